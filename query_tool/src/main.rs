//! Runs radius and k-nearest queries against a saved tree file.
//!
//! The probe is either a single hash given on the command line or every entry
//! of a hash-list file (the near-duplicate sweep the original tools ran over a
//! directory of images). Results print as comma-separated identifiers, or as
//! JSON with distances when asked.

use mvp_tree::data::{DataPoint, Neighbor};
use mvp_tree::metric::HammingMetric;
use mvp_tree::tree::{Tree, TreeConfig};

use log::warn;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
#[derive(Parser, Debug)] #[command(author, version, about, long_about = None)]
struct Args {

    ///Tree file to query
    #[arg(short = 'f', long)]
    tree_file: PathBuf,

    ///Probe hash as 16 hex digits
    #[arg(short = 'x', long)]
    hash: Option<String>,

    ///Hash-list file; every entry is queried against the tree
    #[arg(short, long)]
    list: Option<PathBuf>,

    ///Search radius
    #[arg(short, long, default_value_t = 21.0)]
    radius: f32,

    ///Maximum number of results per probe
    #[arg(short, long, default_value_t = 5)]
    knearest: usize,

    ///Emit results as JSON with distances
    #[arg(long)]
    json: bool,

    ///Print the tree structure instead of querying
    #[arg(long)]
    dump: bool,

    ///Optional YAML file overriding branch factor, path length and leaf capacity
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Serialize)]
struct JsonHit<'a> {
    id: &'a str,
    distance: f32,
}

fn main() -> ExitCode {

    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(filename) => match TreeConfig::from_file(filename) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("could not read config {}: {}", filename, e);
                return ExitCode::FAILURE;
            }
        },
        None => TreeConfig::default(),
    };

    let tree = match mvp_tree::io::load(&args.tree_file, &config, Box::new(HammingMetric)) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("could not load {}: {}", args.tree_file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.dump {
        print!("{}", tree.debug_dump());
        return ExitCode::SUCCESS;
    }

    match (&args.hash, &args.list) {
        (Some(hex), _) => query_single(&args, &tree, hex),
        (None, Some(list)) => query_list(&args, &tree, list.clone()),
        (None, None) => {
            eprintln!("nothing to do: pass --hash, --list or --dump");
            ExitCode::FAILURE
        }
    }
}

fn query_single(args: &Args, tree: &Tree, hex: &str) -> ExitCode {

    let hash = match u64::from_str_radix(hex.trim(), 16) {
        Ok(hash) => hash,
        Err(_) => {
            eprintln!("not a 64-bit hex hash: {}", hex);
            return ExitCode::FAILURE;
        }
    };

    let probe = DataPoint::from_hash("0".to_string(), hash);
    let hits = match tree.query(&probe, args.knearest, args.radius) {
        Ok(hits) => hits,
        Err(e) => {
            eprintln!("query failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_hits(&hits, args.json);
    ExitCode::SUCCESS
}

fn query_list(args: &Args, tree: &Tree, list: PathBuf) -> ExitCode {

    let probes = match read_hash_list(&list) {
        Ok(probes) => probes,
        Err(e) => {
            eprintln!("could not read {}: {}", list.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut matches = 0usize;

    for probe in probes.iter() {

        let hits = match tree.query(probe, args.knearest, args.radius) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("{}: query failed: {}", probe.id, e);
                continue;
            }
        };

        if hits.is_empty() {
            continue;
        }
        matches += 1;

        println!("{}:", probe.id);
        print_hits(&hits, args.json);
    }

    println!("Matches: {}", matches);
    ExitCode::SUCCESS
}

fn print_hits(hits: &[Neighbor], json: bool) {

    if json {
        let rows: Vec<JsonHit> = hits
            .iter()
            .map(|n| JsonHit {
                id: &n.point.id,
                distance: n.distance,
            })
            .collect();
        match serde_json::to_string_pretty(&rows) {
            Ok(s) => println!("{}", s),
            Err(e) => warn!("could not encode results: {}", e),
        }
        return;
    }

    let ids: Vec<&str> = hits.iter().map(|n| n.point.id.as_str()).collect();
    println!("{}", ids.join(","));
}

fn read_hash_list(filename: &PathBuf) -> io::Result<Vec<DataPoint>> {

    let file = File::open(filename)?;

    let mut points: Vec<DataPoint> = Vec::new();
    for line in io::BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let stripped = trimmed.strip_prefix("@,").unwrap_or(trimmed);
        let parsed = stripped.split_once(',').and_then(|(hash_part, id)| {
            let hash = u64::from_str_radix(hash_part.trim(), 16).ok()?;
            let id = id.trim();
            match id.is_empty() {
                true => None,
                false => Some(DataPoint::from_hash(id.to_string(), hash)),
            }
        });

        match parsed {
            Some(point) => points.push(point),
            None => warn!("{}: unparsable line: {}", filename.display(), trimmed),
        }
    }

    Ok(points)
}
