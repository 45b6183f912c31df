//! Builds and extends tree files from precomputed perceptual-hash lists.
//!
//! Hash computation happens upstream; this tool only consumes its output. A
//! hash list is plain text with one `<16 hex digits>,<identifier>` entry per
//! line (a leading `@,` marker, as printed by the hashing tools, is accepted
//! and ignored). Lines that do not parse are logged and skipped, never
//! aborting the batch.

use mvp_tree::data::DataPoint;
use mvp_tree::metric::HammingMetric;
use mvp_tree::tree::{Tree, TreeConfig};

use glob::glob;
use kdam::tqdm;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
#[derive(Parser, Debug)] #[command(author, version, about, long_about = None)]
struct Args {

    ///Which task to carry out: "add" inserts hash lists, "print" dumps the structure
    #[arg(short, long)]
    task: String,

    ///Tree file to create or extend
    #[arg(short = 'f', long)]
    tree_file: PathBuf,

    ///Glob pattern matching hash-list files, required for add
    #[arg(short, long)]
    inputs: Option<String>,

    ///Optional YAML file overriding branch factor, path length and leaf capacity
    #[arg(short, long)]
    config: Option<String>,
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

    let result = match args.task.as_str() {
        "add" => add_hash_lists(&args, config),
        "print" => print_tree(&args, config),
        _ => {
            eprintln!("unknown task: {}", args.task);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(had_errors) => match had_errors {
            //same legend as the original tools: 1 means non-critical errors
            true => ExitCode::from(1),
            false => ExitCode::SUCCESS,
        },
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn add_hash_lists(args: &Args, config: TreeConfig) -> Result<bool, String> {

    let pattern = match &args.inputs {
        Some(pattern) => pattern,
        None => return Err("task add needs --inputs".to_string()),
    };

    let mut filenames: Vec<PathBuf> = Vec::new();
    for entry in glob(pattern).map_err(|e| format!("bad glob pattern: {}", e))? {
        match entry {
            Ok(path) => filenames.push(path),
            Err(e) => warn!("skipping unreadable path: {}", e),
        }
    }
    if filenames.is_empty() {
        return Err(format!("no files match {}", pattern));
    }

    let mut tree = Tree::open_or_create(&args.tree_file, config, Box::new(HammingMetric))
        .map_err(|e| format!("could not open {}: {}", args.tree_file.display(), e))?;

    info!("{} points already in tree", tree.len());

    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for filename in tqdm!(filenames.iter()) {

        let (points, bad_lines) = match read_hash_list(filename) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("skipping {}: {}", filename.display(), e);
                skipped += 1;
                continue;
            }
        };
        skipped += bad_lines;

        let report = tree
            .insert(points)
            .map_err(|e| format!("insert failed: {}", e))?;

        for id in report.skipped.iter() {
            warn!("{}: incomparable point {}", filename.display(), id);
        }

        inserted += report.inserted;
        skipped += report.skipped.len();
    }

    tree.save(&args.tree_file)
        .map_err(|e| format!("could not save {}: {}", args.tree_file.display(), e))?;

    println!("{} hashes added to {}", inserted, args.tree_file.display());
    if skipped > 0 {
        println!("{} entries skipped", skipped);
    }

    Ok(skipped > 0)
}

fn print_tree(args: &Args, config: TreeConfig) -> Result<bool, String> {

    let tree = mvp_tree::io::load(&args.tree_file, &config, Box::new(HammingMetric))
        .map_err(|e| format!("could not load {}: {}", args.tree_file.display(), e))?;

    print!("{}", tree.debug_dump());

    Ok(false)
}

///Parses one hash-list file. Returns the points plus the number of lines that
///did not parse.
fn read_hash_list(filename: &Path) -> io::Result<(Vec<DataPoint>, usize)> {

    let file = File::open(filename)?;

    let mut points: Vec<DataPoint> = Vec::new();
    let mut bad_lines = 0usize;

    for line in io::BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_hash_line(trimmed) {
            Some(point) => points.push(point),
            None => {
                warn!("{}: unparsable line: {}", filename.display(), trimmed);
                bad_lines += 1;
            }
        }
    }

    Ok((points, bad_lines))
}

fn parse_hash_line(line: &str) -> Option<DataPoint> {

    let line = line.strip_prefix("@,").unwrap_or(line);

    let (hash_part, id) = line.split_once(',')?;
    let hash = u64::from_str_radix(hash_part.trim(), 16).ok()?;

    let id = id.trim();
    match id.is_empty() {
        true => None,
        false => Some(DataPoint::from_hash(id.to_string(), hash)),
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parses_plain_and_marked_lines() {

        let point = parse_hash_line("00000000000000ff,cat.jpg").unwrap();
        assert_eq!(point.id, "cat.jpg");
        assert_eq!(point.as_hash(), Some(0xff));

        let point = parse_hash_line("@,deadbeef00c0ffee,dog.jpg").unwrap();
        assert_eq!(point.id, "dog.jpg");
        assert_eq!(point.as_hash(), Some(0xdeadbeef00c0ffee));
    }

    #[test]
    fn rejects_garbage_lines() {

        assert!(parse_hash_line("not a hash,x.jpg").is_none());
        assert!(parse_hash_line("0123456789abcdef").is_none());
        assert!(parse_hash_line("0123456789abcdef,").is_none());
    }
}
