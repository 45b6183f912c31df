//! Implementation of MVP-tree creation, insertion and querying

use crate::data::{DataPoint, InsertReport, Neighbor, StoredPoint};
use crate::error::IndexError;
use crate::io;
use crate::metric::Metric;
use crate::node::{band_intersects, band_range, InternalNode, LeafNode, Node, NodeId, NodeStore};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TreeConfig {
    pub branch_factor: usize,
    pub path_length: usize,
    pub leaf_capacity: usize,
}

impl TreeConfig {

    /// The parameters the original image-hash tools were built with.
    pub fn default() -> Self {
        Self {
            branch_factor: 2,
            path_length: 5,
            leaf_capacity: 25,
        }
    }

    pub fn from_file(filename: &str) -> Result<Self, IndexError> {

        let serialized = std::fs::read_to_string(filename)?;

        let deserialized: Self =
            serde_yaml::from_str(&serialized).map_err(|_| IndexError::Corrupt("invalid tree config file"))?;
        deserialized.validate()?;

        Ok(deserialized)
    }

    pub fn to_file(&self, filename: &str) -> Result<(), IndexError> {

        let serialized =
            serde_yaml::to_string(self).map_err(|_| IndexError::Corrupt("unencodable tree config"))?;
        let mut file = File::create(filename)?;
        file.write_all(serialized.as_bytes())?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), IndexError> {

        if self.branch_factor < 2 {
            return Err(IndexError::ConfigMismatch("branch factor must be at least 2"));
        }
        if self.leaf_capacity == 0 {
            return Err(IndexError::ConfigMismatch("leaf capacity must be nonzero"));
        }

        Ok(())
    }

    /// Child slots per internal node: two vantage levels of `branch_factor` bands each.
    pub fn fanout(&self) -> usize {
        self.branch_factor * self.branch_factor
    }
}

/// Struct to represent the MVP tree
///
/// Owns every node and stored point. Not internally synchronized: a query
/// concurrent with an insert is undefined, callers impose their own lock.
pub struct Tree {
    pub config: TreeConfig,
    pub metric: Box<dyn Metric>,
    pub store: NodeStore,
    pub root: NodeId,
    pub count: usize,
    pub next_seq: u64,
}

///struct for keeping the closest points seen so far during a query
///
///keeps at most `capacity` hits sorted by (distance, insertion sequence) and
///exposes the working radius that branch-and-bound pruning tightens against
#[derive(Debug)]
pub struct HitSet {
    capacity: usize,
    radius: f32,
    hits: Vec<Hit>,
}

#[derive(Debug, Clone)]
struct Hit {
    distance: f32,
    seq: u64,
    point: DataPoint,
}

impl HitSet {

    pub fn new(capacity: usize, radius: f32) -> Self {
        Self {
            capacity,
            radius,
            hits: Vec::new(),
        }
    }

    ///Caller radius until the set fills, then the k-th best distance if smaller
    pub fn working_radius(&self) -> f32 {

        if self.hits.len() < self.capacity {
            return self.radius;
        }

        match self.hits.last() {
            Some(last) => self.radius.min(last.distance),
            None => self.radius,
        }
    }

    ///To be called on every candidate record; keeps the set sorted and truncated
    pub fn try_add(&mut self, distance: f32, seq: u64, point: &DataPoint) {

        if distance > self.radius {
            return;
        }

        if self.hits.len() == self.capacity {
            match self.hits.last() {
                Some(last) if (distance, seq) < (last.distance, last.seq) => {}
                _ => return,
            }
        }

        let insert_index = self
            .hits
            .iter()
            .position(|h| (distance, seq) < (h.distance, h.seq))
            .unwrap_or(self.hits.len());

        self.hits.insert(
            insert_index,
            Hit {
                distance,
                seq,
                point: point.clone(),
            },
        );
        self.hits.truncate(self.capacity);
    }

    pub fn into_neighbors(self) -> Vec<Neighbor> {

        self.hits
            .into_iter()
            .map(|h| Neighbor {
                point: h.point,
                distance: h.distance,
            })
            .collect()
    }
}

//decision taken at each node while descending for an insert
enum Descent {
    Into(NodeId),
    EmptySlot(usize),
    Arrived,
}

//record plus its distances to the vantage points of the node being built
struct Keyed {
    d1: f32,
    d2: f32,
    record: StoredPoint,
}

impl Tree {

    pub fn new(config: TreeConfig, metric: Box<dyn Metric>) -> Result<Self, IndexError> {

        config.validate()?;

        let mut store = NodeStore::new();
        let root = store.add_node(Node::Leaf(LeafNode::empty()));

        Ok(Self {
            config,
            metric,
            store,
            root,
            count: 0,
            next_seq: 0,
        })
    }

    /// Loads the tree stored at `path`, or starts an empty one when no file
    /// exists there yet. The configuration must match the one the stored tree
    /// was built with.
    pub fn open_or_create(
        path: &Path,
        config: TreeConfig,
        metric: Box<dyn Metric>,
    ) -> Result<Self, IndexError> {

        match path.exists() {
            true => io::load(path, &config, metric),
            false => Self::new(config, metric),
        }
    }

    /// Serializes the whole tree to `path`, writing through a temporary file
    /// and renaming it into place so an interrupted save leaves any previous
    /// file untouched.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        io::save(self, path)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drops every node and stored point; the root becomes an empty leaf and
    /// sequence numbering restarts.
    pub fn clear(&mut self) {

        self.store = NodeStore::new();
        self.root = self.store.add_node(Node::Leaf(LeafNode::empty()));
        self.count = 0;
        self.next_seq = 0;
    }

    ///Inserts a batch of points. A point the metric rejects is skipped and
    ///reported in the result, never failing the rest of the batch; any other
    ///error aborts the call.
    pub fn insert(&mut self, points: Vec<DataPoint>) -> Result<InsertReport, IndexError> {

        let mut report = InsertReport::default();

        for point in points {

            match self.metric.validate(&point) {
                Ok(()) => {}
                Err(IndexError::IncomparablePoints) => {
                    report.skipped.push(point.id);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let id = point.id.clone();
            match self.insert_one(point) {
                Ok(()) => report.inserted += 1,
                Err(IndexError::IncomparablePoints) => report.skipped.push(id),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    ///Descends to a leaf following the distance bands, appends the point, and
    ///splits the leaf when it overflows its capacity.
    fn insert_one(&mut self, point: DataPoint) -> Result<(), IndexError> {

        let mut path: Vec<f32> = Vec::new();
        let mut curr = self.root;

        loop {

            let decision = match self.store.get(curr)? {
                Node::Leaf(_) => Descent::Arrived,
                Node::Internal(node) => {
                    let d1 = self.metric.distance(&point, &node.first_vantage)?;
                    let d2 = self.metric.distance(&point, &node.second_vantage)?;

                    push_path(&mut path, self.config.path_length, d1);
                    push_path(&mut path, self.config.path_length, d2);

                    let slot = node.select_child(self.config.branch_factor, d1, d2);
                    match node.children[slot] {
                        Some(next) => Descent::Into(next),
                        None => Descent::EmptySlot(slot),
                    }
                }
            };

            match decision {
                Descent::Into(next) => {
                    curr = next;
                }
                Descent::EmptySlot(slot) => {
                    let record = StoredPoint {
                        seq: self.next_seq,
                        point,
                        path,
                    };
                    let leaf = self.store.add_node(Node::Leaf(LeafNode {
                        records: vec![record],
                    }));
                    self.store.set_child(curr, slot, leaf)?;
                    self.next_seq += 1;
                    self.count += 1;
                    return Ok(());
                }
                Descent::Arrived => {
                    let record = StoredPoint {
                        seq: self.next_seq,
                        point,
                        path,
                    };
                    let len = self.store.push_record(curr, record)?;
                    self.next_seq += 1;
                    self.count += 1;

                    if len > self.config.leaf_capacity {
                        self.split(curr)?;
                    }
                    return Ok(());
                }
            }
        }
    }

    ///Internal method to take one overflowing leaf, choose vantage points from
    ///its records, and replace it in place with an internal node whose children
    ///hold the redistributed records. Replacing at the same arena index means no
    ///parent link needs updating.
    fn split(&mut self, leaf_id: NodeId) -> Result<(), IndexError> {

        let records = match self.store.get(leaf_id)? {
            Node::Leaf(leaf) => leaf.records.clone(),
            Node::Internal(_) => return Err(IndexError::Corrupt("split target is not a leaf")),
        };

        let node = self.build_internal(records)?;
        self.store.update_node(leaf_id, Node::Internal(node))
    }

    ///Builds an internal node over `records`, cascading into further internal
    ///nodes for any band that still exceeds the leaf capacity.
    ///
    ///Vantage selection: the earliest-inserted record, then the record farthest
    ///from it (earliest again on ties). Bands are equal-count cuts of the
    ///records ordered by (distance, sequence), so the partition stays total and
    ///makes progress even when many distances tie.
    fn build_internal(&mut self, records: Vec<StoredPoint>) -> Result<InternalNode, IndexError> {

        let bf = self.config.branch_factor;
        let path_length = self.config.path_length;

        let first_vantage = records
            .iter()
            .min_by_key(|r| r.seq)
            .map(|r| r.point.clone())
            .ok_or(IndexError::Corrupt("split of an empty leaf"))?;

        let mut keyed: Vec<Keyed> = Vec::with_capacity(records.len());
        for record in records {
            let d1 = self.metric.distance(&record.point, &first_vantage)?;
            keyed.push(Keyed {
                d1,
                d2: 0.0,
                record,
            });
        }

        let mut farthest: Option<&Keyed> = None;
        for k in keyed.iter() {
            let better = match farthest {
                None => true,
                Some(best) => {
                    k.d1 > best.d1 || (k.d1 == best.d1 && k.record.seq < best.record.seq)
                }
            };
            if better {
                farthest = Some(k);
            }
        }
        let second_vantage = match farthest {
            Some(k) => k.record.point.clone(),
            None => first_vantage.clone(),
        };

        for k in keyed.iter_mut() {
            k.d2 = self.metric.distance(&k.record.point, &second_vantage)?;
            push_path(&mut k.record.path, path_length, k.d1);
            push_path(&mut k.record.path, path_length, k.d2);
        }

        //first vantage level: equal-count bands by rank
        keyed.sort_by(|a, b| {
            a.d1.partial_cmp(&b.d1)
                .unwrap()
                .then(a.record.seq.cmp(&b.record.seq))
        });

        let (groups, first_bounds) = cut_into_bands(keyed, bf, |k| k.d1);

        //second vantage level inside each band
        let mut second_bounds: Vec<f32> = Vec::with_capacity(bf * (bf - 1));
        let mut children: Vec<Option<NodeId>> = vec![None; self.config.fanout()];

        for (band, mut group) in groups.into_iter().enumerate() {

            group.sort_by(|a, b| {
                a.d2.partial_cmp(&b.d2)
                    .unwrap()
                    .then(a.record.seq.cmp(&b.record.seq))
            });

            let (buckets, band_bounds) = cut_into_bands(group, bf, |k| k.d2);
            second_bounds.extend(band_bounds);

            for (sub, bucket) in buckets.into_iter().enumerate() {
                if bucket.is_empty() {
                    continue;
                }

                let bucket_records: Vec<StoredPoint> =
                    bucket.into_iter().map(|k| k.record).collect();

                let child = match bucket_records.len() <= self.config.leaf_capacity {
                    true => self.store.add_node(Node::Leaf(LeafNode {
                        records: bucket_records,
                    })),
                    false => {
                        let inner = self.build_internal(bucket_records)?;
                        self.store.add_node(Node::Internal(inner))
                    }
                };

                children[band * bf + sub] = Some(child);
            }
        }

        Ok(InternalNode {
            first_vantage,
            second_vantage,
            first_bounds,
            second_bounds,
            children,
        })
    }

    ///Returns at most `knearest` points within `radius` of `probe`, closest
    ///first, distance ties broken by insertion order.
    ///
    ///Performance worsens as `knearest` grows, since fewer bands can be pruned
    ///once the working radius is bounded by more distant already-found points.
    pub fn query(
        &self,
        probe: &DataPoint,
        knearest: usize,
        radius: f32,
    ) -> Result<Vec<Neighbor>, IndexError> {

        self.metric.validate(probe)?;

        if knearest == 0 || radius < 0.0 {
            return Ok(Vec::new());
        }

        let mut hits = HitSet::new(knearest, radius);
        let mut query_path: Vec<f32> = Vec::new();
        self.query_node(self.root, probe, &mut query_path, &mut hits)?;

        Ok(hits.into_neighbors())
    }

    fn query_node(
        &self,
        node_id: NodeId,
        probe: &DataPoint,
        query_path: &mut Vec<f32>,
        hits: &mut HitSet,
    ) -> Result<(), IndexError> {

        match self.store.get(node_id)? {

            Node::Leaf(leaf) => {
                for record in leaf.records.iter() {

                    let working_radius = hits.working_radius();

                    //cached vantage distances rule the record out by the
                    //triangle inequality without touching the metric
                    let shared = record.path.len().min(query_path.len());
                    let pruned = (0..shared)
                        .any(|i| (record.path[i] - query_path[i]).abs() > working_radius);
                    if pruned {
                        continue;
                    }

                    let distance = self.metric.distance(probe, &record.point)?;
                    if distance <= working_radius {
                        hits.try_add(distance, record.seq, &record.point);
                    }
                }
            }

            Node::Internal(node) => {

                let bf = self.config.branch_factor;
                let d1 = self.metric.distance(probe, &node.first_vantage)?;
                let d2 = self.metric.distance(probe, &node.second_vantage)?;

                let depth_before = query_path.len();
                push_path(query_path, self.config.path_length, d1);
                push_path(query_path, self.config.path_length, d2);

                for band in 0..bf {

                    let (lo, hi) = band_range(band, &node.first_bounds, bf);
                    if !band_intersects(d1, hits.working_radius(), lo, hi) {
                        continue;
                    }

                    let sub_bounds = node.second_bounds_of(bf, band);
                    for sub in 0..bf {

                        let (lo, hi) = band_range(sub, sub_bounds, bf);
                        if !band_intersects(d2, hits.working_radius(), lo, hi) {
                            continue;
                        }

                        if let Some(child) = node.children[band * bf + sub] {
                            self.query_node(child, probe, query_path, hits)?;
                        }
                    }
                }

                query_path.truncate(depth_before);
            }
        }

        Ok(())
    }

    ///Human-readable pre-order print of the whole structure for diagnostics
    pub fn debug_dump(&self) -> String {

        let mut out = String::new();
        let _ = writeln!(
            out,
            "tree: {} points, {} nodes, branch_factor={} path_length={} leaf_capacity={}",
            self.count,
            self.store.len(),
            self.config.branch_factor,
            self.config.path_length,
            self.config.leaf_capacity
        );
        self.dump_node(self.root, 0, &mut out);

        out
    }

    fn dump_node(&self, node_id: NodeId, depth: usize, out: &mut String) {

        let pad = "  ".repeat(depth);

        match self.store.get(node_id) {
            Err(_) => {
                let _ = writeln!(out, "{}<dangling node {}>", pad, node_id);
            }
            Ok(Node::Leaf(leaf)) => {
                let _ = writeln!(out, "{}LEAF {} records", pad, leaf.len());
                for record in leaf.records.iter() {
                    match record.point.as_hash() {
                        Some(hash) => {
                            let _ = writeln!(out, "{}  {:016x} {}", pad, hash, record.point.id);
                        }
                        None => {
                            let _ = writeln!(
                                out,
                                "{}  <{} bytes> {}",
                                pad,
                                record.point.payload.len(),
                                record.point.id
                            );
                        }
                    }
                }
            }
            Ok(Node::Internal(node)) => {
                let _ = writeln!(
                    out,
                    "{}INTERNAL vp1={} vp2={} bounds={:?}|{:?}",
                    pad, node.first_vantage.id, node.second_vantage.id, node.first_bounds, node.second_bounds
                );
                for child in node.children.iter() {
                    match child {
                        Some(id) => self.dump_node(*id, depth + 1, out),
                        None => {
                            let _ = writeln!(out, "{}  -", pad);
                        }
                    }
                }
            }
        }
    }
}

fn push_path(path: &mut Vec<f32>, path_length: usize, d: f32) {

    if path.len() < path_length {
        path.push(d);
    }
}

///Cuts records already sorted by `key` into `count` equal-count bands.
///
///Returns the bands and the `count - 1` boundaries between them; the boundary
///recorded for a band is the largest key inside it, so band ranges are closed
///intervals. A band left empty by the rank arithmetic reuses the previous
///boundary, which keeps the sequence monotone and the band unreachable.
fn cut_into_bands<F>(sorted: Vec<Keyed>, count: usize, key: F) -> (Vec<Vec<Keyed>>, Vec<f32>)
where
    F: Fn(&Keyed) -> f32,
{
    let n = sorted.len();
    let mut rest = sorted;
    let mut bands: Vec<Vec<Keyed>> = Vec::with_capacity(count);
    let mut bounds: Vec<f32> = Vec::with_capacity(count - 1);

    for band in 0..count {
        let take = ((band + 1) * n / count) - (band * n / count);
        let tail = rest.split_off(take);
        let group = std::mem::replace(&mut rest, tail);

        if band < count - 1 {
            let bound = match group.last() {
                Some(k) => key(k),
                None => bounds.last().copied().unwrap_or(0.0),
            };
            bounds.push(bound);
        }
        bands.push(group);
    }

    (bands, bounds)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::metric::HammingMetric;

    fn small_tree(leaf_capacity: usize) -> Tree {

        let config = TreeConfig {
            branch_factor: 2,
            path_length: 5,
            leaf_capacity,
        };
        Tree::new(config, Box::new(HammingMetric)).unwrap()
    }

    fn ids(neighbors: &[Neighbor]) -> Vec<String> {
        neighbors.iter().map(|n| n.point.id.clone()).collect()
    }

    //walks every leaf in the arena
    fn leaf_lengths(tree: &Tree) -> Vec<usize> {

        tree.store
            .store
            .iter()
            .filter_map(|node| match node {
                Node::Leaf(leaf) => Some(leaf.len()),
                Node::Internal(_) => None,
            })
            .collect()
    }

    #[test]
    fn two_close_hashes_come_back_in_distance_order() {

        let mut tree = small_tree(25);

        let report = tree
            .insert(vec![
                DataPoint::from_hash("a".to_string(), 0x0000000000000000),
                DataPoint::from_hash("b".to_string(), 0x0000000000000001),
            ])
            .unwrap();
        assert_eq!(report.inserted, 2);
        assert!(report.skipped.is_empty());

        let probe = DataPoint::from_hash("probe".to_string(), 0x0);
        let hits = tree.query(&probe, 5, 1.0).unwrap();

        assert_eq!(ids(&hits), vec!["a", "b"]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
    }

    #[test]
    fn overflowing_a_leaf_splits_the_root_and_loses_nothing() {

        let mut tree = small_tree(25);

        let points: Vec<DataPoint> = (0..30u64)
            .map(|i| DataPoint::from_hash(format!("p{}", i), 1u64 << (i % 60)))
            .collect();

        let report = tree.insert(points).unwrap();
        assert_eq!(report.inserted, 30);

        match tree.store.get(tree.root).unwrap() {
            Node::Internal(_) => {}
            Node::Leaf(_) => panic!("root did not split"),
        }

        let probe = DataPoint::from_hash("probe".to_string(), 0);
        let hits = tree.query(&probe, 30, 64.0).unwrap();
        assert_eq!(hits.len(), 30);
    }

    #[test]
    fn querying_an_empty_tree_finds_nothing() {

        let tree = small_tree(25);

        let probe = DataPoint::from_hash("probe".to_string(), 0xabcd);
        let hits = tree.query(&probe, 5, 21.0).unwrap();

        assert!(hits.is_empty());
    }

    #[test]
    fn mismatched_payload_is_skipped_not_fatal() {

        let mut tree = small_tree(25);

        let report = tree
            .insert(vec![
                DataPoint::from_hash("good_1".to_string(), 7),
                DataPoint::new("bad".to_string(), vec![1, 2, 3]),
                DataPoint::from_hash("good_2".to_string(), 9),
            ])
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, vec!["bad".to_string()]);
        assert_eq!(tree.len(), 2);

        let probe = DataPoint::from_hash("probe".to_string(), 7);
        let hits = tree.query(&probe, 5, 64.0).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn malformed_probe_is_an_error_not_partial_results() {

        let mut tree = small_tree(25);
        tree.insert(vec![DataPoint::from_hash("a".to_string(), 1)])
            .unwrap();

        let probe = DataPoint::new("probe".to_string(), vec![0u8; 3]);
        assert!(matches!(
            tree.query(&probe, 5, 21.0),
            Err(IndexError::IncomparablePoints)
        ));
    }

    #[test]
    fn no_leaf_ever_exceeds_capacity() {

        for leaf_capacity in [1, 2, 5, 25] {

            let mut tree = small_tree(leaf_capacity);

            for _ in 0..40 {
                tree.insert(vec![DataPoint::random()]).unwrap();
            }
            let batch: Vec<DataPoint> = (0..200).map(|_| DataPoint::random()).collect();
            tree.insert(batch).unwrap();

            for len in leaf_lengths(&tree) {
                assert!(len <= leaf_capacity);
            }
            assert_eq!(tree.len(), 240);
        }
    }

    #[test]
    fn pruning_never_loses_a_match() {

        //compare every query against a brute-force scan of the same points
        let metric = HammingMetric;

        for _ in 0..20 {

            let mut tree = small_tree(5);
            let points: Vec<DataPoint> = (0..300)
                .map(|i| {
                    let mut p = DataPoint::random();
                    p.id = format!("p{}", i);
                    p
                })
                .collect();
            tree.insert(points.clone()).unwrap();

            let probe = DataPoint::random();
            for radius in [0.0, 1.0, 3.0, 10.0, 21.0, 64.0] {

                let mut expected: Vec<(f32, usize)> = points
                    .iter()
                    .enumerate()
                    .filter_map(|(i, p)| {
                        let d = metric.distance(&probe, p).unwrap();
                        match d <= radius {
                            true => Some((d, i)),
                            false => None,
                        }
                    })
                    .collect();
                expected.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
                expected.truncate(points.len());

                let hits = tree.query(&probe, points.len(), radius).unwrap();

                let got: Vec<String> = ids(&hits);
                let want: Vec<String> = expected
                    .iter()
                    .map(|(_, i)| points[*i].id.clone())
                    .collect();

                assert_eq!(got, want, "radius {}", radius);
            }
        }
    }

    #[test]
    fn knearest_truncates_after_sorting() {

        let mut tree = small_tree(3);

        let points: Vec<DataPoint> = (0..6u64)
            .map(|i| {
                //hash with i low bits set: distance to zero probe == i
                DataPoint::from_hash(format!("d{}", i), (1u64 << i) - 1)
            })
            .collect();
        tree.insert(points).unwrap();

        let probe = DataPoint::from_hash("probe".to_string(), 0);
        let hits = tree.query(&probe, 3, 64.0).unwrap();

        assert_eq!(ids(&hits), vec!["d0", "d1", "d2"]);
    }

    #[test]
    fn equal_distances_come_back_in_insertion_order() {

        let mut tree = small_tree(4);

        //every payload is at distance one from the zero probe
        let points: Vec<DataPoint> = (0..12u64)
            .map(|i| DataPoint::from_hash(format!("bit{}", i), 1u64 << i))
            .collect();
        tree.insert(points).unwrap();

        let probe = DataPoint::from_hash("probe".to_string(), 0);
        let hits = tree.query(&probe, 12, 1.0).unwrap();

        let want: Vec<String> = (0..12).map(|i| format!("bit{}", i)).collect();
        assert_eq!(ids(&hits), want);

        //truncation keeps the earliest-inserted of the tied points
        let hits = tree.query(&probe, 4, 1.0).unwrap();
        let want: Vec<String> = (0..4).map(|i| format!("bit{}", i)).collect();
        assert_eq!(ids(&hits), want);
    }

    #[test]
    fn duplicate_payloads_split_and_stay_retrievable() {

        let mut tree = small_tree(4);

        let points: Vec<DataPoint> = (0..30)
            .map(|i| DataPoint::from_hash(format!("dup{}", i), 0x1234))
            .collect();
        tree.insert(points).unwrap();

        for len in leaf_lengths(&tree) {
            assert!(len <= 4);
        }

        let probe = DataPoint::from_hash("probe".to_string(), 0x1234);
        let hits = tree.query(&probe, 30, 0.0).unwrap();
        assert_eq!(hits.len(), 30);
    }

    #[test]
    fn radius_zero_finds_exact_matches_only() {

        let mut tree = small_tree(25);
        tree.insert(vec![
            DataPoint::from_hash("exact".to_string(), 0xcafe),
            DataPoint::from_hash("near".to_string(), 0xcaff),
            DataPoint::from_hash("far".to_string(), 0),
        ])
        .unwrap();

        let probe = DataPoint::from_hash("probe".to_string(), 0xcafe);
        let hits = tree.query(&probe, 5, 0.0).unwrap();

        assert_eq!(ids(&hits), vec!["exact"]);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn clear_resets_to_an_empty_tree() {

        let mut tree = small_tree(25);
        let batch: Vec<DataPoint> = (0..60).map(|_| DataPoint::random()).collect();
        tree.insert(batch).unwrap();
        assert_eq!(tree.len(), 60);

        tree.clear();

        assert!(tree.is_empty());
        let probe = DataPoint::from_hash("probe".to_string(), 0);
        assert!(tree.query(&probe, 5, 64.0).unwrap().is_empty());

        //sequence numbering restarts
        tree.insert(vec![DataPoint::from_hash("first".to_string(), 0)])
            .unwrap();
        assert_eq!(tree.next_seq, 1);
    }

    #[test]
    fn debug_dump_shows_every_point() {

        let mut tree = small_tree(2);
        tree.insert(vec![
            DataPoint::from_hash("one.jpg".to_string(), 0x1),
            DataPoint::from_hash("two.jpg".to_string(), 0xffff),
            DataPoint::from_hash("three.jpg".to_string(), 0xff00ff),
        ])
        .unwrap();

        let dump = tree.debug_dump();

        assert!(dump.contains("one.jpg"));
        assert!(dump.contains("two.jpg"));
        assert!(dump.contains("three.jpg"));
        assert!(dump.contains("INTERNAL"));
    }

    #[test]
    fn rejects_degenerate_configuration() {

        let config = TreeConfig {
            branch_factor: 1,
            path_length: 5,
            leaf_capacity: 25,
        };
        assert!(matches!(
            Tree::new(config, Box::new(HammingMetric)),
            Err(IndexError::ConfigMismatch(_))
        ));

        let config = TreeConfig {
            branch_factor: 2,
            path_length: 5,
            leaf_capacity: 0,
        };
        assert!(matches!(
            Tree::new(config, Box::new(HammingMetric)),
            Err(IndexError::ConfigMismatch(_))
        ));
    }
}
