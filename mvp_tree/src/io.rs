//! Binary encode and decode of whole trees
//!
//! One file per tree: a fixed-size header carrying the build configuration,
//! then a pre-order stream of tagged nodes. Everything multi-byte is big
//! endian. The metric is never persisted; the caller re-supplies it on load,
//! and a tree decoded with a different metric than it was built with silently
//! answers queries wrong, so don't.

use crate::data::{DataPoint, StoredPoint};
use crate::error::IndexError;
use crate::layout;
use crate::metric::Metric;
use crate::node::{InternalNode, LeafNode, Node, NodeId, NodeStore};
use crate::tree::{Tree, TreeConfig};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Encodes the whole tree to a byte buffer.
pub fn serialize(tree: &Tree) -> Result<Vec<u8>, IndexError> {

    let mut out: Vec<u8> = Vec::new();

    write_header(&mut out, tree);
    write_node(&mut out, tree, Some(tree.root))?;

    Ok(out)
}

/// Decodes a tree from `bytes`. The supplied configuration must match the one
/// in the file header; the metric must be the one the tree was built with.
pub fn deserialize(
    bytes: &[u8],
    config: &TreeConfig,
    metric: Box<dyn Metric>,
) -> Result<Tree, IndexError> {

    config.validate()?;

    if bytes.len() < layout::HEADER_SIZE {
        return Err(IndexError::Corrupt("truncated header"));
    }

    let (count, next_seq) = read_header(bytes, config)?;

    let mut reader = &bytes[layout::HEADER_SIZE..];
    let mut store = NodeStore::new();
    let root = read_node(&mut reader, &mut store, config)?
        .ok_or(IndexError::Corrupt("missing root node"))?;

    if !reader.is_empty() {
        return Err(IndexError::Corrupt("trailing bytes after tree body"));
    }

    let stored: usize = store
        .store
        .iter()
        .map(|node| match node {
            Node::Leaf(leaf) => leaf.len(),
            Node::Internal(_) => 0,
        })
        .sum();
    if stored as u64 != count {
        return Err(IndexError::Corrupt("header point count disagrees with body"));
    }

    Ok(Tree {
        config: config.clone(),
        metric,
        store,
        root,
        count: stored,
        next_seq,
    })
}

/// Writes the tree to `path` through a sibling temporary file and an atomic
/// rename, so a failed or interrupted save leaves any previous file intact.
pub fn save(tree: &Tree, path: &Path) -> Result<(), IndexError> {

    let bytes = serialize(tree)?;

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    //write failures here must not surface as NotFound/Corrupt remaps
    fs::write(&tmp_path, &bytes).map_err(IndexError::Io)?;
    fs::rename(&tmp_path, path).map_err(IndexError::Io)?;

    Ok(())
}

/// Reads the tree stored at `path`. A missing file is `NotFound`, a short or
/// garbled one is `Corrupt`.
pub fn load(path: &Path, config: &TreeConfig, metric: Box<dyn Metric>) -> Result<Tree, IndexError> {

    let bytes = fs::read(path)?;

    deserialize(&bytes, config, metric)
}

fn write_header(out: &mut Vec<u8>, tree: &Tree) {

    let mut arr = [0u8; layout::HEADER_SIZE];

    arr[layout::MAGIC_START..layout::MAGIC_START + layout::MAGIC_SIZE]
        .copy_from_slice(&layout::MAGIC);
    arr[layout::VERSION_OFFSET] = layout::FORMAT_VERSION;

    BigEndian::write_u32(
        &mut arr[layout::BRANCH_FACTOR_OFFSET..layout::BRANCH_FACTOR_OFFSET + layout::BRANCH_FACTOR_SIZE],
        tree.config.branch_factor as u32,
    );
    BigEndian::write_u32(
        &mut arr[layout::PATH_LENGTH_OFFSET..layout::PATH_LENGTH_OFFSET + layout::PATH_LENGTH_SIZE],
        tree.config.path_length as u32,
    );
    BigEndian::write_u32(
        &mut arr[layout::LEAF_CAPACITY_OFFSET..layout::LEAF_CAPACITY_OFFSET + layout::LEAF_CAPACITY_SIZE],
        tree.config.leaf_capacity as u32,
    );
    BigEndian::write_u64(
        &mut arr[layout::POINT_COUNT_OFFSET..layout::POINT_COUNT_OFFSET + layout::POINT_COUNT_SIZE],
        tree.count as u64,
    );
    BigEndian::write_u64(
        &mut arr[layout::NEXT_SEQ_OFFSET..layout::NEXT_SEQ_OFFSET + layout::NEXT_SEQ_SIZE],
        tree.next_seq,
    );

    out.extend_from_slice(&arr);
}

fn read_header(bytes: &[u8], config: &TreeConfig) -> Result<(u64, u64), IndexError> {

    if bytes[layout::MAGIC_START..layout::MAGIC_START + layout::MAGIC_SIZE] != layout::MAGIC {
        return Err(IndexError::Corrupt("bad magic"));
    }
    if bytes[layout::VERSION_OFFSET] != layout::FORMAT_VERSION {
        return Err(IndexError::Corrupt("unsupported format version"));
    }

    let branch_factor = BigEndian::read_u32(&bytes[layout::BRANCH_FACTOR_OFFSET..]) as usize;
    let path_length = BigEndian::read_u32(&bytes[layout::PATH_LENGTH_OFFSET..]) as usize;
    let leaf_capacity = BigEndian::read_u32(&bytes[layout::LEAF_CAPACITY_OFFSET..]) as usize;

    if branch_factor != config.branch_factor {
        return Err(IndexError::ConfigMismatch("stored branch factor differs"));
    }
    if path_length != config.path_length {
        return Err(IndexError::ConfigMismatch("stored path length differs"));
    }
    if leaf_capacity != config.leaf_capacity {
        return Err(IndexError::ConfigMismatch("stored leaf capacity differs"));
    }

    let count = BigEndian::read_u64(&bytes[layout::POINT_COUNT_OFFSET..]);
    let next_seq = BigEndian::read_u64(&bytes[layout::NEXT_SEQ_OFFSET..]);

    Ok((count, next_seq))
}

fn write_node(out: &mut Vec<u8>, tree: &Tree, child: Option<NodeId>) -> Result<(), IndexError> {

    let node_id = match child {
        None => {
            out.push(layout::TAG_EMPTY);
            return Ok(());
        }
        Some(node_id) => node_id,
    };

    match tree.store.get(node_id)? {

        Node::Internal(node) => {
            out.push(layout::TAG_INTERNAL);

            write_point(out, &node.first_vantage)?;
            write_point(out, &node.second_vantage)?;

            for bound in node.first_bounds.iter() {
                out.write_f32::<BigEndian>(*bound).map_err(IndexError::Io)?;
            }
            for bound in node.second_bounds.iter() {
                out.write_f32::<BigEndian>(*bound).map_err(IndexError::Io)?;
            }

            for slot in node.children.iter() {
                write_node(out, tree, *slot)?;
            }
        }

        Node::Leaf(leaf) => {
            out.push(layout::TAG_LEAF);

            let len = u32::try_from(leaf.len())
                .map_err(|_| IndexError::Corrupt("leaf too large to encode"))?;
            out.write_u32::<BigEndian>(len).map_err(IndexError::Io)?;

            for record in leaf.records.iter() {
                write_record(out, record)?;
            }
        }
    }

    Ok(())
}

fn read_node<R: Read>(
    reader: &mut R,
    store: &mut NodeStore,
    config: &TreeConfig,
) -> Result<Option<NodeId>, IndexError> {

    let tag = reader.read_u8()?;

    match tag {

        layout::TAG_EMPTY => Ok(None),

        layout::TAG_INTERNAL => {
            let first_vantage = read_point(reader)?;
            let second_vantage = read_point(reader)?;

            let bf = config.branch_factor;
            let mut first_bounds: Vec<f32> = Vec::with_capacity(bf - 1);
            for _ in 0..bf - 1 {
                first_bounds.push(reader.read_f32::<BigEndian>()?);
            }
            let mut second_bounds: Vec<f32> = Vec::with_capacity(bf * (bf - 1));
            for _ in 0..bf * (bf - 1) {
                second_bounds.push(reader.read_f32::<BigEndian>()?);
            }

            let node_id = store.add_node(Node::Internal(InternalNode {
                first_vantage,
                second_vantage,
                first_bounds,
                second_bounds,
                children: vec![None; config.fanout()],
            }));

            for slot in 0..config.fanout() {
                if let Some(child) = read_node(reader, store, config)? {
                    store.set_child(node_id, slot, child)?;
                }
            }

            Ok(Some(node_id))
        }

        layout::TAG_LEAF => {
            let len = reader.read_u32::<BigEndian>()? as usize;

            let mut records: Vec<StoredPoint> = Vec::new();
            records.try_reserve(len)?;
            for _ in 0..len {
                records.push(read_record(reader)?);
            }

            Ok(Some(store.add_node(Node::Leaf(LeafNode { records }))))
        }

        _ => Err(IndexError::Corrupt("unknown node tag")),
    }
}

fn write_point(out: &mut Vec<u8>, point: &DataPoint) -> Result<(), IndexError> {

    let id_len = u16::try_from(point.id.len())
        .map_err(|_| IndexError::Corrupt("identifier too long to encode"))?;
    out.write_u16::<BigEndian>(id_len).map_err(IndexError::Io)?;
    out.extend_from_slice(point.id.as_bytes());

    let payload_len = u32::try_from(point.payload.len())
        .map_err(|_| IndexError::Corrupt("payload too long to encode"))?;
    out.write_u32::<BigEndian>(payload_len).map_err(IndexError::Io)?;
    out.extend_from_slice(&point.payload);

    Ok(())
}

fn read_point<R: Read>(reader: &mut R) -> Result<DataPoint, IndexError> {

    let id_len = reader.read_u16::<BigEndian>()? as usize;
    let mut id_bytes = vec![0u8; id_len];
    reader.read_exact(&mut id_bytes)?;
    let id = String::from_utf8(id_bytes)
        .map_err(|_| IndexError::Corrupt("identifier is not valid UTF-8"))?;

    let payload_len = reader.read_u32::<BigEndian>()? as usize;
    let mut payload: Vec<u8> = Vec::new();
    payload.try_reserve(payload_len)?;
    payload.resize(payload_len, 0);
    reader.read_exact(&mut payload)?;

    Ok(DataPoint { id, payload })
}

fn write_record(out: &mut Vec<u8>, record: &StoredPoint) -> Result<(), IndexError> {

    out.write_u64::<BigEndian>(record.seq).map_err(IndexError::Io)?;
    write_point(out, &record.point)?;

    let path_len = u8::try_from(record.path.len())
        .map_err(|_| IndexError::Corrupt("distance path too long to encode"))?;
    out.push(path_len);
    for d in record.path.iter() {
        out.write_f32::<BigEndian>(*d).map_err(IndexError::Io)?;
    }

    Ok(())
}

fn read_record<R: Read>(reader: &mut R) -> Result<StoredPoint, IndexError> {

    let seq = reader.read_u64::<BigEndian>()?;
    let point = read_point(reader)?;

    let path_len = reader.read_u8()? as usize;
    let mut path: Vec<f32> = Vec::with_capacity(path_len);
    for _ in 0..path_len {
        path.push(reader.read_f32::<BigEndian>()?);
    }

    Ok(StoredPoint { seq, point, path })
}
