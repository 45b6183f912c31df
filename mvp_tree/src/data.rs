//! The indexed unit: an identifier plus the raw hash payload it was computed from

use rand::{distributions::Alphanumeric, Rng};

/// Size in bytes of a 64-bit perceptual hash payload.
pub const HASH_PAYLOAD_SIZE: usize = 8;

/// A point as supplied by the caller: an opaque identifier (typically a filename)
/// and the byte payload the distance function operates on.
///
/// Identifiers are not required to be unique across the whole tree, only useful
/// to the caller when they come back out of a query.
#[derive(Debug, PartialEq, Clone)]
pub struct DataPoint {
    pub id: String,
    pub payload: Vec<u8>,
}

impl DataPoint {

    pub fn new(id: String, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Builds a point from a 64-bit perceptual hash, stored big-endian.
    pub fn from_hash(id: String, hash: u64) -> Self {
        Self {
            id,
            payload: hash.to_be_bytes().to_vec(),
        }
    }

    /// The payload reinterpreted as a 64-bit hash, if it has the right width.
    pub fn as_hash(&self) -> Option<u64> {
        let arr: [u8; HASH_PAYLOAD_SIZE] = self.payload.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(arr))
    }

    pub fn random() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();

        Self::from_hash(id, rand::thread_rng().gen::<u64>())
    }
}

/// A point as held inside the tree: the caller's point plus bookkeeping the
/// query path needs.
///
/// `seq` is the insertion sequence number, used to break distance ties
/// deterministically. `path` holds the point's distances to the vantage points
/// of its ancestor internal nodes in descent order, capped at the tree's
/// `path_length`; leaves use it to discard candidates without re-invoking the
/// metric.
#[derive(Debug, PartialEq, Clone)]
pub struct StoredPoint {
    pub seq: u64,
    pub point: DataPoint,
    pub path: Vec<f32>,
}

/// One query result: a copy of the stored point and its distance to the probe.
#[derive(Debug, PartialEq, Clone)]
pub struct Neighbor {
    pub point: DataPoint,
    pub distance: f32,
}

/// Outcome of a batch insert. Points the metric rejected are skipped rather
/// than failing the batch; their identifiers are reported here.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct InsertReport {
    pub inserted: usize,
    pub skipped: Vec<String>,
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn hash_payload_round_trips() {

        let point = DataPoint::from_hash("img_001.jpg".to_string(), 0xdeadbeef00c0ffee);
        assert_eq!(point.payload.len(), HASH_PAYLOAD_SIZE);
        assert_eq!(point.as_hash(), Some(0xdeadbeef00c0ffee));
    }

    #[test]
    fn short_payload_is_not_a_hash() {

        let point = DataPoint::new("stub".to_string(), vec![1, 2, 3]);
        assert_eq!(point.as_hash(), None);
    }

    #[test]
    fn random_points_have_distinct_ids() {

        let a = DataPoint::random();
        let b = DataPoint::random();
        assert_ne!(a.id, b.id);
    }
}
