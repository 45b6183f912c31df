//! Pluggable distance functions over data points
//!
//! The tree only assumes the metric axioms: symmetry, non-negativity and the triangle
//! inequality. Violating the triangle inequality breaks query pruning silently, so a
//! metric implementation owes the tree that much. Implementations must also be pure;
//! the tree calls them with no synchronization whatsoever.

use crate::data::{DataPoint, HASH_PAYLOAD_SIZE};
use crate::error::IndexError;

pub trait Metric {

    /// Distance between two points. Fails with `IncomparablePoints` when the
    /// operands cannot be compared, e.g. payload widths differ.
    fn distance(&self, a: &DataPoint, b: &DataPoint) -> Result<f32, IndexError>;

    /// Insert-time payload check. A point that fails here would fail `distance`
    /// against any stored point, so the tree rejects it before descending; the
    /// default accepts everything.
    fn validate(&self, point: &DataPoint) -> Result<(), IndexError> {
        let _ = point;
        Ok(())
    }
}

/// Hamming distance over 64-bit perceptual hashes: population count of the XOR
/// of the two payloads, in [0, 64].
#[derive(Debug, Clone, Copy, Default)]
pub struct HammingMetric;

impl HammingMetric {

    fn to_u64(point: &DataPoint) -> Result<u64, IndexError> {
        let arr: [u8; HASH_PAYLOAD_SIZE] = point
            .payload
            .as_slice()
            .try_into()
            .map_err(|_| IndexError::IncomparablePoints)?;
        Ok(u64::from_be_bytes(arr))
    }
}

impl Metric for HammingMetric {

    fn distance(&self, a: &DataPoint, b: &DataPoint) -> Result<f32, IndexError> {
        let a = Self::to_u64(a)?;
        let b = Self::to_u64(b)?;
        Ok((a ^ b).count_ones() as f32)
    }

    fn validate(&self, point: &DataPoint) -> Result<(), IndexError> {
        match point.payload.len() == HASH_PAYLOAD_SIZE {
            true => Ok(()),
            false => Err(IndexError::IncomparablePoints),
        }
    }
}
