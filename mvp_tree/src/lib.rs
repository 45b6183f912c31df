//! Implementation of an in-memory MVP tree (multi-vantage-point tree) for near-duplicate
//! image detection over fixed-length perceptual hash codes.
//!
//! Points are partitioned by their distances to vantage points chosen during node splits,
//! which lets radius and k-nearest queries prune whole subtrees with the triangle
//! inequality instead of scanning every stored hash. The metric is pluggable; the one
//! shipped here is Hamming distance over 64-bit hashes.
//!
//! The whole tree serializes to a single binary file and can be reloaded with the same
//! configuration and metric. The tree is not internally synchronized: concurrent access
//! from multiple threads is on the caller, typically with one lock around the whole tree.

pub mod data;
pub mod error;
pub mod metric;
pub mod node;
pub mod layout;
pub mod io;
pub mod tree;
