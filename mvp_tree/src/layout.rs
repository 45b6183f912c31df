//! Sets constants for the binary file layout

/// File signature at offset zero of every tree file.
pub const MAGIC: [u8; 4] = *b"MVPT";

pub const FORMAT_VERSION: u8 = 1;

pub const MAGIC_START: usize = 0;
pub const MAGIC_SIZE: usize = 4;

pub const VERSION_OFFSET: usize = MAGIC_START + MAGIC_SIZE;
pub const VERSION_SIZE: usize = 1;

pub const BRANCH_FACTOR_OFFSET: usize = VERSION_OFFSET + VERSION_SIZE;
pub const BRANCH_FACTOR_SIZE: usize = 4;

pub const PATH_LENGTH_OFFSET: usize = BRANCH_FACTOR_OFFSET + BRANCH_FACTOR_SIZE;
pub const PATH_LENGTH_SIZE: usize = 4;

pub const LEAF_CAPACITY_OFFSET: usize = PATH_LENGTH_OFFSET + PATH_LENGTH_SIZE;
pub const LEAF_CAPACITY_SIZE: usize = 4;

pub const POINT_COUNT_OFFSET: usize = LEAF_CAPACITY_OFFSET + LEAF_CAPACITY_SIZE;
pub const POINT_COUNT_SIZE: usize = 8;

pub const NEXT_SEQ_OFFSET: usize = POINT_COUNT_OFFSET + POINT_COUNT_SIZE;
pub const NEXT_SEQ_SIZE: usize = 8;

pub const HEADER_SIZE: usize = NEXT_SEQ_OFFSET + NEXT_SEQ_SIZE;

//node tags in the pre-order body
pub const TAG_EMPTY: u8 = 0;
pub const TAG_INTERNAL: u8 = 1;
pub const TAG_LEAF: u8 = 2;
