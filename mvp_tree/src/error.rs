//! Error type shared by tree mutation, queries and the on-disk codec

use std::fmt;

#[derive(Debug)]
pub enum IndexError {
    Io(std::io::Error),
    Corrupt(&'static str),
    ConfigMismatch(&'static str),
    IncomparablePoints,
    NotFound,
    OutOfMemory,
}

impl fmt::Display for IndexError {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IndexError::Io(e) => write!(f, "i/o failure: {}", e),
            IndexError::Corrupt(what) => write!(f, "corrupt tree data: {}", what),
            IndexError::ConfigMismatch(what) => write!(f, "configuration mismatch: {}", what),
            IndexError::IncomparablePoints => write!(f, "points are not comparable under the configured metric"),
            IndexError::NotFound => write!(f, "tree file not found"),
            IndexError::OutOfMemory => write!(f, "allocation failed while decoding tree"),
        }
    }
}

impl std::error::Error for IndexError {

    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IndexError {

    fn from(e: std::io::Error) -> IndexError {
        match e.kind() {
            std::io::ErrorKind::NotFound => IndexError::NotFound,
            // a short read while decoding means the stream ended mid-structure
            std::io::ErrorKind::UnexpectedEof => IndexError::Corrupt("unexpected end of data"),
            _ => IndexError::Io(e),
        }
    }
}

impl From<std::collections::TryReserveError> for IndexError {

    fn from(_e: std::collections::TryReserveError) -> IndexError {
        IndexError::OutOfMemory
    }
}
