use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access arrival snapshot {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("arrival snapshot {path:?} line {line_number}: {reason}")]
    Corrupt {
        path: PathBuf,
        line_number: usize,
        reason: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid threshold range '{spec}': {reason}")]
pub struct RangeError {
    pub spec: String,
    pub reason: String,
}
