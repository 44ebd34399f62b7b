//! Error types for saltree-core

use thiserror::Error;

use crate::snapshot::SnapshotError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot build a tree from zero records")]
    EmptyInput,

    #[error("Index out of range: {index} >= {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("Record unavailable: index {index} is tombstoned")]
    RecordUnavailable { index: u64 },

    #[error("Record too large: {len} bytes exceeds {max}")]
    RecordTooLarge { len: usize, max: usize },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Unknown hash algorithm: {0}")]
    UnknownHashAlgorithm(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}
