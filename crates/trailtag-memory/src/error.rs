//! Memory layer error types.

use thiserror::Error;

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur in the memory layer.
///
/// Snapshot I/O failures are deliberately absent from most public
/// signatures: storage is advisory and the in-memory state stays
/// authoritative, so write errors are logged where they happen.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown memory family: {0}")]
    UnknownFamily(String),
}
