//! Error types for store operations

use std::fmt;
use std::path::PathBuf;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or appending event files
#[derive(Debug)]
pub enum StoreError {
    /// File access or record encoding failed. The record involved is
    /// considered lost for that tick; it is never retried against a
    /// possibly-corrupt handle.
    IoFailure { path: PathBuf, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        StoreError::IoFailure {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::IoFailure { path, message } => {
                write!(f, "event store I/O failure on {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for StoreError {}
