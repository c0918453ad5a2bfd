//! Structured error types for Loopy bundle construction.

use std::path::Path;

use thiserror::Error;

/// Unified error type for all Loopy operations.
#[derive(Debug, Error)]
pub enum LoopyError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed CSV, JSON, or TIFF input)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, duplicated ids, unsupported dtype)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Cross-registry or join consistency violation
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Compression or decompression failure
    #[error("compression error: {0}")]
    Compression(String),

    /// An external program exited unsuccessfully.
    #[error("command `{command}` failed: {stderr}")]
    Subprocess { command: String, stderr: String },

    /// A queued registration step failed while the sample was being committed.
    #[error("error executing queued action: {label}")]
    Deferred {
        label: String,
        #[source]
        source: Box<LoopyError>,
    },

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl LoopyError {
    /// Wrap an I/O error so the message carries the offending path.
    pub fn io_at(path: &Path, e: std::io::Error) -> Self {
        LoopyError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    }

    /// Wrap `self` with the label of the queued action that produced it.
    pub fn deferred(label: impl Into<String>, source: LoopyError) -> Self {
        LoopyError::Deferred {
            label: label.into(),
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for LoopyError {
    fn from(e: serde_json::Error) -> Self {
        LoopyError::Parse(e.to_string())
    }
}

/// Convenience alias used throughout the Loopy crates.
pub type Result<T> = std::result::Result<T, LoopyError>;
