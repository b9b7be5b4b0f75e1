//! Crate-wide error type and `Result` alias.
//!
//! Per-event and per-file problems (attrition, unreadable shards, unknown
//! field names) are *not* errors — they are counted in statistics and logged.
//! `ExtractError` covers the conditions that must stop the caller:
//! configuration mistakes, top-level I/O failures, and a run in which no
//! shard at all was processable.

use std::fmt;
use std::path::PathBuf;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors surfaced to the top-level caller.
#[derive(Debug)]
pub enum ExtractError {
    /// Invalid or inconsistent configuration (fail-fast, before any data is read).
    Config(String),

    /// Schema resolution failure (e.g. augmentation enabled without the
    /// region/layer features present).
    Schema(String),

    /// Shape mismatch while assembling tensors or batches.
    Shape(String),

    /// Event store failure that is not recoverable per-file.
    Store { path: PathBuf, message: String },

    /// Every input shard failed to load or process.
    NoUsableShards { attempted: usize },

    /// Underlying I/O error.
    Io(std::io::Error),

    /// JSON (shard or metadata) encode/decode error.
    Json(serde_json::Error),
}

impl ExtractError {
    /// Build a `Config` error from anything displayable.
    pub fn config(message: impl fmt::Display) -> Self {
        ExtractError::Config(message.to_string())
    }

    /// Schema mismatch error with a formatted message.
    pub fn schema(message: impl fmt::Display) -> Self {
        ExtractError::Schema(message.to_string())
    }

    /// Build a `Store` error for a given shard path.
    pub fn store(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        ExtractError::Store {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            ExtractError::Schema(msg) => write!(f, "schema error: {msg}"),
            ExtractError::Shape(msg) => write!(f, "shape error: {msg}"),
            ExtractError::Store { path, message } => {
                write!(f, "event store error at {}: {message}", path.display())
            }
            ExtractError::NoUsableShards { attempted } => write!(
                f,
                "no usable shards: all {attempted} input files failed to load"
            ),
            ExtractError::Io(err) => write!(f, "I/O error: {err}"),
            ExtractError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io(err) => Some(err),
            ExtractError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        ExtractError::Io(err)
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(err: serde_json::Error) -> Self {
        ExtractError::Json(err)
    }
}
