//! Store error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by key-value stores and the asset cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize value for key {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored value for key {key} is unreadable: {message}")]
    Corrupt { key: String, message: String },

    #[error("store {namespace} is in read-only mode")]
    ReadOnly { namespace: String },

    #[error("asset producer failed for key {key}: {source}")]
    Producer {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
