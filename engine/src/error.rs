//! Error types for the scan pipeline.
//!
//! Only two conditions are terminal: an unreachable workspace root and a
//! cancellation delivered by the caller. Everything else (unreadable files,
//! parser rejections, encoding problems) degrades into diagnostic facts and
//! the scan keeps going.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("workspace root not found: {0}")]
    WorkspaceNotFound(PathBuf),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fact store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("scan cancelled")]
    Cancelled,
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io { path: path.into(), source }
    }
}
