//! Error types for the notepad synchronizer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from synchronizer operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to initialize synchronizer: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },

    #[error("File system error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Synchronizer dispatch loop already started")]
    AlreadyStarted,
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<notify::Error> for SyncError {
    fn from(e: notify::Error) -> Self {
        let path = e.paths.first().cloned().unwrap_or_default();
        SyncError::WatchFailed {
            path,
            reason: e.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
