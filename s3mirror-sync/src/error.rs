//! Error types for s3mirror-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use s3mirror_core::KeyError;
use s3mirror_store::StoreError;

/// All errors that can arise from a mirror run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A path or key could not be mapped.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// The storage backend rejected or failed a call.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("local root {path} does not exist")]
    RootNotFound { path: PathBuf },

    #[error("local root {path} is not a directory")]
    NotADirectory { path: PathBuf },

    /// The local walk hit an unreadable entry and was aborted.
    #[error("walk aborted at {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The provider reported more pages but gave no way to fetch them.
    #[error("listing of '{bucket}' truncated after page {page} without a continuation token")]
    MissingContinuation { bucket: String, page: usize },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("run cancelled")]
    Cancelled,

    /// Some keys failed; the rest of the run was applied.
    #[error("{failed} of {attempted} operation(s) failed: {preview}")]
    Incomplete {
        failed: usize,
        attempted: usize,
        preview: String,
    },

    #[error("background task failed: {0}")]
    Join(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
