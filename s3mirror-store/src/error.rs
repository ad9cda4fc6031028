//! Error types for s3mirror-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors a storage backend can report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket '{bucket}' does not exist")]
    BucketNotFound { bucket: String },

    #[error("object '{key}' not found in bucket '{bucket}'")]
    ObjectNotFound { bucket: String, key: String },

    /// Any other provider-side or transport failure.
    #[error("{op} failed: {message}")]
    Request { op: &'static str, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
