//! Error types for tokensync-sync.

use std::path::PathBuf;

use thiserror::Error;

use tokensync_core::error::DocumentError;

/// Failures reported by a [`crate::RemoteStore`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport or API failure.
    #[error("remote request failed: {0}")]
    Request(String),

    #[error("token '{token}' not found in project {project}")]
    NotFound { project: String, token: String },

    /// The backing document of a file store could not be read or written.
    #[error("remote store document error: {0}")]
    Document(#[from] DocumentError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Infrastructure failures that abort a whole sync.
///
/// Individual remote deletions never surface here; they are collected in
/// [`crate::SyncResult::errors`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load local tokens: {0}")]
    LoadLocal(#[source] DocumentError),

    #[error("failed to save local tokens: {0}")]
    SaveLocal(#[source] DocumentError),

    #[error("failed to fetch remote tokens: {0}")]
    FetchRemote(#[source] RemoteError),

    #[error("failed to upload tokens: {0}")]
    UploadRemote(#[source] RemoteError),

    #[error("unsupported sync direction: {0}")]
    UnsupportedDirection(String),
}

/// Convenience constructor for [`RemoteError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RemoteError {
    RemoteError::Io {
        path: path.into(),
        source,
    }
}
