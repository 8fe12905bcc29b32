use thiserror::Error;

use tokensync_sync::SyncError;

/// Error surface for the watcher lifecycle and its retrying sync loop.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher is already running")]
    AlreadyRunning,

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("watcher cancelled")]
    Cancelled,

    #[error("watcher stopped")]
    Stopped,

    #[error("sync failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: SyncError,
    },
}
