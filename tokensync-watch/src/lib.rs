//! Watch mode: file-system driven, debounced and retried token sync.
//!
//! Wrap a [`tokensync_sync::Syncer`] in a [`Watcher`], then drive it with
//! [`Watcher::start`]:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tokensync_sync::{FileRemoteStore, SyncConfig, Syncer};
//! # use tokensync_core::SyncDirection;
//! # use tokensync_watch::{WatchConfig, Watcher};
//! # async fn demo() -> Result<(), tokensync_watch::WatchError> {
//! let syncer = Syncer::new(
//!     FileRemoteStore::new("/srv/tokens"),
//!     SyncConfig::new("acme", SyncDirection::Bidirectional).with_local_path("design-tokens.json"),
//! );
//! let watcher = Watcher::new(
//!     Arc::new(syncer),
//!     WatchConfig { paths: vec![".".into()], sync_on_start: true, ..WatchConfig::default() },
//! );
//! watcher.start(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod config;
mod error;
pub mod event;
pub mod logging;
mod watcher;

pub use config::{WatchConfig, EVENT_QUEUE_CAPACITY};
pub use error::WatchError;
pub use event::{classify, WatchEvent};
pub use logging::init_tracing;
pub use watcher::Watcher;
