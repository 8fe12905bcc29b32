//! # tokensync-sync
//!
//! Reconciles a local token document with a remote token store.
//!
//! Build a [`Syncer`] from a [`RemoteStore`] and a [`SyncConfig`], then call
//! [`Syncer::sync`]. Conflicting tokens are settled by a [`ConflictResolver`];
//! progress is reported to a [`SyncObserver`].

pub mod conflict;
pub mod diff;
pub mod error;
pub mod observer;
pub mod remote;
pub mod syncer;

pub use conflict::{parse_strategy_lenient, ConflictResolver, UPDATED_AT_KEY};
pub use diff::{render_conflict_diff, render_conflict_summary, render_token_diff};
pub use error::{RemoteError, SyncError};
pub use observer::{LogObserver, NoopObserver, StagedChange, SyncEvent, SyncObserver};
pub use remote::{CallCounts, FileRemoteStore, MemoryRemoteStore, RemoteStore};
pub use syncer::{parse_direction, reconcile, SyncConfig, SyncPlan, SyncResult, Syncer, TokenError};
