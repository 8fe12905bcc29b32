//! Injected observer for sync progress.
//!
//! Reconciliation code reports what it does through [`SyncObserver`] instead of
//! logging directly. [`LogObserver`] is the default and forwards to the `log`
//! facade; tests plug in their own recorder.

use std::path::PathBuf;
use std::time::Duration;

use tokensync_core::{ConflictStrategy, ConflictType, ProjectId, SyncDirection};

/// What a staged change will do when the plan is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedChange {
    /// Write a token that is new to the local document.
    AddLocal,
    /// Overwrite a local token with a resolved version.
    UpdateLocal,
    /// Drop a local token that no longer exists remotely.
    DropLocal,
    /// Upload a token that is new to the remote side.
    AddRemote,
    /// Upload a resolved version over the remote token.
    UpdateRemote,
    /// Delete a remote token that no longer exists locally.
    DeleteRemote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started {
        project: ProjectId,
        direction: SyncDirection,
        dry_run: bool,
    },
    LocalMissing {
        path: Option<PathBuf>,
    },
    LocalLoaded {
        count: usize,
    },
    RemoteLoaded {
        count: usize,
    },
    Staged {
        token: String,
        change: StagedChange,
    },
    ConflictResolved {
        token: String,
        conflict_type: ConflictType,
        strategy: ConflictStrategy,
        skipped: bool,
    },
    /// A strategy could not be applied as configured and degraded to remote-wins.
    StrategyFallback {
        token: Option<String>,
        reason: String,
    },
    DeleteFailed {
        token: String,
        error: String,
    },
    LocalSaved {
        path: PathBuf,
        count: usize,
    },
    Completed {
        added: usize,
        updated: usize,
        deleted: usize,
        conflicts: usize,
        duration: Duration,
    },
}

pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SyncObserver for LogObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Started {
                project,
                direction,
                dry_run,
            } => {
                tracing::info!(
                    "starting design token sync: project={project} direction={direction} dry_run={dry_run}"
                );
            }
            SyncEvent::LocalMissing { path: Some(path) } => {
                tracing::debug!(
                    "local token file {} does not exist, starting fresh",
                    path.display()
                );
            }
            SyncEvent::LocalMissing { path: None } => {
                tracing::debug!("no local path configured, local snapshot is empty");
            }
            SyncEvent::LocalLoaded { count } => tracing::debug!("loaded {count} local tokens"),
            SyncEvent::RemoteLoaded { count } => tracing::debug!("loaded {count} remote tokens"),
            SyncEvent::Staged { token, change } => tracing::debug!("{token}: staged {change:?}"),
            SyncEvent::ConflictResolved {
                token,
                conflict_type,
                strategy,
                skipped,
            } => {
                if *skipped {
                    tracing::info!("{token}: {conflict_type} conflict skipped ({strategy})");
                } else {
                    tracing::debug!("{token}: {conflict_type} conflict resolved ({strategy})");
                }
            }
            SyncEvent::StrategyFallback { token, reason } => match token {
                Some(token) => tracing::warn!("{token}: {reason}, using remote"),
                None => tracing::warn!("{reason}, using remote"),
            },
            SyncEvent::DeleteFailed { token, error } => {
                tracing::warn!("failed to delete remote token {token}: {error}");
            }
            SyncEvent::LocalSaved { path, count } => {
                tracing::debug!("saved {count} tokens to {}", path.display());
            }
            SyncEvent::Completed {
                added,
                updated,
                deleted,
                conflicts,
                duration,
            } => {
                tracing::info!(
                    "design token sync completed: added={added} updated={updated} deleted={deleted} conflicts={conflicts} duration={duration:?}"
                );
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_event(&self, _event: &SyncEvent) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Captures every event for later assertions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        events: Mutex<Vec<SyncEvent>>,
    }

    impl RecordingObserver {
        pub(crate) fn events(&self) -> Vec<SyncEvent> {
            self.events.lock().unwrap().clone()
        }

        pub(crate) fn fallbacks(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, SyncEvent::StrategyFallback { .. }))
                .count()
        }
    }

    impl SyncObserver for RecordingObserver {
        fn on_event(&self, event: &SyncEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
