//! Classification of raw notify events into [`WatchEvent`]s.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::event::ModifyKind;
use notify::{Event, EventKind};

use tokensync_core::ChangeType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub change: ChangeType,
    pub timestamp: DateTime<Utc>,
}

/// Map a notify event kind to a change.
///
/// Renames count as deletions of the old name. Access and metadata-only
/// events are ignored.
pub fn classify(kind: &EventKind) -> Option<ChangeType> {
    match kind {
        EventKind::Create(_) => Some(ChangeType::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeType::Delete),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeType::Update),
        EventKind::Remove(_) => Some(ChangeType::Delete),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// One [`WatchEvent`] per path of a relevant notify event.
pub fn watch_events(event: &Event) -> Vec<WatchEvent> {
    let Some(change) = classify(&event.kind) else {
        return Vec::new();
    };
    let timestamp = Utc::now();
    event
        .paths
        .iter()
        .map(|path| WatchEvent {
            path: path.clone(),
            change,
            timestamp,
        })
        .collect()
}
