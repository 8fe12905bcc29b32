//! Pull, push and bidirectional token sync.
//!
//! A run has three phases:
//!
//! 1. Load the local document and fetch the remote tokens into [`Snapshot`]s.
//! 2. [`reconcile`] the snapshots into a [`SyncPlan`]. This is pure apart from
//!    an interactive prompt, and is all a dry run executes.
//! 3. Apply the plan: rewrite the local document, upload one batch, then
//!    delete remote tokens one by one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Serialize, Serializer};

use tokensync_core::{
    document::{self, TokenDocument},
    Conflict, ConflictStrategy, ProjectId, Snapshot, SyncDirection, Token, TokenWithMetadata,
};

use crate::conflict::ConflictResolver;
use crate::error::SyncError;
use crate::observer::{LogObserver, StagedChange, SyncEvent, SyncObserver};
use crate::remote::RemoteStore;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub project_id: ProjectId,
    pub direction: SyncDirection,
    /// Local token document. `None` (or an empty path) disables local persistence.
    pub local_path: Option<PathBuf>,
    pub conflict_resolution: ConflictStrategy,
    pub dry_run: bool,
    pub verbose: bool,
}

impl SyncConfig {
    pub fn new(project_id: impl Into<ProjectId>, direction: SyncDirection) -> Self {
        Self {
            project_id: project_id.into(),
            direction,
            local_path: None,
            conflict_resolution: ConflictStrategy::default(),
            dry_run: false,
            verbose: false,
        }
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_conflict_resolution(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_resolution = strategy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn local_document(&self) -> Option<&Path> {
        self.local_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Parse a direction name (`pull`, `push`, `bidirectional` or `both`).
pub fn parse_direction(raw: &str) -> Result<SyncDirection, SyncError> {
    raw.parse()
        .map_err(|_| SyncError::UnsupportedDirection(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// A per-token failure that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenError {
    pub token: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Conflicts whose resolution selected a token, with that resolution attached.
    pub conflicts: Vec<Conflict>,
    pub errors: Vec<TokenError>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub dry_run: bool,
}

impl SyncResult {
    pub fn has_changes(&self) -> bool {
        self.added + self.updated + self.deleted > 0
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Staged mutations for both sides, produced by [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Tokens to add to or overwrite in the local document.
    pub local_writes: BTreeMap<String, Token>,
    /// Local tokens to drop (pull only).
    pub local_drops: BTreeSet<String>,
    /// Uploaded as a single batch.
    pub uploads: Vec<Token>,
    pub remote_deletes: Vec<String>,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub conflicts: Vec<Conflict>,
}

impl SyncPlan {
    pub fn changes_local(&self) -> bool {
        !self.local_writes.is_empty() || !self.local_drops.is_empty()
    }

    pub fn changes_remote(&self) -> bool {
        !self.uploads.is_empty() || !self.remote_deletes.is_empty()
    }

    /// The full local token set after the plan is applied, ordered by name.
    ///
    /// Tokens untouched by the plan are carried over from `local`.
    pub fn reconciled_local(&self, local: &Snapshot) -> Vec<Token> {
        let mut merged: BTreeMap<&str, &Token> = local
            .iter()
            .filter(|(name, _)| !self.local_drops.contains(*name))
            .map(|(name, entry)| (name, &entry.token))
            .collect();
        for (name, token) in &self.local_writes {
            merged.insert(name, token);
        }
        merged.into_values().cloned().collect()
    }

    fn stage(&mut self, observer: &dyn SyncObserver, token: &Token, change: StagedChange) {
        observer.on_event(&SyncEvent::Staged {
            token: token.name.clone(),
            change,
        });
        match change {
            StagedChange::AddLocal | StagedChange::UpdateLocal => {
                self.local_writes.insert(token.name.clone(), token.clone());
            }
            StagedChange::AddRemote | StagedChange::UpdateRemote => {
                self.uploads.push(token.clone());
            }
            StagedChange::DropLocal => {
                self.local_drops.insert(token.name.clone());
            }
            StagedChange::DeleteRemote => self.remote_deletes.push(token.name.clone()),
        }
    }
}

/// Compute what a sync in `direction` has to change on each side.
///
/// Counting rules:
/// - `added`: tokens present on only the source side (either side when bidirectional).
/// - `updated`: conflicts whose resolution selected a token.
/// - `deleted`: tokens present on only the destination side (never when bidirectional).
pub fn reconcile(
    direction: SyncDirection,
    local: &Snapshot,
    remote: &Snapshot,
    resolver: &ConflictResolver,
    observer: &dyn SyncObserver,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    match direction {
        SyncDirection::Pull => {
            for (name, theirs) in remote.iter() {
                match local.get(name) {
                    None => {
                        plan.stage(observer, &theirs.token, StagedChange::AddLocal);
                        plan.added += 1;
                    }
                    Some(ours) => {
                        if let Some(selected) =
                            resolve_pair(&mut plan, resolver, observer, ours, theirs)
                        {
                            plan.stage(observer, &selected, StagedChange::UpdateLocal);
                        }
                    }
                }
            }
            for (name, ours) in local.iter() {
                if !remote.contains(name) {
                    plan.stage(observer, &ours.token, StagedChange::DropLocal);
                    plan.deleted += 1;
                }
            }
        }
        SyncDirection::Push => {
            for (name, ours) in local.iter() {
                match remote.get(name) {
                    None => {
                        plan.stage(observer, &ours.token, StagedChange::AddRemote);
                        plan.added += 1;
                    }
                    Some(theirs) => {
                        if let Some(selected) =
                            resolve_pair(&mut plan, resolver, observer, ours, theirs)
                        {
                            plan.stage(observer, &selected, StagedChange::UpdateRemote);
                        }
                    }
                }
            }
            for (name, theirs) in remote.iter() {
                if !local.contains(name) {
                    plan.stage(observer, &theirs.token, StagedChange::DeleteRemote);
                    plan.deleted += 1;
                }
            }
        }
        SyncDirection::Bidirectional => {
            let names: BTreeSet<&str> = local.names().chain(remote.names()).collect();
            for name in names {
                match (local.get(name), remote.get(name)) {
                    (Some(ours), None) => {
                        plan.stage(observer, &ours.token, StagedChange::AddRemote);
                        plan.added += 1;
                    }
                    (None, Some(theirs)) => {
                        plan.stage(observer, &theirs.token, StagedChange::AddLocal);
                        plan.added += 1;
                    }
                    (Some(ours), Some(theirs)) => {
                        if let Some(selected) =
                            resolve_pair(&mut plan, resolver, observer, ours, theirs)
                        {
                            plan.stage(observer, &selected, StagedChange::UpdateLocal);
                            plan.stage(observer, &selected, StagedChange::UpdateRemote);
                        }
                    }
                    (None, None) => {}
                }
            }
        }
    }
    plan
}

/// Resolve a name present on both sides.
///
/// Returns the token to stage when the pair differs and the resolution picked
/// one; the conflict is recorded and counted as an update in that case only.
fn resolve_pair(
    plan: &mut SyncPlan,
    resolver: &ConflictResolver,
    observer: &dyn SyncObserver,
    ours: &TokenWithMetadata,
    theirs: &TokenWithMetadata,
) -> Option<Token> {
    let mut conflict = Conflict::detect(&ours.token, &theirs.token)?;
    let resolution = resolver.resolve(&conflict);
    observer.on_event(&SyncEvent::ConflictResolved {
        token: conflict.token_name.clone(),
        conflict_type: conflict.conflict_type,
        strategy: resolution.strategy,
        skipped: resolution.selected_token.is_none(),
    });
    let selected = resolution.selected_token.clone()?;
    conflict.resolution = Some(resolution);
    plan.conflicts.push(conflict);
    plan.updated += 1;
    Some(selected)
}

// ---------------------------------------------------------------------------
// Syncer
// ---------------------------------------------------------------------------

/// Runs syncs for one project against a [`RemoteStore`].
///
/// A `Syncer` holds no state between runs; every [`Syncer::sync`] starts from
/// fresh snapshots of both sides.
pub struct Syncer<S> {
    store: S,
    resolver: ConflictResolver,
    config: SyncConfig,
    observer: Arc<dyn SyncObserver>,
}

impl<S: RemoteStore> Syncer<S> {
    /// Syncer with a non-interactive resolver for `config.conflict_resolution`.
    pub fn new(store: S, config: SyncConfig) -> Self {
        let resolver = ConflictResolver::new(config.conflict_resolution);
        Self {
            store,
            resolver,
            config,
            observer: Arc::new(LogObserver),
        }
    }

    /// Replace the resolver (e.g. one with prompt I/O attached).
    pub fn with_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Route events from the syncer and its resolver to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.resolver = self.resolver.with_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one sync.
    ///
    /// Infrastructure failures (local load/save, remote fetch, batch upload)
    /// abort the run. Failed remote deletions are collected in
    /// [`SyncResult::errors`] instead.
    pub async fn sync(&self) -> Result<SyncResult, SyncError> {
        let started = Instant::now();
        let config = &self.config;
        self.observer.on_event(&SyncEvent::Started {
            project: config.project_id.clone(),
            direction: config.direction,
            dry_run: config.dry_run,
        });

        let local = self.load_local()?;
        let remote = self.fetch_remote().await?;
        let plan = reconcile(
            config.direction,
            &local,
            &remote,
            &self.resolver,
            self.observer.as_ref(),
        );

        let mut result = SyncResult {
            added: plan.added,
            updated: plan.updated,
            deleted: plan.deleted,
            dry_run: config.dry_run,
            ..SyncResult::default()
        };

        if !config.dry_run {
            self.apply(&plan, &local, &mut result).await?;
        }
        result.conflicts = plan.conflicts;
        result.duration = started.elapsed();

        self.observer.on_event(&SyncEvent::Completed {
            added: result.added,
            updated: result.updated,
            deleted: result.deleted,
            conflicts: result.conflicts.len(),
            duration: result.duration,
        });
        Ok(result)
    }

    fn load_local(&self) -> Result<Snapshot, SyncError> {
        let Some(path) = self.config.local_document() else {
            self.observer.on_event(&SyncEvent::LocalMissing { path: None });
            return Ok(Snapshot::new());
        };
        match document::load_at(path).map_err(SyncError::LoadLocal)? {
            Some(doc) => {
                let snapshot = Snapshot::from_tokens(doc.tokens, Utc::now());
                self.observer.on_event(&SyncEvent::LocalLoaded {
                    count: snapshot.len(),
                });
                Ok(snapshot)
            }
            None => {
                self.observer.on_event(&SyncEvent::LocalMissing {
                    path: Some(path.to_path_buf()),
                });
                Ok(Snapshot::new())
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Snapshot, SyncError> {
        let tokens = self
            .store
            .get_tokens(&self.config.project_id)
            .await
            .map_err(SyncError::FetchRemote)?;
        let snapshot = Snapshot::from_tokens(tokens, Utc::now());
        self.observer.on_event(&SyncEvent::RemoteLoaded {
            count: snapshot.len(),
        });
        Ok(snapshot)
    }

    async fn apply(
        &self,
        plan: &SyncPlan,
        local: &Snapshot,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let project = &self.config.project_id;

        if plan.changes_local() {
            if let Some(path) = self.config.local_document() {
                let tokens = plan.reconciled_local(local);
                let count = tokens.len();
                let doc = TokenDocument::stamped(tokens, project);
                document::save_at(path, &doc).map_err(SyncError::SaveLocal)?;
                self.observer.on_event(&SyncEvent::LocalSaved {
                    path: path.to_path_buf(),
                    count,
                });
            }
        }

        if !plan.uploads.is_empty() {
            self.store
                .upload_tokens(project, &plan.uploads)
                .await
                .map_err(SyncError::UploadRemote)?;
        }

        for name in &plan.remote_deletes {
            if let Err(err) = self.store.delete_token(project, name).await {
                let message = err.to_string();
                self.observer.on_event(&SyncEvent::DeleteFailed {
                    token: name.clone(),
                    error: message.clone(),
                });
                result.errors.push(TokenError {
                    token: name.clone(),
                    message,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
