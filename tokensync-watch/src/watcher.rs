//! Debounced, retrying background sync driven by file-system events.
//!
//! A running [`Watcher`] owns two tasks:
//!
//! - **intake**: classifies raw notify events and pushes them onto a bounded
//!   queue, dropping events when the queue is full;
//! - **debounce**: coalesces queued events behind a single-shot timer and runs
//!   at most one sync at a time, retrying with a fixed delay.
//!
//! [`Watcher::start`] blocks until its shutdown future resolves or
//! [`Watcher::stop`] is called, then joins both tasks.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use tokensync_sync::{render_conflict_summary, RemoteStore, SyncResult, Syncer};

use crate::config::{WatchConfig, EVENT_QUEUE_CAPACITY};
use crate::error::WatchError;
use crate::event::{watch_events, WatchEvent};

/// Why a running watcher is winding down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    Cancelled,
    Stopped,
}

impl From<Halt> for WatchError {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Cancelled => WatchError::Cancelled,
            Halt::Stopped => WatchError::Stopped,
        }
    }
}

type HaltSender = Arc<watch::Sender<Option<Halt>>>;
type HaltReceiver = watch::Receiver<Option<Halt>>;

/// Resolves once a halt has been signalled. A dropped sender counts as a stop.
pub(crate) async fn halted(rx: &mut HaltReceiver) -> Halt {
    loop {
        let current = *rx.borrow_and_update();
        if let Some(halt) = current {
            return halt;
        }
        if rx.changed().await.is_err() {
            return Halt::Stopped;
        }
    }
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

pub struct Watcher<S> {
    syncer: Arc<Syncer<S>>,
    config: WatchConfig,
    /// `Some` while running.
    halt: Mutex<Option<HaltSender>>,
    running: watch::Sender<bool>,
}

impl<S: RemoteStore + 'static> Watcher<S> {
    /// Zero durations and retry counts in `config` are replaced by defaults.
    pub fn new(syncer: Arc<Syncer<S>>, config: WatchConfig) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            syncer,
            config: config.normalized(),
            halt: Mutex::new(None),
            running,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Watch until `shutdown` resolves or [`Watcher::stop`] is called.
    ///
    /// Fails with [`WatchError::AlreadyRunning`] on re-entry and with
    /// [`WatchError::Notify`] when no file watcher can be created. Sync
    /// failures never end the watcher.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), WatchError>
    where
        F: Future<Output = ()> + Send,
    {
        let halt_tx = {
            let mut halt = self.lock();
            if halt.is_some() {
                return Err(WatchError::AlreadyRunning);
            }
            let (tx, _) = watch::channel(None);
            let tx = Arc::new(tx);
            *halt = Some(Arc::clone(&tx));
            self.running.send_replace(true);
            tx
        };

        let outcome = self.run(&halt_tx, shutdown).await;

        {
            let mut halt = self.lock();
            *halt = None;
            self.running.send_replace(false);
        }
        tracing::info!("file watcher stopped");
        outcome
    }

    /// Signal a running watcher to stop and wait until [`Watcher::start`]
    /// has returned. No-op when not running.
    pub async fn stop(&self) {
        let halt_tx = {
            let halt = self.lock();
            match halt.as_ref() {
                Some(tx) => Arc::clone(tx),
                None => return,
            }
        };
        halt_tx.send_if_modified(|halt| {
            if halt.is_none() {
                *halt = Some(Halt::Stopped);
                true
            } else {
                false
            }
        });
        let mut running = self.running.subscribe();
        let _ = running.wait_for(|running| !*running).await;
    }

    async fn run<F>(&self, halt_tx: &HaltSender, shutdown: F) -> Result<(), WatchError>
    where
        F: Future<Output = ()> + Send,
    {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut fs_watcher: RecommendedWatcher = recommended_watcher(move |event| {
            let _ = raw_tx.send(event);
        })?;
        for path in &self.config.paths {
            register_path(&mut fs_watcher, path);
        }

        if self.config.sync_on_start {
            tracing::info!("performing initial sync");
            match self.syncer.sync().await {
                Ok(result) => log_sync_result(&result),
                Err(err) => tracing::warn!(error = %err, "initial sync failed"),
            }
        }

        let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(EVENT_QUEUE_CAPACITY);
        let intake = tokio::spawn(intake_loop(raw_rx, event_tx, halt_tx.subscribe()));
        let debounce = tokio::spawn(debounce_loop(
            Arc::clone(&self.syncer),
            self.config.clone(),
            event_rx,
            halt_tx.subscribe(),
        ));
        tracing::info!("file watcher started");

        let mut halt_rx = halt_tx.subscribe();
        let reason = tokio::select! {
            _ = shutdown => Halt::Cancelled,
            halt = halted(&mut halt_rx) => halt,
        };
        match reason {
            Halt::Cancelled => tracing::info!("shutdown requested, stopping watcher"),
            Halt::Stopped => tracing::info!("stop signal received"),
        }
        halt_tx.send_if_modified(|halt| {
            if halt.is_none() {
                *halt = Some(reason);
                true
            } else {
                false
            }
        });

        drop(fs_watcher);
        join_task("intake", intake).await;
        join_task("debounce", debounce).await;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<HaltSender>> {
        match self.halt.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Register one path, resolved to an absolute path. Failures are logged and skipped.
fn register_path(fs_watcher: &mut RecommendedWatcher, path: &Path) {
    let absolute = match absolute_path(path) {
        Ok(absolute) => absolute,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to resolve watch path");
            return;
        }
    };
    match fs_watcher.watch(&absolute, RecursiveMode::NonRecursive) {
        Ok(()) => tracing::info!(path = %absolute.display(), "watching path for changes"),
        Err(err) => {
            tracing::warn!(path = %absolute.display(), error = %err, "failed to add path to watcher")
        }
    }
}

fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    // Canonical form matches the real paths some backends report (e.g. /private/var on macOS).
    match std::fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(_) => Ok(std::env::current_dir()?.join(path)),
    }
}

async fn join_task(name: &str, handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        tracing::error!(task = name, error = %err, "watcher task failed");
    }
}

// ---------------------------------------------------------------------------
// Event intake
// ---------------------------------------------------------------------------

async fn intake_loop(
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    event_tx: mpsc::Sender<WatchEvent>,
    mut halt_rx: HaltReceiver,
) {
    loop {
        tokio::select! {
            _ = halted(&mut halt_rx) => break,
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                let event = match raw {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "file watcher error");
                        continue;
                    }
                };
                for event in watch_events(&event) {
                    if !enqueue(&event_tx, event) {
                        return;
                    }
                }
            }
        }
    }
}

/// Non-blocking push onto the debounce queue. Returns `false` once the
/// receiving side is gone.
pub(crate) fn enqueue(tx: &mpsc::Sender<WatchEvent>, event: WatchEvent) -> bool {
    let path = event.path.clone();
    match tx.try_send(event) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "queued sync event");
            true
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(path = %path.display(), "sync queue full, dropping event");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

// ---------------------------------------------------------------------------
// Debounce and retry
// ---------------------------------------------------------------------------

pub(crate) async fn debounce_loop<S: RemoteStore>(
    syncer: Arc<Syncer<S>>,
    config: WatchConfig,
    mut events: mpsc::Receiver<WatchEvent>,
    mut halt_rx: HaltReceiver,
) {
    let timer = sleep(Duration::ZERO);
    tokio::pin!(timer);
    let mut armed = false;
    let mut pending = false;
    let mut last_sync: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = halted(&mut halt_rx) => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                tracing::debug!(path = %event.path.display(), change = %event.change, "processing sync event");
                pending = true;
                timer.as_mut().reset(Instant::now() + config.debounce);
                armed = true;
            }
            _ = &mut timer, if armed => {
                armed = false;
                if !pending {
                    continue;
                }
                if let Some(last) = last_sync {
                    let since = last.elapsed();
                    if since < config.debounce {
                        timer.as_mut().reset(Instant::now() + (config.debounce - since));
                        armed = true;
                        continue;
                    }
                }

                tracing::info!("debounce period elapsed, triggering sync");
                match sync_with_retry(&syncer, &config, &mut halt_rx).await {
                    Ok(result) => log_sync_result(&result),
                    Err(err @ (WatchError::Cancelled | WatchError::Stopped)) => {
                        tracing::info!(reason = %err, "retry loop interrupted");
                        break;
                    }
                    Err(err) => tracing::error!(error = %err, "sync failed after retries"),
                }
                last_sync = Some(Instant::now());
                pending = false;
            }
        }
    }
}

/// Run a sync, retrying up to `max_retries` attempts with a fixed delay.
///
/// The delay is cut short by a halt signal.
pub(crate) async fn sync_with_retry<S: RemoteStore>(
    syncer: &Syncer<S>,
    config: &WatchConfig,
    halt_rx: &mut HaltReceiver,
) -> Result<SyncResult, WatchError> {
    let max_retries = config.max_retries.max(1);
    let mut attempt = 1;
    loop {
        let err = match syncer.sync().await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };
        tracing::warn!(error = %err, attempt, max_retries, "sync attempt failed");
        if attempt >= max_retries {
            return Err(WatchError::RetriesExhausted {
                attempts: attempt,
                source: err,
            });
        }

        tracing::info!(delay_ms = config.retry_delay.as_millis() as u64, "waiting before retry");
        tokio::select! {
            halt = halted(halt_rx) => return Err(halt.into()),
            _ = sleep(config.retry_delay) => {}
        }
        attempt += 1;
    }
}

fn log_sync_result(result: &SyncResult) {
    tracing::info!(
        added = result.added,
        updated = result.updated,
        deleted = result.deleted,
        errors = result.errors.len(),
        duration_ms = result.duration.as_millis() as u64,
        "sync completed"
    );
    if !result.conflicts.is_empty() {
        tracing::info!("\n{}", render_conflict_summary(&result.conflicts));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
