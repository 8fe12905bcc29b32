//! `tokensync sync`: one-shot or watch-mode token sync.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use tokensync_core::{ConflictStrategy, SyncDirection};
use tokensync_sync::{
    parse_direction, parse_strategy_lenient, render_conflict_summary, ConflictResolver,
    FileRemoteStore, LogObserver, SyncConfig, SyncResult, Syncer,
};
use tokensync_watch::{init_tracing, WatchConfig, Watcher};

use super::{block_on, Target, TargetArgs};

/// Arguments for `tokensync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Sync direction: pull, push or bidirectional (alias: both) [default: bidirectional].
    #[arg(short, long)]
    pub direction: Option<SyncDirection>,

    /// Conflict strategy: local, remote, newest, prompt or merge [default: prompt].
    #[arg(short, long)]
    pub conflict: Option<ConflictStrategy>,

    /// Compute changes without writing either side.
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the sync result as JSON.
    #[arg(long, conflicts_with = "watch")]
    pub json: bool,

    /// Keep running and sync whenever the local document's directory changes.
    #[arg(short, long)]
    pub watch: bool,

    /// Debounce interval for watch mode, in milliseconds [default: 2000].
    #[arg(long, value_name = "MS")]
    pub watch_interval: Option<u64>,
}

impl SyncArgs {
    pub fn run(self, log_json: bool) -> Result<()> {
        let level = match (self.verbose, self.watch) {
            (true, _) => "debug",
            (false, true) => "info",
            (false, false) => "warn",
        };
        init_tracing(level, log_json);

        let target = self.target.resolve()?;
        let config = self.sync_config(&target)?;
        // Prompt only in one-shot runs attached to a terminal.
        let interactive = !self.watch && std::io::stdin().is_terminal();
        let resolver = ConflictResolver::new(config.conflict_resolution).interactive(interactive);
        let syncer = Syncer::new(target.store(), config).with_resolver(resolver);

        if self.watch {
            return self.run_watch(syncer, &target);
        }

        let result = block_on(syncer.sync())?.context("synchronization failed")?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to serialize sync result")?
            );
        } else {
            print_result(&result);
        }
        Ok(())
    }

    fn sync_config(&self, target: &Target) -> Result<SyncConfig> {
        let direction = match (self.direction, target.file.direction.as_deref()) {
            (Some(direction), _) => direction,
            (None, Some(raw)) => parse_direction(raw).context("invalid direction in config file")?,
            (None, None) => SyncDirection::Bidirectional,
        };
        let conflict = match (self.conflict, target.file.conflict.as_deref()) {
            (Some(strategy), _) => strategy,
            (None, Some(raw)) => parse_strategy_lenient(raw, &LogObserver),
            (None, None) => ConflictStrategy::Prompt,
        };

        tracing::info!(
            project = %target.project,
            direction = %direction,
            local_path = %target.local_path.display(),
            conflict = %conflict,
            dry_run = self.dry_run,
            "starting design token sync"
        );

        Ok(SyncConfig {
            project_id: target.project.clone(),
            direction,
            local_path: Some(target.local_path.clone()),
            conflict_resolution: conflict,
            dry_run: self.dry_run,
            verbose: self.verbose,
        })
    }

    fn run_watch(&self, syncer: Syncer<FileRemoteStore>, target: &Target) -> Result<()> {
        let mut watch = WatchConfig {
            paths: vec![watch_dir(&target.local_path)],
            sync_on_start: true,
            ..WatchConfig::default()
        }
        .with_settings(&target.file.watch);
        if let Some(ms) = self.watch_interval {
            watch.debounce = Duration::from_millis(ms);
        }

        println!("{}", "Starting watch mode...".bold());
        for path in &watch.paths {
            println!("Watching: {}", path.display());
        }
        println!("Press Ctrl+C to stop\n");

        let watcher = Watcher::new(Arc::new(syncer), watch);
        block_on(watcher.start(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }))?
        .context("watcher error")?;

        println!("Watch mode stopped");
        Ok(())
    }
}

fn watch_dir(local_path: &Path) -> PathBuf {
    match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "change")]
    change: &'static str,
    #[tabled(rename = "tokens")]
    count: usize,
}

fn print_result(result: &SyncResult) {
    let rows = vec![
        CountRow {
            change: "added",
            count: result.added,
        },
        CountRow {
            change: "updated",
            count: result.updated,
        },
        CountRow {
            change: "deleted",
            count: result.deleted,
        },
        CountRow {
            change: "conflicts",
            count: result.conflicts.len(),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());

    println!("{}", "=== Sync Results ===".bold());
    println!("Duration: {} ms", result.duration.as_millis());
    println!("{table}");

    if !result.errors.is_empty() {
        println!("\n{}", "Errors encountered:".red().bold());
        for (i, err) in result.errors.iter().enumerate() {
            println!("  {}. {}: {}", i + 1, err.token, err.message);
        }
    }

    if !result.conflicts.is_empty() {
        println!("\n{}", render_conflict_summary(&result.conflicts));
    }

    if result.dry_run {
        println!("\n{}", "Dry run completed - no changes were made".yellow());
    } else if result.has_changes() {
        println!("\n{}", "✓ Synchronization completed successfully".green());
    } else {
        println!("\n{}", "✓ Already in sync".green());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_dir_is_parent_or_cwd() {
        assert_eq!(
            watch_dir(Path::new("/srv/design/tokens.json")),
            PathBuf::from("/srv/design")
        );
        assert_eq!(watch_dir(Path::new("tokens.json")), PathBuf::from("."));
    }
}
