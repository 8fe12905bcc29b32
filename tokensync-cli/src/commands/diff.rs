//! `tokensync diff`: unified diffs for tokens that differ between both sides.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tokensync_core::{ConflictStrategy, SyncDirection};
use tokensync_sync::{render_conflict_diff, SyncConfig, Syncer};
use tokensync_watch::init_tracing;

use super::{block_on, TargetArgs};

/// Arguments for `tokensync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl DiffArgs {
    pub fn run(self, log_json: bool) -> Result<()> {
        init_tracing("warn", log_json);
        let target = self.target.resolve()?;

        let config = SyncConfig::new(target.project.clone(), SyncDirection::Bidirectional)
            .with_local_path(&target.local_path)
            .with_conflict_resolution(ConflictStrategy::Remote)
            .dry_run(true);
        let syncer = Syncer::new(target.store(), config);
        let result = block_on(syncer.sync())?
            .with_context(|| format!("diff failed for project '{}'", target.project))?;

        if result.conflicts.is_empty() && result.added == 0 {
            println!("No differences for project '{}'.", target.project);
            return Ok(());
        }

        for conflict in &result.conflicts {
            let diff = render_conflict_diff(conflict);
            print!("{diff}");
            if !diff.ends_with('\n') {
                println!();
            }
        }
        if result.added > 0 {
            println!(
                "{}",
                format!("{} token(s) exist on only one side", result.added).yellow()
            );
        }
        Ok(())
    }
}
