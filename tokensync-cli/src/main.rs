//! tokensync: design token synchronization CLI.
//!
//! # Usage
//!
//! ```text
//! tokensync sync --project <id> [--direction pull|push|bidirectional] [--local-path <file>]
//!                [--conflict local|remote|newest|prompt|merge] [--remote-dir <dir>]
//!                [--dry-run] [--verbose] [--json] [--watch] [--watch-interval <ms>]
//! tokensync diff --project <id> [--local-path <file>] [--remote-dir <dir>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tokensync",
    version,
    about = "Synchronize design tokens between a local file and a remote store",
    long_about = None,
)]
struct Cli {
    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pull, push or bidirectionally sync tokens, once or in watch mode.
    Sync(SyncArgs),

    /// Show a unified diff for every token that differs between both sides.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(cli.log_json),
        Commands::Diff(args) => args.run(cli.log_json),
    }
}
