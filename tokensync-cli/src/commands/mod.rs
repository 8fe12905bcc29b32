pub mod diff;
pub mod sync;

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use tokensync_core::{
    config::{self, CONFIG_FILE_NAME},
    ProjectConfig, ProjectId,
};
use tokensync_sync::FileRemoteStore;

pub const DEFAULT_LOCAL_PATH: &str = "./design-tokens.json";

/// Where to sync from and to. Shared by `sync` and `diff`.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project identifier on the remote store.
    #[arg(short, long, env = "TOKENSYNC_PROJECT")]
    pub project: Option<String>,

    /// Local token document (.json, .yaml or .yml) [default: ./design-tokens.json].
    #[arg(short, long, value_name = "FILE")]
    pub local_path: Option<PathBuf>,

    /// Directory backing the remote store [default: ~/.tokensync/remote].
    #[arg(long, env = "TOKENSYNC_REMOTE_DIR", value_name = "DIR")]
    pub remote_dir: Option<PathBuf>,

    /// Project config file.
    #[arg(long, value_name = "FILE", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,
}

/// [`TargetArgs`] merged with the project config file.
#[derive(Debug, Clone)]
pub struct Target {
    pub project: ProjectId,
    pub local_path: PathBuf,
    pub remote_dir: PathBuf,
    pub file: ProjectConfig,
}

impl TargetArgs {
    /// Flags win over the config file; the config file wins over defaults.
    pub fn resolve(&self) -> Result<Target> {
        let file = config::load_at(&self.config)
            .with_context(|| format!("failed to read config {}", self.config.display()))?;

        let project = self
            .project
            .clone()
            .or_else(|| file.project.clone())
            .filter(|project| !project.trim().is_empty())
            .context("missing project: pass --project, set TOKENSYNC_PROJECT, or add `project:` to tokensync.yaml")?;

        let local_path = self
            .local_path
            .clone()
            .or_else(|| file.local_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_PATH));
        let local_path = absolutize(&local_path)?;

        let remote_dir = match self.remote_dir.clone().or_else(|| file.remote_dir.clone()) {
            Some(dir) => dir,
            None => default_remote_dir()?,
        };

        Ok(Target {
            project: ProjectId::from(project),
            local_path,
            remote_dir,
            file,
        })
    }
}

impl Target {
    pub fn store(&self) -> FileRemoteStore {
        FileRemoteStore::new(&self.remote_dir)
    }
}

fn default_remote_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".tokensync").join("remote"))
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(path))
}

/// Run `future` on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
