//! Optional per-project config file (`tokensync.yaml`).
//!
//! Every field is optional; command-line flags override whatever is set here.
//! `direction` and `conflict` stay raw strings so callers decide how strictly
//! to interpret them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "tokensync.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: Option<String>,
    pub direction: Option<String>,
    pub local_path: Option<PathBuf>,
    pub conflict: Option<String>,
    pub remote_dir: Option<PathBuf>,
    pub watch: WatchSettings,
}

/// Watch-mode overrides. Unset values fall back to the watcher defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WatchSettings {
    pub paths: Vec<PathBuf>,
    pub debounce_ms: Option<u64>,
    pub sync_on_start: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

/// Load the config at `path`; a missing file yields the defaults.
pub fn load_at(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ProjectConfig::default())
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/tokensync.yaml`. Pure, no I/O.
pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_is_default() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_at(&config_path_in(tmp.path())).unwrap();
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn partial_config_parses() {
        let tmp = TempDir::new().unwrap();
        let path = config_path_in(tmp.path());
        std::fs::write(
            &path,
            "project: acme\nconflict: merge\nwatch:\n  debounce_ms: 250\n  paths: [tokens]\n",
        )
        .unwrap();

        let cfg = load_at(&path).unwrap();
        assert_eq!(cfg.project.as_deref(), Some("acme"));
        assert_eq!(cfg.conflict.as_deref(), Some("merge"));
        assert!(cfg.direction.is_none());
        assert_eq!(cfg.watch.debounce_ms, Some(250));
        assert_eq!(cfg.watch.paths, vec![PathBuf::from("tokens")]);
    }

    #[test]
    fn malformed_config_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = config_path_in(tmp.path());
        std::fs::write(&path, "watch: [not, a, mapping]\n").unwrap();

        let err = load_at(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
