//! Local persisted token document.
//!
//! # Layout
//!
//! ```text
//! {
//!   "tokens":   [ { "name": ..., "type": ..., "value": ... }, ... ],
//!   "metadata": { "synced_at": "<RFC 3339>", "project": "<id>" }
//! }
//! ```
//!
//! Files ending in `.yaml` / `.yml` use the same shape in YAML.
//!
//! The document is always rewritten in full. There is no locking and no
//! temp-file rename, so a concurrent editor can race a sync write.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, DocumentError};
use crate::types::{ProjectId, Token};

pub const META_SYNCED_AT: &str = "synced_at";
pub const META_PROJECT: &str = "project";

/// On-disk serialization format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

/// Ordered token list plus free-form string metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenDocument {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl TokenDocument {
    /// Document stamped with the current time and the owning project.
    pub fn stamped(tokens: Vec<Token>, project: &ProjectId) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            META_SYNCED_AT.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        metadata.insert(META_PROJECT.to_string(), project.0.clone());
        Self { tokens, metadata }
    }
}

/// Load the document at `path`.
///
/// Returns `Ok(None)` if the file does not exist,
/// [`DocumentError::Io`] for any other read failure and a parse error
/// (carrying the path) if the content is malformed.
pub fn load_at(path: &Path) -> Result<Option<TokenDocument>, DocumentError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    let doc = match DocumentFormat::for_path(path) {
        DocumentFormat::Json => {
            serde_json::from_str(&contents).map_err(|source| DocumentError::ParseJson {
                path: path.to_path_buf(),
                source,
            })?
        }
        DocumentFormat::Yaml => {
            serde_yaml::from_str(&contents).map_err(|source| DocumentError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    Ok(Some(doc))
}

/// Write `doc` to `path` with indented formatting, creating parent directories.
pub fn save_at(path: &Path, doc: &TokenDocument) -> Result<(), DocumentError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let serialize_err = |message: String| DocumentError::Serialize {
        path: path.to_path_buf(),
        message,
    };
    let mut contents = match DocumentFormat::for_path(path) {
        DocumentFormat::Json => {
            serde_json::to_string_pretty(doc).map_err(|e| serialize_err(e.to_string()))?
        }
        DocumentFormat::Yaml => {
            serde_yaml::to_string(doc).map_err(|e| serialize_err(e.to_string()))?
        }
    };
    if !contents.ends_with('\n') {
        contents.push('\n');
    }

    std::fs::write(path, contents).map_err(|e| io_err(path, e))?;
    set_file_permissions(path)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), DocumentError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), DocumentError> {
    Ok(())
}
