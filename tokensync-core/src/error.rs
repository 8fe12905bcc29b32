//! Error types for tokensync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing the local token document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Underlying I/O failure other than "file does not exist".
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON document could not be parsed.
    #[error("failed to parse token document at {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML document could not be parsed; the message carries serde_yaml line context.
    #[error("failed to parse token document at {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Serialization failure on the write path.
    #[error("failed to serialize token document for {path}: {message}")]
    Serialize { path: PathBuf, message: String },
}

impl DocumentError {
    /// True for malformed-content errors (as opposed to I/O failures).
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            DocumentError::ParseJson { .. } | DocumentError::ParseYaml { .. }
        )
    }
}

/// Errors raised while loading the project config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.into(),
        source,
    }
}
