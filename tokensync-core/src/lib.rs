//! Tokensync core library: token model, snapshots, local document and config.
//!
//! - [`types`]: tokens, snapshots, conflicts, sync enums
//! - [`document`]: the local persisted token document
//! - [`config`]: optional `tokensync.yaml` project config
//! - [`error`]: [`DocumentError`], [`ConfigError`]

pub mod config;
pub mod document;
pub mod error;
pub mod types;

pub use config::{ProjectConfig, WatchSettings};
pub use document::{DocumentFormat, TokenDocument};
pub use error::{ConfigError, DocumentError};
pub use types::{
    ChangeType, Conflict, ConflictStrategy, ConflictType, ContentHash, ProjectId, Resolution,
    ParseEnumError, Snapshot, SyncDirection, Token, TokenType, TokenWithMetadata,
};
