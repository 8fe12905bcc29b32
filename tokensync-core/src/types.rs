//! Domain types for design-token synchronization.
//!
//! Tokens are immutable value records; a change is always a full replacement.
//! All types are serializable via serde so they can be persisted in the local
//! document or emitted as JSON by the CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of the remote project a token set belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Hex SHA-256 digest of a token's `(name, type, value)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Returned by the `FromStr` impls below for unrecognised names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'; expected: {expected}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// The category of a design token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    Color,
    Typography,
    Spacing,
    Shadow,
    BorderRadius,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Color => "color",
            TokenType::Typography => "typography",
            TokenType::Spacing => "spacing",
            TokenType::Shadow => "shadow",
            TokenType::BorderRadius => "border-radius",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "color" => Ok(TokenType::Color),
            "typography" => Ok(TokenType::Typography),
            "spacing" => Ok(TokenType::Spacing),
            "shadow" => Ok(TokenType::Shadow),
            "border-radius" => Ok(TokenType::BorderRadius),
            _ => Err(ParseEnumError {
                kind: "token type",
                value: s.to_string(),
                expected: "color, typography, spacing, shadow, border-radius",
            }),
        }
    }
}

/// Which side(s) of a sync are authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Remote → local.
    Pull,
    /// Local → remote.
    Push,
    /// Both ways, with conflict resolution.
    #[default]
    #[serde(alias = "both")]
    Bidirectional,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Pull => write!(f, "pull"),
            SyncDirection::Push => write!(f, "push"),
            SyncDirection::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for SyncDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pull" => Ok(SyncDirection::Pull),
            "push" => Ok(SyncDirection::Push),
            "bidirectional" | "both" => Ok(SyncDirection::Bidirectional),
            _ => Err(ParseEnumError {
                kind: "sync direction",
                value: s.to_string(),
                expected: "pull, push, bidirectional",
            }),
        }
    }
}

/// How a conflicting token pair is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    Local,
    #[default]
    Remote,
    Newest,
    Prompt,
    Merge,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Local => "local",
            ConflictStrategy::Remote => "remote",
            ConflictStrategy::Newest => "newest",
            ConflictStrategy::Prompt => "prompt",
            ConflictStrategy::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ConflictStrategy::Local),
            "remote" => Ok(ConflictStrategy::Remote),
            "newest" => Ok(ConflictStrategy::Newest),
            "prompt" => Ok(ConflictStrategy::Prompt),
            "merge" => Ok(ConflictStrategy::Merge),
            _ => Err(ParseEnumError {
                kind: "conflict strategy",
                value: s.to_string(),
                expected: "local, remote, newest, prompt, merge",
            }),
        }
    }
}

/// Classification of a conflict between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Same type on both sides, different values.
    BothModified,
    /// Deleted locally, modified remotely. Never constructed by the current
    /// reconciliation (no last-synced baseline).
    LocalDeleted,
    /// Deleted remotely, modified locally. See [`ConflictType::LocalDeleted`].
    RemoteDeleted,
    /// The token's type differs between the sides.
    TypeChange,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::BothModified => write!(f, "both_modified"),
            ConflictType::LocalDeleted => write!(f, "local_deleted"),
            ConflictType::RemoteDeleted => write!(f, "remote_deleted"),
            ConflictType::TypeChange => write!(f, "type_change"),
        }
    }
}

/// Kind of a file-system change observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Delete => write!(f, "delete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A single named design token.
///
/// Derived `PartialEq` compares every field; sync logic uses
/// [`Token::content_eq`], which only looks at `(name, type, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Token {
    pub fn new(name: impl Into<String>, token_type: TokenType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token_type,
            value: value.into(),
            description: None,
            category: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sync equality: `name`, `type` and `value` only.
    pub fn content_eq(&self, other: &Token) -> bool {
        self.name == other.name && self.token_type == other.token_type && self.value == other.value
    }

    pub fn content_hash(&self) -> ContentHash {
        let mut h = Sha256::new();
        h.update(self.name.as_bytes());
        h.update([0u8]);
        h.update(self.token_type.as_str().as_bytes());
        h.update([0u8]);
        h.update(self.value.as_bytes());
        ContentHash(hex::encode(h.finalize()))
    }
}

/// A token plus the bookkeeping used to compare two copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWithMetadata {
    pub token: Token,
    pub last_synced_at: DateTime<Utc>,
    pub content_hash: ContentHash,
    pub version: u32,
}

impl TokenWithMetadata {
    /// Wrap a freshly loaded token; version starts at 1.
    pub fn observed(token: Token, at: DateTime<Utc>) -> Self {
        let content_hash = token.content_hash();
        Self {
            token,
            last_synced_at: at,
            content_hash,
            version: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Name-keyed view of every token on one side at the start of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    tokens: BTreeMap<String, TokenWithMetadata>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot; a later token with an already-seen name replaces the earlier one.
    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>, at: DateTime<Utc>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|token| (token.name.clone(), TokenWithMetadata::observed(token, at)))
            .collect();
        Self { tokens }
    }

    pub fn get(&self, name: &str) -> Option<&TokenWithMetadata> {
        self.tokens.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tokens.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenWithMetadata)> {
        self.tokens.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values().map(|entry| &entry.token)
    }
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// Chosen outcome for a conflict. `selected_token == None` means skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ConflictStrategy,
    pub selected_token: Option<Token>,
    pub reason: String,
}

/// A token name present on both sides with unequal content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub token_name: String,
    pub local_token: Token,
    pub remote_token: Token,
    pub conflict_type: ConflictType,
    pub resolution: Option<Resolution>,
}

impl Conflict {
    /// Returns `None` when the two tokens are content-equal.
    pub fn detect(local: &Token, remote: &Token) -> Option<Conflict> {
        if local.content_eq(remote) {
            return None;
        }
        let conflict_type = if local.token_type != remote.token_type {
            ConflictType::TypeChange
        } else {
            ConflictType::BothModified
        };
        Some(Conflict {
            token_name: local.name.clone(),
            local_token: local.clone(),
            remote_token: remote.clone(),
            conflict_type,
            resolution: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
