//! Remote store boundary.
//!
//! The syncer talks to the remote side only through [`RemoteStore`]. Transport,
//! authentication and request retries belong to the implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tokensync_core::{
    document::{self, TokenDocument},
    ProjectId, Token,
};

use crate::error::{io_err, RemoteError};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every token currently stored for `project`.
    async fn get_tokens(&self, project: &ProjectId) -> Result<Vec<Token>, RemoteError>;

    /// Upsert `tokens` by name in a single batch.
    async fn upload_tokens(&self, project: &ProjectId, tokens: &[Token])
        -> Result<(), RemoteError>;

    async fn delete_token(&self, project: &ProjectId, token_name: &str)
        -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn get_tokens(&self, project: &ProjectId) -> Result<Vec<Token>, RemoteError> {
        (**self).get_tokens(project).await
    }

    async fn upload_tokens(
        &self,
        project: &ProjectId,
        tokens: &[Token],
    ) -> Result<(), RemoteError> {
        (**self).upload_tokens(project, tokens).await
    }

    async fn delete_token(&self, project: &ProjectId, token_name: &str) -> Result<(), RemoteError> {
        (**self).delete_token(project, token_name).await
    }
}

// =============================================================================
// Directory-backed store
// =============================================================================

/// Remote store kept in a local directory (shared drive, fixture, offline mode).
///
/// Each project lives in `<root>/<project>.json` using the token document layout.
#[derive(Debug, Clone)]
pub struct FileRemoteStore {
    root: PathBuf,
}

impl FileRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_path(&self, project: &ProjectId) -> PathBuf {
        self.root.join(format!("{}.json", project.0))
    }

    fn load(&self, project: &ProjectId) -> Result<Vec<Token>, RemoteError> {
        Ok(document::load_at(&self.project_path(project))?
            .map(|doc| doc.tokens)
            .unwrap_or_default())
    }

    fn store(&self, project: &ProjectId, tokens: Vec<Token>) -> Result<(), RemoteError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
        }
        let doc = TokenDocument::stamped(tokens, project);
        document::save_at(&self.project_path(project), &doc)?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn get_tokens(&self, project: &ProjectId) -> Result<Vec<Token>, RemoteError> {
        self.load(project)
    }

    async fn upload_tokens(
        &self,
        project: &ProjectId,
        tokens: &[Token],
    ) -> Result<(), RemoteError> {
        let mut stored = self.load(project)?;
        for token in tokens {
            match stored.iter_mut().find(|existing| existing.name == token.name) {
                Some(existing) => *existing = token.clone(),
                None => stored.push(token.clone()),
            }
        }
        self.store(project, stored)
    }

    async fn delete_token(&self, project: &ProjectId, token_name: &str) -> Result<(), RemoteError> {
        let mut stored = self.load(project)?;
        let before = stored.len();
        stored.retain(|token| token.name != token_name);
        if stored.len() == before {
            return Err(RemoteError::NotFound {
                project: project.0.clone(),
                token: token_name.to_string(),
            });
        }
        self.store(project, stored)
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Per-operation call counters of a [`MemoryRemoteStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub upload: usize,
    pub delete: usize,
}

/// Remote store held in process memory.
///
/// Used for dry runs against fixtures and as the double in tests; it counts
/// calls so callers can assert how often the remote was touched.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    projects: Mutex<HashMap<ProjectId, Vec<Token>>>,
    gets: AtomicUsize,
    uploads: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `tokens` for `project`.
    pub fn with_tokens(project: &ProjectId, tokens: Vec<Token>) -> Self {
        let store = Self::default();
        store.replace(project, tokens);
        store
    }

    /// Overwrite the stored tokens of `project` without counting a call.
    pub fn replace(&self, project: &ProjectId, tokens: Vec<Token>) {
        self.lock().insert(project.clone(), tokens);
    }

    /// Current tokens of `project` without counting a call.
    pub fn tokens(&self, project: &ProjectId) -> Vec<Token> {
        self.lock().get(project).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.gets.load(Ordering::SeqCst),
            upload: self.uploads.load(Ordering::SeqCst),
            delete: self.deletes.load(Ordering::SeqCst),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ProjectId, Vec<Token>>> {
        match self.projects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_tokens(&self, project: &ProjectId) -> Result<Vec<Token>, RemoteError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokens(project))
    }

    async fn upload_tokens(
        &self,
        project: &ProjectId,
        tokens: &[Token],
    ) -> Result<(), RemoteError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let mut projects = self.lock();
        let stored = projects.entry(project.clone()).or_default();
        for token in tokens {
            match stored.iter_mut().find(|existing| existing.name == token.name) {
                Some(existing) => *existing = token.clone(),
                None => stored.push(token.clone()),
            }
        }
        Ok(())
    }

    async fn delete_token(&self, project: &ProjectId, token_name: &str) -> Result<(), RemoteError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut projects = self.lock();
        let stored = projects.entry(project.clone()).or_default();
        let before = stored.len();
        stored.retain(|token| token.name != token_name);
        if stored.len() == before {
            return Err(RemoteError::NotFound {
                project: project.0.clone(),
                token: token_name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokensync_core::TokenType;

    fn project() -> ProjectId {
        ProjectId::from("acme")
    }

    #[tokio::test]
    async fn empty_store_has_no_tokens() {
        let tmp = TempDir::new().unwrap();
        let store = FileRemoteStore::new(tmp.path().join("remote"));
        assert!(store.get_tokens(&project()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_upserts_by_name_keeping_order() {
        let tmp = TempDir::new().unwrap();
        let store = FileRemoteStore::new(tmp.path().join("remote"));
        store
            .upload_tokens(
                &project(),
                &[
                    Token::new("color.primary", TokenType::Color, "#007bff"),
                    Token::new("spacing.small", TokenType::Spacing, "8px"),
                ],
            )
            .await
            .unwrap();
        store
            .upload_tokens(
                &project(),
                &[Token::new("color.primary", TokenType::Color, "#0056b3")],
            )
            .await
            .unwrap();

        let tokens = store.get_tokens(&project()).await.unwrap();
        let values: Vec<_> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["#0056b3", "8px"]);
    }

    #[tokio::test]
    async fn delete_missing_token_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FileRemoteStore::new(tmp.path());
        let err = store.delete_token(&project(), "ghost").await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn memory_store_counts_calls() {
        let store = MemoryRemoteStore::with_tokens(
            &project(),
            vec![Token::new("a", TokenType::Color, "#000")],
        );
        assert_eq!(store.get_tokens(&project()).await.unwrap().len(), 1);
        store
            .upload_tokens(&project(), &[Token::new("b", TokenType::Color, "#fff")])
            .await
            .unwrap();
        store.delete_token(&project(), "a").await.unwrap();
        assert!(store.delete_token(&project(), "a").await.is_err());

        assert_eq!(
            store.calls(),
            CallCounts {
                get: 1,
                upload: 1,
                delete: 2
            }
        );
        let names: Vec<_> = store.tokens(&project()).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[tokio::test]
    async fn arc_store_delegates() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileRemoteStore::new(tmp.path()));
        store
            .upload_tokens(&project(), &[Token::new("a", TokenType::Color, "#000")])
            .await
            .unwrap();
        store.delete_token(&project(), "a").await.unwrap();
        assert!(store.get_tokens(&project()).await.unwrap().is_empty());
    }
}
