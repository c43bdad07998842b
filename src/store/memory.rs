//! In-memory file store.

use std::collections::HashMap;
use std::io;

use tokio::sync::RwLock;

use super::{normalize_path, DocumentHandle, FileStore};
use crate::error::StoreError;

/// Failure to report instead of a document's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Forbidden,
    Io,
    Storage,
}

#[derive(Debug, Clone)]
enum Entry {
    Text(String),
    Failing(InjectedFailure),
}

/// Map-backed store; failures can be injected per path
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: &str, text: impl Into<String>) {
        if let Ok(path) = normalize_path(path) {
            self.entries
                .write()
                .await
                .insert(path, Entry::Text(text.into()));
        }
    }

    pub async fn remove(&self, path: &str) {
        if let Ok(path) = normalize_path(path) {
            self.entries.write().await.remove(&path);
        }
    }

    /// Make every later access to `path` fail with `failure`
    pub async fn fail(&self, path: &str, failure: InjectedFailure) {
        if let Ok(path) = normalize_path(path) {
            self.entries
                .write()
                .await
                .insert(path, Entry::Failing(failure));
        }
    }
}

fn injected_error(path: &str, failure: InjectedFailure) -> StoreError {
    let path = path.to_string();
    match failure {
        InjectedFailure::Forbidden => StoreError::Forbidden { path },
        InjectedFailure::Io => StoreError::Io {
            path,
            source: io::Error::other("injected failure"),
        },
        InjectedFailure::Storage => StoreError::Storage {
            path,
            reason: "injected failure".to_string(),
        },
    }
}

#[tower_lsp::async_trait]
impl FileStore for MemoryFileStore {
    async fn resolve(&self, path: &str) -> Result<Option<DocumentHandle>, StoreError> {
        let path = normalize_path(path)?;
        let entries = self.entries.read().await;
        match entries.get(&path) {
            Some(Entry::Failing(InjectedFailure::Forbidden)) => {
                Err(injected_error(&path, InjectedFailure::Forbidden))
            }
            Some(_) => Ok(Some(DocumentHandle::new(path))),
            None => Ok(None),
        }
    }

    async fn read_text(&self, handle: &DocumentHandle) -> Result<String, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(handle.path()) {
            Some(Entry::Text(text)) => Ok(text.clone()),
            Some(Entry::Failing(failure)) => Err(injected_error(handle.path(), *failure)),
            None => Err(StoreError::Io {
                path: handle.path().to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }
}
