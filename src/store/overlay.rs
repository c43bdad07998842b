//! Open-editor contents layered over another store.
//!
//! Documents open in an editor are served from memory so reconciliation
//! sees what the user is typing, not what was last saved.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{normalize_path, DocumentHandle, FileStore};
use crate::error::StoreError;

pub struct OverlayFileStore {
    inner: Arc<dyn FileStore>,
    open: RwLock<HashMap<String, String>>,
}

impl OverlayFileStore {
    pub fn new(inner: Arc<dyn FileStore>) -> Self {
        Self {
            inner,
            open: RwLock::new(HashMap::new()),
        }
    }

    /// Record the live text of an open document, replacing any previous one
    pub async fn update(&self, path: &str, text: String) {
        if let Ok(path) = normalize_path(path) {
            self.open.write().await.insert(path, text);
        }
    }

    pub async fn close(&self, path: &str) {
        if let Ok(path) = normalize_path(path) {
            self.open.write().await.remove(&path);
        }
    }

    pub async fn is_open(&self, path: &str) -> bool {
        match normalize_path(path) {
            Ok(path) => self.open.read().await.contains_key(&path),
            Err(_) => false,
        }
    }

    pub async fn live_text(&self, path: &str) -> Option<String> {
        let path = normalize_path(path).ok()?;
        self.open.read().await.get(&path).cloned()
    }
}

#[tower_lsp::async_trait]
impl FileStore for OverlayFileStore {
    async fn resolve(&self, path: &str) -> Result<Option<DocumentHandle>, StoreError> {
        let normalized = normalize_path(path)?;
        if self.open.read().await.contains_key(&normalized) {
            return Ok(Some(DocumentHandle::new(normalized)));
        }
        self.inner.resolve(&normalized).await
    }

    async fn read_text(&self, handle: &DocumentHandle) -> Result<String, StoreError> {
        if let Some(text) = self.open.read().await.get(handle.path()) {
            return Ok(text.clone());
        }
        self.inner.read_text(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFileStore;

    #[tokio::test]
    async fn test_open_text_shadows_inner_store() {
        let disk = Arc::new(MemoryFileStore::new());
        disk.insert("pom.xml", "saved").await;
        let overlay = OverlayFileStore::new(disk);

        let handle = overlay.resolve("pom.xml").await.unwrap().unwrap();
        assert_eq!(overlay.read_text(&handle).await.unwrap(), "saved");

        overlay.update("pom.xml", "typing".to_string()).await;
        assert_eq!(overlay.read_text(&handle).await.unwrap(), "typing");

        overlay.close("pom.xml").await;
        assert_eq!(overlay.read_text(&handle).await.unwrap(), "saved");
    }

    #[tokio::test]
    async fn test_unsaved_document_resolves() {
        let overlay = OverlayFileStore::new(Arc::new(MemoryFileStore::new()));
        assert!(overlay.resolve("new/pom.xml").await.unwrap().is_none());

        overlay.update("new/pom.xml", "<project/>".to_string()).await;
        assert!(overlay.resolve("new/pom.xml").await.unwrap().is_some());
        assert!(overlay.is_open("/new/pom.xml").await);
    }
}
