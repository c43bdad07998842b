//! File Store
//!
//! Resolution and retrieval of document text by workspace-relative path.
//! Paths always use `/` separators and never leave the workspace root.

pub mod fs;
pub mod memory;
pub mod overlay;

pub use fs::FsFileStore;
pub use memory::MemoryFileStore;
pub use overlay::OverlayFileStore;

use crate::error::StoreError;

/// A document that resolved in a store; pass it back to read its text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    path: String,
}

impl DocumentHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Storage collaborator of the reconciliation engine
#[tower_lsp::async_trait]
pub trait FileStore: Send + Sync {
    /// `Ok(None)` when nothing exists at `path`
    async fn resolve(&self, path: &str) -> Result<Option<DocumentHandle>, StoreError>;

    async fn read_text(&self, handle: &DocumentHandle) -> Result<String, StoreError>;
}

/// Normalize a workspace-relative path.
///
/// Leading slashes and `.` segments are dropped. `..` segments are refused
/// so no store can be coaxed outside its root.
pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(StoreError::Forbidden {
                    path: path.to_string(),
                });
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}
