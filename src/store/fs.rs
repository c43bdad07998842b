//! Filesystem-backed file store confined to a workspace root.

use std::io;
use std::path::{Path, PathBuf};

use super::{normalize_path, DocumentHandle, FileStore};
use crate::error::StoreError;

/// Directories never descended into while discovering descriptors
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Deepest directory level searched for descriptors
const MAX_DISCOVERY_DEPTH: usize = 12;

#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    /// Workspace-relative path for an absolute path under the root
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(segments?.join("/"))
    }

    /// Find every file called `descriptor` below the root.
    ///
    /// Hidden directories and build output directories are skipped.
    pub async fn discover(&self, descriptor: &str) -> Result<Vec<String>, StoreError> {
        let mut found = Vec::new();
        let mut pending = vec![(self.root.clone(), 0usize)];

        while let Some((dir, depth)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == self.root => {
                    return Err(StoreError::from_io(dir.display().to_string(), e));
                }
                Err(e) => {
                    log::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::from_io(dir.display().to_string(), e))?
            {
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(_) => continue,
                };

                if file_type.is_dir() {
                    if depth < MAX_DISCOVERY_DEPTH
                        && !name.starts_with('.')
                        && !SKIPPED_DIRS.contains(&&*name)
                    {
                        pending.push((path, depth + 1));
                    }
                } else if file_type.is_file() && name == descriptor {
                    if let Some(relative) = self.relative(&path) {
                        found.push(relative);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

#[tower_lsp::async_trait]
impl FileStore for FsFileStore {
    async fn resolve(&self, path: &str) -> Result<Option<DocumentHandle>, StoreError> {
        let relative = normalize_path(path)?;
        if relative.is_empty() {
            return Ok(None);
        }

        match tokio::fs::metadata(self.absolute(&relative)).await {
            Ok(meta) if meta.is_file() => Ok(Some(DocumentHandle::new(relative))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::from_io(relative, e)),
        }
    }

    async fn read_text(&self, handle: &DocumentHandle) -> Result<String, StoreError> {
        let bytes = tokio::fs::read(self.absolute(handle.path()))
            .await
            .map_err(|e| StoreError::from_io(handle.path(), e))?;

        String::from_utf8(bytes).map_err(|e| StoreError::Storage {
            path: handle.path().to_string(),
            reason: format!("content is not valid UTF-8: {}", e),
        })
    }
}
