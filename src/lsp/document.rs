//! Mapping between LSP document URIs and workspace-relative paths.

use std::path::Path;

use tower_lsp::lsp_types::Url;

/// Workspace-relative path of a `file:` URI under `root`
pub fn relative_path(root: &Path, uri: &Url) -> Option<String> {
    let path = uri.to_file_path().ok()?;
    let relative = path.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect();
    let joined = segments?.join("/");
    (!joined.is_empty()).then_some(joined)
}

/// `file:` URI of a workspace-relative path
pub fn document_url(root: &Path, path: &str) -> Option<Url> {
    let absolute = path
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment));
    Url::from_file_path(absolute).ok()
}

/// Whether the last segment of `path` is the descriptor file name
pub fn is_descriptor(path: &str, descriptor: &str) -> bool {
    path.rsplit('/').next() == Some(descriptor)
}
