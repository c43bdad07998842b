//! Semantic Project Model
//!
//! Higher-level validation of descriptors, keyed by the project unit that
//! owns a document. Problems from the model carry no text position.

pub mod maven;

pub use maven::MavenWorkspace;

use crate::core::problem::SemanticProblem;
use crate::store::normalize_path;

/// A tracked project, identified by the directory owning its descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectUnit {
    owner: String,
}

impl ProjectUnit {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

/// Semantic model collaborator of the reconciliation engine
#[tower_lsp::async_trait]
pub trait SemanticModel: Send + Sync {
    /// `None` when no tracked project owns `owner`
    async fn find_unit(&self, owner: &str) -> Option<ProjectUnit>;

    /// Every outstanding problem of `unit`, in reporting order
    async fn problems_of(&self, unit: &ProjectUnit) -> Vec<SemanticProblem>;
}

/// Owner identity of a document: its parent directory, `""` at the root
pub fn owner_of(path: &str) -> String {
    let path = normalize_path(path).unwrap_or_else(|_| path.to_string());
    match path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}
