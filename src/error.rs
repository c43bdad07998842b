//! Error types for the reconciliation core.
//!
//! None of these escape `ReconcileEngine::reconcile`: a missing document
//! ends the pass with no problems, storage failures are logged and
//! swallowed, structural failures become a problem, and position mapping
//! clamps instead of failing.

use std::io;

use thiserror::Error;

/// Failure reported by a file store collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("access to '{path}' is forbidden")]
    Forbidden { path: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("storage error on '{path}': {reason}")]
    Storage { path: String, reason: String },
}

impl StoreError {
    /// Map an I/O error, classifying permission problems as forbidden
    pub fn from_io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::Forbidden { path },
            _ => Self::Io { path, source },
        }
    }

    /// The document disappeared between resolution and reading
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Why a reconciliation pass ended without consulting its sources
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("access denied while reconciling '{path}'")]
    AccessDenied {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("storage failure while reconciling '{path}'")]
    Storage {
        path: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    pub fn from_store(path: &str, source: StoreError) -> Self {
        let path = path.to_string();
        match source {
            StoreError::Forbidden { .. } => Self::AccessDenied { path, source },
            _ => Self::Storage { path, source },
        }
    }

    pub fn source_error(&self) -> &StoreError {
        match self {
            Self::AccessDenied { source, .. } | Self::Storage { source, .. } => source,
        }
    }
}
