//! Reconciliation Engine
//!
//! One pass resolves a descriptor, checks that it is well-formed, and asks
//! the semantic model about its owning project. Every pass ends with a
//! problem list, possibly empty; nothing propagates to the caller.

mod locks;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::core::locator::DEFAULT_ANCHOR;
use crate::core::problem::{self, Problem, StructuralFailure};
use crate::error::ReconcileError;
use crate::model::{owner_of, SemanticModel};
use crate::parser::StructuralParser;
use crate::store::{normalize_path, FileStore};
use locks::PathLocks;

/// Notification method used to push reconcile results to an endpoint
pub const RECONCILE_STATE_METHOD: &str = "event:pom-reconcile-state-changed";

/// Payload of [`RECONCILE_STATE_METHOD`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileState {
    pub document_path: String,
    pub problems: Vec<Problem>,
    /// Text the problem offsets refer to; never sent over the wire
    #[serde(skip)]
    pub source_text: Option<String>,
}

/// Outbound channel for reconcile results
#[tower_lsp::async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, endpoint_id: &str, state: ReconcileState);
}

/// Outcome of resolving and parsing a document
#[derive(Debug)]
enum Resolution {
    Missing,
    Parsed(String),
    StructuralFailure {
        text: String,
        failure: StructuralFailure,
    },
    StorageFailure(ReconcileError),
}

/// Delivery bookkeeping of one path
#[derive(Debug, Default)]
struct PathSequence {
    /// Scheduled passes that have not settled yet
    pending: usize,
    /// Highest sequence number delivered so far
    delivered: u64,
}

/// Orders deliveries per path so a result never replaces a newer one
#[derive(Debug, Default)]
struct DeliveryOrder {
    next: AtomicU64,
    paths: Mutex<HashMap<String, PathSequence>>,
}

impl DeliveryOrder {
    fn issue(&self, path: &str) -> u64 {
        let seq = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_default()
            .pending += 1;
        seq
    }

    /// Settle pass `seq`; returns whether its result is still the newest
    fn settle(&self, path: &str, seq: u64) -> bool {
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = paths.get_mut(path) else {
            return true;
        };

        entry.pending = entry.pending.saturating_sub(1);
        let fresh = seq > entry.delivered;
        if fresh {
            entry.delivered = seq;
        }
        if entry.pending == 0 {
            paths.remove(path);
        }
        fresh
    }

    fn len(&self) -> usize {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub struct ReconcileEngine {
    store: Arc<dyn FileStore>,
    model: Arc<dyn SemanticModel>,
    parser: Arc<dyn StructuralParser>,
    anchor: String,
    locks: PathLocks,
    order: DeliveryOrder,
}

impl ReconcileEngine {
    pub fn new(
        store: Arc<dyn FileStore>,
        model: Arc<dyn SemanticModel>,
        parser: Arc<dyn StructuralParser>,
    ) -> Self {
        Self {
            store,
            model,
            parser,
            anchor: DEFAULT_ANCHOR.to_string(),
            locks: PathLocks::default(),
            order: DeliveryOrder::default(),
        }
    }

    /// Use `anchor` to place problems that carry no position
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = anchor.into();
        self
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Run one reconciliation pass over the document at `path`.
    ///
    /// Passes over the same path are serialized; passes over different
    /// paths run concurrently.
    pub async fn reconcile(&self, path: &str) -> Vec<Problem> {
        self.reconcile_state(path).await.problems
    }

    /// [`ReconcileEngine::reconcile`], packaged for delivery together with
    /// the text the problems were computed against
    pub async fn reconcile_state(&self, path: &str) -> ReconcileState {
        let key = lock_key(path);
        let _guard = self.locks.acquire(&key).await;
        self.run_pass(path).await
    }

    /// Reconcile on a background task and deliver the result to `endpoint_id`.
    ///
    /// Delivery happens while the path is still locked, and a result is
    /// dropped when a pass scheduled later on the same path was already
    /// delivered, so the endpoint never ends up with stale problems.
    pub fn spawn_reconcile(
        self: &Arc<Self>,
        endpoint_id: impl Into<String>,
        path: impl Into<String>,
        delivery: Arc<dyn Delivery>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let endpoint_id = endpoint_id.into();
        let path = path.into();
        let key = lock_key(&path);
        let seq = self.order.issue(&key);

        tokio::spawn(async move {
            let _guard = engine.locks.acquire(&key).await;
            let state = engine.run_pass(&path).await;

            if !engine.order.settle(&key, seq) {
                log::debug!("Dropping superseded result #{} for '{}'", seq, path);
                return;
            }

            log::debug!(
                "Delivering {} problem(s) for '{}' to '{}'",
                state.problems.len(),
                path,
                endpoint_id
            );
            delivery.deliver(&endpoint_id, state).await;
        })
    }

    /// Number of paths with scheduled passes not yet settled
    pub fn scheduled_paths(&self) -> usize {
        self.order.len()
    }

    /// One pass; the caller holds the path lock
    async fn run_pass(&self, path: &str) -> ReconcileState {
        let (problems, source_text) = match self.resolve(path).await {
            Resolution::Missing => {
                log::debug!("Reconcile '{}': document not found", path);
                (Vec::new(), None)
            }
            Resolution::StorageFailure(err) => {
                log::error!("{}: {}", err, err.source_error());
                (Vec::new(), None)
            }
            Resolution::StructuralFailure { text, failure } => {
                log::debug!(
                    "Reconcile '{}': not well-formed at {}:{}: {}",
                    path,
                    failure.line,
                    failure.column,
                    failure.message
                );
                let problem = problem::from_structural_failure(&failure, &text);
                (vec![problem], Some(text))
            }
            Resolution::Parsed(text) => {
                let problems = self.semantic_problems(path, &text).await;
                (problems, Some(text))
            }
        };

        ReconcileState {
            document_path: path.to_string(),
            problems,
            source_text,
        }
    }

    async fn resolve(&self, path: &str) -> Resolution {
        let handle = match self.store.resolve(path).await {
            Ok(Some(handle)) => handle,
            Ok(None) => return Resolution::Missing,
            Err(e) => return Resolution::StorageFailure(ReconcileError::from_store(path, e)),
        };

        let text = match self.store.read_text(&handle).await {
            Ok(text) => text,
            Err(e) if e.is_not_found() => return Resolution::Missing,
            Err(e) => return Resolution::StorageFailure(ReconcileError::from_store(path, e)),
        };

        match self.parser.parse(&text) {
            Ok(()) => Resolution::Parsed(text),
            Err(failure) => Resolution::StructuralFailure { text, failure },
        }
    }

    async fn semantic_problems(&self, path: &str, text: &str) -> Vec<Problem> {
        let owner = owner_of(path);
        let Some(unit) = self.model.find_unit(&owner).await else {
            log::debug!("Reconcile '{}': no project unit owns '{}'", path, owner);
            return Vec::new();
        };

        let problems = self.model.problems_of(&unit).await;
        problem::from_semantic_problems(&problems, text, &self.anchor)
    }
}

fn lock_key(path: &str) -> String {
    normalize_path(path).unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MavenWorkspace;
    use crate::parser::XmlStructureParser;
    use crate::store::MemoryFileStore;

    #[tokio::test]
    async fn test_reconcile_state_carries_path() {
        let store = Arc::new(MemoryFileStore::new());
        store.insert("app/pom.xml", "<project>").await;
        let engine = ReconcileEngine::new(
            store,
            Arc::new(MavenWorkspace::new()),
            Arc::new(XmlStructureParser::new()),
        );

        let state = engine.reconcile_state("app/pom.xml").await;
        assert_eq!(state.document_path, "app/pom.xml");
        assert_eq!(state.problems.len(), 1);
        assert_eq!(state.source_text.as_deref(), Some("<project>"));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["documentPath"], "app/pom.xml");
        assert_eq!(value["problems"][0]["error"], true);
        assert!(value.get("sourceText").is_none());
    }

    #[tokio::test]
    async fn test_custom_anchor() {
        let engine = ReconcileEngine::new(
            Arc::new(MemoryFileStore::new()),
            Arc::new(MavenWorkspace::new()),
            Arc::new(XmlStructureParser::new()),
        )
        .with_anchor("<project>");
        assert_eq!(engine.anchor(), "<project>");
    }
}
