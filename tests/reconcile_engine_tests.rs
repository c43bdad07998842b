use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Barrier, Mutex, Notify};

use pom_reconciler::core::offset_of;
use pom_reconciler::error::StoreError;
use pom_reconciler::model::{MavenWorkspace, ProjectUnit, SemanticModel};
use pom_reconciler::parser::{StructuralParser, XmlStructureParser};
use pom_reconciler::store::memory::InjectedFailure;
use pom_reconciler::store::{DocumentHandle, FileStore, MemoryFileStore};
use pom_reconciler::{Delivery, ReconcileEngine, ReconcileState, SemanticProblem, StructuralFailure};

const VALID_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.example</groupId>
  <artifactId>app</artifactId>
  <version>1.0.0</version>
</project>
"#;

/// Parser that always reports the same failure
struct FailingParser(StructuralFailure);

impl StructuralParser for FailingParser {
    fn parse(&self, _text: &str) -> Result<(), StructuralFailure> {
        Err(self.0.clone())
    }
}

/// Model with a fixed problem list for every owner in `owners`
struct FixedModel {
    owners: Vec<String>,
    problems: Vec<SemanticProblem>,
}

#[tower_lsp::async_trait]
impl SemanticModel for FixedModel {
    async fn find_unit(&self, owner: &str) -> Option<ProjectUnit> {
        self.owners
            .iter()
            .any(|o| o == owner)
            .then(|| ProjectUnit::new(owner))
    }

    async fn problems_of(&self, _unit: &ProjectUnit) -> Vec<SemanticProblem> {
        self.problems.clone()
    }
}

fn fixed_model(owner: &str, problems: &[&str]) -> Arc<FixedModel> {
    Arc::new(FixedModel {
        owners: vec![owner.to_string()],
        problems: problems.iter().map(|p| SemanticProblem::new(*p)).collect(),
    })
}

async fn store_with(path: &str, text: &str) -> Arc<MemoryFileStore> {
    let store = Arc::new(MemoryFileStore::new());
    store.insert(path, text).await;
    store
}

#[tokio::test]
async fn test_well_formed_without_semantic_problems() {
    let engine = ReconcileEngine::new(
        store_with("app/pom.xml", VALID_POM).await,
        fixed_model("app", &[]),
        Arc::new(XmlStructureParser::new()),
    );

    assert!(engine.reconcile("app/pom.xml").await.is_empty());
}

#[tokio::test]
async fn test_structural_failure_yields_one_problem() {
    let text = "<project>\n  <a>\n    </b>\n</project>\n";
    let failure = StructuralFailure {
        line: 3,
        column: 5,
        message: "The element type \"a\" must be terminated.".to_string(),
    };
    let engine = ReconcileEngine::new(
        store_with("app/pom.xml", text).await,
        fixed_model("app", &["never consulted"]),
        Arc::new(FailingParser(failure)),
    );

    let problems = engine.reconcile("app/pom.xml").await;
    assert_eq!(problems.len(), 1);

    let problem = &problems[0];
    let expected_start = offset_of(text, 3, 5) - 1;
    assert!(problem.is_error());
    assert_eq!(problem.source_start(), expected_start);
    assert_eq!(problem.source_end(), expected_start + 1);
    assert_eq!(problem.message(), "The element type \"a\" must be terminated.");
}

#[tokio::test]
async fn test_real_parser_reports_mismatched_tag() {
    let text = "<project>\n  <groupId>x</artifactId>\n</project>\n";
    let engine = ReconcileEngine::new(
        store_with("pom.xml", text).await,
        fixed_model("", &["never consulted"]),
        Arc::new(XmlStructureParser::new()),
    );

    let problems = engine.reconcile("pom.xml").await;
    assert_eq!(problems.len(), 1);
    assert!(problems[0].is_error());
    assert!(problems[0].source_end() <= text.chars().count());
}

#[tokio::test]
async fn test_semantic_problems_share_fallback_range() {
    let engine = ReconcileEngine::new(
        store_with("app/pom.xml", VALID_POM).await,
        fixed_model("app", &["first", "second"]),
        Arc::new(XmlStructureParser::new()),
    );

    let problems = engine.reconcile("app/pom.xml").await;
    assert_eq!(problems.len(), 2);
    assert_eq!(problems[0].message(), "first");
    assert_eq!(problems[1].message(), "second");

    let anchor_at = VALID_POM.find("<project ").unwrap();
    for problem in &problems {
        assert!(problem.is_error());
        assert_eq!(problem.source_start(), anchor_at + 1);
        assert_eq!(problem.source_end(), anchor_at + 1 + "<project ".len());
    }
}

#[tokio::test]
async fn test_missing_document_yields_nothing() {
    let store = store_with("app/pom.xml", VALID_POM).await;
    let engine = ReconcileEngine::new(
        store.clone(),
        fixed_model("app", &["problem"]),
        Arc::new(XmlStructureParser::new()),
    );

    assert!(engine.reconcile("other/pom.xml").await.is_empty());

    store.remove("app/pom.xml").await;
    assert!(engine.reconcile("app/pom.xml").await.is_empty());
}

#[tokio::test]
async fn test_storage_failures_are_swallowed() {
    for failure in [
        InjectedFailure::Forbidden,
        InjectedFailure::Io,
        InjectedFailure::Storage,
    ] {
        let store = Arc::new(MemoryFileStore::new());
        store.fail("app/pom.xml", failure).await;
        let engine = ReconcileEngine::new(
            store,
            fixed_model("app", &["problem"]),
            Arc::new(XmlStructureParser::new()),
        );

        assert!(
            engine.reconcile("app/pom.xml").await.is_empty(),
            "{:?} should produce no problems",
            failure
        );
    }
}

#[tokio::test]
async fn test_escaping_path_yields_nothing() {
    let engine = ReconcileEngine::new(
        store_with("pom.xml", VALID_POM).await,
        fixed_model("", &["problem"]),
        Arc::new(XmlStructureParser::new()),
    );

    assert!(engine.reconcile("../pom.xml").await.is_empty());
}

#[tokio::test]
async fn test_untracked_owner_yields_nothing() {
    let engine = ReconcileEngine::new(
        store_with("app/pom.xml", VALID_POM).await,
        fixed_model("lib", &["problem"]),
        Arc::new(XmlStructureParser::new()),
    );

    assert!(engine.reconcile("app/pom.xml").await.is_empty());
}

#[tokio::test]
async fn test_maven_workspace_problems_are_anchored() {
    let text = "<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n  <modelVersion>4.0.0</modelVersion>\n  <groupId>org.example</groupId>\n</project>\n";
    let workspace = Arc::new(MavenWorkspace::new());
    workspace.refresh("app", text).await;

    let engine = ReconcileEngine::new(
        store_with("app/pom.xml", text).await,
        workspace,
        Arc::new(XmlStructureParser::new()),
    );

    let problems = engine.reconcile("app/pom.xml").await;
    let messages: Vec<&str> = problems.iter().map(|p| p.message()).collect();
    assert_eq!(messages, ["'artifactId' is missing.", "'version' is missing."]);
    assert!(problems.iter().all(|p| p.source_start() == 1 && p.source_end() == 10));
}

#[tokio::test]
async fn test_problem_ranges_stay_within_text() {
    let texts = [
        "",
        "<",
        "<project>",
        "<project>\r\n</project>",
        "<project>\r</project>",
        "<projet>ünïcödé</projet>",
        "<project \n",
    ];
    let failures = [(0, 0), (1, 1), (1, 200), (3, 5), (500, 1), (2, 0)];

    for text in texts {
        for (line, column) in failures {
            let failure = StructuralFailure {
                line,
                column,
                message: "failure".to_string(),
            };
            let engine = ReconcileEngine::new(
                store_with("pom.xml", text).await,
                fixed_model("", &[]),
                Arc::new(FailingParser(failure)),
            );
            for problem in engine.reconcile("pom.xml").await {
                assert!(problem.source_start() <= problem.source_end());
                assert!(problem.source_end() <= text.chars().count(), "{:?}", text);
            }
        }

        let engine = ReconcileEngine::new(
            store_with("pom.xml", text).await,
            fixed_model("", &["a", "b"]),
            Arc::new(XmlStructureParser::new()),
        )
        .with_anchor("<project ");
        for problem in engine.reconcile("pom.xml").await {
            assert!(problem.source_start() <= problem.source_end());
            assert!(problem.source_end() <= text.chars().count(), "{:?}", text);
        }
    }
}

/// Counts passes that are between resolution and semantic lookup
#[derive(Default)]
struct PassTracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
    passes: AtomicUsize,
}

impl PassTracker {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.passes.fetch_add(1, Ordering::SeqCst);
    }
}

struct TrackedStore {
    inner: MemoryFileStore,
    tracker: Arc<PassTracker>,
}

#[tower_lsp::async_trait]
impl FileStore for TrackedStore {
    async fn resolve(&self, path: &str) -> Result<Option<DocumentHandle>, StoreError> {
        self.tracker.enter();
        tokio::task::yield_now().await;
        self.inner.resolve(path).await
    }

    async fn read_text(&self, handle: &DocumentHandle) -> Result<String, StoreError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.inner.read_text(handle).await
    }
}

struct TrackedModel {
    tracker: Arc<PassTracker>,
}

#[tower_lsp::async_trait]
impl SemanticModel for TrackedModel {
    async fn find_unit(&self, owner: &str) -> Option<ProjectUnit> {
        Some(ProjectUnit::new(owner))
    }

    async fn problems_of(&self, _unit: &ProjectUnit) -> Vec<SemanticProblem> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.tracker.exit();
        vec![SemanticProblem::new("problem")]
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_passes_on_one_path_are_serialized() {
    let tracker = Arc::new(PassTracker::default());
    let inner = MemoryFileStore::new();
    inner.insert("app/pom.xml", VALID_POM).await;

    let engine = Arc::new(ReconcileEngine::new(
        Arc::new(TrackedStore {
            inner,
            tracker: tracker.clone(),
        }),
        Arc::new(TrackedModel {
            tracker: tracker.clone(),
        }),
        Arc::new(XmlStructureParser::new()),
    ));

    let passes: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            // Differently spelled paths still name the same document
            let path = if i % 2 == 0 { "app/pom.xml" } else { "/app/./pom.xml" };
            tokio::spawn(async move { engine.reconcile(path).await })
        })
        .collect();

    for pass in passes {
        assert_eq!(pass.await.unwrap().len(), 1);
    }
    assert_eq!(tracker.passes.load(Ordering::SeqCst), 8);
    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);
}

/// Store whose reads wait until every expected reader has arrived
struct RendezvousStore {
    inner: MemoryFileStore,
    barrier: Barrier,
}

#[tower_lsp::async_trait]
impl FileStore for RendezvousStore {
    async fn resolve(&self, path: &str) -> Result<Option<DocumentHandle>, StoreError> {
        self.inner.resolve(path).await
    }

    async fn read_text(&self, handle: &DocumentHandle) -> Result<String, StoreError> {
        self.barrier.wait().await;
        self.inner.read_text(handle).await
    }
}

#[tokio::test]
async fn test_passes_on_different_paths_run_concurrently() {
    let inner = MemoryFileStore::new();
    inner.insert("a/pom.xml", VALID_POM).await;
    inner.insert("b/pom.xml", VALID_POM).await;

    let engine = ReconcileEngine::new(
        Arc::new(RendezvousStore {
            inner,
            barrier: Barrier::new(2),
        }),
        Arc::new(FixedModel {
            owners: vec!["a".to_string(), "b".to_string()],
            problems: vec![SemanticProblem::new("problem")],
        }),
        Arc::new(XmlStructureParser::new()),
    );

    let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(engine.reconcile("a/pom.xml"), engine.reconcile("b/pom.xml"))
    })
    .await
    .expect("passes on distinct paths should not wait for each other");

    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
}

#[derive(Default)]
struct RecordingDelivery {
    delivered: Mutex<Vec<(String, ReconcileState)>>,
}

#[tower_lsp::async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, endpoint_id: &str, state: ReconcileState) {
        self.delivered
            .lock()
            .await
            .push((endpoint_id.to_string(), state));
    }
}

#[tokio::test]
async fn test_spawn_reconcile_delivers_to_endpoint() {
    let engine = Arc::new(ReconcileEngine::new(
        store_with("app/pom.xml", VALID_POM).await,
        fixed_model("app", &["'version' is missing."]),
        Arc::new(XmlStructureParser::new()),
    ));
    let delivery = Arc::new(RecordingDelivery::default());

    engine
        .spawn_reconcile("editor-1", "app/pom.xml", delivery.clone())
        .await
        .unwrap();

    let delivered = delivery.delivered.lock().await;
    assert_eq!(delivered.len(), 1);

    let (endpoint_id, state) = &delivered[0];
    assert_eq!(endpoint_id, "editor-1");
    assert_eq!(state.document_path, "app/pom.xml");
    assert_eq!(state.problems.len(), 1);

    let wire = serde_json::to_value(state).unwrap();
    assert_eq!(wire["documentPath"], "app/pom.xml");
    assert_eq!(wire["problems"][0]["message"], "'version' is missing.");
    assert!(wire["problems"][0]["sourceStart"].is_i64());
}

#[tokio::test]
async fn test_spawn_reconcile_delivers_empty_result_for_missing_document() {
    let engine = Arc::new(ReconcileEngine::new(
        Arc::new(MemoryFileStore::new()),
        fixed_model("app", &["problem"]),
        Arc::new(XmlStructureParser::new()),
    ));
    let delivery = Arc::new(RecordingDelivery::default());

    engine
        .spawn_reconcile("editor-1", "app/pom.xml", delivery.clone())
        .await
        .unwrap();

    let delivered = delivery.delivered.lock().await;
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].1.problems.is_empty());
}

/// Delivery whose first call is slow, signalling when it starts
#[derive(Default)]
struct SlowFirstDelivery {
    started: Notify,
    calls: AtomicUsize,
    delivered: Mutex<Vec<ReconcileState>>,
}

#[tower_lsp::async_trait]
impl Delivery for SlowFirstDelivery {
    async fn deliver(&self, _endpoint_id: &str, state: ReconcileState) {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.delivered.lock().await.push(state);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_delivery_is_not_overtaken_by_newer_pass() {
    let store = store_with("app/pom.xml", "<project>").await;
    let engine = Arc::new(ReconcileEngine::new(
        store.clone(),
        fixed_model("app", &[]),
        Arc::new(XmlStructureParser::new()),
    ));
    let delivery = Arc::new(SlowFirstDelivery::default());

    let first = engine.spawn_reconcile("editor-1", "app/pom.xml", delivery.clone());
    delivery.started.notified().await;

    store.insert("app/pom.xml", "<project></project>").await;
    let second = engine.spawn_reconcile("editor-1", "app/pom.xml", delivery.clone());

    first.await.unwrap();
    second.await.unwrap();

    let delivered = delivery.delivered.lock().await;
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].problems.len(), 1);
    assert_eq!(delivered[0].source_text.as_deref(), Some("<project>"));
    assert!(delivered[1].problems.is_empty());
    assert_eq!(delivered[1].source_text.as_deref(), Some("<project></project>"));
    assert_eq!(engine.scheduled_paths(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_delivery_reflects_latest_text() {
    let store = Arc::new(MemoryFileStore::new());
    let engine = Arc::new(ReconcileEngine::new(
        store.clone(),
        fixed_model("app", &[]),
        Arc::new(XmlStructureParser::new()),
    ));
    let delivery = Arc::new(RecordingDelivery::default());

    let mut passes = Vec::new();
    for i in 0..8 {
        // Only the final revision is well-formed
        let text = if i == 7 {
            "<project></project>".to_string()
        } else {
            format!("<project>{}", "<a>".repeat(i))
        };
        store.insert("app/pom.xml", text).await;
        let path = if i % 2 == 0 { "app/pom.xml" } else { "./app/pom.xml" };
        passes.push(engine.spawn_reconcile("editor-1", path, delivery.clone()));
    }
    for pass in passes {
        pass.await.unwrap();
    }

    let delivered = delivery.delivered.lock().await;
    assert!(!delivered.is_empty());
    let (_, last) = &delivered[delivered.len() - 1];
    assert!(last.problems.is_empty());
    assert_eq!(last.source_text.as_deref(), Some("<project></project>"));
    assert_eq!(engine.scheduled_paths(), 0);
}
