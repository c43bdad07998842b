use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::events::watcher::{WatchEvent, WorkspaceWatcher};
use crate::events::{
    EditorChanges, Event, EventBus, FileTrackingOperation, NoopHooks, SubscriptionManager,
    TrackingOperation,
};
use crate::lsp::delivery::LspDelivery;
use crate::lsp::handlers::HandleDocumentSync;
use crate::model::{owner_of, MavenWorkspace};
use crate::parser::XmlStructureParser;
use crate::reconcile::{Delivery, ReconcileEngine};
use crate::store::{FileStore, FsFileStore, OverlayFileStore};
use crate::Config;

/// Shared collaborators, cloned into background tasks
#[derive(Clone)]
pub struct Services {
    pub endpoint_id: String,
    pub descriptor: String,
    pub disk: Arc<FsFileStore>,
    pub documents: Arc<OverlayFileStore>,
    pub workspace: Arc<MavenWorkspace>,
    pub engine: Arc<ReconcileEngine>,
    pub bus: Arc<EventBus>,
    pub delivery: Arc<dyn Delivery>,
}

impl Services {
    /// Wire the stores, model and engine for `config`.
    ///
    /// `delivery` builds the result sink from the editor overlay.
    pub fn new(
        config: &Config,
        endpoint_id: impl Into<String>,
        delivery: impl FnOnce(Arc<OverlayFileStore>) -> Arc<dyn Delivery>,
    ) -> Self {
        let disk = Arc::new(FsFileStore::new(config.root.clone()));
        let documents = Arc::new(OverlayFileStore::new(disk.clone()));
        let workspace = Arc::new(MavenWorkspace::new());
        let engine = Arc::new(
            ReconcileEngine::new(
                documents.clone(),
                workspace.clone(),
                Arc::new(XmlStructureParser::new()),
            )
            .with_anchor(config.anchor.clone()),
        );

        Self {
            endpoint_id: endpoint_id.into(),
            descriptor: config.descriptor.clone(),
            disk,
            delivery: delivery(documents.clone()),
            documents,
            workspace,
            engine,
            bus: Arc::new(EventBus::new()),
        }
    }

    /// Reconcile `path` in the background and push the result to the client
    pub fn schedule(&self, path: &str) -> JoinHandle<()> {
        self.engine
            .spawn_reconcile(&self.endpoint_id, path, self.delivery.clone())
    }

    pub fn publish_tracking(&self, path: &str, operation: TrackingOperation) {
        self.bus.publish(&Event::FileTrackingOperation {
            endpoint_id: self.endpoint_id.clone(),
            operation: FileTrackingOperation {
                path: path.to_string(),
                operation,
            },
        });
    }

    /// Re-analyze the saved descriptor at `path` in the project model
    pub async fn refresh_from_disk(&self, path: &str) {
        let owner = owner_of(path);
        let handle = match self.disk.resolve(path).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                self.workspace.forget(&owner).await;
                return;
            }
            Err(e) => {
                log::warn!("Cannot refresh project '{}': {}", owner, e);
                return;
            }
        };

        match self.disk.read_text(&handle).await {
            Ok(text) => {
                self.workspace.refresh(&owner, &text).await;
            }
            Err(e) => log::warn!("Cannot refresh project '{}': {}", owner, e),
        }
    }

    /// Track every descriptor below the workspace root
    pub async fn discover_projects(&self) -> usize {
        let paths = match self.disk.discover(&self.descriptor).await {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("Descriptor discovery failed: {}", e);
                return 0;
            }
        };

        for path in &paths {
            self.refresh_from_disk(path).await;
        }
        paths.len()
    }

    /// An editor opened the descriptor at `path` with `text`
    pub async fn open_document(&self, path: &str, text: String) -> JoinHandle<()> {
        self.documents.update(path, text).await;
        self.publish_tracking(path, TrackingOperation::Start);

        // Opened before discovery saw it, e.g. a descriptor created in the editor
        if !self.workspace.is_tracked(&owner_of(path)).await {
            self.refresh_from_disk(path).await;
        }
        self.schedule(path)
    }

    /// The whole live text of `path` was replaced by `text`
    pub async fn change_document(&self, path: &str, text: String) -> JoinHandle<()> {
        let removed_char_count = self
            .documents
            .live_text(path)
            .await
            .map_or(0, |previous| previous.chars().count());
        self.documents.update(path, text.clone()).await;

        self.bus.publish(&Event::EditorContentUpdate {
            endpoint_id: self.endpoint_id.clone(),
            changes: EditorChanges {
                file_location: path.to_string(),
                offset: 0,
                removed_char_count,
                text,
            },
        });
        self.schedule(path)
    }

    pub async fn save_document(&self, path: &str) -> JoinHandle<()> {
        self.refresh_from_disk(path).await;
        self.schedule(path)
    }

    pub async fn close_document(&self, path: &str) {
        self.documents.close(path).await;
        self.publish_tracking(path, TrackingOperation::Stop);
    }

    /// Apply a watcher event; returns the pass scheduled for an open document
    pub async fn handle_watch_event(&self, event: WatchEvent) -> Option<JoinHandle<()>> {
        let (path, operation) = match event {
            WatchEvent::DescriptorChanged(absolute) => {
                let path = self.disk.relative(&absolute)?;
                self.refresh_from_disk(&path).await;
                (path, TrackingOperation::Modified)
            }
            WatchEvent::DescriptorRemoved(absolute) => {
                let path = self.disk.relative(&absolute)?;
                self.workspace.forget(&owner_of(&path)).await;
                (path, TrackingOperation::Deleted)
            }
            WatchEvent::WatcherError(e) => {
                log::warn!("Workspace watcher error: {}", e);
                return None;
            }
        };

        self.publish_tracking(&path, operation);
        if self.documents.is_open(&path).await {
            Some(self.schedule(&path))
        } else {
            None
        }
    }
}

/// The main LSP backend that holds state and implements the Language Server Protocol
pub struct Backend {
    pub client: Client,
    pub config: Config,
    pub services: Services,
    pub subscriptions: SubscriptionManager,
    watcher: Mutex<Option<WorkspaceWatcher>>,
}

impl Backend {
    pub fn new(client: Client, config: Config) -> Self {
        let endpoint_id = format!("pom-ls-{}", std::process::id());
        let services = Services::new(&config, endpoint_id.clone(), |documents| {
            let delivery: Arc<dyn Delivery> = Arc::new(LspDelivery::new(
                client.clone(),
                endpoint_id,
                config.root.clone(),
                documents,
            ));
            delivery
        });
        let subscriptions =
            SubscriptionManager::subscribe(services.bus.clone(), Arc::new(NoopHooks));

        Self {
            client,
            services,
            config,
            subscriptions,
            watcher: Mutex::new(None),
        }
    }

    /// Workspace-relative path of `uri` if it is a descriptor under the root
    pub fn descriptor_path(&self, uri: &Url) -> Option<String> {
        crate::lsp::document::relative_path(&self.config.root, uri)
            .filter(|path| crate::lsp::document::is_descriptor(path, &self.config.descriptor))
    }

    async fn start_watching(&self) {
        let (watcher, mut rx) =
            match WorkspaceWatcher::start(&self.config.root, &self.config.descriptor) {
                Ok(started) => started,
                Err(e) => {
                    self.client
                        .log_message(
                            MessageType::WARNING,
                            format!("Descriptor watching disabled: {:#}", e),
                        )
                        .await;
                    return;
                }
            };
        *self.watcher.lock().await = Some(watcher);

        let services = self.services.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                services.handle_watch_event(event).await;
            }
        });
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(
        &self,
        _: InitializeParams,
    ) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(false),
                        })),
                        ..Default::default()
                    },
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "pom-ls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let tracked = self.services.discover_projects().await;
        self.client
            .log_message(
                MessageType::INFO,
                format!("pom-ls initialized, tracking {} project(s)", tracked),
            )
            .await;

        if self.config.watch {
            self.start_watching().await;
        }
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        self.subscriptions.shutdown();
        self.watcher.lock().await.take();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.handle_did_open(params).await
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        self.handle_did_change(params).await
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.handle_did_save(params).await
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.handle_did_close(params).await
    }
}
