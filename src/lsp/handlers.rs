use serde::{Deserialize, Serialize};
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::*;

use crate::core::problem::Problem;
use crate::lsp::backend::Backend;

/// Method name of the on-demand reconcile request
pub const RECONCILE_REQUEST_METHOD: &str = "pom/reconcile";

/// Parameters of [`RECONCILE_REQUEST_METHOD`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileParams {
    pub document_path: String,
}

/// Trait for handling text document synchronization
#[tower_lsp::async_trait]
pub trait HandleDocumentSync {
    async fn handle_did_open(&self, params: DidOpenTextDocumentParams);
    async fn handle_did_change(&self, params: DidChangeTextDocumentParams);
    async fn handle_did_save(&self, params: DidSaveTextDocumentParams);
    async fn handle_did_close(&self, params: DidCloseTextDocumentParams);
}

#[tower_lsp::async_trait]
impl HandleDocumentSync for Backend {
    async fn handle_did_open(&self, params: DidOpenTextDocumentParams) {
        let Some(path) = self.descriptor_path(&params.text_document.uri) else {
            return;
        };
        self.services
            .open_document(&path, params.text_document.text)
            .await;
    }

    async fn handle_did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(path) = self.descriptor_path(&params.text_document.uri) else {
            return;
        };
        // Full sync: the last change holds the whole document
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        self.services.change_document(&path, change.text).await;
    }

    async fn handle_did_save(&self, params: DidSaveTextDocumentParams) {
        let Some(path) = self.descriptor_path(&params.text_document.uri) else {
            return;
        };
        self.services.save_document(&path).await;
    }

    async fn handle_did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(path) = self.descriptor_path(&uri) else {
            return;
        };

        self.services.close_document(&path).await;
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }
}

impl Backend {
    /// Handler of [`RECONCILE_REQUEST_METHOD`]: run a pass and answer with its problems
    pub async fn reconcile_request(&self, params: ReconcileParams) -> LspResult<Vec<Problem>> {
        Ok(self.services.engine.reconcile(&params.document_path).await)
    }
}
