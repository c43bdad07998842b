//! Delivery of reconcile results to the LSP client.

use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use tower_lsp::Client;

use crate::core::position::LineIndex;
use crate::core::problem::Problem;
use crate::lsp::document::document_url;
use crate::reconcile::{Delivery, ReconcileState, RECONCILE_STATE_METHOD};
use crate::store::OverlayFileStore;

/// Custom notification carrying a [`ReconcileState`]
pub enum ReconcileStateChanged {}

impl Notification for ReconcileStateChanged {
    type Params = ReconcileState;
    const METHOD: &'static str = RECONCILE_STATE_METHOD;
}

/// Pushes results to the connected client.
///
/// Besides the custom notification, problems of open documents are also
/// published as standard diagnostics, positioned against the text the pass
/// actually checked.
pub struct LspDelivery {
    client: Client,
    endpoint_id: String,
    root: PathBuf,
    documents: Arc<OverlayFileStore>,
}

impl LspDelivery {
    pub fn new(
        client: Client,
        endpoint_id: String,
        root: PathBuf,
        documents: Arc<OverlayFileStore>,
    ) -> Self {
        Self {
            client,
            endpoint_id,
            root,
            documents,
        }
    }
}

#[tower_lsp::async_trait]
impl Delivery for LspDelivery {
    async fn deliver(&self, endpoint_id: &str, state: ReconcileState) {
        if endpoint_id != self.endpoint_id {
            log::debug!(
                "Dropping reconcile result for '{}': endpoint '{}' is not connected",
                state.document_path,
                endpoint_id
            );
            return;
        }

        let uri = document_url(&self.root, &state.document_path);
        let diagnostics = if self.documents.is_open(&state.document_path).await {
            let text = state.source_text.as_deref().unwrap_or_default();
            Some(to_lsp_diagnostics(&state.problems, text))
        } else {
            None
        };

        self.client
            .send_notification::<ReconcileStateChanged>(state)
            .await;

        if let (Some(uri), Some(diagnostics)) = (uri, diagnostics) {
            self.client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }
}

/// Convert problems to LSP diagnostics against `text`.
///
/// Problem offsets count characters; LSP columns count UTF-16 code units.
pub fn to_lsp_diagnostics(problems: &[Problem], text: &str) -> Vec<Diagnostic> {
    let index = LineIndex::new(text);
    problems
        .iter()
        .map(|problem| {
            let severity = if problem.is_error() {
                DiagnosticSeverity::ERROR
            } else {
                DiagnosticSeverity::WARNING
            };
            Diagnostic::new(
                Range::new(
                    to_position(&index, text, problem.source_start()),
                    to_position(&index, text, problem.source_end()),
                ),
                Some(severity),
                None,
                Some("pom-ls".to_string()),
                problem.message().to_string(),
                None,
                None,
            )
        })
        .collect()
}

fn to_position(index: &LineIndex, text: &str, offset: usize) -> Position {
    let (line, column) = index.line_col(offset);
    let utf16_column: usize = text
        .chars()
        .skip(index.line_start(line))
        .take(column - 1)
        .map(char::len_utf16)
        .sum();
    Position::new((line - 1) as u32, utf16_column as u32)
}
