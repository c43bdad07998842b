//! Subscription Management
//!
//! Owns the bus registrations of the reconciler: exactly one per observed
//! event kind from construction until shutdown, none afterwards.

use std::sync::{Arc, Mutex, PoisonError};

use super::{
    EditorChanges, Event, EventBus, EventHandler, EventKind, FileTrackingOperation,
    SubscriptionHandle,
};

/// Event kinds the reconciler listens to
pub const OBSERVED_KINDS: [EventKind; 2] = [
    EventKind::FileTrackingOperation,
    EventKind::EditorContentUpdate,
];

/// Extension points invoked for observed events.
///
/// Both default to doing nothing; they are where push-based reconciliation
/// plugs in.
pub trait ReconcileHooks: Send + Sync {
    fn on_editor_content_changed(&self, _endpoint_id: &str, _changes: &EditorChanges) {}

    fn on_file_operation(&self, _endpoint_id: &str, _operation: &FileTrackingOperation) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ReconcileHooks for NoopHooks {}

/// Handler record for content updates
struct ContentUpdateHandler {
    hooks: Arc<dyn ReconcileHooks>,
}

impl EventHandler for ContentUpdateHandler {
    fn on_event(&self, event: &Event) {
        if let Event::EditorContentUpdate {
            endpoint_id,
            changes,
        } = event
        {
            self.hooks.on_editor_content_changed(endpoint_id, changes);
        }
    }
}

/// Handler record for file-tracking operations
struct FileOperationHandler {
    hooks: Arc<dyn ReconcileHooks>,
}

impl EventHandler for FileOperationHandler {
    fn on_event(&self, event: &Event) {
        if let Event::FileTrackingOperation {
            endpoint_id,
            operation,
        } = event
        {
            self.hooks.on_file_operation(endpoint_id, operation);
        }
    }
}

fn handler_for(kind: EventKind, hooks: Arc<dyn ReconcileHooks>) -> Arc<dyn EventHandler> {
    match kind {
        EventKind::EditorContentUpdate => Arc::new(ContentUpdateHandler { hooks }),
        EventKind::FileTrackingOperation => Arc::new(FileOperationHandler { hooks }),
    }
}

pub struct SubscriptionManager {
    bus: Arc<EventBus>,
    handles: Mutex<Vec<SubscriptionHandle>>,
}

impl SubscriptionManager {
    /// Register one handler per kind in [`OBSERVED_KINDS`]
    pub fn subscribe(bus: Arc<EventBus>, hooks: Arc<dyn ReconcileHooks>) -> Self {
        let handles = OBSERVED_KINDS
            .iter()
            .map(|&kind| bus.subscribe(kind, handler_for(kind, hooks.clone())))
            .collect();

        Self {
            bus,
            handles: Mutex::new(handles),
        }
    }

    /// Kinds with a live registration
    pub fn live_kinds(&self) -> Vec<EventKind> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(SubscriptionHandle::kind)
            .collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Release every registration. Later calls find nothing left to release.
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return;
        }

        for handle in handles {
            let kind = handle.kind();
            if let Err(e) = self.bus.unsubscribe(handle) {
                log::warn!("Failed to unsubscribe {:?} handler: {}", kind, e);
            }
        }
        log::debug!("Reconciler unsubscribed from the event bus");
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
