//! Event Bus
//!
//! Publish/subscribe between the editor-facing layer and the
//! reconciliation core. Every event carries the endpoint it came from.

pub mod subscriptions;
pub mod watcher;

pub use subscriptions::{NoopHooks, ReconcileHooks, SubscriptionManager, OBSERVED_KINDS};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

/// Kinds of events a subscriber can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EditorContentUpdate,
    FileTrackingOperation,
}

/// Content change made in an editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorChanges {
    pub file_location: String,
    /// Character offset where the edit starts
    pub offset: usize,
    pub removed_char_count: usize,
    pub text: String,
}

/// What happened to a tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingOperation {
    /// The editor started tracking the file
    Start,
    /// The editor stopped tracking the file
    Stop,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTrackingOperation {
    pub path: String,
    pub operation: TrackingOperation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EditorContentUpdate {
        endpoint_id: String,
        changes: EditorChanges,
    },
    FileTrackingOperation {
        endpoint_id: String,
        operation: FileTrackingOperation,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::EditorContentUpdate { .. } => EventKind::EditorContentUpdate,
            Event::FileTrackingOperation { .. } => EventKind::FileTrackingOperation,
        }
    }

    pub fn endpoint_id(&self) -> &str {
        match self {
            Event::EditorContentUpdate { endpoint_id, .. }
            | Event::FileTrackingOperation { endpoint_id, .. } => endpoint_id,
        }
    }
}

/// Receiver of published events
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// One live registration on a bus.
///
/// Not `Clone`: unsubscribing consumes the handle, so a registration can
/// only be released once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    kind: EventKind,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("subscription {0} is not registered on this bus")]
    UnknownSubscription(u64),
}

struct Subscriber {
    kind: EventKind,
    handler: Arc<dyn EventHandler>,
}

/// In-process event bus
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<u64, Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Subscriber { kind, handler });
        SubscriptionHandle { id, kind }
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id)
            .map(|_| ())
            .ok_or(BusError::UnknownSubscription(handle.id))
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Handlers run after the subscriber table is released, so they may
    /// subscribe or unsubscribe themselves.
    pub fn publish(&self, event: &Event) {
        let kind = event.kind();
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.kind == kind)
            .map(|s| s.handler.clone())
            .collect();

        log::trace!(
            "Publishing {:?} from '{}' to {} subscriber(s)",
            kind,
            event.endpoint_id(),
            handlers.len()
        );
        for handler in handlers {
            handler.on_event(event);
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.kind == kind)
            .count()
    }
}
