//! POM Reconciler
//!
//! Keeps Maven project descriptors checked while they are edited.
//!
//! This library provides:
//! - Structural (well-formedness) checking of descriptor text
//! - Semantic problems of the owning project, anchored in the document
//! - An event bus linking editor activity to reconciliation
//! - An LSP front end delivering results to the connected editor

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod lsp;
pub mod model;
pub mod parser;
pub mod reconcile;
pub mod store;

pub use config::Config;
pub use crate::core::{LineIndex, Problem, SemanticProblem, StructuralFailure};
pub use error::{ReconcileError, StoreError};
pub use events::{Event, EventBus, EventKind, SubscriptionManager};
pub use reconcile::{Delivery, ReconcileEngine, ReconcileState};
