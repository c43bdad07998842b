//! LSP Protocol Implementation
//!
//! Thin protocol layer: editor notifications become store updates and bus
//! events, reconcile results go back as notifications and diagnostics.

pub mod backend;
pub mod delivery;
pub mod document;
pub mod handlers;
pub mod server;

pub use backend::Backend;
