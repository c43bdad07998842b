//! Core Reconciliation Logic
//!
//! Position mapping, fallback ranges and problem construction. Everything
//! here is pure and total over the document text.

pub mod locator;
pub mod position;
pub mod problem;

pub use locator::{fallback_range, DEFAULT_ANCHOR};
pub use position::{offset_of, LineIndex};
pub use problem::{Problem, SemanticProblem, StructuralFailure};
