//! Structural Parser
//!
//! Low-level well-formedness validation of descriptor text. Parsers report
//! at most one failure, with a 1-based line and column.

pub mod xml;

pub use xml::XmlStructureParser;

use crate::core::problem::StructuralFailure;

/// Well-formedness check run at the start of every reconciliation pass
pub trait StructuralParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<(), StructuralFailure>;
}
