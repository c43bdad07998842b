//! Problem records and the builders that normalize both problem sources.

use serde::{Deserialize, Serialize};

use super::locator::fallback_range;
use super::position::LineIndex;

/// A diagnostic anchored to a character range of the document.
///
/// `source_start` is inclusive, `source_end` exclusive, and both lie within
/// the text the problem was built against. Instances are only created by the
/// builder functions in this module and are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireProblem", try_from = "WireProblem")]
pub struct Problem {
    is_error: bool,
    message: String,
    source_start: usize,
    source_end: usize,
}

impl Problem {
    fn new(is_error: bool, message: String, (start, end): (usize, usize)) -> Self {
        let end = end.max(start);
        Self {
            is_error,
            message,
            source_start: start,
            source_end: end,
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_start(&self) -> usize {
        self.source_start
    }

    pub fn source_end(&self) -> usize {
        self.source_end
    }
}

/// Wire record shared with existing clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProblem {
    error: bool,
    message: String,
    source_start: i32,
    source_end: i32,
}

impl From<Problem> for WireProblem {
    fn from(problem: Problem) -> Self {
        Self {
            error: problem.is_error,
            message: problem.message,
            source_start: i32::try_from(problem.source_start).unwrap_or(i32::MAX),
            source_end: i32::try_from(problem.source_end).unwrap_or(i32::MAX),
        }
    }
}

impl TryFrom<WireProblem> for Problem {
    type Error = String;

    fn try_from(wire: WireProblem) -> Result<Self, Self::Error> {
        let start = usize::try_from(wire.source_start)
            .map_err(|_| format!("negative sourceStart {}", wire.source_start))?;
        let end = usize::try_from(wire.source_end)
            .map_err(|_| format!("negative sourceEnd {}", wire.source_end))?;
        if end < start {
            return Err(format!("sourceEnd {} precedes sourceStart {}", end, start));
        }
        Ok(Self::new(wire.error, wire.message, (start, end)))
    }
}

/// Well-formedness failure reported by a structural parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralFailure {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    pub message: String,
}

/// Problem reported by the semantic project model; carries no position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticProblem {
    pub description: String,
}

impl SemanticProblem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Build the single problem for a structural failure.
///
/// Structural failures point at one offending character, one position
/// before the mapped offset of the reported line and column.
pub fn from_structural_failure(failure: &StructuralFailure, text: &str) -> Problem {
    let index = LineIndex::new(text);
    let start = index
        .offset_of(failure.line, failure.column)
        .saturating_sub(1);
    let end = (start + 1).min(index.len());
    Problem::new(true, failure.message.clone(), (start.min(end), end))
}

/// Build one error per semantic problem, all sharing the anchored fallback range
pub fn from_semantic_problems(
    problems: &[SemanticProblem],
    text: &str,
    anchor: &str,
) -> Vec<Problem> {
    let range = fallback_range(text, anchor);
    problems
        .iter()
        .map(|problem| Problem::new(true, problem.description.clone(), range))
        .collect()
}
