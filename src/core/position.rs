//! Position Mapping
//!
//! Translates between 1-based (line, column) pairs, as reported by
//! structural parsers, and absolute character offsets into the document.
//! Offsets count Unicode scalar values, not bytes.

/// Line number to starting character offset, built once per document text.
///
/// An index must be rebuilt whenever the text changes; nothing here is
/// shared between reconciliation passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build an index over `text`, recognizing `\n`, `\r\n` and lone `\r`
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut offset = 0;
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            offset += 1;
            match ch {
                '\n' => line_starts.push(offset),
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                        offset += 1;
                    }
                    line_starts.push(offset);
                }
                _ => {}
            }
        }

        Self {
            line_starts,
            len: offset,
        }
    }

    /// Number of lines; an empty text still has one (empty) line
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Length of the indexed text in characters
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start offset of a 1-based line, clamped into the valid line range
    pub fn line_start(&self, line: usize) -> usize {
        let idx = line.clamp(1, self.line_count()) - 1;
        self.line_starts[idx]
    }

    /// Offset of the `column`-th character on `line`, both 1-based.
    ///
    /// Never fails: lines past the end map onto the last line, and the
    /// result is clamped to `[0, len]`.
    pub fn offset_of(&self, line: usize, column: usize) -> usize {
        let column = column.max(1);
        (self.line_start(line) + (column - 1)).min(self.len)
    }

    /// Inverse of [`LineIndex::offset_of`]: 1-based (line, column) of an offset
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len);
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        (idx + 1, offset - self.line_starts[idx] + 1)
    }
}

/// Character offset of `line`/`column` in `text`, building a fresh index
pub fn offset_of(text: &str, line: usize, column: usize) -> usize {
    LineIndex::new(text).offset_of(line, column)
}

/// Convert a byte position into a character offset.
///
/// Positions past the end clamp to the text length; positions inside a
/// multi-byte character resolve to that character.
pub fn char_offset(text: &str, byte_pos: usize) -> usize {
    let mut pos = byte_pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    text[..pos].chars().count()
}
