//! Fallback source ranges for problems that carry no position.

use super::position::char_offset;

/// Anchor used when none is configured: the opening tag of the root element
pub const DEFAULT_ANCHOR: &str = "<project ";

/// Range anchored on the first occurrence of `anchor` in `text`.
///
/// A match at character index `i` yields `(i + 1, i + 1 + len(anchor))`.
/// The one-character shift is what existing clients expect and is kept
/// as-is. No match yields `(0, 0)`, meaning the whole document, unanchored.
/// Both bounds are clamped to the text length.
pub fn fallback_range(text: &str, anchor: &str) -> (usize, usize) {
    if anchor.is_empty() {
        return (0, 0);
    }

    match text.find(anchor) {
        Some(byte_idx) => {
            let len = text.chars().count();
            let start = char_offset(text, byte_idx) + 1;
            let end = start + anchor.chars().count();
            (start.min(len), end.min(len))
        }
        None => (0, 0),
    }
}
