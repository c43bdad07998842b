//! XML well-formedness checking on top of `quick-xml`.
//!
//! Positions are reported SAX-style: the column points just past the
//! offending character.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::StructuralParser;
use crate::core::position::{char_offset, LineIndex};
use crate::core::problem::StructuralFailure;

const PREMATURE_END: &str = "Premature end of file.";
const UNCLOSED_ROOT: &str = "XML document structures must start and end within the same entity.";
const CONTENT_IN_PROLOG: &str = "Content is not allowed in prolog.";
const CONTENT_IN_TRAILER: &str = "Content is not allowed in trailing section.";
const MARKUP_AFTER_ROOT: &str =
    "The markup in the document following the root element must be well-formed.";
const MARKUP_IN_CONTENT: &str =
    "The content of elements must consist of well-formed character data or markup.";
const MISPLACED_DECLARATION: &str =
    "The processing instruction target matching \"[xX][mM][lL]\" is not allowed.";
const SECOND_DOCTYPE: &str = "Already seen doctype.";

/// Where the reader is relative to the root element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Prolog,
    Root,
    Trailer,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlStructureParser;

impl XmlStructureParser {
    pub fn new() -> Self {
        Self
    }
}

impl StructuralParser for XmlStructureParser {
    fn parse(&self, text: &str) -> Result<(), StructuralFailure> {
        let mut reader = Reader::from_str(text);
        let mut section = Section::Prolog;
        let mut depth = 0usize;
        let mut seen_doctype = false;

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| failure_at(text, reader.error_position() as usize, e.to_string()))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    if section == Section::Trailer {
                        return Err(failure_at(text, before, MARKUP_AFTER_ROOT));
                    }
                    if let Some(Err(attr_err)) = e.attributes().find(|a| a.is_err()) {
                        return Err(failure_at(text, before, attr_err.to_string()));
                    }
                    if matches!(event, Event::Start(_)) {
                        section = Section::Root;
                        depth += 1;
                    } else if depth == 0 {
                        section = Section::Trailer;
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        section = Section::Trailer;
                    }
                }
                Event::Text(ref e) if section != Section::Root => {
                    if let Some(skip) = e.iter().position(|b| !b.is_ascii_whitespace()) {
                        return Err(failure_at(text, before + skip, misplaced_content(section)));
                    }
                }
                Event::GeneralRef(_) if section != Section::Root => {
                    return Err(failure_at(text, before, misplaced_content(section)));
                }
                Event::CData(_) if section != Section::Root => {
                    return Err(failure_at(text, before, MARKUP_AFTER_ROOT));
                }
                Event::DocType(_) => {
                    let message = match section {
                        Section::Prolog if !seen_doctype => {
                            seen_doctype = true;
                            continue;
                        }
                        Section::Prolog => SECOND_DOCTYPE,
                        Section::Root => MARKUP_IN_CONTENT,
                        Section::Trailer => MARKUP_AFTER_ROOT,
                    };
                    return Err(failure_at(text, before, message));
                }
                // The declaration may only open the document, after an optional BOM
                Event::Decl(_) => {
                    let leading = text.get(..before).unwrap_or_default();
                    if !leading.trim_start_matches('\u{feff}').is_empty() {
                        return Err(failure_at(text, before, MISPLACED_DECLARATION));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        match section {
            Section::Prolog => Err(failure_at(text, text.len(), PREMATURE_END)),
            Section::Root => Err(failure_at(text, text.len(), UNCLOSED_ROOT)),
            Section::Trailer => Ok(()),
        }
    }
}

/// Message for character data outside the root element
fn misplaced_content(section: Section) -> &'static str {
    match section {
        Section::Prolog => CONTENT_IN_PROLOG,
        _ => CONTENT_IN_TRAILER,
    }
}

/// Failure pointing at the character starting at byte `byte_pos`
fn failure_at(text: &str, byte_pos: usize, message: impl Into<String>) -> StructuralFailure {
    let index = LineIndex::new(text);
    let (line, column) = index.line_col(char_offset(text, byte_pos) + 1);
    StructuralFailure {
        line,
        column,
        message: message.into(),
    }
}
