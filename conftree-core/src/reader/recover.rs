use crate::cursor::Cursor;
use crate::lexer::{classify, indentation, Line};

/// Where [`skip_block`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The `end` balancing the header was consumed.
    Closed,
    /// A new section header was found and left unread.
    HandedBack,
    /// Input ran out first.
    Exhausted,
}

/// Skip over a block whose contents could not be used.
///
/// `header` is the line index of the failing block's `config` line. The cursor
/// is reset there and moved forward while counting nested `config`/`end`
/// pairs. Scanning stops at the `end` that brings the count back to zero, or
/// before a `config vdom`/`config global` marker or a `config` line indented
/// no deeper than the header. Indentation only counts as evidence when the
/// block body itself is indented; flat input falls back to pure counting.
pub fn skip_block(cursor: &mut Cursor<'_>, header: usize) -> SkipOutcome {
    let base = cursor.line_at(header).map(indentation).unwrap_or(0);
    let indented = body_is_indented(cursor, header, base);
    cursor.seek(header + 1);

    let mut depth = 1usize;
    while let Some(raw) = cursor.peek() {
        let line = classify(raw);
        match line {
            Line::Vdom | Line::Global => return SkipOutcome::HandedBack,
            Line::Config(_) if indented && indentation(raw) <= base => {
                return SkipOutcome::HandedBack;
            }
            Line::Config(_) => depth += 1,
            Line::End => {
                depth -= 1;
                if depth == 0 {
                    cursor.advance();
                    return SkipOutcome::Closed;
                }
            }
            _ => {}
        }
        cursor.advance();
    }
    SkipOutcome::Exhausted
}

fn body_is_indented(cursor: &Cursor<'_>, header: usize, base: usize) -> bool {
    let mut index = header + 1;
    while let Some(raw) = cursor.line_at(index) {
        if !classify(raw).is_insignificant() {
            return indentation(raw) > base;
        }
        index += 1;
    }
    false
}
