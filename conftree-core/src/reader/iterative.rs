use super::{
    apply_field_line, starts_list, warn_between_entries, warn_edit_in_settings,
    warn_implicit_next, warn_missing_next, warn_stray_next, warn_unrecognised, ReadError,
};
use crate::cursor::Cursor;
use crate::lexer::{classify, normalize_key, Line};
use crate::tree::{BlockBody, Entry, Fields};

/// One open `config` block.
struct Frame {
    section: String,
    opened_at: usize,
    body: FrameBody,
}

enum FrameBody {
    Entries {
        closed: Vec<Entry>,
        open: Option<Entry>,
    },
    Settings(Fields),
}

enum Step {
    Continue,
    Open(Frame),
    Close,
    Fail(ReadError),
}

impl Frame {
    fn open(cursor: &Cursor<'_>, section: String, opened_at: usize) -> Self {
        let body = if starts_list(cursor) {
            FrameBody::Entries {
                closed: Vec::new(),
                open: None,
            }
        } else {
            FrameBody::Settings(Fields::new())
        };
        Self {
            section,
            opened_at,
            body,
        }
    }

    /// Field map currently receiving `set` lines, if any.
    fn active_fields(&mut self) -> Option<&mut Fields> {
        match &mut self.body {
            FrameBody::Entries { open, .. } => open.as_mut().map(|entry| &mut entry.fields),
            FrameBody::Settings(fields) => Some(fields),
        }
    }

    fn finish(self) -> BlockBody {
        match self.body {
            FrameBody::Entries { mut closed, open } => {
                closed.extend(open);
                BlockBody::Entries(closed)
            }
            FrameBody::Settings(fields) => BlockBody::Settings(fields),
        }
    }

    fn step(&mut self, cursor: &mut Cursor<'_>, line_no: usize, raw: &str) -> Step {
        let line = classify(raw);
        if line.is_insignificant() {
            return Step::Continue;
        }
        let section = self.section.as_str();
        match &mut self.body {
            FrameBody::Settings(fields) => {
                settings_step(fields, section, cursor, line_no, raw, line)
            }
            FrameBody::Entries { closed, open } => {
                entries_step(closed, open, section, cursor, line_no, raw, line)
            }
        }
    }
}

fn settings_step(
    fields: &mut Fields,
    section: &str,
    cursor: &mut Cursor<'_>,
    line_no: usize,
    raw: &str,
    line: Line<'_>,
) -> Step {
    if apply_field_line(fields, &line) {
        return Step::Continue;
    }
    if let Some(nested) = line.config_name() {
        return Step::Open(Frame::open(cursor, normalize_key(nested), line_no));
    }
    match line {
        Line::End => return Step::Close,
        Line::Next => warn_stray_next(cursor, line_no, section),
        Line::Edit(_) => warn_edit_in_settings(cursor, line_no, section),
        _ => warn_unrecognised(cursor, line_no, section, raw),
    }
    Step::Continue
}

fn entries_step(
    closed: &mut Vec<Entry>,
    open: &mut Option<Entry>,
    section: &str,
    cursor: &mut Cursor<'_>,
    line_no: usize,
    raw: &str,
    line: Line<'_>,
) -> Step {
    let Some(entry) = open.as_mut() else {
        match line {
            Line::Edit(name) => *open = Some(Entry::new(name)),
            Line::End => return Step::Close,
            _ => {
                if let Some(nested) = line.config_name() {
                    return Step::Fail(ReadError::ConfigBetweenEntries {
                        section: section.to_string(),
                        nested: nested.to_string(),
                        line: line_no,
                    });
                }
                warn_between_entries(cursor, line_no, section, raw);
            }
        }
        return Step::Continue;
    };

    if apply_field_line(&mut entry.fields, &line) {
        return Step::Continue;
    }
    if let Some(nested) = line.config_name() {
        return Step::Open(Frame::open(cursor, normalize_key(nested), line_no));
    }
    let current = entry.name.clone();
    match line {
        Line::Next => closed.extend(open.take()),
        Line::End => {
            warn_missing_next(cursor, line_no, section, &current);
            return Step::Close;
        }
        Line::Edit(name) => {
            warn_implicit_next(cursor, line_no, section, &current);
            closed.extend(open.replace(Entry::new(name)));
        }
        _ => warn_unrecognised(cursor, line_no, section, raw),
    }
    Step::Continue
}

/// Read a block with an explicit stack of open frames.
///
/// `opened_at` is the 1-based line of the block's `config` header, which the
/// cursor has already consumed.
pub(super) fn read(
    cursor: &mut Cursor<'_>,
    section: &str,
    opened_at: usize,
) -> Result<BlockBody, ReadError> {
    let mut stack = vec![Frame::open(cursor, section.to_string(), opened_at)];

    while let Some((line_no, raw)) = cursor.advance() {
        let Some(top) = stack.last_mut() else {
            break;
        };
        match top.step(cursor, line_no, raw) {
            Step::Continue => {}
            Step::Open(frame) => stack.push(frame),
            Step::Fail(err) => return Err(err),
            Step::Close => {
                let Some(done) = stack.pop() else {
                    break;
                };
                let key = done.section.clone();
                let body = done.finish();
                let Some(parent) = stack.last_mut() else {
                    return Ok(body);
                };
                if let Some(fields) = parent.active_fields() {
                    fields.insert(key, body.into_value());
                }
            }
        }
    }

    let (section, line) = stack
        .last()
        .map(|frame| (frame.section.clone(), frame.opened_at))
        .unwrap_or_else(|| (section.to_string(), opened_at));
    Err(ReadError::UnexpectedEof { section, line })
}
