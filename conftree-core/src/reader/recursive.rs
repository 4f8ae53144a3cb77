use tracing::debug;

use super::{
    apply_field_line, iterative, starts_list, warn_between_entries, warn_edit_in_settings,
    warn_implicit_next, warn_missing_next, warn_stray_next, warn_unrecognised, ReadError,
};
use crate::cursor::Cursor;
use crate::lexer::{classify, normalize_key, Line};
use crate::tree::{BlockBody, Entry, Fields};

/// What closes the field run being read.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Until {
    /// Fields of an `edit` entry.
    Next,
    /// Fields of a settings block.
    End,
}

/// How a field run ended.
enum Closed {
    /// `next`, or an `edit` left unread for the caller.
    Entry,
    /// `end`: the enclosing block is finished too.
    Block,
}

pub(super) struct Recursive {
    pub(super) limit: usize,
    pub(super) fallback: bool,
}

impl Recursive {
    pub(super) fn read(
        &self,
        cursor: &mut Cursor<'_>,
        section: &str,
        opened_at: usize,
        depth: usize,
    ) -> Result<BlockBody, ReadError> {
        if starts_list(cursor) {
            return self.read_entries(cursor, section, opened_at, depth);
        }
        let (fields, _) = self.read_fields(cursor, section, opened_at, depth, Until::End, "")?;
        Ok(BlockBody::Settings(fields))
    }

    fn read_entries(
        &self,
        cursor: &mut Cursor<'_>,
        section: &str,
        opened_at: usize,
        depth: usize,
    ) -> Result<BlockBody, ReadError> {
        let mut entries = Vec::new();
        while let Some((line_no, raw)) = cursor.advance() {
            let line = classify(raw);
            let insignificant = line.is_insignificant();
            match line {
                Line::Edit(name) => {
                    let (fields, closed) =
                        self.read_fields(cursor, section, opened_at, depth, Until::Next, &name)?;
                    entries.push(Entry { name, fields });
                    if let Closed::Block = closed {
                        return Ok(BlockBody::Entries(entries));
                    }
                }
                Line::End => return Ok(BlockBody::Entries(entries)),
                _ if insignificant => {}
                _ => {
                    if let Some(nested) = line.config_name() {
                        return Err(ReadError::ConfigBetweenEntries {
                            section: section.to_string(),
                            nested: nested.to_string(),
                            line: line_no,
                        });
                    }
                    warn_between_entries(cursor, line_no, section, raw);
                }
            }
        }
        Err(ReadError::UnexpectedEof {
            section: section.to_string(),
            line: opened_at,
        })
    }

    fn read_fields(
        &self,
        cursor: &mut Cursor<'_>,
        section: &str,
        opened_at: usize,
        depth: usize,
        until: Until,
        entry: &str,
    ) -> Result<(Fields, Closed), ReadError> {
        let mut fields = Fields::new();

        while let Some((line_no, raw)) = cursor.advance() {
            let line = classify(raw);
            if apply_field_line(&mut fields, &line) || line.is_insignificant() {
                continue;
            }
            if let Some(nested) = line.config_name() {
                let key = normalize_key(nested);
                let body = self.read_nested(cursor, &key, line_no, depth)?;
                fields.insert(key, body.into_value());
                continue;
            }
            match (line, until) {
                (Line::Next, Until::Next) => return Ok((fields, Closed::Entry)),
                (Line::Next, Until::End) => warn_stray_next(cursor, line_no, section),
                (Line::End, Until::Next) => {
                    warn_missing_next(cursor, line_no, section, entry);
                    return Ok((fields, Closed::Block));
                }
                (Line::End, Until::End) => return Ok((fields, Closed::Block)),
                (Line::Edit(_), Until::Next) => {
                    warn_implicit_next(cursor, line_no, section, entry);
                    cursor.seek(line_no - 1);
                    return Ok((fields, Closed::Entry));
                }
                (Line::Edit(_), Until::End) => warn_edit_in_settings(cursor, line_no, section),
                _ => warn_unrecognised(cursor, line_no, section, raw),
            }
        }
        Err(ReadError::UnexpectedEof {
            section: section.to_string(),
            line: opened_at,
        })
    }

    fn read_nested(
        &self,
        cursor: &mut Cursor<'_>,
        section: &str,
        line_no: usize,
        depth: usize,
    ) -> Result<BlockBody, ReadError> {
        let depth = depth + 1;
        if depth <= self.limit {
            return self.read(cursor, section, line_no, depth);
        }
        if !self.fallback {
            return Err(ReadError::DepthExceeded {
                line: line_no,
                limit: self.limit,
            });
        }
        debug!(
            line = line_no,
            depth, "nesting limit reached, continuing with explicit stack"
        );
        iterative::read(cursor, section, line_no)
    }
}
