//! Block reader: turns the lines between `config <name>` and its matching
//! `end` into a [`BlockBody`].
//!
//! Two traversals share the line rules in this module:
//!
//! - [`recursive`] descends one call per nested `config` block;
//! - [`iterative`] keeps open blocks on an explicit stack.
//!
//! With [`ReadStrategy::Auto`] the recursive reader hands a nested block to the
//! iterative one as soon as the depth limit would be exceeded. The hand-off
//! happens at the nested header, so reading continues from the same line and
//! nothing is re-read.

mod iterative;
mod recover;
mod recursive;

use serde::Deserialize;
use thiserror::Error;

use crate::cursor::Cursor;
use crate::lexer::{classify, Line};
use crate::tree::{BlockBody, Fields};

pub use recover::{skip_block, SkipOutcome};

/// Nesting depth handled recursively before switching to the explicit stack.
pub const DEFAULT_DEPTH_LIMIT: usize = 64;

/// Structural failures that abandon the current block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Input ended while a block was still open.
    #[error("block `{section}` opened at line {line} is not closed before end of input")]
    UnexpectedEof { section: String, line: usize },
    /// A nested `config` appeared between entries rather than inside one.
    #[error("line {line}: `config {nested}` between entries of `{section}`")]
    ConfigBetweenEntries {
        section: String,
        nested: String,
        line: usize,
    },
    /// The recursive reader ran out of depth budget and fallback is disabled.
    #[error("line {line}: nesting deeper than {limit} levels")]
    DepthExceeded { line: usize, limit: usize },
}

/// Which traversal reads blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrategy {
    /// Recursive, switching to iterative past the depth limit.
    #[default]
    Auto,
    /// Recursive only; exceeding the limit is an error.
    Recursive,
    /// Explicit stack only.
    Iterative,
}

/// Reader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub strategy: ReadStrategy,
    pub depth_limit: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            strategy: ReadStrategy::Auto,
            depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }
}

/// Read the body of the block whose `config` header was the last line consumed.
///
/// On success the cursor sits just past the matching `end`.
pub fn read_block(
    cursor: &mut Cursor<'_>,
    section: &str,
    opts: &ReaderOptions,
) -> Result<BlockBody, ReadError> {
    let opened_at = cursor.position();
    match opts.strategy {
        ReadStrategy::Iterative => iterative::read(cursor, section, opened_at),
        ReadStrategy::Auto | ReadStrategy::Recursive => {
            let reader = recursive::Recursive {
                limit: opts.depth_limit.max(1),
                fallback: opts.strategy == ReadStrategy::Auto,
            };
            reader.read(cursor, section, opened_at, 1)
        }
    }
}

/// Whether the next significant line opens an entry.
fn starts_list(cursor: &Cursor<'_>) -> bool {
    let mut index = cursor.position();
    while let Some(raw) = cursor.line_at(index) {
        let line = classify(raw);
        if !line.is_insignificant() {
            return matches!(line, Line::Edit(_));
        }
        index += 1;
    }
    false
}

/// Apply `set`/`append`/`unset`; returns `false` for any other line.
fn apply_field_line(fields: &mut Fields, line: &Line<'_>) -> bool {
    match line {
        Line::Set { key, raw } => fields.set_raw(key, raw),
        Line::Append { key, raw } => fields.append_raw(key, raw),
        Line::Unset(key) => {
            fields.remove(key);
        }
        _ => return false,
    }
    true
}

fn warn_between_entries(cursor: &mut Cursor<'_>, line_no: usize, section: &str, raw: &str) {
    cursor.warn(
        line_no,
        format!("unexpected `{}` between entries of `{section}`", raw.trim()),
    );
}

fn warn_unrecognised(cursor: &mut Cursor<'_>, line_no: usize, section: &str, raw: &str) {
    cursor.warn(
        line_no,
        format!("unrecognised line in `{section}`: {}", raw.trim()),
    );
}

fn warn_missing_next(cursor: &mut Cursor<'_>, line_no: usize, section: &str, entry: &str) {
    cursor.warn(
        line_no,
        format!("entry `{entry}` in `{section}` closed by `end` without `next`"),
    );
}

fn warn_implicit_next(cursor: &mut Cursor<'_>, line_no: usize, section: &str, entry: &str) {
    cursor.warn(
        line_no,
        format!("`edit` before `next` in `{section}`; closing entry `{entry}`"),
    );
}

fn warn_edit_in_settings(cursor: &mut Cursor<'_>, line_no: usize, section: &str) {
    cursor.warn(
        line_no,
        format!("`edit` inside settings block `{section}` ignored"),
    );
}

fn warn_stray_next(cursor: &mut Cursor<'_>, line_no: usize, section: &str) {
    cursor.warn(line_no, format!("`next` outside an entry in `{section}`"));
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tree::{Entry, Value};

    fn read(
        text: &str,
        strategy: ReadStrategy,
        depth_limit: usize,
    ) -> (Result<BlockBody, ReadError>, usize) {
        let mut cursor = Cursor::new(text);
        cursor.advance();
        let result = read_block(
            &mut cursor,
            "test",
            &ReaderOptions {
                strategy,
                depth_limit,
            },
        );
        (result, cursor.position())
    }

    #[test]
    fn reads_entries_with_nested_blocks() {
        let text = "config system interface
    edit \"port1\"
        set ip 10.0.0.1 255.255.255.0
        config secondaryip
            edit 1
                set ip 10.0.1.1 255.255.255.0
            next
        end
    next
end
";
        let (result, position) = read(text, ReadStrategy::Auto, DEFAULT_DEPTH_LIMIT);
        let body = result.expect("read");
        assert_eq!(position, 10);
        let BlockBody::Entries(entries) = body else {
            panic!("expected entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields.get_str("ip"), Some("10.0.0.1/24"));
        let secondary = entries[0].fields.get_entries("secondaryip");
        assert_eq!(secondary[0].fields.get_str("ip"), Some("10.0.1.1/24"));
    }

    #[test]
    fn settings_block_and_unset() {
        let text = "config system global
    set hostname \"fw01\"
    set timezone 04
    unset timezone
end";
        let (result, _) = read(text, ReadStrategy::Iterative, DEFAULT_DEPTH_LIMIT);
        let mut expected = Fields::new();
        expected.insert("hostname", Value::Scalar("fw01".to_string()));
        assert_eq!(result.expect("read"), BlockBody::Settings(expected));
    }

    #[test]
    fn missing_end_is_reported_for_innermost_block() {
        let text = "config firewall address
    edit \"a\"
        config tagging
            edit 1
";
        for strategy in [ReadStrategy::Recursive, ReadStrategy::Iterative] {
            let (result, _) = read(text, strategy, DEFAULT_DEPTH_LIMIT);
            assert_eq!(
                result,
                Err(ReadError::UnexpectedEof {
                    section: "tagging".to_string(),
                    line: 3
                })
            );
        }
    }

    #[test]
    fn config_between_entries_is_an_error() {
        let text = "config firewall address
    edit \"a\"
    next
config firewall policy
end";
        let (result, _) = read(text, ReadStrategy::Auto, DEFAULT_DEPTH_LIMIT);
        assert!(matches!(
            result,
            Err(ReadError::ConfigBetweenEntries { line: 4, .. })
        ));
    }

    #[test]
    fn edit_without_next_closes_previous_entry() {
        let text = "config firewall addrgrp
    edit \"g1\"
        set member \"a\"
    edit \"g2\"
        set member \"b\"
end";
        for strategy in [ReadStrategy::Recursive, ReadStrategy::Iterative] {
            let mut cursor = Cursor::new(text);
            cursor.advance();
            let body = read_block(
                &mut cursor,
                "firewall addrgrp",
                &ReaderOptions {
                    strategy,
                    depth_limit: 8,
                },
            )
            .expect("read");
            let mut g1 = Entry::new("g1");
            g1.fields.insert("member", Value::Scalar("a".to_string()));
            let mut g2 = Entry::new("g2");
            g2.fields.insert("member", Value::Scalar("b".to_string()));
            assert_eq!(body, BlockBody::Entries(vec![g1, g2]));
            assert_eq!(cursor.warnings().len(), 2);
        }
    }

    #[test]
    fn recursive_only_refuses_deep_nesting() {
        let mut text = String::from("config root\n");
        for _ in 0..5 {
            text.push_str("config inner\n");
        }
        for _ in 0..6 {
            text.push_str("end\n");
        }
        let (result, _) = read(&text, ReadStrategy::Recursive, 3);
        assert_eq!(result, Err(ReadError::DepthExceeded { line: 4, limit: 3 }));
        let (result, position) = read(&text, ReadStrategy::Auto, 3);
        assert!(result.is_ok());
        assert_eq!(position, 12);
    }
}
