//! Tolerant reading and structural diffing of `config`/`edit`/`set`/`end`
//! CLI exports.
//!
//! - [`lexer`] classifies single lines.
//! - [`reader`] turns a `config` block into a [`BlockBody`] using a recursive
//!   or explicit-stack traversal, and skips broken blocks.
//! - [`tree`] holds the parsed value union.
//! - [`diff`] compares identity-keyed sections and [`format`] renders the result.
//!
//! Nothing here knows what a given section means; that belongs to callers.

pub mod cursor;
pub mod diff;
pub mod format;
pub mod lexer;
pub mod reader;
pub mod source;
pub mod tree;
pub mod version;

pub use cursor::{Cursor, ParseWarning};
pub use diff::{
    diff_records, diff_section, diff_sections, DiffError, DiffOptions, DiffResult, FieldChange,
    Record, SectionData, SectionDiff, SETTINGS_ITEM,
};
pub use format::{format_json, format_summary, format_text};
pub use lexer::{classify, normalize_key, normalize_section_name, split_tokens, Line};
pub use reader::{
    read_block, skip_block, ReadError, ReadStrategy, ReaderOptions, SkipOutcome,
    DEFAULT_DEPTH_LIMIT,
};
pub use source::{read_source, SourceError};
pub use tree::{parse_value, BlockBody, Entry, Fields, Value};
pub use version::{parse_version_banner, FirmwareVersion};
