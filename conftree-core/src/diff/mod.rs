//! Structural comparison of identity-keyed sections.

pub mod engine;
pub mod result;

pub use engine::{diff_records, diff_section, diff_sections, DiffError, DiffOptions};
pub use result::{DiffResult, FieldChange, Record, SectionData, SectionDiff, SETTINGS_ITEM};
