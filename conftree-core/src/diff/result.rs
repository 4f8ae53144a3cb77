use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Name of the pseudo-item a settings block is compared as.
pub const SETTINGS_ITEM: &str = "Settings";

/// Flattened item: field name to JSON value.
pub type Record = BTreeMap<String, JsonValue>;

/// One section prepared for comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionData {
    /// Items keyed by name or by a declared identifier field.
    Keyed(BTreeMap<String, Record>),
    /// Singleton settings block with no natural identity.
    Settings(Record),
}

impl SectionData {
    pub fn shape(&self) -> &'static str {
        match self {
            SectionData::Keyed(_) => "keyed",
            SectionData::Settings(_) => "settings",
        }
    }
}

/// Old and new value of a changed field; `null` stands for an absent field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub old: JsonValue,
    pub new: JsonValue,
}

/// Changes within one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionDiff {
    /// Items only on the right, keyed by identity.
    pub added: BTreeMap<String, Record>,
    /// Items only on the left.
    pub deleted: BTreeMap<String, Record>,
    /// Items on both sides with field-level changes.
    pub modified: BTreeMap<String, BTreeMap<String, FieldChange>>,
}

impl SectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Section name to its changes. Sections without changes are absent.
pub type DiffResult = BTreeMap<String, SectionDiff>;
