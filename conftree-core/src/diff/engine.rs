use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::diff::result::{
    DiffResult, FieldChange, Record, SectionData, SectionDiff, SETTINGS_ITEM,
};

/// Inputs that cannot be compared meaningfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The same section has a different shape on each side.
    #[error("section `{section}` is {left} on the left but {right} on the right")]
    ShapeMismatch {
        section: String,
        left: &'static str,
        right: &'static str,
    },
}

/// Configures section comparison.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Field names never reported as modified (for example `uuid`).
    pub ignore_fields: BTreeSet<String>,
}

/// Compare every section present on either side.
pub fn diff_sections(
    left: &BTreeMap<String, SectionData>,
    right: &BTreeMap<String, SectionData>,
    opts: &DiffOptions,
) -> Result<DiffResult, DiffError> {
    let names: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    let mut out = DiffResult::new();
    for name in names {
        if let Some(diff) = diff_section(name, left.get(name), right.get(name), opts)? {
            out.insert(name.clone(), diff);
        }
    }
    Ok(out)
}

/// Compare one section; `None` means no change.
///
/// A side that lacks the section counts as an empty section of the other
/// side's shape.
pub fn diff_section(
    name: &str,
    left: Option<&SectionData>,
    right: Option<&SectionData>,
    opts: &DiffOptions,
) -> Result<Option<SectionDiff>, DiffError> {
    let empty_keyed = SectionData::Keyed(BTreeMap::new());
    let empty_settings = SectionData::Settings(Record::new());
    let (left, right) = match (left, right) {
        (None, None) => return Ok(None),
        (Some(l), Some(r)) => (l, r),
        (Some(l), None) => (l, blank_like(l, &empty_keyed, &empty_settings)),
        (None, Some(r)) => (blank_like(r, &empty_keyed, &empty_settings), r),
    };

    let diff = match (left, right) {
        (SectionData::Keyed(l), SectionData::Keyed(r)) => diff_keyed(l, r, opts),
        (SectionData::Settings(l), SectionData::Settings(r)) => diff_settings(l, r, opts),
        _ => {
            return Err(DiffError::ShapeMismatch {
                section: name.to_string(),
                left: left.shape(),
                right: right.shape(),
            })
        }
    };
    Ok((!diff.is_empty()).then_some(diff))
}

/// Field-level changes between two records over the union of their keys.
///
/// One-element arrays are unwrapped before comparing, so `["a"]` and `"a"`
/// are equal.
pub fn diff_records(
    left: &Record,
    right: &Record,
    opts: &DiffOptions,
) -> BTreeMap<String, FieldChange> {
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    let mut changes = BTreeMap::new();
    for key in keys {
        if opts.ignore_fields.contains(key.as_str()) {
            continue;
        }
        let old = left.get(key).map(unwrap_single).unwrap_or(&JsonValue::Null);
        let new = right.get(key).map(unwrap_single).unwrap_or(&JsonValue::Null);
        if old != new {
            changes.insert(
                key.clone(),
                FieldChange {
                    old: old.clone(),
                    new: new.clone(),
                },
            );
        }
    }
    changes
}

fn diff_keyed(
    left: &BTreeMap<String, Record>,
    right: &BTreeMap<String, Record>,
    opts: &DiffOptions,
) -> SectionDiff {
    let mut diff = SectionDiff::default();
    for (key, record) in right {
        if !left.contains_key(key) {
            diff.added.insert(key.clone(), record.clone());
        }
    }
    for (key, old) in left {
        match right.get(key) {
            None => {
                diff.deleted.insert(key.clone(), old.clone());
            }
            Some(new) => {
                let changes = diff_records(old, new, opts);
                if !changes.is_empty() {
                    diff.modified.insert(key.clone(), changes);
                }
            }
        }
    }
    diff
}

fn diff_settings(left: &Record, right: &Record, opts: &DiffOptions) -> SectionDiff {
    let mut diff = SectionDiff::default();
    match (left.is_empty(), right.is_empty()) {
        (true, true) => {}
        (true, false) => {
            diff.added.insert(SETTINGS_ITEM.to_string(), right.clone());
        }
        (false, true) => {
            diff.deleted.insert(SETTINGS_ITEM.to_string(), left.clone());
        }
        (false, false) => {
            let changes = diff_records(left, right, opts);
            if !changes.is_empty() {
                diff.modified.insert(SETTINGS_ITEM.to_string(), changes);
            }
        }
    }
    diff
}

fn blank_like<'a>(
    other: &SectionData,
    keyed: &'a SectionData,
    settings: &'a SectionData,
) -> &'a SectionData {
    match other {
        SectionData::Keyed(_) => keyed,
        SectionData::Settings(_) => settings,
    }
}

fn unwrap_single(value: &JsonValue) -> &JsonValue {
    match value {
        JsonValue::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}
