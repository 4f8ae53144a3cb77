use serde_json::Value as JsonValue;

use crate::diff::result::{DiffResult, SectionDiff};

/// Format a diff result as plain text.
///
/// Each section is a `[name]` header followed by `+` (added), `-` (deleted)
/// and `~` (modified) rows; modified rows list `field: old -> new` below.
pub fn format_text(result: &DiffResult) -> String {
    let mut lines = Vec::new();
    for (section, diff) in result {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("[{section}]"));
        for key in diff.added.keys() {
            lines.push(format!("+ {key}"));
        }
        for key in diff.deleted.keys() {
            lines.push(format!("- {key}"));
        }
        for (key, changes) in &diff.modified {
            lines.push(format!("~ {key}"));
            for (field, change) in changes {
                lines.push(format!(
                    "    {field}: {} -> {}",
                    render(&change.old),
                    render(&change.new)
                ));
            }
        }
    }
    lines.join("\n")
}

/// Format counts across all sections.
pub fn format_summary(result: &DiffResult) -> String {
    let count = |f: fn(&SectionDiff) -> usize| result.values().map(f).sum::<usize>();
    format!(
        "sections={} added={} deleted={} modified={}",
        result.len(),
        count(|d| d.added.len()),
        count(|d| d.deleted.len()),
        count(|d| d.modified.len())
    )
}

fn render(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "(unset)".to_string(),
        JsonValue::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}
