use std::collections::BTreeMap;

use conftree_core::{
    diff_sections, format_json, format_summary, format_text, DiffOptions, Record, SectionData,
};
use serde_json::json;

fn keyed(items: &[(&str, serde_json::Value)]) -> SectionData {
    SectionData::Keyed(
        items
            .iter()
            .map(|(name, value)| {
                let mut record = Record::new();
                record.insert("value".to_string(), value.clone());
                ((*name).to_string(), record)
            })
            .collect(),
    )
}

fn model(sections: Vec<(&str, SectionData)>) -> BTreeMap<String, SectionData> {
    sections
        .into_iter()
        .map(|(name, data)| (name.to_string(), data))
        .collect()
}

#[test]
fn added_and_deleted_are_symmetric() {
    let a = model(vec![
        ("addresses", keyed(&[("web", json!("10.0.0.1/32")), ("db", json!("10.0.0.2/32"))])),
        ("services", keyed(&[("HTTP", json!("tcp/80"))])),
    ]);
    let b = model(vec![
        ("addresses", keyed(&[("web", json!("10.0.0.9/32")), ("mail", json!("10.0.0.3/32"))])),
        ("zones", keyed(&[("dmz", json!(["port3"]))])),
    ]);
    let opts = DiffOptions::default();
    let forward = diff_sections(&a, &b, &opts).expect("forward");
    let backward = diff_sections(&b, &a, &opts).expect("backward");

    for (section, diff) in &forward {
        let other = backward.get(section).expect("section present both ways");
        let added: Vec<_> = diff.added.keys().collect();
        let deleted: Vec<_> = other.deleted.keys().collect();
        assert_eq!(added, deleted, "{section}");
        let deleted: Vec<_> = diff.deleted.keys().collect();
        let added: Vec<_> = other.added.keys().collect();
        assert_eq!(deleted, added, "{section}");
    }
    assert!(forward["addresses"].modified.contains_key("web"));
    assert!(forward["services"].deleted.contains_key("HTTP"));
    assert!(forward["zones"].added.contains_key("dmz"));
}

#[test]
fn formatters_render_all_classes() {
    let a = model(vec![("addresses", keyed(&[("web", json!("a")), ("old", json!("x"))]))]);
    let b = model(vec![("addresses", keyed(&[("web", json!("b")), ("new", json!("y"))]))]);
    let result = diff_sections(&a, &b, &DiffOptions::default()).expect("diff");

    let text = format_text(&result);
    assert!(text.contains("[addresses]"));
    assert!(text.contains("+ new"));
    assert!(text.contains("- old"));
    assert!(text.contains("~ web"));
    assert!(text.contains("value: \"a\" -> \"b\""));
    assert_eq!(format_summary(&result), "sections=1 added=1 deleted=1 modified=1");
    assert!(format_json(&result).contains("\"modified\""));
}
