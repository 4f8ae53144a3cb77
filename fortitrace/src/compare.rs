//! Section-by-section comparison of two parsed exports.
//!
//! Typed collections are flattened to JSON records keyed by name (policies,
//! routes, DHCP servers and DoS policies by their `edit` id), singleton blocks
//! become one `Settings` record, and sections without a typed handler are
//! compared in whatever shape they were read.

use std::collections::BTreeMap;

use conftree_core::{
    diff_sections, BlockBody, DiffError, DiffOptions, DiffResult, Record, SectionData,
    SETTINGS_ITEM,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::model::{ConfigModel, Configuration};

#[derive(Debug, Error)]
pub enum CompareError {
    #[error(transparent)]
    Shape(#[from] DiffError),
    #[error("cannot compare a configuration with VDOMs against one without")]
    VdomModeMismatch,
}

/// Compare two exports scope by scope.
///
/// Without VDOMs section names are bare (`firewall_policy`); otherwise they
/// carry the scope (`global/system_interface`, `vdom:dmz/firewall_policy`).
pub fn compare(
    left: &Configuration,
    right: &Configuration,
    opts: &DiffOptions,
) -> Result<DiffResult, CompareError> {
    if left.is_vdom_mode() != right.is_vdom_mode() {
        return Err(CompareError::VdomModeMismatch);
    }
    if !left.is_vdom_mode() {
        return Ok(compare_models(&left.root, &right.root, opts)?);
    }

    let mut left_sections = BTreeMap::new();
    let mut right_sections = BTreeMap::new();
    for (scope, model) in left.scopes() {
        prefixed(&mut left_sections, &scope, model_sections(model));
    }
    for (scope, model) in right.scopes() {
        prefixed(&mut right_sections, &scope, model_sections(model));
    }
    Ok(diff_sections(&left_sections, &right_sections, opts)?)
}

/// Compare two single-scope models.
pub fn compare_models(
    left: &ConfigModel,
    right: &ConfigModel,
    opts: &DiffOptions,
) -> Result<DiffResult, DiffError> {
    diff_sections(&model_sections(left), &model_sections(right), opts)
}

fn prefixed(
    out: &mut BTreeMap<String, SectionData>,
    scope: &str,
    sections: BTreeMap<String, SectionData>,
) {
    for (name, data) in sections {
        out.insert(format!("{scope}/{name}"), data);
    }
}

/// Every section of `model` in comparable form.
pub fn model_sections(model: &ConfigModel) -> BTreeMap<String, SectionData> {
    let mut out = BTreeMap::new();
    out.insert("system_interface".into(), keyed(&model.interfaces, "name"));
    out.insert("system_zone".into(), keyed(&model.zones, "name"));
    out.insert("firewall_address".into(), keyed(&model.addresses, "name"));
    out.insert("firewall_addrgrp".into(), keyed(&model.address_groups, "name"));
    out.insert("firewall_service_custom".into(), keyed(&model.services, "name"));
    out.insert("firewall_service_group".into(), keyed(&model.service_groups, "name"));
    out.insert(
        "firewall_policy".into(),
        listed(model.policies.iter().map(|p| (&p.id, p)), "id"),
    );
    out.insert(
        "router_static".into(),
        listed(model.routes.iter().map(|r| (&r.id, r)), "id"),
    );
    out.insert("firewall_vip".into(), keyed(&model.vips, "name"));
    out.insert("firewall_vipgrp".into(), keyed(&model.vip_groups, "name"));
    out.insert("firewall_ippool".into(), keyed(&model.ippools, "name"));
    out.insert("vpn_ipsec_phase1_interface".into(), keyed(&model.phase1, "name"));
    out.insert("vpn_ipsec_phase2_interface".into(), keyed(&model.phase2, "name"));
    out.insert(
        "system_dhcp_server".into(),
        listed(model.dhcp_servers.iter().map(|d| (&d.id, d)), "id"),
    );
    out.insert(
        "firewall_dos_policy".into(),
        listed(model.dos_policies.iter().map(|d| (&d.id, d)), "id"),
    );
    if let Some(sdwan) = &model.sdwan {
        out.insert("system_sdwan".into(), SectionData::Settings(record(sdwan, "")));
    }
    for (name, fields) in &model.settings {
        out.insert(name.clone(), SectionData::Settings(record(fields, "")));
    }
    for (name, raw) in &model.unhandled {
        let data = match &raw.body {
            BlockBody::Entries(entries) => SectionData::Keyed(
                entries
                    .iter()
                    .map(|entry| (entry.name.clone(), record(&entry.fields, "")))
                    .collect(),
            ),
            BlockBody::Settings(fields) => SectionData::Settings(record(fields, "")),
        };
        out.insert(name.clone(), data);
    }
    out
}

fn keyed<T: Serialize>(items: &BTreeMap<String, T>, identity: &str) -> SectionData {
    listed(items.iter(), identity)
}

fn listed<'a, T: Serialize + 'a>(
    items: impl Iterator<Item = (&'a String, &'a T)>,
    identity: &str,
) -> SectionData {
    SectionData::Keyed(
        items
            .map(|(key, item)| (key.clone(), record(item, identity)))
            .collect(),
    )
}

/// Flatten `item` to its top-level fields, minus the identity field.
fn record<T: Serialize>(item: &T, identity: &str) -> Record {
    match serde_json::to_value(item) {
        Ok(JsonValue::Object(map)) => map.into_iter().filter(|(k, _)| k != identity).collect(),
        Ok(other) => Record::from([(SETTINGS_ITEM.to_string(), other)]),
        Err(_) => Record::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::parse::parse;

    const BEFORE: &str = r#"config system global
    set hostname "fw01"
end
config firewall address
    edit "keep"
        set subnet 10.0.0.0 255.255.255.0
    next
    edit "gone"
        set subnet 10.0.1.0 255.255.255.0
    next
end
config firewall policy
    edit 1
        set srcintf "port1"
        set dstintf "port2"
        set action accept
    next
end
config router bgp
    set as 65001
end
"#;

    const AFTER: &str = r#"config system global
    set hostname "fw02"
end
config firewall address
    edit "keep"
        set subnet 10.0.0.0 255.255.255.0
    next
    edit "new"
        set fqdn "example.com"
        set type fqdn
    next
end
config firewall policy
    edit 1
        set srcintf "port1"
        set dstintf "port3"
        set action accept
    next
end
config router bgp
    set as 65001
end
"#;

    #[test]
    fn changes_are_grouped_by_section() {
        let (before, _) = parse(BEFORE);
        let (after, _) = parse(AFTER);
        let diff = compare(&before, &after, &DiffOptions::default()).expect("diff");

        assert_eq!(
            diff.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["firewall_address", "firewall_policy", "system_global"]
        );
        let addresses = &diff["firewall_address"];
        assert!(addresses.added.contains_key("new"));
        assert!(addresses.deleted.contains_key("gone"));
        assert!(addresses.modified.is_empty());

        let policy = &diff["firewall_policy"].modified["1"];
        assert_eq!(policy["dstintf"].old, json!("port2"));
        assert_eq!(policy["dstintf"].new, json!("port3"));

        let global = &diff["system_global"].modified[SETTINGS_ITEM];
        assert_eq!(global["hostname"].new, json!("fw02"));
    }

    #[test]
    fn identical_exports_have_no_diff() {
        let (before, _) = parse(BEFORE);
        assert!(compare(&before, &before, &DiffOptions::default())
            .expect("diff")
            .is_empty());
    }

    #[test]
    fn added_and_deleted_mirror_each_other() {
        let (before, _) = parse(BEFORE);
        let (after, _) = parse(AFTER);
        let forward = compare(&before, &after, &DiffOptions::default()).expect("diff");
        let backward = compare(&after, &before, &DiffOptions::default()).expect("diff");
        for (section, diff) in &forward {
            let mirror = &backward[section];
            assert_eq!(
                diff.added.keys().collect::<Vec<_>>(),
                mirror.deleted.keys().collect::<Vec<_>>()
            );
            assert_eq!(
                diff.deleted.keys().collect::<Vec<_>>(),
                mirror.added.keys().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn vdom_mode_mismatch_is_an_error() {
        let (flat, _) = parse(BEFORE);
        let (vdoms, _) = parse("config vdom\nedit root\nnext\nend\n");
        assert!(matches!(
            compare(&flat, &vdoms, &DiffOptions::default()),
            Err(CompareError::VdomModeMismatch)
        ));
    }
}
