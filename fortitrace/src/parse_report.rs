//! What a parse produced: firmware banner, object counts per scope,
//! generically kept sections and warnings.

use std::collections::BTreeMap;

use conftree_core::ParseWarning;
use serde::Serialize;

use crate::model::{ConfigModel, Configuration, ObjectClass};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeInventory {
    pub scope: String,
    /// Object count per class; classes with no objects are left out.
    pub objects: BTreeMap<String, usize>,
    pub settings: Vec<String>,
    /// Sections kept without a typed handler, by name as written.
    pub unhandled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub file: String,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub build: Option<u32>,
    pub vdom_mode: bool,
    pub scopes: Vec<ScopeInventory>,
    pub warnings: Vec<ParseWarning>,
}

pub fn build_parse_report(
    file: &str,
    config: &Configuration,
    warnings: Vec<ParseWarning>,
) -> ParseReport {
    ParseReport {
        file: file.to_string(),
        platform: config.version.as_ref().and_then(|v| v.platform.clone()),
        version: config.version.as_ref().map(|v| v.to_string()),
        build: config.version.as_ref().and_then(|v| v.build),
        vdom_mode: config.is_vdom_mode(),
        scopes: config
            .scopes()
            .into_iter()
            .map(|(scope, model)| scope_inventory(scope, model))
            .collect(),
        warnings,
    }
}

fn scope_inventory(scope: String, model: &ConfigModel) -> ScopeInventory {
    let mut objects = BTreeMap::new();
    for class in ObjectClass::ALL {
        let count = model.names(class).len();
        if count > 0 {
            objects.insert(class.to_string(), count);
        }
    }
    if !model.policies.is_empty() {
        objects.insert("policy".to_string(), model.policies.len());
    }
    if !model.dos_policies.is_empty() {
        objects.insert("dos_policy".to_string(), model.dos_policies.len());
    }
    if let Some(sdwan) = &model.sdwan {
        objects.insert("sdwan_member".to_string(), sdwan.members.len());
    }
    ScopeInventory {
        scope,
        objects,
        settings: model.settings.keys().cloned().collect(),
        unhandled: model.unhandled.values().map(|raw| raw.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn report_counts_objects_per_scope() {
        let text = "#config-version=FGT60F-7.2.5-FW-build1517-230606:opmode=0:vdom=0:user=admin\nconfig firewall address\n    edit \"a\"\n    next\nend\nconfig router ospf\n    set router-id 1.1.1.1\nend\n";
        let (config, warnings) = parse(text);
        let report = build_parse_report("fw.conf", &config, warnings);
        assert_eq!(report.platform.as_deref(), Some("FGT60F"));
        assert_eq!(report.build, Some(1517));
        assert!(!report.vdom_mode);
        assert_eq!(report.scopes.len(), 1);
        assert_eq!(report.scopes[0].objects["address"], 1);
        assert_eq!(report.scopes[0].unhandled, vec!["router ospf"]);
    }
}
