//! Consistency findings over one model scope.

use serde::Serialize;

use crate::analyze::{GroupCycle, GroupKind, UsageSets};
use crate::model::{ConfigModel, Group};
use crate::resolve::{is_any_address, is_any_interface, is_any_service};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub severity: FindingSeverity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub scope: String,
    pub errors: usize,
    pub warnings: usize,
    pub findings: Vec<AuditFinding>,
}

/// Collect findings for `model`. Group cycles come from an earlier analysis.
pub fn build_audit_report(scope: &str, model: &ConfigModel, usage: &UsageSets) -> AuditReport {
    let mut findings = Vec::new();
    findings.extend(zone_findings(model));
    findings.extend(group_member_findings("address", &model.address_groups, |name| {
        model.addresses.contains_key(name)
            || model.address_groups.contains_key(name)
            || model.vips.contains_key(name)
            || model.vip_groups.contains_key(name)
    }));
    findings.extend(group_member_findings("service", &model.service_groups, |name| {
        model.services.contains_key(name) || model.service_groups.contains_key(name)
    }));
    findings.extend(usage.cycles.iter().map(cycle_finding));
    findings.extend(policy_findings(model));
    findings.extend(route_findings(model));
    findings.extend(phase2_findings(model));

    let errors = findings
        .iter()
        .filter(|f| f.severity == FindingSeverity::Error)
        .count();
    let warnings = findings.len() - errors;
    AuditReport {
        scope: scope.to_string(),
        errors,
        warnings,
        findings,
    }
}

fn zone_findings(model: &ConfigModel) -> Vec<AuditFinding> {
    let mut out = Vec::new();
    for zone in model.zones.values() {
        for member in &zone.interfaces {
            if !model.interfaces.contains_key(member) {
                out.push(warning(
                    "zone_member_missing",
                    format!("zone `{}` lists undefined interface `{member}`", zone.name),
                ));
            }
        }
    }
    out
}

fn group_member_findings(
    kind: &str,
    groups: &std::collections::BTreeMap<String, Group>,
    defined: impl Fn(&str) -> bool,
) -> Vec<AuditFinding> {
    let mut out = Vec::new();
    for group in groups.values() {
        for member in group.members.iter().filter(|m| !defined(m)) {
            out.push(warning(
                "group_member_missing",
                format!("{kind} group `{}` lists undefined member `{member}`", group.name),
            ));
        }
    }
    out
}

fn cycle_finding(cycle: &GroupCycle) -> AuditFinding {
    let (code, kind) = match cycle.kind {
        GroupKind::Address => ("address_group_cycle", "address"),
        GroupKind::Service => ("service_group_cycle", "service"),
    };
    let mut path = cycle.path.clone();
    if let Some(first) = cycle.path.first() {
        path.push(first.clone());
    }
    err(code, format!("{kind} group cycle: {}", path.join(" -> ")))
}

fn policy_findings(model: &ConfigModel) -> Vec<AuditFinding> {
    let mut out = Vec::new();
    for policy in &model.policies {
        let mut missing = |what: &str, name: &str| {
            out.push(err(
                "policy_reference_missing",
                format!("policy {} references undefined {what} `{name}`", policy.label()),
            ));
        };
        for name in policy.srcintf.iter().chain(&policy.dstintf) {
            if !is_any_interface(name) && !model.is_interface_like(name) {
                missing("interface", name);
            }
        }
        for name in policy.srcaddr.iter().chain(&policy.dstaddr) {
            let defined = model.addresses.contains_key(name)
                || model.address_groups.contains_key(name)
                || model.vips.contains_key(name)
                || model.vip_groups.contains_key(name);
            if !defined && !is_any_address(name) {
                missing("address", name);
            }
        }
        for name in &policy.service {
            let defined =
                model.services.contains_key(name) || model.service_groups.contains_key(name);
            if !defined && !is_any_service(name) {
                missing("service", name);
            }
        }
        if policy.nat && policy.ippool {
            for pool in &policy.poolname {
                if !model.ippools.contains_key(pool) {
                    missing("IP pool", pool);
                }
            }
        }
    }
    out
}

fn route_findings(model: &ConfigModel) -> Vec<AuditFinding> {
    model
        .routes
        .iter()
        .filter_map(|route| {
            let device = route.device.as_deref()?;
            (!model.is_interface_like(device)).then(|| {
                warning(
                    "route_device_missing",
                    format!("static route {} uses undefined device `{device}`", route.id),
                )
            })
        })
        .collect()
}

fn phase2_findings(model: &ConfigModel) -> Vec<AuditFinding> {
    model
        .phase2
        .values()
        .filter(|p2| !model.phase1.contains_key(&p2.phase1name))
        .map(|p2| {
            err(
                "phase2_phase1_missing",
                format!(
                    "phase2 `{}` references undefined phase1 `{}`",
                    p2.name, p2.phase1name
                ),
            )
        })
        .collect()
}

fn err(code: &str, message: impl Into<String>) -> AuditFinding {
    AuditFinding {
        severity: FindingSeverity::Error,
        code: code.to_string(),
        message: message.into(),
    }
}

fn warning(code: &str, message: impl Into<String>) -> AuditFinding {
    AuditFinding {
        severity: FindingSeverity::Warning,
        code: code.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::parse::parse;

    fn codes(report: &AuditReport) -> Vec<&str> {
        report.findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[test]
    fn clean_config_has_no_findings() {
        let text = r#"config system interface
    edit "port1"
        set ip 192.168.1.1 255.255.255.0
    next
end
config firewall policy
    edit 1
        set srcintf "port1"
        set dstintf "port1"
        set srcaddr "all"
        set dstaddr "all"
        set service "ALL"
        set action accept
    next
end
"#;
        let (config, _) = parse(text);
        let report = build_audit_report("root", &config.root, &analyze(&config.root));
        assert_eq!(report.errors, 0);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn dangling_references_are_reported() {
        let text = r#"config system zone
    edit "inside"
        set interface "port7"
    next
end
config firewall addrgrp
    edit "g1"
        set member "g2" "ghost"
    next
    edit "g2"
        set member "g1"
    next
end
config firewall policy
    edit 5
        set srcintf "port7"
        set dstintf "any"
        set srcaddr "nowhere"
        set dstaddr "all"
        set service "NOPE"
        set action accept
    next
end
config router static
    edit 1
        set device "port9"
    next
end
config vpn ipsec phase2-interface
    edit "p2"
        set phase1name "missing-tunnel"
    next
end
"#;
        let (config, _) = parse(text);
        let report = build_audit_report("root", &config.root, &analyze(&config.root));
        assert_eq!(
            codes(&report),
            vec![
                "zone_member_missing",
                "group_member_missing",
                "address_group_cycle",
                "policy_reference_missing",
                "policy_reference_missing",
                "policy_reference_missing",
                "route_device_missing",
                "phase2_phase1_missing",
            ]
        );
        assert_eq!(report.errors, 5);
        assert_eq!(report.warnings, 3);
        assert!(report.findings[2].message.contains("g1 -> g2 -> g1"));
    }
}
