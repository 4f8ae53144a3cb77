use colored::Colorize;
use conftree_core::{format_summary, format_text, DiffResult};

use crate::analyze::{GroupDepth, UsageSets};
use crate::audit::{AuditReport, FindingSeverity};
use crate::parse_report::ParseReport;
use crate::model::ObjectClass;
use crate::resolve::ExpandedPolicy;
use crate::trace::{Hop, TraceResult, TraceStatus};

/// Render diff sections for terminal output.
pub fn render_diff_text(result: &DiffResult) -> String {
    let raw = format_text(result);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with('~') {
            line.yellow().to_string()
        } else if line.starts_with('[') {
            line.bold().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render summary counts for terminal output.
pub fn render_diff_summary(result: &DiffResult) -> String {
    format_summary(result).cyan().to_string()
}

pub fn render_parse(report: &ParseReport) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "parse file={} platform={} version={} vdom_mode={}",
        report.file,
        report.platform.as_deref().unwrap_or("unknown"),
        report.version.as_deref().unwrap_or("unknown"),
        report.vdom_mode
    ));
    for scope in &report.scopes {
        out.push(String::new());
        out.push(format!("[{}]", scope.scope).bold().to_string());
        for (class, count) in &scope.objects {
            out.push(format!("- {class}: {count}"));
        }
        if !scope.settings.is_empty() {
            out.push(format!("- settings: {}", scope.settings.join(", ")));
        }
        if !scope.unhandled.is_empty() {
            out.push(format!("- generic: {}", scope.unhandled.join(", ")));
        }
    }
    if !report.warnings.is_empty() {
        out.push(String::new());
        out.push(format!("warnings={}", report.warnings.len()).yellow().to_string());
        for warning in &report.warnings {
            out.push(format!("- line {}: {}", warning.line, warning.message));
        }
    }
    out.join("\n")
}

/// Render unused objects, depths and cycles; `verbose` adds used objects and
/// reference counts.
pub fn render_usage(scope: &str, usage: &UsageSets, verbose: bool) -> String {
    let mut out = Vec::new();
    out.push(format!("analyze scope={scope} unused={}", usage.unused_count()));
    for class in ObjectClass::ALL {
        let used = usage.used.get(&class).map_or(0, |s| s.len());
        let unused = usage.unused.get(&class).map(|s| s.iter().cloned().collect::<Vec<_>>());
        let unused = unused.unwrap_or_default();
        if used == 0 && unused.is_empty() {
            continue;
        }
        out.push(format!("- {class}: used={used} unused={}", unused.len()));
        for name in &unused {
            out.push(format!("    {}", format!("unused {name}").yellow()));
        }
        if verbose {
            for name in usage.used.get(&class).into_iter().flatten() {
                out.push(format!("    used {name}"));
            }
        }
    }

    let deepest = |depths: &std::collections::BTreeMap<String, GroupDepth>| {
        depths
            .values()
            .filter_map(|d| match d {
                GroupDepth::Depth(n) => Some(*n),
                GroupDepth::Cycle => None,
            })
            .max()
            .unwrap_or(0)
    };
    out.push(format!(
        "group_depth address_max={} service_max={}",
        deepest(&usage.address_group_depth),
        deepest(&usage.service_group_depth)
    ));
    for cycle in &usage.cycles {
        let mut path = cycle.path.clone();
        if let Some(first) = cycle.path.first() {
            path.push(first.clone());
        }
        out.push(
            format!("cycle {:?}: {}", cycle.kind, path.join(" -> "))
                .red()
                .to_string(),
        );
    }

    if verbose {
        out.push("references".to_string());
        for (kind, counts) in [
            ("interface", &usage.references.interfaces),
            ("address", &usage.references.addresses),
            ("service", &usage.references.services),
        ] {
            for (name, count) in counts {
                out.push(format!("- {kind} {name}: {count}"));
            }
        }
    }
    out.join("\n")
}

pub fn render_audit(report: &AuditReport) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "audit scope={} errors={} warnings={}",
        report.scope, report.errors, report.warnings
    ));
    for finding in &report.findings {
        let line = format!("[{}] {}", finding.code, finding.message);
        out.push(match finding.severity {
            FindingSeverity::Error => format!("{} {line}", "ERROR".red()),
            FindingSeverity::Warning => format!("{} {line}", "WARN".yellow()),
        });
    }
    out.join("\n")
}

pub fn render_expanded(policies: &[ExpandedPolicy]) -> String {
    let mut out = Vec::new();
    for expanded in policies {
        let policy = &expanded.policy;
        let state = if policy.enabled { "" } else { " (disabled)" };
        out.push(
            format!("policy {} action={}{state}", policy.label(), policy.action)
                .bold()
                .to_string(),
        );
        out.push(format!(
            "  interfaces: {} -> {}",
            policy.srcintf.join(", "),
            policy.dstintf.join(", ")
        ));
        let join = |items: Vec<String>| {
            if items.is_empty() {
                "(none)".to_string()
            } else {
                items.join(", ")
            }
        };
        out.push(format!(
            "  source: {}",
            join(expanded.srcaddr.iter().map(ToString::to_string).collect())
        ));
        out.push(format!(
            "  destination: {}",
            join(expanded.dstaddr.iter().map(ToString::to_string).collect())
        ));
        out.push(format!(
            "  service: {}",
            join(expanded.service.iter().map(ToString::to_string).collect())
        ));
    }
    out.join("\n")
}

pub fn render_trace(result: &TraceResult) -> String {
    let mut out = Vec::new();
    out.push(format!("trace {}", result.request));
    for hop in &result.hops {
        render_hop(&mut out, hop);
    }
    let status = result.status.to_string();
    out.push(match &result.status {
        TraceStatus::Delivered { .. } | TraceStatus::Forwarded { .. } => status.green().to_string(),
        TraceStatus::Blocked { .. } | TraceStatus::NoIngress { .. } => status.red().to_string(),
        TraceStatus::Stopped { .. } => status.yellow().to_string(),
    });
    out.join("\n")
}

fn render_hop(out: &mut Vec<String>, hop: &Hop) {
    out.push(format!("hop {}", hop.number).bold().to_string());
    out.push(format!("  ingress: {}", hop.ingress));
    out.push(format!("  packet: {}", hop.input));
    match &hop.route {
        Some(route) => {
            let via = route
                .gateway
                .map(|gw| format!(" via {gw}"))
                .unwrap_or_default();
            let id = route
                .id
                .as_deref()
                .map(|id| format!(" #{id}"))
                .unwrap_or_default();
            out.push(format!(
                "  route: {:?}{id} {}{via} dev {} distance {}",
                route.kind, route.dst, route.device, route.distance
            ));
        }
        None => out.push("  route: none".to_string()),
    }
    if let Some(egress) = &hop.egress {
        out.push(format!("  egress: {egress}"));
    }
    if let Some(policy) = &hop.policy {
        let name = policy
            .name
            .as_deref()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default();
        out.push(format!("  policy: {}{name} {}", policy.id, policy.action));
    }
    if let Some(output) = &hop.output {
        out.push(format!("  out: {output}"));
    }
    for note in &hop.notes {
        out.push(format!("  note: {note}"));
    }
}
