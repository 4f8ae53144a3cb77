//! Source and destination NAT for a matched policy.
//!
//! Multi-entry pools and mapped-IP lists are reduced to their first entry:
//! SNAT uses the pool's start address and DNAT the first mapped address.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::warn;

use crate::model::{ConfigModel, Policy, Vip};

use super::FiveTuple;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceNat {
    pub from: Ipv4Addr,
    pub to: Ipv4Addr,
    /// Pool name, or the egress interface.
    pub via: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationNat {
    pub vip: String,
    pub from: Ipv4Addr,
    pub to: Ipv4Addr,
    pub from_port: Option<u16>,
    pub to_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NatOutcome {
    pub source: Option<SourceNat>,
    pub destination: Option<DestinationNat>,
}

impl NatOutcome {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.destination.is_none()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(snat) = &self.source {
            parts.push(format!("SNAT {} -> {} via {}", snat.from, snat.to, snat.via));
        }
        if let Some(dnat) = &self.destination {
            let port = match (dnat.from_port, dnat.to_port) {
                (Some(from), Some(to)) if from != to => format!(" port {from} -> {to}"),
                _ => String::new(),
            };
            parts.push(format!(
                "DNAT {} -> {}{port} via VIP {}",
                dnat.from, dnat.to, dnat.vip
            ));
        }
        if parts.is_empty() {
            "no NAT".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Rewrite `flow` as `policy` would. Destination NAT applies whenever the
/// policy names a VIP covering the destination, independent of the `nat` flag.
pub fn apply(
    model: &ConfigModel,
    policy: &Policy,
    flow: &FiveTuple,
    egress: &str,
) -> (FiveTuple, NatOutcome) {
    let mut out = *flow;
    let mut outcome = NatOutcome::default();

    if policy.nat {
        match source_address(model, policy, egress) {
            Some((to, via)) => {
                out.src = to;
                if to != flow.src {
                    outcome.source = Some(SourceNat {
                        from: flow.src,
                        to,
                        via,
                    });
                }
            }
            None => warn!(
                policy = %policy.id,
                egress,
                "NAT enabled but no source address available"
            ),
        }
    }

    if let Some(vip) = policy_vip(model, policy, flow) {
        let to = mapped_address(vip);
        let to_port = mapped_port(vip, flow);
        out.dst = to;
        out.dst_port = to_port;
        outcome.destination = Some(DestinationNat {
            vip: vip.name.clone(),
            from: flow.dst,
            to,
            from_port: flow.dst_port,
            to_port,
        });
    }

    (out, outcome)
}

fn source_address(
    model: &ConfigModel,
    policy: &Policy,
    egress: &str,
) -> Option<(Ipv4Addr, String)> {
    if policy.ippool {
        let pool = policy
            .poolname
            .iter()
            .find_map(|name| model.ippools.get(name))?;
        return pool.startip.map(|ip| (ip, format!("pool {}", pool.name)));
    }
    let interface = model.interfaces.get(egress)?;
    interface
        .ip
        .map(|net| (net.ip(), format!("interface {}", interface.name)))
}

/// Whether `vip` translates this flow.
pub(super) fn vip_applies(vip: &Vip, flow: &FiveTuple) -> bool {
    if vip.mapped.is_empty() || !vip.extip.contains(flow.dst) {
        return false;
    }
    if !vip.portforward {
        return true;
    }
    let same_protocol = vip.protocol.eq_ignore_ascii_case(&flow.protocol.to_string());
    let port_ok = match (vip.extport, flow.dst_port) {
        (Some(range), Some(port)) => range.contains(port),
        (None, Some(_)) => true,
        (_, None) => false,
    };
    same_protocol && port_ok
}

/// First VIP, directly or through VIP groups, among the policy destinations.
pub(super) fn policy_vip<'m>(
    model: &'m ConfigModel,
    policy: &Policy,
    flow: &FiveTuple,
) -> Option<&'m Vip> {
    let mut seen = BTreeSet::new();
    policy
        .dstaddr
        .iter()
        .find_map(|name| find_vip(model, name, flow, &mut seen))
}

fn find_vip<'m>(
    model: &'m ConfigModel,
    name: &str,
    flow: &FiveTuple,
    seen: &mut BTreeSet<String>,
) -> Option<&'m Vip> {
    if let Some(vip) = model.vips.get(name) {
        return vip_applies(vip, flow).then_some(vip);
    }
    let group = model.vip_groups.get(name)?;
    if !seen.insert(name.to_string()) {
        return None;
    }
    group
        .members
        .iter()
        .find_map(|member| find_vip(model, member, flow, seen))
}

/// Any VIP in the model translating the flow; used to pick the route.
pub(super) fn routing_vip<'m>(model: &'m ConfigModel, flow: &FiveTuple) -> Option<&'m Vip> {
    model.vips.values().find(|vip| vip_applies(vip, flow))
}

pub(super) fn mapped_address(vip: &Vip) -> Ipv4Addr {
    vip.mapped.first().map_or(Ipv4Addr::UNSPECIFIED, |span| span.first())
}

fn mapped_port(vip: &Vip, flow: &FiveTuple) -> Option<u16> {
    let port = flow.dst_port?;
    if !vip.portforward || !flow.protocol.carries_ports() {
        return Some(port);
    }
    match (vip.extport, vip.mappedport) {
        (Some(ext), Some(mapped)) => Some(ext.map_onto(port, mapped)),
        (None, Some(mapped)) => Some(mapped.low),
        _ => Some(port),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::parse;
    use crate::trace::TraceRequest;

    const NAT: &str = r#"config system interface
    edit "wan1"
        set ip 203.0.113.2 255.255.255.0
    next
end
config firewall vip
    edit "web"
        set extip 203.0.113.10
        set mappedip "10.0.0.10"
        set portforward enable
        set extport 8080-8090
        set mappedport 80-90
    next
end
config firewall vipgrp
    edit "vips"
        set member "web"
    next
end
config firewall ippool
    edit "pool"
        set startip 203.0.113.50
        set endip 203.0.113.60
    next
end
config firewall policy
    edit 1
        set dstaddr "vips"
        set nat enable
        set ippool enable
        set poolname "pool"
    next
    edit 2
        set dstaddr "all"
        set nat enable
    next
    edit 3
        set dstaddr "all"
    next
end
"#;

    fn flow(dst: &str, port: &str) -> FiveTuple {
        TraceRequest::parse("192.168.1.5", dst, "tcp", Some(port))
            .expect("request")
            .flow
    }

    #[test]
    fn pool_snat_and_vip_port_forwarding() {
        let (config, _) = parse(NAT);
        let model = &config.root;
        let (out, nat) = apply(model, &model.policies[0], &flow("203.0.113.10", "8085"), "wan1");
        assert_eq!(out.src, "203.0.113.50".parse::<Ipv4Addr>().expect("ip"));
        assert_eq!(out.dst, "10.0.0.10".parse::<Ipv4Addr>().expect("ip"));
        assert_eq!(out.dst_port, Some(85));
        assert_eq!(
            nat.describe(),
            "SNAT 192.168.1.5 -> 203.0.113.50 via pool pool; DNAT 203.0.113.10 -> 10.0.0.10 port 8085 -> 85 via VIP web"
        );
    }

    #[test]
    fn port_outside_the_forwarded_range_is_not_translated() {
        let (config, _) = parse(NAT);
        let model = &config.root;
        let (out, nat) = apply(model, &model.policies[0], &flow("203.0.113.10", "443"), "wan1");
        assert_eq!(out.dst, "203.0.113.10".parse::<Ipv4Addr>().expect("ip"));
        assert!(nat.destination.is_none());
    }

    #[test]
    fn interface_snat_without_pool() {
        let (config, _) = parse(NAT);
        let model = &config.root;
        let (out, _) = apply(model, &model.policies[1], &flow("8.8.8.8", "53"), "wan1");
        assert_eq!(out.src, "203.0.113.2".parse::<Ipv4Addr>().expect("ip"));
    }

    #[test]
    fn policy_without_nat_leaves_the_flow_alone() {
        let (config, _) = parse(NAT);
        let model = &config.root;
        let original = flow("8.8.8.8", "53");
        let (out, nat) = apply(model, &model.policies[2], &original, "wan1");
        assert_eq!(out, original);
        assert!(nat.is_empty());
        assert_eq!(nat.describe(), "no NAT");
    }
}
