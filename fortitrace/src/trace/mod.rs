//! Hop-by-hop simulation of one flow through the device.
//!
//! Each hop runs ingress resolution, route lookup, first-match policy
//! evaluation and NAT, then decides whether the packet is delivered on a
//! directly attached subnet or leaves the device. A route that sends the
//! packet back out of the interface it came in on, with no gateway, re-enters
//! the device on the next hop; the hop cap ends such loops.

pub mod ingress;
mod nat;
mod policy_match;
pub mod routing;

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use nat::{DestinationNat, NatOutcome, SourceNat};
pub use policy_match::{first_match, service_matches};
pub use routing::{RouteChoice, RouteKind};

use crate::model::net::Protocol;
use crate::model::{ConfigModel, PolicyAction};
use crate::settings::DEFAULT_MAX_HOPS;

/// Caller-supplied trace parameters that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceInputError {
    #[error("invalid source address `{0}`")]
    Source(String),
    #[error("invalid destination address `{0}`")]
    Destination(String),
    #[error("{0}")]
    Protocol(String),
    #[error("invalid port `{0}`")]
    Port(String),
    #[error("protocol {0} needs a destination port")]
    PortRequired(Protocol),
    #[error("protocol {0} has no ports")]
    PortNotApplicable(Protocol),
    #[error("invalid ICMP type/code `{0}`")]
    Icmp(String),
    #[error("hop budget must be at least 1")]
    ZeroHops,
}

/// Addresses, protocol and ports of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiveTuple {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: Protocol,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub icmp_type: Option<u8>,
    pub icmp_code: Option<u8>,
}

impl Display for FiveTuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fn side(f: &mut Formatter<'_>, ip: Ipv4Addr, port: Option<u16>) -> fmt::Result {
            match port {
                Some(port) => write!(f, "{ip}:{port}"),
                None => write!(f, "{ip}"),
            }
        }
        write!(f, "{} ", self.protocol)?;
        side(f, self.src, self.src_port)?;
        f.write_str(" -> ")?;
        side(f, self.dst, self.dst_port)?;
        if let Some(icmp_type) = self.icmp_type {
            write!(f, " type {icmp_type}")?;
            if let Some(code) = self.icmp_code {
                write!(f, " code {code}")?;
            }
        }
        Ok(())
    }
}

/// A validated trace request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRequest {
    pub flow: FiveTuple,
    pub max_hops: usize,
}

impl TraceRequest {
    /// Validate the textual form of a request.
    ///
    /// TCP, UDP and SCTP need a destination port in `1..=65535`; other
    /// protocols must not carry one.
    pub fn parse(
        src: &str,
        dst: &str,
        protocol: &str,
        port: Option<&str>,
    ) -> Result<Self, TraceInputError> {
        let src = src
            .trim()
            .parse()
            .map_err(|_| TraceInputError::Source(src.to_string()))?;
        let dst = dst
            .trim()
            .parse()
            .map_err(|_| TraceInputError::Destination(dst.to_string()))?;
        let protocol: Protocol = protocol.parse().map_err(TraceInputError::Protocol)?;
        let dst_port = match (port, protocol.carries_ports()) {
            (Some(port), true) => Some(parse_port(port)?),
            (None, true) => return Err(TraceInputError::PortRequired(protocol)),
            (Some(_), false) => return Err(TraceInputError::PortNotApplicable(protocol)),
            (None, false) => None,
        };
        Ok(Self {
            flow: FiveTuple {
                src,
                dst,
                protocol,
                src_port: None,
                dst_port,
                icmp_type: None,
                icmp_code: None,
            },
            max_hops: DEFAULT_MAX_HOPS,
        })
    }

    pub fn with_source_port(mut self, port: &str) -> Result<Self, TraceInputError> {
        if !self.flow.protocol.carries_ports() {
            return Err(TraceInputError::PortNotApplicable(self.flow.protocol));
        }
        self.flow.src_port = Some(parse_port(port)?);
        Ok(self)
    }

    /// ICMP type with an optional code, written `type[/code]`.
    pub fn with_icmp(mut self, spec: &str) -> Result<Self, TraceInputError> {
        if !matches!(self.flow.protocol, Protocol::Icmp | Protocol::Icmp6) {
            return Err(TraceInputError::Icmp(spec.to_string()));
        }
        let bad = || TraceInputError::Icmp(spec.to_string());
        let (icmp_type, code) = match spec.split_once('/') {
            Some((t, c)) => (t, Some(c)),
            None => (spec, None),
        };
        self.flow.icmp_type = Some(icmp_type.trim().parse().map_err(|_| bad())?);
        self.flow.icmp_code = code
            .map(|c| c.trim().parse().map_err(|_| bad()))
            .transpose()?;
        Ok(self)
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Result<Self, TraceInputError> {
        if max_hops == 0 {
            return Err(TraceInputError::ZeroHops);
        }
        self.max_hops = max_hops;
        Ok(self)
    }
}

fn parse_port(text: &str) -> Result<u16, TraceInputError> {
    match text.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(TraceInputError::Port(text.to_string())),
    }
}

/// An interface together with the zone it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRef {
    pub interface: String,
    pub zone: Option<String>,
}

impl InterfaceRef {
    /// Resolve the zone of `interface`: a firewall zone first, then an SD-WAN zone.
    pub fn resolve(model: &ConfigModel, interface: &str) -> Self {
        let zone = model.zone_of(interface).map(|z| z.name.clone()).or_else(|| {
            let sdwan = model.sdwan.as_ref()?;
            let member = sdwan.members.iter().find(|m| m.interface == interface)?;
            Some(
                member
                    .zone
                    .clone()
                    .unwrap_or_else(|| "virtual-wan-link".to_string()),
            )
        });
        Self {
            interface: interface.to_string(),
            zone,
        }
    }

    /// Whether a policy interface list names this interface or its zone.
    pub fn named_by(&self, names: &[String]) -> bool {
        names.iter().any(|name| {
            crate::resolve::is_any_interface(name)
                || *name == self.interface
                || self.zone.as_deref() == Some(name.as_str())
        })
    }
}

impl Display for InterfaceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "{} (zone {zone})", self.interface),
            None => f.write_str(&self.interface),
        }
    }
}

/// The policy that decided a hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyVerdict {
    pub id: String,
    pub name: Option<String>,
    pub action: PolicyAction,
}

/// Everything one hop looked at and decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub number: usize,
    pub ingress: InterfaceRef,
    /// Packet as it arrived.
    pub input: FiveTuple,
    pub route: Option<RouteChoice>,
    pub egress: Option<InterfaceRef>,
    pub policy: Option<PolicyVerdict>,
    pub nat: Option<NatOutcome>,
    /// Packet as it left, after NAT.
    pub output: Option<FiveTuple>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceStatus {
    /// No interface is attached to the source address.
    NoIngress { reason: String },
    Delivered { interface: String },
    Forwarded {
        interface: String,
        next_hop: Option<Ipv4Addr>,
    },
    Blocked { reason: String },
    Stopped { max_hops: usize },
}

impl TraceStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TraceStatus::Delivered { .. })
    }
}

impl Display for TraceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TraceStatus::NoIngress { reason } => write!(f, "Failed: {reason}"),
            TraceStatus::Delivered { interface } => write!(f, "Delivered via {interface}"),
            TraceStatus::Forwarded {
                interface,
                next_hop: Some(gateway),
            } => write!(f, "Forwarded via {interface} to {gateway}"),
            TraceStatus::Forwarded { interface, .. } => write!(f, "Forwarded via {interface}"),
            TraceStatus::Blocked { reason } => write!(f, "Blocked: {reason}"),
            TraceStatus::Stopped { max_hops } => {
                write!(f, "Stopped: hop limit of {max_hops} reached")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceResult {
    pub request: FiveTuple,
    pub hops: Vec<Hop>,
    pub status: TraceStatus,
}

/// Run one trace against an immutable model.
pub fn trace(model: &ConfigModel, request: &TraceRequest) -> TraceResult {
    let mut hops = Vec::new();
    let Some(first) = ingress::lookup(model, request.flow.src) else {
        return TraceResult {
            request: request.flow,
            hops,
            status: TraceStatus::NoIngress {
                reason: format!("no interface is attached to {}", request.flow.src),
            },
        };
    };

    let mut ingress = InterfaceRef::resolve(model, &first.name);
    let mut flow = request.flow;
    for number in 1..=request.max_hops {
        let (hop, next) = run_hop(model, number, ingress, flow);
        hops.push(hop);
        match next {
            Step::Done(status) => {
                return TraceResult {
                    request: request.flow,
                    hops,
                    status,
                }
            }
            Step::Reenter { ingress: again, flow: out } => {
                ingress = again;
                flow = out;
            }
        }
    }

    warn!(max_hops = request.max_hops, "trace hit the hop limit");
    TraceResult {
        request: request.flow,
        hops,
        status: TraceStatus::Stopped {
            max_hops: request.max_hops,
        },
    }
}

/// Route towards a VIP's mapped address, as the device does when it
/// translates the destination before routing. Only taken when the policy that
/// would match on that path actually translates through a VIP; otherwise the
/// flow is routed on its own destination.
fn vip_route(
    model: &ConfigModel,
    ingress: &InterfaceRef,
    flow: &FiveTuple,
) -> Option<(RouteChoice, String)> {
    let vip = nat::routing_vip(model, flow)?;
    let mapped = nat::mapped_address(vip);
    let route = routing::lookup(model, mapped).filter(|route| !route.blackhole)?;
    let egress = InterfaceRef::resolve(model, &route.device);
    let policy = first_match(model, ingress, &egress, flow)?;
    nat::policy_vip(model, policy, flow)?;
    let note = format!(
        "destination {} is VIP `{}`; routing towards {mapped}",
        flow.dst, vip.name
    );
    Some((route, note))
}

enum Step {
    Done(TraceStatus),
    Reenter { ingress: InterfaceRef, flow: FiveTuple },
}

fn blocked(reason: impl Into<String>) -> Step {
    Step::Done(TraceStatus::Blocked {
        reason: reason.into(),
    })
}

fn run_hop(
    model: &ConfigModel,
    number: usize,
    ingress: InterfaceRef,
    flow: FiveTuple,
) -> (Hop, Step) {
    let mut hop = Hop {
        number,
        ingress,
        input: flow,
        route: None,
        egress: None,
        policy: None,
        nat: None,
        output: None,
        notes: Vec::new(),
    };

    let route = match vip_route(model, &hop.ingress, &flow) {
        Some((route, note)) => {
            hop.notes.push(note);
            route
        }
        None => match routing::lookup(model, flow.dst) {
            Some(route) => route,
            None => return (hop, blocked("no matching route")),
        },
    };
    if route.default_fallback {
        hop.notes.push("no specific route; using the default route".to_string());
    }
    if route.blackhole {
        hop.route = Some(route);
        return (hop, blocked("blackhole route"));
    }

    let egress = InterfaceRef::resolve(model, &route.device);
    hop.egress = Some(egress.clone());
    let gateway = route.gateway;
    hop.route = Some(route);

    let Some(policy) = first_match(model, &hop.ingress, &egress, &flow) else {
        return (hop, blocked("no matching policy (implicit deny)"));
    };
    hop.policy = Some(PolicyVerdict {
        id: policy.id.clone(),
        name: policy.name.clone(),
        action: policy.action,
    });
    if !policy.action.permits() {
        return (hop, blocked(format!("denied by policy {}", policy.label())));
    }
    for (kind, profile) in &policy.profiles {
        hop.notes.push(format!("{kind}: {profile}"));
    }

    let (out, nat) = nat::apply(model, policy, &flow, &egress.interface);
    hop.notes.push(nat.describe());
    hop.nat = Some(nat);
    hop.output = Some(out);

    let attached = model
        .interfaces
        .get(&egress.interface)
        .is_some_and(|intf| intf.is_attached(out.dst));
    if attached {
        let interface = egress.interface.clone();
        return (hop, Step::Done(TraceStatus::Delivered { interface }));
    }
    if egress.interface == hop.ingress.interface && gateway.is_none() {
        debug!(interface = %egress.interface, hop = number, "hairpin route, re-entering");
        hop.notes
            .push(format!("route leads back out of {}; packet re-enters", egress.interface));
        return (hop, Step::Reenter { ingress: egress, flow: out });
    }
    let interface = egress.interface.clone();
    (
        hop,
        Step::Done(TraceStatus::Forwarded {
            interface,
            next_hop: gateway,
        }),
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::parse;

    const SCENARIO: &str = r#"config system interface
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

    fn request(src: &str, dst: &str, port: u16) -> TraceRequest {
        TraceRequest::parse(src, dst, "tcp", Some(&port.to_string())).expect("request")
    }

    #[test]
    fn flow_inside_one_subnet_is_delivered() {
        let (config, _) = parse(SCENARIO);
        let result = trace(&config.root, &request("192.168.1.50", "192.168.1.99", 80));

        assert_eq!(
            result.status,
            TraceStatus::Delivered {
                interface: "port1".to_string()
            }
        );
        assert_eq!(result.hops.len(), 1);
        let hop = &result.hops[0];
        assert_eq!(hop.ingress.interface, "port1");
        let route = hop.route.as_ref().expect("route");
        assert_eq!(route.kind, RouteKind::Connected);
        assert_eq!(route.dst.to_string(), "192.168.1.0/24");
        assert_eq!(hop.policy.as_ref().map(|p| p.id.as_str()), Some("1"));
        assert_eq!(hop.nat.as_ref().map(NatOutcome::describe).as_deref(), Some("no NAT"));
        assert_eq!(hop.output, Some(hop.input));
    }

    #[test]
    fn missing_route_blocks() {
        let (config, _) = parse(SCENARIO);
        let result = trace(&config.root, &request("192.168.1.50", "8.8.8.8", 80));
        assert_eq!(result.status.to_string(), "Blocked: no matching route");
        assert_eq!(result.hops.len(), 1);
        assert!(result.hops[0].route.is_none());
    }

    #[test]
    fn unknown_source_fails_without_hops() {
        let (config, _) = parse(SCENARIO);
        let result = trace(&config.root, &request("10.9.9.9", "192.168.1.99", 80));
        assert!(matches!(result.status, TraceStatus::NoIngress { .. }));
        assert!(result.hops.is_empty());
    }

    const VIP_EXPORT: &str = r#"config system interface
    edit "port1"
        set ip 192.168.1.1 255.255.255.0
    next
    edit "port2"
        set ip 10.0.0.1 255.255.255.0
    next
    edit "wan1"
        set ip 203.0.113.2 255.255.255.0
    next
end
config firewall vip
    edit "web"
        set extip 203.0.113.10
        set mappedip "10.0.0.10"
        set extintf "wan1"
    next
end
"#;

    fn vip_config(dstaddr: &str) -> String {
        format!(
            "{VIP_EXPORT}config firewall policy\n    edit 1\n        set srcintf \"port1\"\n        set dstintf \"port2\" \"wan1\"\n        set srcaddr \"all\"\n        set dstaddr \"{dstaddr}\"\n        set service \"ALL\"\n        set action accept\n    next\nend\n"
        )
    }

    #[test]
    fn vip_not_used_by_any_policy_does_not_steer_routing() {
        let (config, _) = parse(&vip_config("all"));
        let result = trace(&config.root, &request("192.168.1.5", "203.0.113.10", 80));

        assert_eq!(
            result.status,
            TraceStatus::Delivered {
                interface: "wan1".to_string()
            }
        );
        let hop = &result.hops[0];
        assert_eq!(hop.egress.as_ref().map(|e| e.interface.as_str()), Some("wan1"));
        assert_eq!(hop.output.map(|out| out.dst.to_string()).as_deref(), Some("203.0.113.10"));
        assert_eq!(hop.nat.as_ref().map(NatOutcome::describe).as_deref(), Some("no NAT"));
    }

    #[test]
    fn vip_named_by_the_policy_routes_to_the_mapped_host() {
        let (config, _) = parse(&vip_config("web"));
        let result = trace(&config.root, &request("192.168.1.5", "203.0.113.10", 80));

        assert_eq!(
            result.status,
            TraceStatus::Delivered {
                interface: "port2".to_string()
            }
        );
        let hop = &result.hops[0];
        assert_eq!(hop.output.map(|out| out.dst.to_string()).as_deref(), Some("10.0.0.10"));
        assert!(hop.notes.iter().any(|note| note.contains("VIP `web`")));
    }

    #[test]
    fn hairpin_route_runs_into_the_hop_limit() {
        let text = format!(
            "{SCENARIO}config router static\n    edit 1\n        set dst 10.50.0.0 255.255.0.0\n        set device \"port1\"\n    next\nend\n"
        );
        let (config, _) = parse(&text);
        let req = request("192.168.1.50", "10.50.1.1", 443)
            .with_max_hops(4)
            .expect("hops");
        let result = trace(&config.root, &req);
        assert_eq!(result.status, TraceStatus::Stopped { max_hops: 4 });
        assert_eq!(result.hops.len(), 4);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(
            TraceRequest::parse("300.1.1.1", "1.1.1.1", "tcp", Some("80")),
            Err(TraceInputError::Source("300.1.1.1".to_string()))
        );
        assert!(matches!(
            TraceRequest::parse("1.1.1.1", "2.2.2.2", "tcp", None),
            Err(TraceInputError::PortRequired(Protocol::Tcp))
        ));
        assert!(matches!(
            TraceRequest::parse("1.1.1.1", "2.2.2.2", "udp", Some("0")),
            Err(TraceInputError::Port(_))
        ));
        assert!(matches!(
            TraceRequest::parse("1.1.1.1", "2.2.2.2", "gre", None),
            Err(TraceInputError::Protocol(_))
        ));
        let icmp = TraceRequest::parse("1.1.1.1", "2.2.2.2", "icmp", None).expect("icmp");
        assert_eq!(icmp.clone().with_max_hops(0), Err(TraceInputError::ZeroHops));
        let typed = icmp.with_icmp("8/0").expect("icmp type");
        assert_eq!((typed.flow.icmp_type, typed.flow.icmp_code), (Some(8), Some(0)));
    }
}
