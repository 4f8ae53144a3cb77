//! Expanding object names into leaf values.
//!
//! Groups are walked depth-first with the current path kept in a set, so a
//! group that reaches itself contributes nothing on the second visit instead
//! of recursing forever. Names that resolve to nothing are logged and skipped.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::Serialize;
use tracing::warn;

use crate::model::net::{any_network, IpSpan, PortRange, PortSpec};
use crate::model::{AddressKind, ConfigModel, Policy, Service, ServiceProtocol};

/// Wildcard address names.
pub fn is_any_address(name: &str) -> bool {
    name.eq_ignore_ascii_case("all") || name.eq_ignore_ascii_case("any")
}

/// Wildcard service names.
pub fn is_any_service(name: &str) -> bool {
    name.eq_ignore_ascii_case("ALL") || name.eq_ignore_ascii_case("ANY")
}

/// Wildcard interface name.
pub fn is_any_interface(name: &str) -> bool {
    name.eq_ignore_ascii_case("any")
}

/// A resolved address value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AddressLeaf {
    Network(Ipv4Network),
    Range { start: Ipv4Addr, end: Ipv4Addr },
    Fqdn(String),
    Wildcard(String),
    Geography(String),
    InterfaceSubnet(String),
    Dynamic(String),
}

impl AddressLeaf {
    /// Whether `ip` falls inside this leaf. Leaves without a static address
    /// (FQDN, geography, ...) never match.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        match self {
            AddressLeaf::Network(net) => net.contains(ip),
            AddressLeaf::Range { start, end } => *start <= ip && ip <= *end,
            _ => false,
        }
    }

    fn from_span(span: IpSpan) -> Self {
        match span {
            IpSpan::Host(host) => AddressLeaf::Network(Ipv4Network::from(host)),
            IpSpan::Range(start, end) => AddressLeaf::Range { start, end },
            IpSpan::Network(net) => AddressLeaf::Network(net),
        }
    }
}

impl Display for AddressLeaf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddressLeaf::Network(net) => write!(f, "{net}"),
            AddressLeaf::Range { start, end } => write!(f, "{start}-{end}"),
            AddressLeaf::Fqdn(name) => write!(f, "fqdn:{name}"),
            AddressLeaf::Wildcard(text) => write!(f, "wildcard:{text}"),
            AddressLeaf::Geography(country) => write!(f, "geo:{country}"),
            AddressLeaf::InterfaceSubnet(intf) => write!(f, "subnet-of:{intf}"),
            AddressLeaf::Dynamic(sdn) => write!(f, "dynamic:{sdn}"),
        }
    }
}

/// Transport protocols a port-based service covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum L4 {
    Tcp,
    Udp,
    Sctp,
}

impl Display for L4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            L4::Tcp => "tcp",
            L4::Udp => "udp",
            L4::Sctp => "sctp",
        })
    }
}

/// A resolved service value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceLeaf {
    Ports {
        protocol: L4,
        dst: PortRange,
        src: Option<PortRange>,
    },
    Icmp {
        v6: bool,
        icmp_type: Option<u8>,
        icmp_code: Option<u8>,
    },
    /// IP protocol number; `0` means every protocol.
    Ip { protocol: u8 },
}

impl Display for ServiceLeaf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLeaf::Ports { protocol, dst, src } => {
                write!(f, "{protocol}/{dst}")?;
                if let Some(src) = src {
                    write!(f, " (src {src})")?;
                }
                Ok(())
            }
            ServiceLeaf::Icmp {
                v6,
                icmp_type,
                icmp_code,
            } => {
                f.write_str(if *v6 { "icmp6" } else { "icmp" })?;
                if let Some(t) = icmp_type {
                    write!(f, " type {t}")?;
                }
                if let Some(c) = icmp_code {
                    write!(f, " code {c}")?;
                }
                Ok(())
            }
            ServiceLeaf::Ip { protocol: 0 } => f.write_str("ip/any"),
            ServiceLeaf::Ip { protocol } => write!(f, "ip/{protocol}"),
        }
    }
}

/// A policy with its address and service names expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedPolicy {
    pub policy: Policy,
    pub srcaddr: Vec<AddressLeaf>,
    pub dstaddr: Vec<AddressLeaf>,
    pub service: Vec<ServiceLeaf>,
}

impl ConfigModel {
    /// Leaf values behind an address, address group or VIP name.
    ///
    /// VIPs contribute their external address. A cycle or an unknown name
    /// contributes nothing.
    pub fn resolve_address(&self, name: &str) -> Vec<AddressLeaf> {
        let mut out = Vec::new();
        self.collect_address(name, &mut BTreeSet::new(), &mut out);
        out
    }

    /// Leaf values behind a service or service group name.
    pub fn resolve_service(&self, name: &str) -> Vec<ServiceLeaf> {
        let mut out = Vec::new();
        self.collect_service(name, &mut BTreeSet::new(), &mut out);
        out
    }

    /// Copy of `policy` with every address and service expanded.
    ///
    /// Undefined wildcard names (`all`, `ALL`) expand to everything.
    pub fn expand_policy(&self, policy: &Policy) -> ExpandedPolicy {
        ExpandedPolicy {
            srcaddr: self.expand_addresses(&policy.srcaddr),
            dstaddr: self.expand_addresses(&policy.dstaddr),
            service: self.expand_services(&policy.service),
            policy: policy.clone(),
        }
    }

    fn expand_addresses(&self, names: &[String]) -> Vec<AddressLeaf> {
        let mut out = Vec::new();
        for name in names {
            let leaves = if is_any_address(name) && !self.defines_address(name) {
                vec![AddressLeaf::Network(any_network())]
            } else {
                self.resolve_address(name)
            };
            push_unique(&mut out, leaves);
        }
        out
    }

    fn expand_services(&self, names: &[String]) -> Vec<ServiceLeaf> {
        let mut out = Vec::new();
        for name in names {
            let leaves = if is_any_service(name) && !self.services.contains_key(name.as_str()) {
                vec![ServiceLeaf::Ip { protocol: 0 }]
            } else {
                self.resolve_service(name)
            };
            push_unique(&mut out, leaves);
        }
        out
    }

    fn defines_address(&self, name: &str) -> bool {
        self.addresses.contains_key(name)
            || self.address_groups.contains_key(name)
            || self.vips.contains_key(name)
            || self.vip_groups.contains_key(name)
    }

    fn collect_address(&self, name: &str, path: &mut BTreeSet<String>, out: &mut Vec<AddressLeaf>) {
        if let Some(address) = self.addresses.get(name) {
            let leaf = match &address.kind {
                AddressKind::Subnet(net) => AddressLeaf::Network(*net),
                AddressKind::Range { start, end } => AddressLeaf::Range {
                    start: *start,
                    end: *end,
                },
                AddressKind::Fqdn(fqdn) => AddressLeaf::Fqdn(fqdn.clone()),
                AddressKind::Wildcard(text) => AddressLeaf::Wildcard(text.clone()),
                AddressKind::Geography(country) => AddressLeaf::Geography(country.clone()),
                AddressKind::InterfaceSubnet(intf) => AddressLeaf::InterfaceSubnet(intf.clone()),
                AddressKind::Dynamic(sdn) => AddressLeaf::Dynamic(sdn.clone()),
                AddressKind::Other(_) => return,
            };
            push_unique(out, [leaf]);
            return;
        }
        if let Some(vip) = self.vips.get(name) {
            push_unique(out, [AddressLeaf::from_span(vip.extip)]);
            return;
        }

        let members = match (self.address_groups.get(name), self.vip_groups.get(name)) {
            (Some(group), _) => &group.members,
            (None, Some(group)) => &group.members,
            (None, None) => {
                warn!(address = name, "unresolvable address reference");
                return;
            }
        };
        if !path.insert(name.to_string()) {
            warn!(group = name, "address group cycle");
            return;
        }
        for member in members {
            self.collect_address(member, path, out);
        }
        path.remove(name);
    }

    fn collect_service(&self, name: &str, path: &mut BTreeSet<String>, out: &mut Vec<ServiceLeaf>) {
        if let Some(service) = self.services.get(name) {
            push_unique(out, service_leaves(service));
            return;
        }
        let Some(group) = self.service_groups.get(name) else {
            warn!(service = name, "unresolvable service reference");
            return;
        };
        if !path.insert(name.to_string()) {
            warn!(group = name, "service group cycle");
            return;
        }
        for member in &group.members {
            self.collect_service(member, path, out);
        }
        path.remove(name);
    }
}

/// Leaf tuples of one custom service.
///
/// A TCP/UDP/SCTP service with no ranges at all covers every port of all
/// three protocols.
pub fn service_leaves(service: &Service) -> Vec<ServiceLeaf> {
    match &service.protocol {
        ServiceProtocol::TcpUdpSctp => {
            let ports = |protocol: L4, specs: &[PortSpec]| {
                specs
                    .iter()
                    .map(move |spec| ServiceLeaf::Ports {
                        protocol,
                        dst: spec.dst,
                        src: spec.src,
                    })
                    .collect::<Vec<_>>()
            };
            let mut out = ports(L4::Tcp, &service.tcp);
            out.extend(ports(L4::Udp, &service.udp));
            out.extend(ports(L4::Sctp, &service.sctp));
            if out.is_empty() {
                out = [L4::Tcp, L4::Udp, L4::Sctp]
                    .into_iter()
                    .map(|protocol| ServiceLeaf::Ports {
                        protocol,
                        dst: PortRange::ANY,
                        src: None,
                    })
                    .collect();
            }
            out
        }
        ServiceProtocol::Icmp | ServiceProtocol::Icmp6 => vec![ServiceLeaf::Icmp {
            v6: service.protocol == ServiceProtocol::Icmp6,
            icmp_type: service.icmp_type,
            icmp_code: service.icmp_code,
        }],
        ServiceProtocol::Ip => vec![ServiceLeaf::Ip {
            protocol: service.protocol_number.unwrap_or(0),
        }],
        ServiceProtocol::Other(_) => Vec::new(),
    }
}

fn push_unique<T: PartialEq>(out: &mut Vec<T>, items: impl IntoIterator<Item = T>) {
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
}
