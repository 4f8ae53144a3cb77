use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::Serialize;

use super::net::{subnet_of, IpSpan, PortRange, PortSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    /// Address with its prefix length, e.g. `192.168.1.1/24`.
    pub ip: Option<Ipv4Network>,
    pub secondary_ips: Vec<Ipv4Network>,
    pub role: Option<String>,
    pub vdom: Option<String>,
    pub enabled: bool,
    pub alias: Option<String>,
    pub kind: Option<String>,
    /// Parent interface of a VLAN.
    pub parent: Option<String>,
    pub vlanid: Option<u16>,
    pub allowaccess: Vec<String>,
    pub description: Option<String>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip: None,
            secondary_ips: Vec::new(),
            role: None,
            vdom: None,
            enabled: true,
            alias: None,
            kind: None,
            parent: None,
            vlanid: None,
            allowaccess: Vec::new(),
            description: None,
        }
    }

    /// Primary then secondary addresses.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Network> + '_ {
        self.ip.iter().chain(&self.secondary_ips).copied()
    }

    /// Attached subnets, one per address.
    pub fn subnets(&self) -> impl Iterator<Item = Ipv4Network> + '_ {
        self.addresses().map(subnet_of)
    }

    /// Whether `ip` sits on one of this interface's subnets.
    pub fn is_attached(&self, ip: Ipv4Addr) -> bool {
        self.addresses().any(|net| net.contains(ip))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub name: String,
    pub interfaces: Vec<String>,
    pub intrazone: String,
    pub description: Option<String>,
}

/// Type-specific value of an address object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AddressKind {
    Subnet(Ipv4Network),
    Range { start: Ipv4Addr, end: Ipv4Addr },
    Fqdn(String),
    /// `address mask` with a non-contiguous mask.
    Wildcard(String),
    Geography(String),
    InterfaceSubnet(String),
    Dynamic(String),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub name: String,
    pub kind: AddressKind,
    pub associated_interface: Option<String>,
    pub comment: Option<String>,
}

/// A named list of members, shared by address, service and VIP groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceProtocol {
    TcpUdpSctp,
    Icmp,
    Icmp6,
    Ip,
    Other(String),
}

impl ServiceProtocol {
    pub fn parse(text: &str) -> Self {
        match text.to_ascii_uppercase().as_str() {
            "TCP/UDP/SCTP" | "TCP/UDP/UDP-LITE/SCTP" => ServiceProtocol::TcpUdpSctp,
            "ICMP" => ServiceProtocol::Icmp,
            "ICMP6" => ServiceProtocol::Icmp6,
            "IP" => ServiceProtocol::Ip,
            _ => ServiceProtocol::Other(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub protocol: ServiceProtocol,
    pub tcp: Vec<PortSpec>,
    pub udp: Vec<PortSpec>,
    pub sctp: Vec<PortSpec>,
    pub icmp_type: Option<u8>,
    pub icmp_code: Option<u8>,
    pub protocol_number: Option<u8>,
    pub category: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Accept,
    Deny,
    Ipsec,
}

impl PolicyAction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "accept" => Some(PolicyAction::Accept),
            "deny" => Some(PolicyAction::Deny),
            "ipsec" => Some(PolicyAction::Ipsec),
            _ => None,
        }
    }

    /// Whether matching traffic is let through.
    pub fn permits(&self) -> bool {
        matches!(self, PolicyAction::Accept | PolicyAction::Ipsec)
    }
}

impl Display for PolicyAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyAction::Accept => "accept",
            PolicyAction::Deny => "deny",
            PolicyAction::Ipsec => "ipsec",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub id: String,
    pub name: Option<String>,
    pub enabled: bool,
    pub srcintf: Vec<String>,
    pub dstintf: Vec<String>,
    pub srcaddr: Vec<String>,
    pub dstaddr: Vec<String>,
    pub service: Vec<String>,
    pub action: PolicyAction,
    pub nat: bool,
    pub ippool: bool,
    pub poolname: Vec<String>,
    pub schedule: Option<String>,
    /// Security profile kind (`av_profile`, `ips_sensor`, ...) to profile name.
    pub profiles: BTreeMap<String, String>,
    pub logtraffic: Option<String>,
    pub comments: Option<String>,
}

impl Policy {
    /// Display label: `7` or `7 (web-in)`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({name})", self.id),
            None => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub id: String,
    pub dst: Ipv4Network,
    /// Named address object used instead of `dst`.
    pub dstaddr: Option<String>,
    pub gateway: Option<Ipv4Addr>,
    pub device: Option<String>,
    pub distance: u32,
    pub priority: u32,
    pub enabled: bool,
    pub blackhole: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vip {
    pub name: String,
    pub extip: IpSpan,
    pub mapped: Vec<IpSpan>,
    pub extintf: Option<String>,
    pub portforward: bool,
    pub protocol: String,
    pub extport: Option<PortRange>,
    pub mappedport: Option<PortRange>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VipGroup {
    pub name: String,
    pub members: Vec<String>,
    pub interface: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpPool {
    pub name: String,
    pub kind: String,
    pub startip: Option<Ipv4Addr>,
    pub endip: Option<Ipv4Addr>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phase1 {
    pub name: String,
    pub interface: Option<String>,
    pub remote_gw: Option<String>,
    pub kind: Option<String>,
    pub proposal: Vec<String>,
    pub comment: Option<String>,
}

/// Traffic selector side of a Phase2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Subnet(Ipv4Network),
    Name(String),
    Range { start: Ipv4Addr, end: Ipv4Addr },
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phase2 {
    pub name: String,
    pub phase1name: String,
    pub src: Selector,
    pub dst: Selector,
    pub proposal: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpServer {
    pub id: String,
    pub interface: String,
    pub enabled: bool,
    pub default_gateway: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    pub ranges: Vec<IpSpan>,
    pub dns_servers: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdWanMember {
    pub id: String,
    pub interface: String,
    pub gateway: Option<Ipv4Addr>,
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SdWan {
    pub enabled: bool,
    pub zones: Vec<String>,
    pub members: Vec<SdWanMember>,
}

impl SdWan {
    /// Member interfaces of an SD-WAN zone. FortiOS 6.x has a single
    /// implicit zone called `virtual-wan-link`.
    pub fn zone_members(&self, zone: &str) -> Vec<&str> {
        let implicit = zone == "virtual-wan-link" && self.zones.is_empty();
        if !implicit && !self.zones.iter().any(|z| z == zone) {
            return Vec::new();
        }
        self.members
            .iter()
            .filter(|m| implicit || m.zone.as_deref().unwrap_or("virtual-wan-link") == zone)
            .map(|m| m.interface.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DosPolicy {
    pub id: String,
    pub interface: Option<String>,
    pub srcaddr: Vec<String>,
    pub dstaddr: Vec<String>,
    pub service: Vec<String>,
    pub enabled: bool,
}
