use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use serde::Serialize;

/// A contiguous run of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum IpSpan {
    Host(Ipv4Addr),
    Range(Ipv4Addr, Ipv4Addr),
    Network(Ipv4Network),
}

impl IpSpan {
    /// Parse `a.b.c.d`, `a.b.c.d-e.f.g.h` or `a.b.c.d/len`.
    ///
    /// Range bounds given in reverse order are swapped.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some((start, end)) = text.split_once('-') {
            let start: Ipv4Addr = start.trim().parse().ok()?;
            let end: Ipv4Addr = end.trim().parse().ok()?;
            let (low, high) = if start <= end { (start, end) } else { (end, start) };
            return Some(if low == high {
                IpSpan::Host(low)
            } else {
                IpSpan::Range(low, high)
            });
        }
        if text.contains('/') {
            return text.parse::<Ipv4Network>().ok().map(IpSpan::Network);
        }
        text.parse().ok().map(IpSpan::Host)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        match *self {
            IpSpan::Host(host) => host == ip,
            IpSpan::Range(low, high) => low <= ip && ip <= high,
            IpSpan::Network(net) => net.contains(ip),
        }
    }

    /// Lowest address in the span.
    pub fn first(&self) -> Ipv4Addr {
        match *self {
            IpSpan::Host(host) => host,
            IpSpan::Range(low, _) => low,
            IpSpan::Network(net) => net.network(),
        }
    }

    /// `0.0.0.0`, which FortiOS writes for an unset address.
    pub fn is_unspecified(&self) -> bool {
        matches!(self, IpSpan::Host(host) if host.is_unspecified())
    }
}

impl Display for IpSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IpSpan::Host(host) => write!(f, "{host}"),
            IpSpan::Range(low, high) => write!(f, "{low}-{high}"),
            IpSpan::Network(net) => write!(f, "{net}"),
        }
    }
}

impl From<IpSpan> for String {
    fn from(span: IpSpan) -> Self {
        span.to_string()
    }
}

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl PortRange {
    pub const ANY: PortRange = PortRange { low: 0, high: 65535 };

    pub fn single(port: u16) -> Self {
        Self {
            low: port,
            high: port,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.low <= port && port <= self.high
    }

    /// Map `port` from this range onto `target` by offset.
    ///
    /// Offsets past the end of `target` land on its lowest port.
    pub fn map_onto(&self, port: u16, target: PortRange) -> u16 {
        let offset = port.saturating_sub(self.low);
        match target.low.checked_add(offset) {
            Some(mapped) if mapped <= target.high => mapped,
            _ => target.low,
        }
    }
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid port `{part}`"))
        };
        match text.split_once('-') {
            Some((low, high)) => {
                let (low, high) = (parse(low)?, parse(high)?);
                if low > high {
                    return Err(format!("port range `{text}` runs backwards"));
                }
                Ok(Self { low, high })
            }
            None => parse(text).map(Self::single),
        }
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        range.to_string()
    }
}

/// One `tcp-portrange` style token: `dst[:src]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortSpec {
    pub dst: PortRange,
    pub src: Option<PortRange>,
}

impl FromStr for PortSpec {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.split_once(':') {
            Some((dst, src)) => Ok(Self {
                dst: dst.parse()?,
                src: Some(src.parse()?),
            }),
            None => Ok(Self {
                dst: text.parse()?,
                src: None,
            }),
        }
    }
}

/// IP protocol of a traced flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
    Icmp,
    Icmp6,
    Other(u8),
}

impl Protocol {
    pub fn number(&self) -> u8 {
        match self {
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Sctp => 132,
            Protocol::Icmp => 1,
            Protocol::Icmp6 => 58,
            Protocol::Other(n) => *n,
        }
    }

    /// Whether flows of this protocol have ports.
    pub fn carries_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp | Protocol::Sctp)
    }

    fn from_number(number: u8) -> Self {
        match number {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            132 => Protocol::Sctp,
            1 => Protocol::Icmp,
            58 => Protocol::Icmp6,
            n => Protocol::Other(n),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            "icmp" => Ok(Protocol::Icmp),
            "icmp6" | "icmpv6" => Ok(Protocol::Icmp6),
            other => other
                .parse::<u8>()
                .map(Protocol::from_number)
                .map_err(|_| format!("unknown protocol `{text}`")),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
            Protocol::Sctp => f.write_str("sctp"),
            Protocol::Icmp => f.write_str("icmp"),
            Protocol::Icmp6 => f.write_str("icmp6"),
            Protocol::Other(n) => write!(f, "{n}"),
        }
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.to_string()
    }
}

/// Parse `a.b.c.d/len` or a bare address (as `/32`).
pub fn parse_network(text: &str) -> Option<Ipv4Network> {
    text.trim().parse().ok()
}

/// `0.0.0.0/0`.
pub fn any_network() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0)
        .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::UNSPECIFIED))
}

/// The network an interface address sits in: `192.168.1.1/24` gives `192.168.1.0/24`.
pub fn subnet_of(addr: Ipv4Network) -> Ipv4Network {
    Ipv4Network::new(addr.network(), addr.prefix()).unwrap_or(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(text: &str) -> Ipv4Addr {
        text.parse().expect("ip")
    }

    #[test]
    fn spans_parse_hosts_ranges_and_networks() {
        assert_eq!(IpSpan::parse("10.0.0.1"), Some(IpSpan::Host(ip("10.0.0.1"))));
        assert_eq!(
            IpSpan::parse("10.0.0.9-10.0.0.1"),
            Some(IpSpan::Range(ip("10.0.0.1"), ip("10.0.0.9")))
        );
        let net = IpSpan::parse("10.0.0.0/24").expect("network");
        assert!(net.contains(ip("10.0.0.200")));
        assert!(!net.contains(ip("10.0.1.1")));
        assert_eq!(IpSpan::parse("nonsense"), None);
    }

    #[test]
    fn port_specs_carry_optional_source_range() {
        let spec: PortSpec = "8000-8080:1024-65535".parse().expect("spec");
        assert_eq!(spec.dst, PortRange { low: 8000, high: 8080 });
        assert_eq!(spec.src, Some(PortRange { low: 1024, high: 65535 }));
        assert!("90-80".parse::<PortRange>().is_err());
    }

    #[test]
    fn port_mapping_uses_offset() {
        let ext: PortRange = "8000-8010".parse().expect("range");
        let mapped: PortRange = "80-90".parse().expect("range");
        assert_eq!(ext.map_onto(8005, mapped), 85);
        assert_eq!(ext.map_onto(8005, PortRange::single(443)), 443);
    }

    #[test]
    fn protocols_accept_names_and_numbers() {
        assert_eq!("TCP".parse::<Protocol>(), Ok(Protocol::Tcp));
        assert_eq!("17".parse::<Protocol>(), Ok(Protocol::Udp));
        assert_eq!("47".parse::<Protocol>(), Ok(Protocol::Other(47)));
        assert!("gre".parse::<Protocol>().is_err());
    }

    #[test]
    fn interface_address_maps_to_its_subnet() {
        let addr = parse_network("192.168.1.1/24").expect("addr");
        assert_eq!(subnet_of(addr).to_string(), "192.168.1.0/24");
    }
}
