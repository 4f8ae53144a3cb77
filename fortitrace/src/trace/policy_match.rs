use std::net::Ipv4Addr;

use crate::model::net::Protocol;
use crate::model::{ConfigModel, Policy};
use crate::resolve::{is_any_address, is_any_service, ServiceLeaf, L4};

use super::{FiveTuple, InterfaceRef};

/// First enabled policy, in declaration order, that matches the flow.
pub fn first_match<'m>(
    model: &'m ConfigModel,
    ingress: &InterfaceRef,
    egress: &InterfaceRef,
    flow: &FiveTuple,
) -> Option<&'m Policy> {
    model.policies.iter().filter(|p| p.enabled).find(|policy| {
        ingress.named_by(&policy.srcintf)
            && egress.named_by(&policy.dstintf)
            && address_matches(model, &policy.srcaddr, flow.src)
            && address_matches(model, &policy.dstaddr, flow.dst)
            && service_matches(model, &policy.service, flow)
    })
}

/// VIPs resolve to their external address, so a VIP entry matches on it.
fn address_matches(model: &ConfigModel, names: &[String], ip: Ipv4Addr) -> bool {
    names.iter().any(|name| {
        is_any_address(name)
            || model
                .resolve_address(name)
                .iter()
                .any(|leaf| leaf.contains(ip))
    })
}

/// Whether any of `names` admits the flow's protocol and ports.
pub fn service_matches(model: &ConfigModel, names: &[String], flow: &FiveTuple) -> bool {
    names.iter().any(|name| {
        is_any_service(name)
            || model
                .resolve_service(name)
                .iter()
                .any(|leaf| leaf_matches(leaf, flow))
    })
}

fn leaf_matches(leaf: &ServiceLeaf, flow: &FiveTuple) -> bool {
    match leaf {
        ServiceLeaf::Ports { protocol, dst, src } => {
            let same_protocol = matches!(
                (protocol, flow.protocol),
                (L4::Tcp, Protocol::Tcp) | (L4::Udp, Protocol::Udp) | (L4::Sctp, Protocol::Sctp)
            );
            let dst_ok = flow.dst_port.is_some_and(|port| dst.contains(port));
            let src_ok = match (src, flow.src_port) {
                (Some(range), Some(port)) => range.contains(port),
                _ => true,
            };
            same_protocol && dst_ok && src_ok
        }
        ServiceLeaf::Icmp {
            v6,
            icmp_type,
            icmp_code,
        } => {
            let family = if *v6 { Protocol::Icmp6 } else { Protocol::Icmp };
            if flow.protocol != family {
                return false;
            }
            // Type and code only narrow the match when the flow names them.
            let type_ok = match (icmp_type, flow.icmp_type) {
                (Some(want), Some(got)) => *want == got,
                _ => true,
            };
            let code_ok = match (icmp_code, flow.icmp_code) {
                (Some(want), Some(got)) => *want == got,
                _ => true,
            };
            type_ok && code_ok
        }
        ServiceLeaf::Ip { protocol: 0 } => true,
        ServiceLeaf::Ip { protocol } => flow.protocol.number() == *protocol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::trace::TraceRequest;

    const POLICIES: &str = r#"config system interface
    edit "port1"
        set ip 192.168.1.1 255.255.255.0
    next
    edit "port2"
        set ip 10.0.0.1 255.255.255.0
    next
end
config system zone
    edit "lan-zone"
        set interface "port1"
    next
end
config firewall address
    edit "lan"
        set subnet 192.168.1.0 255.255.255.0
    next
    edit "server"
        set subnet 10.0.0.10 255.255.255.255
    next
end
config firewall service custom
    edit "HTTPS"
        set tcp-portrange 443
    next
    edit "PING"
        set protocol ICMP
        set icmptype 8
    next
    edit "GRE"
        set protocol IP
        set protocol-number 47
    next
end
config firewall policy
    edit 10
        set srcintf "lan-zone"
        set dstintf "port2"
        set srcaddr "lan"
        set dstaddr "server"
        set service "HTTPS"
        set action deny
    next
    edit 11
        set srcintf "port1"
        set dstintf "port2"
        set srcaddr "lan"
        set dstaddr "server"
        set service "HTTPS" "PING" "GRE"
        set action accept
    next
    edit 12
        set status disable
        set srcintf "any"
        set dstintf "any"
        set srcaddr "all"
        set dstaddr "all"
        set service "ALL"
        set action accept
    next
end
"#;

    fn matched(request: TraceRequest) -> Option<String> {
        let (config, _) = parse(POLICIES);
        let model = &config.root;
        let ingress = InterfaceRef::resolve(model, "port1");
        let egress = InterfaceRef::resolve(model, "port2");
        first_match(model, &ingress, &egress, &request.flow).map(|p| p.id.clone())
    }

    fn req(protocol: &str, port: Option<&str>) -> TraceRequest {
        TraceRequest::parse("192.168.1.5", "10.0.0.10", protocol, port).expect("request")
    }

    #[test]
    fn first_declared_policy_wins() {
        assert_eq!(matched(req("tcp", Some("443"))).as_deref(), Some("10"));
    }

    #[test]
    fn service_leaves_decide_the_match() {
        assert_eq!(matched(req("icmp", None)).as_deref(), Some("11"));
        assert_eq!(matched(req("47", None)).as_deref(), Some("11"));
        assert_eq!(
            matched(req("icmp", None).with_icmp("8").expect("icmp")).as_deref(),
            Some("11")
        );
        assert_eq!(matched(req("icmp", None).with_icmp("0").expect("icmp")), None);
        // Disabled catch-all does not apply.
        assert_eq!(matched(req("udp", Some("53"))), None);
    }
}
