use std::collections::BTreeMap;

use conftree_core::{BlockBody, Entry, Fields};

use super::system::text;
use super::{HandlerContext, HandlerError, SectionHandler, SectionRegistration};
use crate::model::net::{any_network, parse_network, IpSpan, PortRange, PortSpec};
use crate::model::{
    Address, AddressKind, DosPolicy, Group, IpPool, Policy, PolicyAction, Service,
    ServiceProtocol, Vip, VipGroup,
};

/// Security profile keys carried over from policies.
pub const PROFILE_KEYS: &[&str] = &[
    "av_profile",
    "webfilter_profile",
    "ips_sensor",
    "application_list",
    "ssl_ssh_profile",
    "dnsfilter_profile",
    "dlp_sensor",
    "icap_profile",
];

pub struct FirewallAddress;

inventory::submit! {
    SectionRegistration { section: "firewall address", handler: &FirewallAddress }
}

impl SectionHandler for FirewallAddress {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let kind = address_kind(ctx, &name, &fields);
            let address = Address {
                name: name.clone(),
                kind,
                associated_interface: text(&fields, "associated_interface"),
                comment: text(&fields, "comment"),
            };
            ctx.model.addresses.insert(name, address);
        }
        Ok(())
    }
}

fn address_kind(ctx: &mut HandlerContext<'_, '_, '_>, name: &str, fields: &Fields) -> AddressKind {
    let kind = fields.get_str("type").unwrap_or("ipmask");
    match kind {
        "ipmask" => match fields.get_str("subnet") {
            // An unset subnet is not exported and means 0.0.0.0/0.
            None => AddressKind::Subnet(any_network()),
            Some(raw) => match parse_network(raw) {
                Some(net) => AddressKind::Subnet(net),
                None => {
                    ctx.warn(format!("`{name}`: invalid subnet `{raw}`"));
                    AddressKind::Other(raw.to_string())
                }
            },
        },
        "iprange" => {
            let start = ctx.ipv4(fields, name, "start_ip");
            let end = ctx.ipv4(fields, name, "end_ip");
            match (start, end) {
                (Some(start), Some(end)) if start <= end => AddressKind::Range { start, end },
                (Some(start), Some(end)) => AddressKind::Range {
                    start: end,
                    end: start,
                },
                _ => {
                    ctx.warn(format!("`{name}`: iprange without start-ip/end-ip"));
                    AddressKind::Other(kind.to_string())
                }
            }
        }
        "fqdn" | "wildcard-fqdn" => AddressKind::Fqdn(
            text(fields, "fqdn")
                .or_else(|| text(fields, "wildcard_fqdn"))
                .unwrap_or_default(),
        ),
        "wildcard" => AddressKind::Wildcard(fields.get_list("wildcard").join(" ")),
        "geography" => AddressKind::Geography(text(fields, "country").unwrap_or_default()),
        "interface-subnet" => {
            AddressKind::InterfaceSubnet(text(fields, "interface").unwrap_or_default())
        }
        "dynamic" => AddressKind::Dynamic(text(fields, "sdn").unwrap_or_default()),
        other => AddressKind::Other(other.to_string()),
    }
}

/// `config firewall addrgrp`.
pub struct FirewallAddrGrp;

inventory::submit! {
    SectionRegistration { section: "firewall addrgrp", handler: &FirewallAddrGrp }
}

impl SectionHandler for FirewallAddrGrp {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for entry in ctx.entries(body)? {
            let group = group(entry);
            ctx.model.address_groups.insert(group.name.clone(), group);
        }
        Ok(())
    }
}

/// `config firewall service custom`.
pub struct FirewallServiceCustom;

inventory::submit! {
    SectionRegistration { section: "firewall service custom", handler: &FirewallServiceCustom }
}

impl SectionHandler for FirewallServiceCustom {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let protocol = fields
                .get_str("protocol")
                .map(ServiceProtocol::parse)
                .unwrap_or(ServiceProtocol::TcpUdpSctp);
            let service = Service {
                name: name.clone(),
                protocol,
                tcp: port_specs(ctx, &name, &fields, "tcp_portrange"),
                udp: port_specs(ctx, &name, &fields, "udp_portrange"),
                sctp: port_specs(ctx, &name, &fields, "sctp_portrange"),
                icmp_type: ctx.number(&fields, &name, "icmptype"),
                icmp_code: ctx.number(&fields, &name, "icmpcode"),
                protocol_number: ctx.number(&fields, &name, "protocol_number"),
                category: text(&fields, "category"),
                comment: text(&fields, "comment"),
            };
            ctx.model.services.insert(name, service);
        }
        Ok(())
    }
}

fn port_specs(
    ctx: &mut HandlerContext<'_, '_, '_>,
    name: &str,
    fields: &Fields,
    key: &str,
) -> Vec<PortSpec> {
    let mut specs = Vec::new();
    for token in fields.get_list(key) {
        match token.parse::<PortSpec>() {
            Ok(spec) => specs.push(spec),
            Err(err) => ctx.warn(format!("`{name}`: {key}: {err}")),
        }
    }
    specs
}

/// `config firewall service group`.
pub struct FirewallServiceGroup;

inventory::submit! {
    SectionRegistration { section: "firewall service group", handler: &FirewallServiceGroup }
}

impl SectionHandler for FirewallServiceGroup {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for entry in ctx.entries(body)? {
            let group = group(entry);
            ctx.model.service_groups.insert(group.name.clone(), group);
        }
        Ok(())
    }
}

fn group(entry: Entry) -> Group {
    Group {
        members: entry.fields.get_list("member"),
        comment: text(&entry.fields, "comment"),
        name: entry.name,
    }
}

/// `config firewall policy`; entry order is evaluation order.
pub struct FirewallPolicy;

inventory::submit! {
    SectionRegistration { section: "firewall policy", handler: &FirewallPolicy }
}

impl SectionHandler for FirewallPolicy {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let action = match fields.get_str("action") {
                None => PolicyAction::Deny,
                Some(raw) => PolicyAction::parse(raw).unwrap_or_else(|| {
                    ctx.warn(format!("policy {name}: unknown action `{raw}`, treating as deny"));
                    PolicyAction::Deny
                }),
            };
            let profiles: BTreeMap<String, String> = PROFILE_KEYS
                .iter()
                .filter_map(|key| text(&fields, key).map(|value| ((*key).to_string(), value)))
                .collect();
            let policy = Policy {
                id: name,
                name: text(&fields, "name"),
                enabled: fields.flag("status", true),
                srcintf: fields.get_list("srcintf"),
                dstintf: fields.get_list("dstintf"),
                srcaddr: fields.get_list("srcaddr"),
                dstaddr: fields.get_list("dstaddr"),
                service: fields.get_list("service"),
                action,
                nat: fields.flag("nat", false),
                ippool: fields.flag("ippool", false),
                poolname: fields.get_list("poolname"),
                schedule: text(&fields, "schedule"),
                profiles,
                logtraffic: text(&fields, "logtraffic"),
                comments: text(&fields, "comments"),
            };
            ctx.model.policies.push(policy);
        }
        Ok(())
    }
}

/// `config firewall vip`.
pub struct FirewallVip;

inventory::submit! {
    SectionRegistration { section: "firewall vip", handler: &FirewallVip }
}

impl SectionHandler for FirewallVip {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let raw_ext = fields.get_str("extip").unwrap_or("0.0.0.0");
            let Some(extip) = IpSpan::parse(raw_ext) else {
                ctx.warn(format!("vip `{name}`: invalid extip `{raw_ext}`, skipped"));
                continue;
            };
            let mut mapped = Vec::new();
            for token in fields.get_list("mappedip") {
                match IpSpan::parse(&token) {
                    Some(span) => mapped.push(span),
                    None => ctx.warn(format!("vip `{name}`: invalid mappedip `{token}`")),
                }
            }
            let vip = Vip {
                name: name.clone(),
                extip,
                mapped,
                extintf: text(&fields, "extintf"),
                portforward: fields.flag("portforward", false),
                protocol: text(&fields, "protocol").unwrap_or_else(|| "tcp".to_string()),
                extport: port_range(ctx, &name, &fields, "extport"),
                mappedport: port_range(ctx, &name, &fields, "mappedport"),
                comment: text(&fields, "comment"),
            };
            ctx.model.vips.insert(name, vip);
        }
        Ok(())
    }
}

fn port_range(
    ctx: &mut HandlerContext<'_, '_, '_>,
    name: &str,
    fields: &Fields,
    key: &str,
) -> Option<PortRange> {
    let raw = fields.get_str(key)?;
    match raw.parse() {
        Ok(range) => Some(range),
        Err(err) => {
            ctx.warn(format!("vip `{name}`: {key}: {err}"));
            None
        }
    }
}

/// `config firewall vipgrp`.
pub struct FirewallVipGrp;

inventory::submit! {
    SectionRegistration { section: "firewall vipgrp", handler: &FirewallVipGrp }
}

impl SectionHandler for FirewallVipGrp {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let group = VipGroup {
                name: name.clone(),
                members: fields.get_list("member"),
                interface: text(&fields, "interface"),
                comment: text(&fields, "comments"),
            };
            ctx.model.vip_groups.insert(name, group);
        }
        Ok(())
    }
}

/// `config firewall ippool`.
pub struct FirewallIpPool;

inventory::submit! {
    SectionRegistration { section: "firewall ippool", handler: &FirewallIpPool }
}

impl SectionHandler for FirewallIpPool {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let pool = IpPool {
                name: name.clone(),
                kind: text(&fields, "type").unwrap_or_else(|| "overload".to_string()),
                startip: ctx.ipv4(&fields, &name, "startip"),
                endip: ctx.ipv4(&fields, &name, "endip"),
                comment: text(&fields, "comments"),
            };
            ctx.model.ippools.insert(name, pool);
        }
        Ok(())
    }
}

/// `config firewall DoS-policy`.
pub struct FirewallDosPolicy;

inventory::submit! {
    SectionRegistration { section: "firewall DoS-policy", handler: &FirewallDosPolicy }
}

impl SectionHandler for FirewallDosPolicy {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            ctx.model.dos_policies.push(DosPolicy {
                id: name,
                interface: text(&fields, "interface"),
                srcaddr: fields.get_list("srcaddr"),
                dstaddr: fields.get_list("dstaddr"),
                service: fields.get_list("service"),
                enabled: fields.flag("status", true),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use crate::model::net::{IpSpan, PortRange};
    use crate::model::{AddressKind, PolicyAction, ServiceProtocol};
    use crate::parse::parse;

    #[test]
    fn address_types_are_typed() {
        let text = r#"config firewall address
    edit "all"
    next
    edit "lan"
        set subnet 192.168.1.0 255.255.255.0
        set associated-interface "port1"
    next
    edit "pool"
        set type iprange
        set start-ip 10.0.0.20
        set end-ip 10.0.0.10
    next
    edit "site"
        set type fqdn
        set fqdn "www.example.com"
    next
    edit "nl"
        set type geography
        set country "NL"
    next
end
"#;
        let (config, warnings) = parse(text);
        assert!(warnings.is_empty(), "{warnings:?}");
        let addresses = &config.root.addresses;
        assert_eq!(
            addresses["all"].kind,
            AddressKind::Subnet("0.0.0.0/0".parse().expect("net"))
        );
        assert_eq!(
            addresses["lan"].kind,
            AddressKind::Subnet("192.168.1.0/24".parse().expect("net"))
        );
        assert_eq!(addresses["lan"].associated_interface.as_deref(), Some("port1"));
        assert_eq!(
            addresses["pool"].kind,
            AddressKind::Range {
                start: Ipv4Addr::new(10, 0, 0, 10),
                end: Ipv4Addr::new(10, 0, 0, 20)
            }
        );
        assert_eq!(addresses["site"].kind, AddressKind::Fqdn("www.example.com".into()));
        assert_eq!(addresses["nl"].kind, AddressKind::Geography("NL".into()));
    }

    #[test]
    fn services_parse_port_ranges_and_icmp() {
        let text = r#"config firewall service custom
    edit "web-alt"
        set tcp-portrange 8080 8443-8444:1024-65535
    next
    edit "echo"
        set protocol ICMP
        set icmptype 8
    next
    edit "gre"
        set protocol IP
        set protocol-number 47
    next
end
"#;
        let (config, _) = parse(text);
        let web = &config.root.services["web-alt"];
        assert_eq!(web.protocol, ServiceProtocol::TcpUdpSctp);
        assert_eq!(web.tcp.len(), 2);
        assert_eq!(web.tcp[1].dst, PortRange { low: 8443, high: 8444 });
        assert_eq!(config.root.services["echo"].icmp_type, Some(8));
        assert_eq!(config.root.services["gre"].protocol_number, Some(47));
    }

    #[test]
    fn policies_keep_order_profiles_and_defaults() {
        let text = r#"config firewall policy
    edit 9
        set srcintf "port1"
        set dstintf "wan1"
        set srcaddr "all"
        set dstaddr "all"
        set action accept
        set service "HTTP" "HTTPS"
        set nat enable
        set av-profile "default"
        set ips-sensor "protect"
    next
    edit 2
        set status disable
    next
end
"#;
        let (config, _) = parse(text);
        let policies = &config.root.policies;
        assert_eq!(policies[0].id, "9");
        assert_eq!(policies[0].action, PolicyAction::Accept);
        assert!(policies[0].nat);
        assert_eq!(policies[0].service, vec!["HTTP", "HTTPS"]);
        assert_eq!(policies[0].profiles["av_profile"], "default");
        assert_eq!(policies[0].profiles["ips_sensor"], "protect");
        assert_eq!(policies[1].id, "2");
        assert!(!policies[1].enabled);
        assert_eq!(policies[1].action, PolicyAction::Deny);
    }

    #[test]
    fn vips_carry_mapping_and_port_forward() {
        let text = r#"config firewall vip
    edit "web"
        set extip 203.0.113.10
        set mappedip "10.0.0.10-10.0.0.11"
        set extintf "wan1"
        set portforward enable
        set extport 8080
        set mappedport 80
    next
end
config firewall ippool
    edit "out"
        set startip 203.0.113.50
        set endip 203.0.113.60
    next
end
"#;
        let (config, _) = parse(text);
        let vip = &config.root.vips["web"];
        assert_eq!(vip.extip, IpSpan::Host(Ipv4Addr::new(203, 0, 113, 10)));
        assert_eq!(
            vip.mapped,
            vec![IpSpan::Range(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 11))]
        );
        assert!(vip.portforward);
        assert_eq!(vip.protocol, "tcp");
        assert_eq!(vip.mappedport, Some(PortRange::single(80)));
        let pool = &config.root.ippools["out"];
        assert_eq!(pool.kind, "overload");
        assert_eq!(pool.startip, Some(Ipv4Addr::new(203, 0, 113, 50)));
    }
}
