use conftree_core::{BlockBody, Entry, Fields};

use super::{HandlerContext, HandlerError, SectionHandler, SectionRegistration};
use crate::model::net::{parse_network, IpSpan};
use crate::model::{DhcpServer, Interface, SdWan, SdWanMember, Zone};

/// `config system interface`, including nested `config secondaryip`.
pub struct SystemInterface;

inventory::submit! {
    SectionRegistration { section: "system interface", handler: &SystemInterface }
}

impl SectionHandler for SystemInterface {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let mut intf = Interface::new(&name);
            intf.ip = ctx.network(&fields, &name, "ip");
            for secondary in fields.get_entries("secondaryip") {
                match secondary.fields.get_str("ip").and_then(parse_network) {
                    Some(net) => intf.secondary_ips.push(net),
                    None => ctx.warn(format!(
                        "`{name}`: secondary address {} has no usable ip",
                        secondary.name
                    )),
                }
            }
            intf.role = text(&fields, "role");
            intf.vdom = text(&fields, "vdom");
            intf.enabled = fields.get_str("status") != Some("down");
            intf.alias = text(&fields, "alias");
            intf.kind = text(&fields, "type");
            intf.parent = text(&fields, "interface");
            intf.vlanid = ctx.number(&fields, &name, "vlanid");
            intf.allowaccess = fields.get_list("allowaccess");
            intf.description = text(&fields, "description");
            ctx.model.interfaces.insert(name, intf);
        }
        Ok(())
    }
}

/// `config system zone`.
pub struct SystemZone;

inventory::submit! {
    SectionRegistration { section: "system zone", handler: &SystemZone }
}

impl SectionHandler for SystemZone {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let zone = Zone {
                name: name.clone(),
                interfaces: fields.get_list("interface"),
                intrazone: text(&fields, "intrazone").unwrap_or_else(|| "deny".to_string()),
                description: text(&fields, "description"),
            };
            ctx.model.zones.insert(name, zone);
        }
        Ok(())
    }
}

/// `config system dhcp server`, including nested `config ip-range`.
pub struct SystemDhcpServer;

inventory::submit! {
    SectionRegistration { section: "system dhcp server", handler: &SystemDhcpServer }
}

impl SectionHandler for SystemDhcpServer {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        let mut servers = Vec::new();
        for Entry { name, fields } in ctx.entries(body)? {
            let interface =
                text(&fields, "interface").ok_or_else(|| ctx.missing(&name, "interface"))?;
            let ranges = fields
                .get_entries("ip_range")
                .iter()
                .filter_map(|range| {
                    let start = range.fields.get_str("start_ip")?;
                    let end = range.fields.get_str("end_ip").unwrap_or(start);
                    IpSpan::parse(&format!("{start}-{end}"))
                })
                .collect();
            let dns_servers = ["dns_server1", "dns_server2", "dns_server3"]
                .into_iter()
                .filter_map(|key| ctx.ipv4(&fields, &name, key))
                .collect();
            let server = DhcpServer {
                id: name.clone(),
                interface,
                enabled: fields.flag("status", true),
                default_gateway: ctx.ipv4(&fields, &name, "default_gateway"),
                netmask: ctx.ipv4(&fields, &name, "netmask"),
                ranges,
                dns_servers,
            };
            servers.push(server);
        }
        ctx.model.dhcp_servers.extend(servers);
        Ok(())
    }
}

/// `config system sdwan` (formerly `system virtual-wan-link`).
pub struct SystemSdWan;

inventory::submit! {
    SectionRegistration { section: "system sdwan", handler: &SystemSdWan }
}

impl SectionHandler for SystemSdWan {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        let fields = ctx.settings(body)?;
        let zones = fields
            .get_entries("zone")
            .iter()
            .map(|zone| zone.name.clone())
            .collect();
        let mut members = Vec::new();
        for member in fields.get_entries("members") {
            let Some(interface) = text(&member.fields, "interface") else {
                ctx.warn(format!("member {} has no interface", member.name));
                continue;
            };
            members.push(SdWanMember {
                id: member.name.clone(),
                interface,
                gateway: ctx.ipv4(&member.fields, &member.name, "gateway"),
                zone: text(&member.fields, "zone"),
            });
        }
        ctx.model.sdwan = Some(SdWan {
            enabled: fields.flag("status", false),
            zones,
            members,
        });
        Ok(())
    }
}

/// Singleton blocks kept as plain field maps.
pub struct SettingsBlock;

inventory::submit! {
    SectionRegistration { section: "system global", handler: &SettingsBlock }
}
inventory::submit! {
    SectionRegistration { section: "system dns", handler: &SettingsBlock }
}
inventory::submit! {
    SectionRegistration { section: "system ntp", handler: &SettingsBlock }
}
inventory::submit! {
    SectionRegistration { section: "system ha", handler: &SettingsBlock }
}
inventory::submit! {
    SectionRegistration { section: "system settings", handler: &SettingsBlock }
}
inventory::submit! {
    SectionRegistration { section: "system fortianalyzer", handler: &SettingsBlock }
}
inventory::submit! {
    SectionRegistration { section: "system fortisandbox", handler: &SettingsBlock }
}

impl SectionHandler for SettingsBlock {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        let fields = ctx.settings(body)?;
        let slot = ctx.model.settings.entry(ctx.section.clone()).or_default();
        for (key, value) in fields.iter() {
            slot.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Scalar text of `key`; empty strings count as unset.
pub(super) fn text(fields: &Fields, key: &str) -> Option<String> {
    fields
        .get_str(key)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
