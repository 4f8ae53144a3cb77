use conftree_core::{BlockBody, Entry, Fields};

use super::system::text;
use super::{HandlerContext, HandlerError, SectionHandler, SectionRegistration};
use crate::model::{Phase1, Phase2, Selector};

/// `config vpn ipsec phase1-interface`.
pub struct IpsecPhase1;

inventory::submit! {
    SectionRegistration { section: "vpn ipsec phase1-interface", handler: &IpsecPhase1 }
}

impl SectionHandler for IpsecPhase1 {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let phase1 = Phase1 {
                name: name.clone(),
                interface: text(&fields, "interface"),
                remote_gw: text(&fields, "remote_gw"),
                kind: text(&fields, "type"),
                proposal: fields.get_list("proposal"),
                comment: text(&fields, "comments"),
            };
            ctx.model.phase1.insert(name, phase1);
        }
        Ok(())
    }
}

/// `config vpn ipsec phase2-interface`; each entry must name its Phase1.
pub struct IpsecPhase2;

inventory::submit! {
    SectionRegistration { section: "vpn ipsec phase2-interface", handler: &IpsecPhase2 }
}

impl SectionHandler for IpsecPhase2 {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        let mut parsed = Vec::new();
        for Entry { name, fields } in ctx.entries(body)? {
            let phase1name =
                text(&fields, "phase1name").ok_or_else(|| ctx.missing(&name, "phase1name"))?;
            let phase2 = Phase2 {
                src: selector(ctx, &name, &fields, "src"),
                dst: selector(ctx, &name, &fields, "dst"),
                name: name.clone(),
                phase1name,
                proposal: fields.get_list("proposal"),
                comment: text(&fields, "comments"),
            };
            parsed.push(phase2);
        }
        // Nothing is kept from a block that fails part way.
        for phase2 in parsed {
            ctx.model.phase2.insert(phase2.name.clone(), phase2);
        }
        Ok(())
    }
}

/// Read `<side>-addr-type` and the matching value keys.
fn selector(
    ctx: &mut HandlerContext<'_, '_, '_>,
    name: &str,
    fields: &Fields,
    side: &str,
) -> Selector {
    let kind = fields
        .get_str(&format!("{side}_addr_type"))
        .unwrap_or("subnet");
    match kind {
        "name" => text(fields, &format!("{side}_name"))
            .map(Selector::Name)
            .unwrap_or(Selector::Any),
        "range" => {
            let start = ctx.ipv4(fields, name, &format!("{side}_start_ip"));
            let end = ctx.ipv4(fields, name, &format!("{side}_end_ip"));
            match (start, end) {
                (Some(start), Some(end)) => Selector::Range { start, end },
                _ => Selector::Any,
            }
        }
        "ip" => ctx
            .network(fields, name, &format!("{side}_start_ip"))
            .map(Selector::Subnet)
            .unwrap_or(Selector::Any),
        _ => ctx
            .network(fields, name, &format!("{side}_subnet"))
            .map(Selector::Subnet)
            .unwrap_or(Selector::Any),
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Selector;
    use crate::parse::parse;

    #[test]
    fn phase2_selectors_and_old_section_names() {
        let text = r#"config vpn ipsec phase1
    edit "to-branch"
        set interface "wan1"
        set remote-gw 198.51.100.7
    next
end
config vpn ipsec phase2
    edit "to-branch-p2"
        set phase1name "to-branch"
        set src-subnet 10.0.0.0 255.255.255.0
        set dst-addr-type name
        set dst-name "branch-lan"
    next
end
"#;
        let (config, warnings) = parse(text);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(
            config.root.phase1["to-branch"].remote_gw.as_deref(),
            Some("198.51.100.7")
        );
        let p2 = &config.root.phase2["to-branch-p2"];
        assert_eq!(p2.phase1name, "to-branch");
        assert_eq!(p2.src, Selector::Subnet("10.0.0.0/24".parse().expect("net")));
        assert_eq!(p2.dst, Selector::Name("branch-lan".into()));
    }

    #[test]
    fn phase2_block_with_an_orphan_entry_is_dropped_whole() {
        let text = r#"config vpn ipsec phase2-interface
    edit "good"
        set phase1name "tun1"
    next
    edit "orphan"
        set src-subnet 10.0.0.0 255.255.255.0
    next
    edit "after"
        set phase1name "tun1"
    next
end
config firewall address
    edit "kept"
    next
end
"#;
        let (config, warnings) = parse(text);
        assert!(config.root.phase2.is_empty());
        assert!(config.root.addresses.contains_key("kept"));
        assert!(warnings.iter().any(|w| w.message.contains("phase1name")));
    }
}
