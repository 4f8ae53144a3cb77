use conftree_core::{BlockBody, Entry};

use super::system::text;
use super::{HandlerContext, HandlerError, SectionHandler, SectionRegistration};
use crate::model::net::any_network;
use crate::model::Route;

/// Default administrative distance of a static route.
pub const DEFAULT_DISTANCE: u32 = 10;

/// `config router static`.
pub struct RouterStatic;

inventory::submit! {
    SectionRegistration { section: "router static", handler: &RouterStatic }
}

impl SectionHandler for RouterStatic {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        for Entry { name, fields } in ctx.entries(body)? {
            let dst = match fields.get_str("dst") {
                // `ctx.network` folds 0.0.0.0/0 into `None` as well.
                Some(_) => ctx.network(&fields, &name, "dst").unwrap_or_else(any_network),
                None => any_network(),
            };
            let route = Route {
                id: name.clone(),
                dst,
                dstaddr: text(&fields, "dstaddr"),
                gateway: ctx.ipv4(&fields, &name, "gateway"),
                device: text(&fields, "device"),
                distance: ctx
                    .number(&fields, &name, "distance")
                    .unwrap_or(DEFAULT_DISTANCE),
                priority: ctx.number(&fields, &name, "priority").unwrap_or(0),
                enabled: fields.flag("status", true),
                blackhole: fields.flag("blackhole", false),
                comment: text(&fields, "comment"),
            };
            ctx.model.routes.push(route);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::parse::parse;

    #[test]
    fn static_routes_default_to_zero_route_and_distance_ten() {
        let text = r#"config router static
    edit 1
        set gateway 203.0.113.1
        set device "wan1"
    next
    edit 2
        set dst 10.20.0.0 255.255.0.0
        set device "port2"
        set distance 5
        set status disable
    next
end
"#;
        let (config, warnings) = parse(text);
        assert!(warnings.is_empty(), "{warnings:?}");
        let routes = &config.root.routes;
        assert_eq!(routes[0].dst.prefix(), 0);
        assert_eq!(routes[0].gateway, Some(Ipv4Addr::new(203, 0, 113, 1)));
        assert_eq!(routes[0].distance, 10);
        assert_eq!(routes[1].dst.to_string(), "10.20.0.0/16");
        assert_eq!(routes[1].distance, 5);
        assert!(!routes[1].enabled);
    }
}
