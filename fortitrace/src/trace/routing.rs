use std::cmp::Reverse;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::Serialize;
use tracing::debug;

use crate::model::net::subnet_of;
use crate::model::{ConfigModel, Route};
use crate::resolve::AddressLeaf;

use super::ingress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Synthesized from an interface subnet.
    Connected,
    Static,
}

/// One routing table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChoice {
    pub kind: RouteKind,
    /// `edit` id of a static route.
    pub id: Option<String>,
    pub dst: Ipv4Network,
    pub gateway: Option<Ipv4Addr>,
    pub device: String,
    pub distance: u32,
    pub priority: u32,
    pub blackhole: bool,
    /// Chosen because nothing more specific than `0.0.0.0/0` matched.
    pub default_fallback: bool,
}

/// Connected routes (distance 0) followed by enabled static routes.
///
/// A static route naming an address object gets one entry per network the
/// object resolves to. A route without a device takes the interface its
/// gateway is attached to.
pub fn routing_table(model: &ConfigModel) -> Vec<RouteChoice> {
    let mut table = Vec::new();
    for interface in model.interfaces.values().filter(|i| i.enabled) {
        for subnet in interface.subnets() {
            table.push(RouteChoice {
                kind: RouteKind::Connected,
                id: None,
                dst: subnet,
                gateway: None,
                device: interface.name.clone(),
                distance: 0,
                priority: 0,
                blackhole: false,
                default_fallback: false,
            });
        }
    }

    for route in model.routes.iter().filter(|r| r.enabled) {
        let Some(device) = egress_device(model, route) else {
            continue;
        };
        let destinations = match &route.dstaddr {
            Some(name) => model
                .resolve_address(name)
                .into_iter()
                .filter_map(|leaf| match leaf {
                    AddressLeaf::Network(net) => Some(subnet_of(net)),
                    _ => None,
                })
                .collect(),
            None => vec![route.dst],
        };
        for dst in destinations {
            table.push(RouteChoice {
                kind: RouteKind::Static,
                id: Some(route.id.clone()),
                dst,
                gateway: route.gateway,
                device: device.clone(),
                distance: route.distance,
                priority: route.priority,
                blackhole: route.blackhole,
                default_fallback: false,
            });
        }
    }
    table
}

/// Interface a static route sends traffic out of: its `device`, or the
/// interface its gateway is attached to. Blackhole routes report `blackhole`.
pub fn egress_device(model: &ConfigModel, route: &Route) -> Option<String> {
    if route.blackhole {
        return Some("blackhole".to_string());
    }
    match (&route.device, route.gateway) {
        (Some(device), _) => Some(device.clone()),
        (None, Some(gateway)) => match ingress::lookup(model, gateway) {
            Some(interface) => Some(interface.name.clone()),
            None => {
                debug!(route = %route.id, %gateway, "gateway is not on any attached subnet");
                None
            }
        },
        (None, None) => {
            debug!(route = %route.id, "route has neither device nor gateway");
            None
        }
    }
}

/// Best route to `dst`: longest prefix, then lowest distance, then lowest
/// priority. Equal candidates keep table order, so connected routes win.
pub fn lookup(model: &ConfigModel, dst: Ipv4Addr) -> Option<RouteChoice> {
    let mut chosen = routing_table(model)
        .into_iter()
        .filter(|route| route.dst.contains(dst))
        .min_by_key(|route| (Reverse(route.dst.prefix()), route.distance, route.priority))?;
    chosen.default_fallback = chosen.dst.prefix() == 0;
    Some(chosen)
}
