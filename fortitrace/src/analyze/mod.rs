//! Which objects an enabled policy actually reaches.
//!
//! Every run starts from empty sets: enabled policies are walked first, then
//! routes, VPN selectors and DHCP servers that hang off something already
//! marked are added until nothing changes. Group nesting depth and membership
//! cycles are computed alongside.

mod depth;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

pub use depth::{group_depths, DepthReport, GroupDepth};

use crate::model::net::IpSpan;
use crate::model::{AddressKind, ConfigModel, ObjectClass, Policy, Selector};
use crate::resolve::{is_any_address, is_any_interface, is_any_service};
use crate::settings::Exclusions;
use crate::trace::routing::egress_device;

/// Kind of group a cycle was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Address,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCycle {
    pub kind: GroupKind,
    pub path: Vec<String>,
}

/// Direct references from enabled policies, by object name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceCounts {
    pub interfaces: BTreeMap<String, usize>,
    pub addresses: BTreeMap<String, usize>,
    pub services: BTreeMap<String, usize>,
}

/// Result of one analysis run.
///
/// For every class, `used`, `unused` and `excluded` are disjoint and together
/// cover every defined object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSets {
    pub used: BTreeMap<ObjectClass, BTreeSet<String>>,
    pub unused: BTreeMap<ObjectClass, BTreeSet<String>>,
    /// Defined, not used, and on a built-in exclusion list.
    pub excluded: BTreeMap<ObjectClass, BTreeSet<String>>,
    pub address_group_depth: BTreeMap<String, GroupDepth>,
    pub service_group_depth: BTreeMap<String, GroupDepth>,
    pub cycles: Vec<GroupCycle>,
    pub references: ReferenceCounts,
}

impl UsageSets {
    pub fn is_used(&self, class: ObjectClass, name: &str) -> bool {
        self.used.get(&class).is_some_and(|set| set.contains(name))
    }

    pub fn is_unused(&self, class: ObjectClass, name: &str) -> bool {
        self.unused.get(&class).is_some_and(|set| set.contains(name))
    }

    pub fn unused_count(&self) -> usize {
        self.unused.values().map(BTreeSet::len).sum()
    }
}

/// Analyze with the default exclusion lists.
pub fn analyze(model: &ConfigModel) -> UsageSets {
    analyze_with(model, &Exclusions::default())
}

pub fn analyze_with(model: &ConfigModel, exclusions: &Exclusions) -> UsageSets {
    let mut marker = Marker {
        model,
        used: BTreeMap::new(),
    };
    let mut references = ReferenceCounts::default();

    for policy in model.policies.iter().filter(|p| p.enabled) {
        if !references_specific_object(policy) {
            debug!(policy = %policy.id, "policy names only wildcards, skipped");
            continue;
        }
        count_references(policy, &mut references);
        marker.mark_policy(policy);
    }

    if let Some(sdwan) = model.sdwan.as_ref().filter(|s| s.enabled) {
        for member in &sdwan.members {
            marker.mark_interface_ref(&member.interface);
        }
    }

    loop {
        let before = marker.total();
        marker.mark_dependents();
        if marker.total() == before {
            break;
        }
    }

    let mut sets = UsageSets {
        references,
        ..UsageSets::default()
    };
    for class in ObjectClass::ALL {
        let used = marker.used.remove(&class).unwrap_or_default();
        let (excluded, unused): (BTreeSet<String>, BTreeSet<String>) = model
            .names(class)
            .into_iter()
            .filter(|name| !used.contains(name))
            .partition(|name| is_excluded(exclusions, class, name));
        sets.used.insert(class, used);
        sets.unused.insert(class, unused);
        sets.excluded.insert(class, excluded);
    }

    let addresses = group_depths(&model.address_groups);
    let services = group_depths(&model.service_groups);
    sets.cycles.extend(addresses.cycles.into_iter().map(|path| GroupCycle {
        kind: GroupKind::Address,
        path,
    }));
    sets.cycles.extend(services.cycles.into_iter().map(|path| GroupCycle {
        kind: GroupKind::Service,
        path,
    }));
    sets.address_group_depth = addresses.depths;
    sets.service_group_depth = services.depths;
    sets
}

fn is_excluded(exclusions: &Exclusions, class: ObjectClass, name: &str) -> bool {
    match class {
        ObjectClass::Address | ObjectClass::AddressGroup => exclusions.excludes_address(name),
        ObjectClass::Service | ObjectClass::ServiceGroup => exclusions.excludes_service(name),
        ObjectClass::Interface | ObjectClass::Zone => exclusions.excludes_interface(name),
        _ => false,
    }
}

fn references_specific_object(policy: &Policy) -> bool {
    policy.srcintf.iter().chain(&policy.dstintf).any(|n| !is_any_interface(n))
        || policy.srcaddr.iter().chain(&policy.dstaddr).any(|n| !is_any_address(n))
        || policy.service.iter().any(|n| !is_any_service(n))
}

fn count_references(policy: &Policy, counts: &mut ReferenceCounts) {
    fn bump(map: &mut BTreeMap<String, usize>, names: &[String]) {
        for name in names {
            *map.entry(name.clone()).or_default() += 1;
        }
    }
    bump(&mut counts.interfaces, &policy.srcintf);
    bump(&mut counts.interfaces, &policy.dstintf);
    bump(&mut counts.addresses, &policy.srcaddr);
    bump(&mut counts.addresses, &policy.dstaddr);
    bump(&mut counts.services, &policy.service);
}

struct Marker<'m> {
    model: &'m ConfigModel,
    used: BTreeMap<ObjectClass, BTreeSet<String>>,
}

impl Marker<'_> {
    /// Mark `name`; `false` if it was already marked.
    fn mark(&mut self, class: ObjectClass, name: &str) -> bool {
        self.used.entry(class).or_default().insert(name.to_string())
    }

    fn is_marked(&self, class: ObjectClass, name: &str) -> bool {
        self.used.get(&class).is_some_and(|set| set.contains(name))
    }

    fn total(&self) -> usize {
        self.used.values().map(BTreeSet::len).sum()
    }

    fn mark_policy(&mut self, policy: &Policy) {
        for name in policy.srcintf.iter().chain(&policy.dstintf) {
            self.mark_interface_ref(name);
        }
        for name in policy.srcaddr.iter().chain(&policy.dstaddr) {
            self.mark_address(name);
        }
        for name in &policy.service {
            self.mark_service(name);
        }
        if policy.nat && policy.ippool {
            for pool in &policy.poolname {
                if self.model.ippools.contains_key(pool) {
                    self.mark(ObjectClass::IpPool, pool);
                } else {
                    warn!(policy = %policy.id, pool = %pool, "policy names an undefined IP pool");
                }
            }
        }
    }

    /// An interface, zone, tunnel or SD-WAN zone name.
    fn mark_interface_ref(&mut self, name: &str) {
        if is_any_interface(name) {
            return;
        }
        let model = self.model;
        if model.interfaces.contains_key(name) {
            self.mark(ObjectClass::Interface, name);
            return;
        }
        if let Some(zone) = model.zones.get(name) {
            if self.mark(ObjectClass::Zone, name) {
                for member in &zone.interfaces {
                    self.mark_interface_ref(member);
                }
            }
            return;
        }
        if let Some(phase1) = model.phase1.get(name) {
            if self.mark(ObjectClass::Phase1, name) {
                if let Some(interface) = &phase1.interface {
                    self.mark_interface_ref(interface);
                }
            }
            return;
        }
        let sdwan_members = model
            .sdwan
            .as_ref()
            .map(|sdwan| sdwan.zone_members(name))
            .unwrap_or_default();
        if sdwan_members.is_empty() {
            warn!(interface = name, "reference to an undefined interface");
        }
        for member in sdwan_members {
            self.mark_interface_ref(member);
        }
    }

    /// Wildcard names are never marked; they sit on the exclusion list.
    fn mark_address(&mut self, name: &str) {
        if is_any_address(name) {
            return;
        }
        let model = self.model;
        if let Some(address) = model.addresses.get(name) {
            if !self.mark(ObjectClass::Address, name) {
                return;
            }
            if let Some(interface) = &address.associated_interface {
                self.mark_interface_ref(interface);
            }
            if let AddressKind::InterfaceSubnet(interface) = &address.kind {
                self.mark_interface_ref(interface);
            }
        } else if let Some(group) = model.address_groups.get(name) {
            if self.mark(ObjectClass::AddressGroup, name) {
                for member in &group.members {
                    self.mark_address(member);
                }
            }
        } else if let Some(vip) = model.vips.get(name) {
            if !self.mark(ObjectClass::Vip, name) {
                return;
            }
            if let Some(interface) = &vip.extintf {
                self.mark_interface_ref(interface);
            }
            for span in &vip.mapped {
                for address in addresses_covering(model, span) {
                    self.mark_address(&address);
                }
            }
        } else if let Some(group) = model.vip_groups.get(name) {
            if !self.mark(ObjectClass::VipGroup, name) {
                return;
            }
            if let Some(interface) = &group.interface {
                self.mark_interface_ref(interface);
            }
            for member in &group.members {
                self.mark_address(member);
            }
        } else {
            warn!(address = name, "reference to an undefined address");
        }
    }

    fn mark_service(&mut self, name: &str) {
        if is_any_service(name) {
            return;
        }
        let model = self.model;
        if model.services.contains_key(name) {
            self.mark(ObjectClass::Service, name);
        } else if let Some(group) = model.service_groups.get(name) {
            if self.mark(ObjectClass::ServiceGroup, name) {
                for member in &group.members {
                    self.mark_service(member);
                }
            }
        } else {
            warn!(service = name, "reference to an undefined service");
        }
    }

    /// Routes, Phase2 selectors and DHCP servers whose anchor is marked.
    fn mark_dependents(&mut self) {
        let model = self.model;
        for route in &model.routes {
            let Some(device) = egress_device(model, route) else {
                continue;
            };
            if !self.interface_ref_marked(&device) {
                continue;
            }
            if self.mark(ObjectClass::Route, &route.id) {
                if let Some(dstaddr) = &route.dstaddr {
                    self.mark_address(dstaddr);
                }
            }
        }

        for phase2 in model.phase2.values() {
            if !self.is_marked(ObjectClass::Phase1, &phase2.phase1name) {
                continue;
            }
            if !self.mark(ObjectClass::Phase2, &phase2.name) {
                continue;
            }
            for selector in [&phase2.src, &phase2.dst] {
                if let Selector::Name(name) = selector {
                    self.mark_address(name);
                }
            }
            if let Some(interface) = model
                .phase1
                .get(&phase2.phase1name)
                .and_then(|p| p.interface.as_deref())
            {
                self.mark_interface_ref(interface);
            }
        }

        for server in model.dhcp_servers.iter().filter(|s| s.enabled) {
            if self.is_marked(ObjectClass::Interface, &server.interface) {
                self.mark(ObjectClass::DhcpServer, &server.id);
            }
        }
    }

    fn interface_ref_marked(&self, name: &str) -> bool {
        self.is_marked(ObjectClass::Interface, name)
            || self.is_marked(ObjectClass::Zone, name)
            || self.is_marked(ObjectClass::Phase1, name)
    }
}

/// Address objects whose value is exactly `span`.
fn addresses_covering(model: &ConfigModel, span: &IpSpan) -> Vec<String> {
    model
        .addresses
        .values()
        .filter(|address| match (&address.kind, span) {
            (AddressKind::Subnet(net), IpSpan::Host(host)) => {
                net.prefix() == 32 && net.ip() == *host
            }
            (AddressKind::Subnet(net), IpSpan::Network(other)) => net == other,
            (AddressKind::Range { start, end }, IpSpan::Range(low, high)) => {
                start == low && end == high
            }
            _ => false,
        })
        .map(|address| address.name.clone())
        .collect()
}
