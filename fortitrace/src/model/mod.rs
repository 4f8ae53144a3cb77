//! Typed configuration model.
//!
//! One [`ConfigModel`] holds every object of a single scope. A
//! [`Configuration`] is the whole export: a root model for devices without
//! virtual domains, or a `global` model plus one model per VDOM.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use conftree_core::{BlockBody, Fields, FirmwareVersion};
use serde::Serialize;
use thiserror::Error;

pub mod net;
mod objects;

pub use objects::{
    Address, AddressKind, DhcpServer, DosPolicy, Group, Interface, IpPool, Phase1, Phase2,
    Policy, PolicyAction, Route, SdWan, SdWanMember, Selector, Service, ServiceProtocol, Vip,
    VipGroup, Zone,
};

/// A section no typed handler claimed, kept as parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawSection {
    /// Section name as written in the export.
    pub name: String,
    pub body: BlockBody,
}

/// Every object of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigModel {
    pub interfaces: BTreeMap<String, Interface>,
    pub zones: BTreeMap<String, Zone>,
    pub addresses: BTreeMap<String, Address>,
    pub address_groups: BTreeMap<String, Group>,
    pub services: BTreeMap<String, Service>,
    pub service_groups: BTreeMap<String, Group>,
    /// In evaluation order.
    pub policies: Vec<Policy>,
    pub routes: Vec<Route>,
    pub vips: BTreeMap<String, Vip>,
    pub vip_groups: BTreeMap<String, VipGroup>,
    pub ippools: BTreeMap<String, IpPool>,
    pub phase1: BTreeMap<String, Phase1>,
    pub phase2: BTreeMap<String, Phase2>,
    pub dhcp_servers: Vec<DhcpServer>,
    pub sdwan: Option<SdWan>,
    pub dos_policies: Vec<DosPolicy>,
    /// Singleton settings blocks by normalised section name.
    pub settings: BTreeMap<String, Fields>,
    /// Sections without a typed handler, by normalised section name.
    pub unhandled: BTreeMap<String, RawSection>,
}

/// Object kinds tracked by usage analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Interface,
    Zone,
    Address,
    AddressGroup,
    Service,
    ServiceGroup,
    Vip,
    VipGroup,
    IpPool,
    Route,
    Phase1,
    Phase2,
    DhcpServer,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 13] = [
        ObjectClass::Interface,
        ObjectClass::Zone,
        ObjectClass::Address,
        ObjectClass::AddressGroup,
        ObjectClass::Service,
        ObjectClass::ServiceGroup,
        ObjectClass::Vip,
        ObjectClass::VipGroup,
        ObjectClass::IpPool,
        ObjectClass::Route,
        ObjectClass::Phase1,
        ObjectClass::Phase2,
        ObjectClass::DhcpServer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Interface => "interface",
            ObjectClass::Zone => "zone",
            ObjectClass::Address => "address",
            ObjectClass::AddressGroup => "address_group",
            ObjectClass::Service => "service",
            ObjectClass::ServiceGroup => "service_group",
            ObjectClass::Vip => "vip",
            ObjectClass::VipGroup => "vip_group",
            ObjectClass::IpPool => "ippool",
            ObjectClass::Route => "route",
            ObjectClass::Phase1 => "phase1",
            ObjectClass::Phase2 => "phase2",
            ObjectClass::DhcpServer => "dhcp_server",
        }
    }
}

impl Display for ObjectClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigModel {
    /// Names of every defined object of `class`.
    ///
    /// Routes and DHCP servers are named by their `edit` id.
    pub fn names(&self, class: ObjectClass) -> Vec<String> {
        fn keys<V>(map: &BTreeMap<String, V>) -> Vec<String> {
            map.keys().cloned().collect()
        }
        match class {
            ObjectClass::Interface => keys(&self.interfaces),
            ObjectClass::Zone => keys(&self.zones),
            ObjectClass::Address => keys(&self.addresses),
            ObjectClass::AddressGroup => keys(&self.address_groups),
            ObjectClass::Service => keys(&self.services),
            ObjectClass::ServiceGroup => keys(&self.service_groups),
            ObjectClass::Vip => keys(&self.vips),
            ObjectClass::VipGroup => keys(&self.vip_groups),
            ObjectClass::IpPool => keys(&self.ippools),
            ObjectClass::Route => self.routes.iter().map(|r| r.id.clone()).collect(),
            ObjectClass::Phase1 => keys(&self.phase1),
            ObjectClass::Phase2 => keys(&self.phase2),
            ObjectClass::DhcpServer => self.dhcp_servers.iter().map(|d| d.id.clone()).collect(),
        }
    }

    /// Zone containing `interface`, if any.
    pub fn zone_of(&self, interface: &str) -> Option<&Zone> {
        self.zones
            .values()
            .find(|zone| zone.interfaces.iter().any(|m| m == interface))
    }

    /// Whether `name` is something a policy or route may use as an interface.
    pub fn is_interface_like(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
            || self.zones.contains_key(name)
            || self.phase1.contains_key(name)
            || self
                .sdwan
                .as_ref()
                .is_some_and(|sdwan| !sdwan.zone_members(name).is_empty())
    }

    pub fn policy(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// Number of objects across every typed collection.
    pub fn object_count(&self) -> usize {
        ObjectClass::ALL
            .iter()
            .map(|class| self.names(*class).len())
            .sum::<usize>()
            + self.policies.len()
            + self.dos_policies.len()
    }
}

/// Asked for a scope the export does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("unknown VDOM `{requested}` (available: {available})")]
    UnknownVdom { requested: String, available: String },
    #[error("configuration has VDOMs; pick one of: {available}")]
    VdomRequired { available: String },
    #[error("configuration has no VDOMs, cannot select `{requested}`")]
    NotVdomMode { requested: String },
}

/// A parsed export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub version: Option<FirmwareVersion>,
    /// Objects outside any VDOM (devices without VDOMs).
    pub root: ConfigModel,
    /// `config global` in VDOM mode.
    pub global: ConfigModel,
    pub vdoms: BTreeMap<String, ConfigModel>,
}

impl Configuration {
    pub fn is_vdom_mode(&self) -> bool {
        !self.vdoms.is_empty()
    }

    /// The model analysis and tracing should run against.
    ///
    /// Without VDOMs this is the root model. In VDOM mode `vdom` defaults to
    /// `root` when that VDOM exists, and the result also carries every global
    /// interface bound to the VDOM with `set vdom`.
    pub fn view(&self, vdom: Option<&str>) -> Result<Cow<'_, ConfigModel>, ScopeError> {
        if !self.is_vdom_mode() {
            return match vdom {
                None => Ok(Cow::Borrowed(&self.root)),
                Some(requested) => Err(ScopeError::NotVdomMode {
                    requested: requested.to_string(),
                }),
            };
        }

        let available = self.vdoms.keys().cloned().collect::<Vec<_>>().join(", ");
        let name = match vdom {
            Some(name) => name,
            None if self.vdoms.contains_key("root") => "root",
            None => return Err(ScopeError::VdomRequired { available }),
        };
        let Some(scoped) = self.vdoms.get(name) else {
            return Err(ScopeError::UnknownVdom {
                requested: name.to_string(),
                available,
            });
        };

        let mut merged = scoped.clone();
        for (intf_name, interface) in &self.global.interfaces {
            if interface.vdom.as_deref() == Some(name) {
                merged
                    .interfaces
                    .entry(intf_name.clone())
                    .or_insert_with(|| interface.clone());
            }
        }
        Ok(Cow::Owned(merged))
    }

    /// Scope labels in a stable order: `root` or `global` followed by VDOMs.
    pub fn scopes(&self) -> Vec<(String, &ConfigModel)> {
        if !self.is_vdom_mode() {
            return vec![("root".to_string(), &self.root)];
        }
        let mut out = vec![("global".to_string(), &self.global)];
        out.extend(self.vdoms.iter().map(|(name, model)| (format!("vdom:{name}"), model)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface(name: &str, vdom: Option<&str>) -> Interface {
        let mut intf = Interface::new(name);
        intf.vdom = vdom.map(ToOwned::to_owned);
        intf
    }

    #[test]
    fn view_without_vdoms_is_root() {
        let mut config = Configuration::default();
        config.root.interfaces.insert("port1".into(), interface("port1", None));
        let view = config.view(None).expect("view");
        assert!(view.interfaces.contains_key("port1"));
        assert!(matches!(
            config.view(Some("dmz")),
            Err(ScopeError::NotVdomMode { .. })
        ));
    }

    #[test]
    fn vdom_view_pulls_in_bound_global_interfaces() {
        let mut config = Configuration::default();
        config.vdoms.insert("root".into(), ConfigModel::default());
        config.vdoms.insert("dmz".into(), ConfigModel::default());
        config
            .global
            .interfaces
            .insert("port1".into(), interface("port1", Some("root")));
        config
            .global
            .interfaces
            .insert("port2".into(), interface("port2", Some("dmz")));

        let root = config.view(None).expect("root view");
        assert!(root.interfaces.contains_key("port1"));
        assert!(!root.interfaces.contains_key("port2"));

        let dmz = config.view(Some("dmz")).expect("dmz view");
        assert!(dmz.interfaces.contains_key("port2"));

        assert!(matches!(
            config.view(Some("lab")),
            Err(ScopeError::UnknownVdom { .. })
        ));
    }
}
