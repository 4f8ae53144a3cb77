use std::net::Ipv4Addr;

use crate::model::{ConfigModel, Interface};

/// The enabled interface whose attached subnet holds `ip`, longest prefix first.
///
/// Secondary addresses count like the primary one. Ties go to the interface
/// that sorts first by name.
pub fn lookup(model: &ConfigModel, ip: Ipv4Addr) -> Option<&Interface> {
    let mut best: Option<(u8, &Interface)> = None;
    for interface in model.interfaces.values().filter(|i| i.enabled) {
        for net in interface.addresses().filter(|net| net.contains(ip)) {
            if best.map_or(true, |(prefix, _)| net.prefix() > prefix) {
                best = Some((net.prefix(), interface));
            }
        }
    }
    best.map(|(_, interface)| interface)
}
