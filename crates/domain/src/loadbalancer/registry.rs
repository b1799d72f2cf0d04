use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::common::entity::MacAddr;

use super::entity::VipInstance;
use super::error::LbError;

/// Registry of configured VIP instances, keyed by virtual IP.
///
/// Read-mostly: built once at startup, iterated in ascending VIP order when
/// provisioning switches so rule installation is deterministic.
#[derive(Debug, Default)]
pub struct VipRegistry {
    instances: BTreeMap<Ipv4Addr, Arc<VipInstance>>,
}

impl VipRegistry {
    /// Build a registry. A duplicate VIP replaces the earlier definition,
    /// matching the most-recent-wins behavior of repeated config entries.
    pub fn new(instances: Vec<VipInstance>) -> Self {
        let mut map = BTreeMap::new();
        for instance in instances {
            map.insert(instance.vip, Arc::new(instance));
        }
        Self { instances: map }
    }

    pub fn get(&self, vip: Ipv4Addr) -> Option<&Arc<VipInstance>> {
        self.instances.get(&vip)
    }

    pub fn contains(&self, vip: Ipv4Addr) -> bool {
        self.instances.contains_key(&vip)
    }

    /// Instances in ascending VIP order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<VipInstance>> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Parse the `instances` configuration string.
///
/// Grammar: entries separated by `;`, each
/// `<vip> <vmac> <backend>[,<backend>...]`, e.g.
/// `10.0.0.100 02:00:00:00:00:64 10.0.0.1,10.0.0.2`.
///
/// Malformed entries never abort parsing; they come back as errors next to
/// the instances that did parse, so the caller can log and keep going.
pub fn parse_instances(config: &str) -> (Vec<VipInstance>, Vec<LbError>) {
    let mut instances = Vec::new();
    let mut errors = Vec::new();
    for raw in config.split(';') {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        match parse_entry(entry) {
            Ok(instance) => instances.push(instance),
            Err(e) => errors.push(e),
        }
    }
    (instances, errors)
}

fn parse_entry(entry: &str) -> Result<VipInstance, LbError> {
    let invalid = |reason: &str| LbError::InvalidInstance {
        entry: entry.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = entry.split_whitespace().collect();
    let [vip, vmac, backends] = fields.as_slice() else {
        return Err(invalid("expected '<vip> <vmac> <backends>'"));
    };

    let vip: Ipv4Addr = vip.parse().map_err(|_| invalid("bad virtual IP"))?;
    let vmac: MacAddr = vmac.parse().map_err(|_| invalid("bad virtual MAC"))?;
    let backends: Vec<Ipv4Addr> = backends
        .split(',')
        .map(|b| b.trim().parse().map_err(|_| invalid("bad backend IP")))
        .collect::<Result<_, _>>()?;

    VipInstance::new(vip, vmac, backends).map_err(|_| invalid("no backends"))
}
