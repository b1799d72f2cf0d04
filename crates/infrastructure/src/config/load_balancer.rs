//! Load balancer configuration section and VIP registry construction.

use domain::loadbalancer::registry::{parse_instances, VipRegistry};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadBalancerConfig {
    /// Flow table holding VIP catch rules and connection rewrites.
    pub table: u8,

    /// VIP instances: `<vip> <vmac> <backend>[,<backend>...]` entries
    /// separated by `;`.
    #[serde(default)]
    pub instances: String,
}

impl LoadBalancerConfig {
    /// Build the VIP registry from the `instances` string.
    ///
    /// Malformed entries are logged and skipped; they never abort startup.
    pub fn vip_registry(&self) -> VipRegistry {
        let (instances, errors) = parse_instances(&self.instances);
        for error in &errors {
            warn!(%error, "skipping malformed VIP instance");
        }
        for instance in &instances {
            info!(
                vip = %instance.vip,
                vmac = %instance.vmac,
                backends = instance.backends().len(),
                "VIP instance configured"
            );
        }
        VipRegistry::new(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn config(instances: &str) -> LoadBalancerConfig {
        LoadBalancerConfig {
            table: 0,
            instances: instances.to_string(),
        }
    }

    #[test]
    fn registry_from_valid_instances() {
        let registry = config(
            "10.0.0.100 02:00:00:00:00:64 10.0.0.1,10.0.0.2;\
             10.0.0.200 02:00:00:00:00:c8 10.0.0.3",
        )
        .vip_registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(Ipv4Addr::new(10, 0, 0, 100)));
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let registry = config("nonsense;10.0.0.100 02:00:00:00:00:64 10.0.0.1").vip_registry();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_instances_yield_empty_registry() {
        assert!(config("").vip_registry().is_empty());
    }
}
