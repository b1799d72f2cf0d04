use thiserror::Error;

use crate::loadbalancer::error::LbError;
use crate::packet::error::PacketError;
use crate::topology::error::TopologyError;

/// Aggregate error for control-plane operations. Nothing here is fatal at
/// runtime: callers log the error and drop the offending event.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("load balancer error: {0}")]
    LoadBalancer(#[from] LbError),

    #[error("malformed packet: {0}")]
    Packet(#[from] PacketError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_error_converts() {
        let e: DomainError = PacketError::Truncated {
            layer: "ethernet",
            needed: 14,
            have: 3,
        }
        .into();
        assert!(matches!(e, DomainError::Packet(_)));
    }

    #[test]
    fn lb_error_converts() {
        let e: DomainError = LbError::NoBackends.into();
        assert!(matches!(e, DomainError::LoadBalancer(_)));
    }
}
