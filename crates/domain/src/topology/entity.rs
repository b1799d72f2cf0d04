use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::common::entity::{Epoch, HostKey, MacAddr, PortNo, SwitchId};

/// A switch currently connected to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub id: SwitchId,
    pub connected: bool,
}

/// One directed half of a discovered inter-switch link.
///
/// The store keeps at most one half-link per `(src, dst)` pair; parallel
/// links between the same switches are coalesced to the most recently
/// observed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub src: SwitchId,
    pub src_port: PortNo,
    pub dst: SwitchId,
    pub dst_port: PortNo,
}

/// Where a host hangs off the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub switch: SwitchId,
    pub port: PortNo,
}

/// An end host learned from the device service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub key: HostKey,
    pub mac: MacAddr,
    pub ipv4: Option<Ipv4Addr>,
    pub attachment: Option<Attachment>,
}

impl Host {
    /// A host gets forwarding rules only once both its address and its
    /// attachment point are known.
    pub fn is_routable(&self) -> bool {
        self.ipv4.is_some() && self.attachment.is_some()
    }
}

/// Which downstream recomputation a store mutation requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSet {
    /// Nothing changed; no downstream work.
    None,
    /// Switches or links changed; recompute routes and sweep all hosts.
    TopologyChanged,
    /// A single host appeared or changed; reconcile that host only.
    HostChanged(HostKey),
    /// A host's IPv4 address changed (or was lost); rules for the old
    /// address must be withdrawn before the host is reconciled.
    HostMoved { key: HostKey, old_ipv4: Ipv4Addr },
    /// A host left the network.
    HostRemoved {
        key: HostKey,
        ipv4: Option<Ipv4Addr>,
    },
}

/// Neighbor entry in the active adjacency, sorted by (neighbor, port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Adjacency {
    pub neighbor: SwitchId,
    pub out_port: PortNo,
}

/// Immutable, consistent view of the topology at a given epoch.
///
/// Only links whose endpoints are both connected appear in the adjacency;
/// half-links referencing an unknown switch stay dormant in the store until
/// the switch shows up.
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    pub epoch: Epoch,
    pub switches: BTreeSet<SwitchId>,
    pub adjacency: BTreeMap<SwitchId, Vec<Adjacency>>,
    pub hosts: Vec<Host>,
}

impl TopologySnapshot {
    pub fn contains_switch(&self, id: SwitchId) -> bool {
        self.switches.contains(&id)
    }

    pub fn neighbors(&self, id: SwitchId) -> &[Adjacency] {
        self.adjacency.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn routable_hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(|h| h.is_routable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(ipv4: Option<Ipv4Addr>, attachment: Option<Attachment>) -> Host {
        Host {
            key: HostKey("h1".to_string()),
            mac: MacAddr([2, 0, 0, 0, 0, 1]),
            ipv4,
            attachment,
        }
    }

    #[test]
    fn host_routable_requires_both() {
        let attach = Attachment {
            switch: SwitchId(1),
            port: 1,
        };
        assert!(host(Some(Ipv4Addr::new(10, 0, 0, 1)), Some(attach)).is_routable());
        assert!(!host(None, Some(attach)).is_routable());
        assert!(!host(Some(Ipv4Addr::new(10, 0, 0, 1)), None).is_routable());
        assert!(!host(None, None).is_routable());
    }

    #[test]
    fn snapshot_neighbors_default_empty() {
        let snapshot = TopologySnapshot::default();
        assert!(snapshot.neighbors(SwitchId(9)).is_empty());
        assert!(!snapshot.contains_switch(SwitchId(9)));
    }
}
