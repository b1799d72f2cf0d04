use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::entity::{Epoch, PortNo, SwitchId};

/// Forwarding decision at one switch toward one destination switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHop {
    pub out_port: PortNo,
}

/// All-pairs next-hop table over the active topology.
///
/// Built whole by the engine and never mutated afterwards; consumers hold it
/// behind an `Arc` and swap the entire table on recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    epoch: Epoch,
    next_hops: BTreeMap<(SwitchId, SwitchId), NextHop>,
}

impl RouteTable {
    pub(crate) fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            next_hops: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, src: SwitchId, dst: SwitchId, hop: NextHop) {
        self.next_hops.insert((src, dst), hop);
    }

    /// Epoch of the snapshot this table was computed from.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// First hop at `src` toward `dst`, if `dst` is reachable.
    pub fn next_hop(&self, src: SwitchId, dst: SwitchId) -> Option<NextHop> {
        self.next_hops.get(&(src, dst)).copied()
    }

    /// Every switch with a path toward `dst`, with its first hop.
    /// `dst` itself is not included.
    pub fn sources_reaching(&self, dst: SwitchId) -> impl Iterator<Item = (SwitchId, NextHop)> {
        self.next_hops
            .iter()
            .filter(move |((_, d), _)| *d == dst)
            .map(|((s, _), hop)| (*s, *hop))
    }

    /// Every `(src, dst, next hop)` entry in (src, dst) order.
    pub fn iter(&self) -> impl Iterator<Item = (SwitchId, SwitchId, NextHop)> {
        self.next_hops.iter().map(|((s, d), hop)| (*s, *d, *hop))
    }

    pub fn len(&self) -> usize {
        self.next_hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }
}
