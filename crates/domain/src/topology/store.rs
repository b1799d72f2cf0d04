use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use crate::common::entity::{Epoch, HostKey, MacAddr, PortNo, SwitchId};

use super::entity::{Adjacency, Attachment, ChangeSet, Host, Link, Switch, TopologySnapshot};

/// Single source of truth for switches, links, and hosts.
///
/// Every mutation returns a [`ChangeSet`] telling the caller which
/// recomputation it owes, and bumps the epoch only when state actually
/// changed, so replaying an event is a no-op all the way down.
#[derive(Debug, Default)]
pub struct TopologyStore {
    switches: BTreeMap<SwitchId, Switch>,
    links: BTreeMap<(SwitchId, SwitchId), Link>,
    hosts: HashMap<HostKey, Host>,
    epoch: Epoch,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn bump(&mut self) {
        self.epoch += 1;
    }

    /// Apply a switch connect (`up = true`) or disconnect.
    ///
    /// Disconnecting keeps the switch's half-links in the store: link
    /// discovery may not re-announce them, and they become active again if
    /// the switch reconnects.
    pub fn apply_switch(&mut self, id: SwitchId, up: bool) -> ChangeSet {
        if up {
            if self.switches.contains_key(&id) {
                return ChangeSet::None;
            }
            self.switches.insert(
                id,
                Switch {
                    id,
                    connected: true,
                },
            );
        } else if self.switches.remove(&id).is_none() {
            return ChangeSet::None;
        }
        self.bump();
        ChangeSet::TopologyChanged
    }

    /// Apply a link discovery update for the undirected link
    /// `(a, a_port) <-> (b, b_port)`.
    ///
    /// Up stores both directed half-links; a repeated identical up is
    /// idempotent, and a differing one replaces the record (most recently
    /// observed wins). Down removes both half-links for the switch pair.
    /// Endpoints do not have to be known switches yet.
    pub fn apply_link(
        &mut self,
        a: SwitchId,
        a_port: PortNo,
        b: SwitchId,
        b_port: PortNo,
        up: bool,
    ) -> ChangeSet {
        if up {
            let forward = Link {
                src: a,
                src_port: a_port,
                dst: b,
                dst_port: b_port,
            };
            let reverse = Link {
                src: b,
                src_port: b_port,
                dst: a,
                dst_port: a_port,
            };
            if self.links.get(&(a, b)) == Some(&forward)
                && self.links.get(&(b, a)) == Some(&reverse)
            {
                return ChangeSet::None;
            }
            self.links.insert((a, b), forward);
            self.links.insert((b, a), reverse);
        } else {
            let removed_forward = self.links.remove(&(a, b)).is_some();
            let removed_reverse = self.links.remove(&(b, a)).is_some();
            if !removed_forward && !removed_reverse {
                return ChangeSet::None;
            }
        }
        self.bump();
        ChangeSet::TopologyChanged
    }

    /// Apply a device-service update for the host identified by `key`.
    ///
    /// `present = false` forgets the host and reports the address whose
    /// rules must be withdrawn. An address change is reported as
    /// [`ChangeSet::HostMoved`] so the caller withdraws the old address's
    /// rules before installing the new ones.
    pub fn apply_host(
        &mut self,
        key: HostKey,
        mac: MacAddr,
        ipv4: Option<Ipv4Addr>,
        attachment: Option<Attachment>,
        present: bool,
    ) -> ChangeSet {
        if !present {
            return match self.hosts.remove(&key) {
                Some(host) => {
                    self.bump();
                    ChangeSet::HostRemoved {
                        key,
                        ipv4: host.ipv4,
                    }
                }
                None => ChangeSet::None,
            };
        }

        let incoming = Host {
            key: key.clone(),
            mac,
            ipv4,
            attachment,
        };
        let old_ipv4 = match self.hosts.get(&key) {
            Some(existing) if *existing == incoming => return ChangeSet::None,
            Some(existing) => existing.ipv4,
            None => None,
        };
        self.hosts.insert(key.clone(), incoming);
        self.bump();

        match old_ipv4 {
            Some(old) if ipv4 != Some(old) => ChangeSet::HostMoved { key, old_ipv4: old },
            _ => ChangeSet::HostChanged(key),
        }
    }

    pub fn host(&self, key: &HostKey) -> Option<&Host> {
        self.hosts.get(key)
    }

    /// Build an immutable snapshot of the current topology.
    ///
    /// The adjacency contains only half-links whose endpoints are both
    /// connected, sorted by (neighbor, port) for deterministic traversal.
    pub fn snapshot(&self) -> TopologySnapshot {
        let switches: std::collections::BTreeSet<SwitchId> =
            self.switches.keys().copied().collect();

        let mut adjacency: BTreeMap<SwitchId, Vec<Adjacency>> = BTreeMap::new();
        for ((src, dst), link) in &self.links {
            if switches.contains(src) && switches.contains(dst) {
                adjacency.entry(*src).or_default().push(Adjacency {
                    neighbor: *dst,
                    out_port: link.src_port,
                });
            }
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_unstable();
        }

        let mut hosts: Vec<Host> = self.hosts.values().cloned().collect();
        hosts.sort_unstable_by(|a, b| a.key.cmp(&b.key));

        TopologySnapshot {
            epoch: self.epoch,
            switches,
            adjacency,
            hosts,
        }
    }
}
