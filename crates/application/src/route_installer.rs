use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;

use domain::common::entity::{Epoch, PortNo, SwitchId};
use domain::flow::entity::{FlowAction, FlowMatch, FlowMod, Port, TableId, PRIORITY_DEFAULT};
use domain::routing::entity::RouteTable;
use domain::topology::entity::{Host, TopologySnapshot};
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::switch_port::{SwitchControl, SwitchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShadowEntry {
    out_port: PortNo,
    epoch: Epoch,
}

/// Derives per-host forwarding entries from the route table and pushes
/// them to switches.
///
/// A local shadow keyed by (switch, host address) records what was last
/// installed and at which epoch; reconciliation issues only deltas, leaves
/// no-op switches untouched, and refuses to overwrite a newer write with a
/// stale one. A failed command leaves the shadow alone so the next pass
/// retries.
pub struct RouteInstaller {
    switch: Arc<dyn SwitchControl>,
    metrics: Arc<dyn MetricsPort>,
    table: TableId,
    installed: HashMap<(SwitchId, Ipv4Addr), ShadowEntry>,
}

impl RouteInstaller {
    pub fn new(
        switch: Arc<dyn SwitchControl>,
        metrics: Arc<dyn MetricsPort>,
        table: TableId,
    ) -> Self {
        Self {
            switch,
            metrics,
            table,
            installed: HashMap::new(),
        }
    }

    /// The flow table this installer writes into.
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Number of entries currently tracked as installed.
    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }

    /// Full reconciliation: diff the desired entries for every routable
    /// host against the shadow and issue only the deltas.
    pub fn sweep(&mut self, topo: &TopologySnapshot, routes: &RouteTable) {
        let mut desired = BTreeMap::new();
        for host in topo.routable_hosts() {
            desired.extend(desired_for_host(host, topo, routes));
        }
        self.apply_diff(None, &desired, topo.epoch);
        self.metrics.set_routes_installed(self.installed.len() as u64);
    }

    /// Reconcile a single host without touching other hosts' entries.
    pub fn reconcile_host(
        &mut self,
        host: &Host,
        topo: &TopologySnapshot,
        routes: &RouteTable,
    ) {
        let desired = desired_for_host(host, topo, routes);
        match host.ipv4 {
            Some(ip) => self.apply_diff(Some(ip), &desired, topo.epoch),
            None => debug_assert!(desired.is_empty()),
        }
        self.metrics.set_routes_installed(self.installed.len() as u64);
    }

    /// Withdraw every entry for `ip`, fleet-wide: every switch the shadow
    /// knows about plus every currently connected switch, in case the
    /// shadow missed one. The shadow forgets the address either way; a
    /// removed host has no desired state left to reconcile from.
    pub fn remove_host(&mut self, ip: Ipv4Addr) {
        let mut targets: BTreeSet<SwitchId> =
            self.switch.connected_switches().into_iter().collect();
        targets.extend(
            self.installed
                .keys()
                .filter(|(_, addr)| *addr == ip)
                .map(|(switch, _)| *switch),
        );

        let matching = FlowMatch::ipv4_to(ip);
        for switch in targets {
            match self.switch.remove_flows(switch, self.table, &matching) {
                Ok(()) => self.metrics.record_flow_mod("remove"),
                Err(e) => {
                    tracing::warn!(%switch, address = %ip, error = %e, "host rule withdrawal failed");
                }
            }
        }
        self.installed.retain(|(_, addr), _| *addr != ip);
        self.metrics.set_routes_installed(self.installed.len() as u64);
    }

    /// Diff `desired` against the shadow. When `scope` is set, only shadow
    /// entries for that address are candidates for withdrawal.
    fn apply_diff(
        &mut self,
        scope: Option<Ipv4Addr>,
        desired: &BTreeMap<(SwitchId, Ipv4Addr), PortNo>,
        epoch: Epoch,
    ) {
        let stale: Vec<(SwitchId, Ipv4Addr)> = self
            .installed
            .iter()
            .filter(|(key, entry)| {
                scope.is_none_or(|s| key.1 == s)
                    && entry.epoch <= epoch
                    && !desired.contains_key(key)
            })
            .map(|(key, _)| *key)
            .collect();

        for (switch, ip) in stale {
            match self
                .switch
                .remove_flows(switch, self.table, &FlowMatch::ipv4_to(ip))
            {
                Ok(()) => {
                    self.installed.remove(&(switch, ip));
                    self.metrics.record_flow_mod("remove");
                }
                Err(SwitchError::NotConnected(_)) if !self.switch.is_connected(switch) => {
                    // The switch is gone; there is nothing left to withdraw.
                    self.installed.remove(&(switch, ip));
                }
                Err(e) => {
                    tracing::warn!(%switch, address = %ip, error = %e, "rule withdrawal failed");
                }
            }
        }

        for (&(switch, ip), &out_port) in desired {
            match self.installed.get(&(switch, ip)) {
                Some(entry) if entry.out_port == out_port => continue,
                Some(entry) if entry.epoch > epoch => continue,
                _ => self.install(switch, ip, out_port, epoch),
            }
        }
    }

    /// Idempotent replace: remove any entry with the same match, then
    /// install. The shadow is updated only when both commands succeed.
    fn install(&mut self, switch: SwitchId, ip: Ipv4Addr, out_port: PortNo, epoch: Epoch) {
        let matching = FlowMatch::ipv4_to(ip);
        let flow = FlowMod::new(
            self.table,
            PRIORITY_DEFAULT,
            matching.clone(),
            vec![FlowAction::Output(Port::Physical(out_port))],
        );

        let result = self
            .switch
            .remove_flows(switch, self.table, &matching)
            .and_then(|()| self.switch.install_flow(switch, &flow));
        match result {
            Ok(()) => {
                self.installed
                    .insert((switch, ip), ShadowEntry { out_port, epoch });
                self.metrics.record_flow_mod("install");
                tracing::debug!(%switch, address = %ip, out_port, "forwarding entry installed");
            }
            Err(e) => {
                tracing::warn!(%switch, address = %ip, error = %e, "forwarding entry install failed");
            }
        }
    }
}

/// Desired entries for one host: the terminal rule at its attachment
/// switch plus a first-hop rule at every switch with a route toward it.
fn desired_for_host(
    host: &Host,
    topo: &TopologySnapshot,
    routes: &RouteTable,
) -> BTreeMap<(SwitchId, Ipv4Addr), PortNo> {
    let mut desired = BTreeMap::new();
    let (Some(ip), Some(attachment)) = (host.ipv4, host.attachment) else {
        return desired;
    };
    if !topo.contains_switch(attachment.switch) {
        return desired;
    }

    desired.insert((attachment.switch, ip), attachment.port);
    for (src, hop) in routes.sources_reaching(attachment.switch) {
        if topo.contains_switch(src) {
            desired.insert((src, ip), hop.out_port);
        }
    }
    desired
}
