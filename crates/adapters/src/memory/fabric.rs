use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};

use domain::common::entity::{MacAddr, PortNo, SwitchId};
use domain::flow::entity::{FlowMatch, FlowMod, TableId};
use ports::secondary::device_port::DeviceResolver;
use ports::secondary::switch_port::{SwitchControl, SwitchError};

/// A frame emitted through [`SwitchControl::send_packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub switch: SwitchId,
    pub out_port: PortNo,
    pub frame: Vec<u8>,
}

#[derive(Debug, Default)]
struct FabricState {
    connected: BTreeSet<SwitchId>,
    flows: BTreeMap<SwitchId, Vec<FlowMod>>,
    packets: Vec<SentPacket>,
}

/// In-memory switch fabric with per-switch flow tables.
///
/// Install replaces any entry with the same table and match, mirroring the
/// remove-then-install convention of the real command surface. Commands
/// against a disconnected switch fail with `NotConnected`.
#[derive(Debug, Default)]
pub struct MemoryFabric {
    state: Mutex<FabricState>,
}

impl MemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FabricState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a switch as connected. Its flow tables start empty unless it
    /// was seen before.
    pub fn connect(&self, switch: SwitchId) {
        let mut state = self.lock();
        state.connected.insert(switch);
        state.flows.entry(switch).or_default();
    }

    /// Mark a switch as disconnected and drop its flow state.
    pub fn disconnect(&self, switch: SwitchId) {
        let mut state = self.lock();
        state.connected.remove(&switch);
        state.flows.remove(&switch);
    }

    /// All flow entries on `switch`, install order.
    pub fn flows_on(&self, switch: SwitchId) -> Vec<FlowMod> {
        self.lock().flows.get(&switch).cloned().unwrap_or_default()
    }

    /// Flow entries on `switch` in `table`, install order.
    pub fn flows_in_table(&self, switch: SwitchId, table: TableId) -> Vec<FlowMod> {
        self.flows_on(switch)
            .into_iter()
            .filter(|f| f.table == table)
            .collect()
    }

    /// Packets emitted so far, oldest first.
    pub fn sent_packets(&self) -> Vec<SentPacket> {
        self.lock().packets.clone()
    }

    pub fn clear_sent_packets(&self) {
        self.lock().packets.clear();
    }
}

impl SwitchControl for MemoryFabric {
    fn connected_switches(&self) -> Vec<SwitchId> {
        self.lock().connected.iter().copied().collect()
    }

    fn is_connected(&self, switch: SwitchId) -> bool {
        self.lock().connected.contains(&switch)
    }

    fn install_flow(&self, switch: SwitchId, flow: &FlowMod) -> Result<(), SwitchError> {
        let mut state = self.lock();
        if !state.connected.contains(&switch) {
            return Err(SwitchError::NotConnected(switch));
        }
        let table = state.flows.entry(switch).or_default();
        table.retain(|f| !(f.table == flow.table && f.matching == flow.matching));
        table.push(flow.clone());
        Ok(())
    }

    fn remove_flows(
        &self,
        switch: SwitchId,
        table: TableId,
        matching: &FlowMatch,
    ) -> Result<(), SwitchError> {
        let mut state = self.lock();
        if !state.connected.contains(&switch) {
            return Err(SwitchError::NotConnected(switch));
        }
        if let Some(flows) = state.flows.get_mut(&switch) {
            flows.retain(|f| !(f.table == table && f.matching == *matching));
        }
        Ok(())
    }

    fn send_packet(
        &self,
        switch: SwitchId,
        out_port: PortNo,
        frame: &[u8],
    ) -> Result<(), SwitchError> {
        let mut state = self.lock();
        if !state.connected.contains(&switch) {
            return Err(SwitchError::NotConnected(switch));
        }
        state.packets.push(SentPacket {
            switch,
            out_port,
            frame: frame.to_vec(),
        });
        Ok(())
    }
}

/// Fixed IP-to-MAC inventory standing in for the device service.
#[derive(Debug, Default)]
pub struct StaticDeviceIndex {
    devices: Mutex<HashMap<Ipv4Addr, MacAddr>>,
}

impl StaticDeviceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ip: Ipv4Addr, mac: MacAddr) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ip, mac);
    }
}

impl DeviceResolver for StaticDeviceIndex {
    fn mac_for_ip(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ip)
            .copied()
    }
}
