use thiserror::Error;

use domain::common::entity::{PortNo, SwitchId};
use domain::flow::entity::{FlowMatch, FlowMod, TableId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SwitchError {
    #[error("switch {0} is not connected")]
    NotConnected(SwitchId),

    #[error("transport error on switch {switch}: {detail}")]
    Transport { switch: SwitchId, detail: String },
}

/// Command surface toward the switch fabric.
///
/// Implementations are thread-safe black boxes; sends are buffered by the
/// transport and treated as non-suspending by callers. A failed call leaves
/// the caller's bookkeeping untouched so the next reconciliation retries.
pub trait SwitchControl: Send + Sync {
    /// Switches currently connected, ascending by id.
    fn connected_switches(&self) -> Vec<SwitchId>;

    fn is_connected(&self, switch: SwitchId) -> bool;

    /// Program one flow entry.
    fn install_flow(&self, switch: SwitchId, flow: &FlowMod) -> Result<(), SwitchError>;

    /// Remove every entry in `table` whose match equals `matching`.
    fn remove_flows(
        &self,
        switch: SwitchId,
        table: TableId,
        matching: &FlowMatch,
    ) -> Result<(), SwitchError>;

    /// Emit a packet out of a physical port.
    fn send_packet(
        &self,
        switch: SwitchId,
        out_port: PortNo,
        frame: &[u8],
    ) -> Result<(), SwitchError>;
}
