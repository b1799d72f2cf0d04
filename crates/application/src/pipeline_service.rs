use std::sync::Arc;

use domain::common::entity::SwitchId;
use domain::flow::entity::{
    FlowAction, FlowMatch, FlowMod, Port, TableId, PRIORITY_DEFAULT, PRIORITY_VIP,
};
use domain::loadbalancer::registry::VipRegistry;
use ports::primary::routing_oracle::RoutingOracle;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::switch_port::SwitchControl;

/// Owner of the two-table pipeline layout.
///
/// Every switch that connects gets the per-VIP catch rules in the load
/// balancer table, above a table-miss default that sends everything else on
/// to the forwarding table. Per-connection rewrite rules later sit above
/// the catch rules, so the relative priorities here are load-bearing.
pub struct PipelineService {
    registry: Arc<VipRegistry>,
    switch: Arc<dyn SwitchControl>,
    oracle: Arc<dyn RoutingOracle>,
    metrics: Arc<dyn MetricsPort>,
    table: TableId,
}

impl PipelineService {
    pub fn new(
        registry: Arc<VipRegistry>,
        switch: Arc<dyn SwitchControl>,
        oracle: Arc<dyn RoutingOracle>,
        metrics: Arc<dyn MetricsPort>,
        table: TableId,
    ) -> Self {
        Self {
            registry,
            switch,
            oracle,
            metrics,
            table,
        }
    }

    /// The load balancer's own flow table.
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Install the pipeline scaffolding on a newly connected switch:
    /// per-VIP ARP and TCP catch rules, then the table-miss default.
    pub fn provision_switch(&self, switch: SwitchId) {
        for instance in self.registry.iter() {
            let arp_catch = FlowMod::new(
                self.table,
                PRIORITY_VIP,
                FlowMatch::arp_asking_for(instance.vip),
                vec![FlowAction::Output(Port::Controller)],
            );
            let tcp_catch = FlowMod::new(
                self.table,
                PRIORITY_VIP,
                FlowMatch::ipv4_to(instance.vip),
                vec![FlowAction::Output(Port::Controller)],
            );
            self.install(switch, &arp_catch);
            self.install(switch, &tcp_catch);
        }

        let table_miss = FlowMod::new(
            self.table,
            PRIORITY_DEFAULT,
            FlowMatch::any(),
            vec![FlowAction::GotoTable(self.oracle.forwarding_table())],
        );
        self.install(switch, &table_miss);
    }

    /// Idempotent replace: any entry with the same match goes first.
    fn install(&self, switch: SwitchId, flow: &FlowMod) {
        let result = self
            .switch
            .remove_flows(switch, self.table, &flow.matching)
            .and_then(|()| self.switch.install_flow(switch, flow));
        match result {
            Ok(()) => self.metrics.record_flow_mod("install"),
            Err(e) => {
                tracing::warn!(%switch, error = %e, "pipeline rule install failed");
            }
        }
    }
}
