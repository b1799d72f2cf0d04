use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use domain::flow::entity::TableId;
use domain::routing::engine::compute_routes;
use domain::routing::entity::RouteTable;
use domain::topology::entity::TopologySnapshot;
use ports::primary::routing_oracle::RoutingOracle;
use ports::secondary::metrics_port::MetricsPort;

/// Owner of the shortest-path table.
///
/// Recomputation produces a new immutable table that atomically replaces
/// the old one; readers holding the previous `Arc` keep a consistent view.
pub struct RoutingAppService {
    table_id: TableId,
    metrics: Arc<dyn MetricsPort>,
    routes: RwLock<Arc<RouteTable>>,
}

impl RoutingAppService {
    pub fn new(table_id: TableId, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            table_id,
            metrics,
            routes: RwLock::new(Arc::new(RouteTable::default())),
        }
    }

    /// Recompute the table from `topo` and swap it in.
    pub fn recompute(&self, topo: &TopologySnapshot) -> Arc<RouteTable> {
        let started = Instant::now();
        let routes = Arc::new(compute_routes(topo));
        self.metrics
            .observe_recompute_duration(started.elapsed().as_secs_f64());

        let link_count: usize = topo.adjacency.values().map(Vec::len).sum();
        self.metrics.set_switches(topo.switches.len() as u64);
        self.metrics.set_links((link_count / 2) as u64);
        self.metrics.set_hosts(topo.hosts.len() as u64);

        tracing::debug!(
            epoch = topo.epoch,
            switches = topo.switches.len(),
            entries = routes.len(),
            "route table recomputed"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            for (src, dst, hop) in routes.iter() {
                tracing::trace!(%src, %dst, out_port = hop.out_port, "next hop");
            }
        }

        *self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&routes);
        routes
    }

    /// The table currently in effect.
    pub fn current(&self) -> Arc<RouteTable> {
        Arc::clone(&self.routes.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RoutingOracle for RoutingAppService {
    fn forwarding_table(&self) -> TableId {
        self.table_id
    }
}
