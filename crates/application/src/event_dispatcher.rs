use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use domain::common::entity::{HostKey, MacAddr, PortNo, SwitchId};
use domain::common::error::DomainError;
use domain::topology::entity::{Attachment, ChangeSet};
use domain::topology::error::TopologyError;
use domain::topology::store::TopologyStore;
use ports::secondary::metrics_port::MetricsPort;

use crate::lb_edge_service::LbEdgeService;
use crate::pipeline_service::PipelineService;
use crate::route_installer::RouteInstaller;
use crate::routing_service::RoutingAppService;

/// One inbound control-plane event. The host framework's listener
/// callbacks all collapse into this single stream.
#[derive(Debug, Clone)]
pub enum Event {
    SwitchUp(SwitchId),
    SwitchDown(SwitchId),
    LinkUp {
        a: SwitchId,
        a_port: PortNo,
        b: SwitchId,
        b_port: PortNo,
    },
    LinkDown {
        a: SwitchId,
        a_port: PortNo,
        b: SwitchId,
        b_port: PortNo,
    },
    HostUpsert {
        key: HostKey,
        mac: MacAddr,
        ipv4: Option<Ipv4Addr>,
        attachment: Option<Attachment>,
    },
    HostRemoved {
        key: HostKey,
    },
    PacketIn {
        switch: SwitchId,
        in_port: PortNo,
        frame: Vec<u8>,
    },
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::SwitchUp(_) => "switch_up",
            Event::SwitchDown(_) => "switch_down",
            Event::LinkUp { .. } => "link_up",
            Event::LinkDown { .. } => "link_down",
            Event::HostUpsert { .. } => "host_upsert",
            Event::HostRemoved { .. } => "host_removed",
            Event::PacketIn { .. } => "packet_in",
        }
    }
}

/// Totally ordered event loop driving the whole control plane.
///
/// One dispatcher owns the topology store, the route table, and the
/// installer shadow, so every event sees the state left behind by the
/// previous one and a packet-in observed after a topology mutation sees the
/// post-mutation snapshot. Errors drop the current event, never the loop.
pub struct EventDispatcher {
    store: TopologyStore,
    routing: Arc<RoutingAppService>,
    installer: RouteInstaller,
    pipeline: PipelineService,
    lb_edge: LbEdgeService,
    metrics: Arc<dyn MetricsPort>,
}

impl EventDispatcher {
    pub fn new(
        routing: Arc<RoutingAppService>,
        installer: RouteInstaller,
        pipeline: PipelineService,
        lb_edge: LbEdgeService,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            store: TopologyStore::new(),
            routing,
            installer,
            pipeline,
            lb_edge,
            metrics,
        }
    }

    /// Main loop. Consumes events until the channel closes or the token
    /// cancels; on cancellation the queue is drained first so nothing that
    /// was already accepted is lost.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Event>, cancel: CancellationToken) {
        let mut count: u64 = 0;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        count += 1;
                        self.dispatch(event);
                    }
                    break;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(event) => {
                            count += 1;
                            self.dispatch(event);
                        }
                        None => break, // channel closed
                    }
                }
            }
        }

        tracing::info!(total_events = count, "event dispatcher stopped");
    }

    /// Apply a single event. Public so callers with their own loop (and
    /// tests) can drive the dispatcher synchronously.
    pub fn dispatch(&mut self, event: Event) {
        self.metrics.record_event(event.kind());
        let kind = event.kind();
        if let Err(e) = self.handle(event) {
            self.metrics.record_event_dropped(kind);
            tracing::warn!(kind, error = %e, "event dropped");
        }
    }

    fn handle(&mut self, event: Event) -> Result<(), DomainError> {
        match event {
            Event::SwitchUp(id) => {
                tracing::info!(switch = %id, "switch connected");
                let change = self.store.apply_switch(id, true);
                // The pipeline scaffolding goes in before any forwarding
                // entries can land on the new switch.
                self.pipeline.provision_switch(id);
                self.apply_change(change)
            }
            Event::SwitchDown(id) => {
                tracing::info!(switch = %id, "switch disconnected");
                let change = self.store.apply_switch(id, false);
                self.apply_change(change)
            }
            Event::LinkUp {
                a,
                a_port,
                b,
                b_port,
            } => {
                tracing::info!(%a, a_port, %b, b_port, "link up");
                let change = self.store.apply_link(a, a_port, b, b_port, true);
                self.apply_change(change)
            }
            Event::LinkDown {
                a,
                a_port,
                b,
                b_port,
            } => {
                tracing::info!(%a, a_port, %b, b_port, "link down");
                let change = self.store.apply_link(a, a_port, b, b_port, false);
                self.apply_change(change)
            }
            Event::HostUpsert {
                key,
                mac,
                ipv4,
                attachment,
            } => {
                let change = self.store.apply_host(key, mac, ipv4, attachment, true);
                self.apply_change(change)
            }
            Event::HostRemoved { key } => {
                let change = self.store.apply_host(key, MacAddr::ZERO, None, None, false);
                self.apply_change(change)
            }
            Event::PacketIn {
                switch,
                in_port,
                frame,
            } => {
                self.lb_edge.handle_packet_in(switch, in_port, &frame);
                Ok(())
            }
        }
    }

    fn apply_change(&mut self, change: ChangeSet) -> Result<(), DomainError> {
        match change {
            ChangeSet::None => Ok(()),
            ChangeSet::TopologyChanged => {
                self.recompute_and_sweep();
                Ok(())
            }
            ChangeSet::HostChanged(key) => self.reconcile_host(&key),
            ChangeSet::HostMoved { key, old_ipv4 } => {
                tracing::info!(host = %key, old_address = %old_ipv4, "host address changed");
                self.installer.remove_host(old_ipv4);
                self.reconcile_host(&key)
            }
            ChangeSet::HostRemoved { key, ipv4 } => {
                tracing::info!(host = %key, "host removed");
                if let Some(ip) = ipv4 {
                    self.installer.remove_host(ip);
                }
                Ok(())
            }
        }
    }

    fn recompute_and_sweep(&mut self) {
        let snapshot = self.store.snapshot();
        let routes = self.routing.recompute(&snapshot);
        self.installer.sweep(&snapshot, &routes);
    }

    fn reconcile_host(&mut self, key: &HostKey) -> Result<(), DomainError> {
        let snapshot = self.store.snapshot();
        let host = snapshot
            .hosts
            .iter()
            .find(|h| h.key == *key)
            .ok_or_else(|| TopologyError::UnknownHost(key.0.clone()))?;
        tracing::info!(host = %key, routable = host.is_routable(), "host reconciled");
        let routes = self.routing.current();
        self.installer.reconcile_host(host, &snapshot, &routes);
        Ok(())
    }
}
