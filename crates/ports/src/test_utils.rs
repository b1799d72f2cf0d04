use crate::secondary::metrics_port::{
    EventMetrics, FlowMetrics, PacketInMetrics, TopologyMetrics,
};

/// No-op implementation of all metrics sub-traits for use in tests.
pub struct NoopMetrics;

impl PacketInMetrics for NoopMetrics {}
impl FlowMetrics for NoopMetrics {}
impl TopologyMetrics for NoopMetrics {}
impl EventMetrics for NoopMetrics {}
