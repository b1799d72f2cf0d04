use domain::flow::entity::TableId;

/// Service interface exposed by the shortest-path switching layer.
///
/// Callers that install rules in tables above the forwarding table (the
/// load balancer, or any further layered application) ask the oracle where
/// to send traffic with a goto-table action.
pub trait RoutingOracle: Send + Sync {
    /// The flow table holding per-host forwarding entries.
    fn forwarding_table(&self) -> TableId;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(TableId);

    impl RoutingOracle for Fixed {
        fn forwarding_table(&self) -> TableId {
            self.0
        }
    }

    #[test]
    fn oracle_is_object_safe() {
        let oracle: &dyn RoutingOracle = &Fixed(1);
        assert_eq!(oracle.forwarding_table(), 1);
    }
}
