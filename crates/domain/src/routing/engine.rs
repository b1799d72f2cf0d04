//! Unit-weight shortest paths over a topology snapshot.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::common::entity::{PortNo, SwitchId};
use crate::topology::entity::TopologySnapshot;

use super::entity::{NextHop, RouteTable};

/// Compute the all-pairs next-hop table for `topo`.
///
/// Pure function: runs Dijkstra from every switch over the unit-weight
/// adjacency. The frontier pops by (distance, switch id) and neighbors are
/// relaxed in (neighbor id, port) order, so equal-length paths always
/// resolve to the lowest-id, lowest-port first hop. Topology events are rare
/// relative to packets, so the full recomputation cost is acceptable.
pub fn compute_routes(topo: &TopologySnapshot) -> RouteTable {
    let mut table = RouteTable::new(topo.epoch);
    for &src in &topo.switches {
        for (dst, hop) in first_hops_from(topo, src) {
            table.insert(src, dst, hop);
        }
    }
    table
}

/// Single-source pass: for every switch reachable from `src`, the out port
/// of the first hop on a shortest path.
fn first_hops_from(topo: &TopologySnapshot, src: SwitchId) -> Vec<(SwitchId, NextHop)> {
    let mut dist: HashMap<SwitchId, u32> = HashMap::new();
    let mut first_hop: HashMap<SwitchId, PortNo> = HashMap::new();
    let mut frontier: BinaryHeap<Reverse<(u32, SwitchId)>> = BinaryHeap::new();

    dist.insert(src, 0);
    frontier.push(Reverse((0, src)));

    while let Some(Reverse((d, current))) = frontier.pop() {
        if dist.get(&current).is_some_and(|&best| d > best) {
            continue;
        }
        for adj in topo.neighbors(current) {
            let candidate = d + 1;
            let improves = dist
                .get(&adj.neighbor)
                .is_none_or(|&best| candidate < best);
            if improves {
                dist.insert(adj.neighbor, candidate);
                let hop = if current == src {
                    adj.out_port
                } else {
                    first_hop[&current]
                };
                first_hop.insert(adj.neighbor, hop);
                frontier.push(Reverse((candidate, adj.neighbor)));
            }
        }
    }

    first_hop
        .into_iter()
        .map(|(dst, out_port)| (dst, NextHop { out_port }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::store::TopologyStore;

    fn s(id: u64) -> SwitchId {
        SwitchId(id)
    }

    /// s1 -(2:1)- s2 -(2:1)- s3
    fn linear_three() -> TopologySnapshot {
        let mut store = TopologyStore::new();
        for id in 1..=3 {
            store.apply_switch(s(id), true);
        }
        store.apply_link(s(1), 2, s(2), 1, true);
        store.apply_link(s(2), 2, s(3), 1, true);
        store.snapshot()
    }

    #[test]
    fn linear_chain_next_hops() {
        let routes = compute_routes(&linear_three());

        assert_eq!(routes.next_hop(s(1), s(2)), Some(NextHop { out_port: 2 }));
        assert_eq!(routes.next_hop(s(1), s(3)), Some(NextHop { out_port: 2 }));
        assert_eq!(routes.next_hop(s(2), s(3)), Some(NextHop { out_port: 2 }));
        assert_eq!(routes.next_hop(s(2), s(1)), Some(NextHop { out_port: 1 }));
        assert_eq!(routes.next_hop(s(3), s(1)), Some(NextHop { out_port: 1 }));
        // No self entries.
        assert_eq!(routes.next_hop(s(1), s(1)), None);
        assert_eq!(routes.len(), 6);
    }

    #[test]
    fn split_component_has_no_cross_routes() {
        let mut store = TopologyStore::new();
        for id in 1..=4 {
            store.apply_switch(s(id), true);
        }
        store.apply_link(s(1), 1, s(2), 1, true);
        store.apply_link(s(3), 1, s(4), 1, true);

        let routes = compute_routes(&store.snapshot());
        assert!(routes.next_hop(s(1), s(2)).is_some());
        assert!(routes.next_hop(s(1), s(3)).is_none());
        assert!(routes.next_hop(s(4), s(2)).is_none());
    }

    #[test]
    fn equal_length_paths_prefer_lower_switch_id() {
        // Diamond: s1 reaches s4 through s2 (port 1) or s3 (port 2), both
        // two hops. The tie must resolve through s2.
        let mut store = TopologyStore::new();
        for id in 1..=4 {
            store.apply_switch(s(id), true);
        }
        store.apply_link(s(1), 1, s(2), 1, true);
        store.apply_link(s(1), 2, s(3), 1, true);
        store.apply_link(s(2), 2, s(4), 1, true);
        store.apply_link(s(3), 2, s(4), 2, true);

        let routes = compute_routes(&store.snapshot());
        assert_eq!(routes.next_hop(s(1), s(4)), Some(NextHop { out_port: 1 }));
        // And the same tie-break seen from the other side: s4 -> s1 via s2.
        assert_eq!(routes.next_hop(s(4), s(1)), Some(NextHop { out_port: 1 }));
    }

    #[test]
    fn parallel_adjacency_prefers_lowest_port() {
        // Hand-built snapshot with two entries toward the same neighbor;
        // the engine must pick the numerically smallest port.
        use crate::topology::entity::Adjacency;
        use std::collections::{BTreeMap, BTreeSet};

        let switches: BTreeSet<SwitchId> = [s(1), s(2)].into_iter().collect();
        let mut adjacency: BTreeMap<SwitchId, Vec<Adjacency>> = BTreeMap::new();
        adjacency.insert(
            s(1),
            vec![
                Adjacency {
                    neighbor: s(2),
                    out_port: 3,
                },
                Adjacency {
                    neighbor: s(2),
                    out_port: 7,
                },
            ],
        );
        let topo = TopologySnapshot {
            epoch: 1,
            switches,
            adjacency,
            hosts: vec![],
        };

        let routes = compute_routes(&topo);
        assert_eq!(routes.next_hop(s(1), s(2)), Some(NextHop { out_port: 3 }));
    }

    #[test]
    fn route_distances_match_hop_counts() {
        // Following next hops from any switch must reach the destination in
        // exactly the shortest-path distance. Ring of five switches: each
        // switch links to the next via port 2, back via port 1.
        let mut store = TopologyStore::new();
        for id in 1..=5 {
            store.apply_switch(s(id), true);
        }
        for id in 1..=5u64 {
            let next = if id == 5 { 1 } else { id + 1 };
            store.apply_link(s(id), 2, s(next), 1, true);
        }
        let topo = store.snapshot();
        let routes = compute_routes(&topo);

        // On a 5-ring the shortest distance between any two nodes is <= 2.
        for &src in &topo.switches {
            for &dst in &topo.switches {
                if src == dst {
                    continue;
                }
                let mut current = src;
                let mut hops = 0;
                while current != dst {
                    let hop = routes.next_hop(current, dst).expect("route must exist");
                    // Walk the edge that leaves `current` on the chosen port.
                    current = topo
                        .neighbors(current)
                        .iter()
                        .find(|a| a.out_port == hop.out_port)
                        .expect("port must map to a link")
                        .neighbor;
                    hops += 1;
                    assert!(hops <= 5, "routing loop from {src} to {dst}");
                }
                assert!(hops <= 2, "path from {src} to {dst} is not shortest");
            }
        }
    }

    #[test]
    fn empty_topology_yields_empty_table() {
        let routes = compute_routes(&TopologySnapshot::default());
        assert!(routes.is_empty());
    }

    #[test]
    fn table_epoch_tracks_snapshot() {
        let topo = linear_three();
        let routes = compute_routes(&topo);
        assert_eq!(routes.epoch(), topo.epoch);
    }
}
