//! Property-based tests for the topology invariants.
//!
//! Each case replays a random sequence of host additions and removals, then
//! checks the bookkeeping and the query algorithms against the result.

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use topology::{NetworkTopology, Node, NodeId, TopologyConfig};

const MASTER_RACK: &str = "/dc0/r0";

/// (data center, rack, host, add?)
type Op = (usize, usize, usize, bool);

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec((0usize..2, 0usize..3, 0usize..4, prop::bool::weighted(0.7)), 1..60)
}

/// Apply `ops` and return the topology with its live hosts keyed by path.
fn replay(ops: &[Op], seed: u64) -> (NetworkTopology, BTreeMap<String, NodeId>) {
    let topology = NetworkTopology::with_rng(
        TopologyConfig::default().with_master_racks([MASTER_RACK]),
        StdRng::seed_from_u64(seed),
    );
    let mut hosts = BTreeMap::new();
    for &(dc, rack, host, add) in ops {
        let location = format!("/dc{dc}/r{rack}");
        let name = format!("h{host}");
        let path = format!("{location}/{name}");
        if add {
            let id = topology.add(Node::leaf(name, location)).unwrap();
            hosts.insert(path, id);
        } else if let Some(id) = hosts.remove(&path) {
            assert!(topology.remove(id).unwrap());
        }
    }
    (topology, hosts)
}

/// Verify cached leaf counts below `path` and return the real count.
fn check_leaf_counts(topology: &NetworkTopology, path: &str) -> usize {
    let id = topology.resolve(path).unwrap();
    let info = topology.node(id).unwrap();
    if info.is_leaf() {
        return 1;
    }
    let children = topology.children_of_rack(path).unwrap();
    let total: usize = children
        .iter()
        .map(|&child| check_leaf_counts(topology, &topology.path_of(child).unwrap()))
        .sum();
    assert_eq!(info.leaf_count, total, "cached leaf count of {path}");
    total
}

fn subset(ids: &[NodeId], mask: u64) -> HashSet<NodeId> {
    ids.iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << (i % 64)) != 0)
        .map(|(_, &id)| id)
        .collect()
}

proptest! {
    #[test]
    fn leaf_counts_match_structure(ops in ops()) {
        let (topology, hosts) = replay(&ops, 0);

        let total = check_leaf_counts(&topology, "/");
        prop_assert_eq!(total, hosts.len());
        prop_assert_eq!(topology.num_leaves(), hosts.len());

        let racks: HashSet<String> = hosts
            .keys()
            .map(|path| path.rsplit_once('/').unwrap().0.to_string())
            .collect();
        prop_assert_eq!(topology.get_racks().into_iter().collect::<HashSet<_>>(), racks);
    }

    #[test]
    fn paths_round_trip(ops in ops()) {
        let (topology, hosts) = replay(&ops, 0);

        for (path, &id) in &hosts {
            prop_assert_eq!(topology.resolve(path), Some(id));
            prop_assert_eq!(topology.path_of(id), Some(path.clone()));
            prop_assert!(topology.contains(id));
        }
    }

    #[test]
    fn removing_absent_host_is_a_no_op(ops in ops()) {
        let (topology, hosts) = replay(&ops, 0);
        let stale = topology.add(Node::leaf("stale", "/dc9/r9")).unwrap();
        prop_assert!(topology.remove(stale).unwrap());

        let leaves = topology.num_leaves();
        let racks = topology.get_racks();
        prop_assert!(!topology.remove(stale).unwrap());
        prop_assert_eq!(topology.num_leaves(), leaves);
        prop_assert_eq!(topology.get_racks(), racks);
        prop_assert_eq!(topology.num_leaves(), hosts.len());
    }

    #[test]
    fn distance_is_symmetric(ops in ops()) {
        let (topology, hosts) = replay(&ops, 0);
        let ids: Vec<NodeId> = hosts.values().copied().collect();

        for &a in &ids {
            prop_assert_eq!(topology.distance(a, a), 0);
            for &b in &ids {
                prop_assert_eq!(topology.distance(a, b), topology.distance(b, a));
                if a != b {
                    let expected = if topology.same_rack(Some(a), Some(b)) { 2 } else { 4 };
                    prop_assert!(topology.distance(a, b) >= expected);
                }
            }
        }
    }

    #[test]
    fn exclusion_partitions_the_cluster(ops in ops(), mask in any::<u64>()) {
        let (topology, hosts) = replay(&ops, 0);
        let ids: Vec<NodeId> = hosts.values().copied().collect();
        let excluded = subset(&ids, mask);

        let mut scopes = vec![
            String::new(),
            "/dc0".to_string(),
            "/dc1".to_string(),
            "/dc0/r1".to_string(),
            "/dc1/r2".to_string(),
            "/nowhere".to_string(),
        ];
        scopes.extend(hosts.keys().take(3).cloned());

        for scope in &scopes {
            let inside = topology.count_available(scope, &excluded).unwrap();
            let outside = topology.count_available(&format!("~{scope}"), &excluded).unwrap();
            prop_assert_eq!(inside + outside, hosts.len() - excluded.len(), "scope {}", scope);
        }
    }

    #[test]
    fn random_choice_stays_in_scope(ops in ops(), seed in any::<u64>()) {
        let (topology, hosts) = replay(&ops, seed);

        for _ in 0..10 {
            match topology.choose_random("~/dc0") {
                Some(id) => prop_assert!(topology.path_of(id).unwrap().starts_with("/dc1/")),
                None => prop_assert_eq!(topology.leaf_count("/dc1"), 0),
            }
            if let Some(id) = topology.choose_random_excluding("/dc0", Some("/dc0/r1")) {
                let path = topology.path_of(id).unwrap();
                prop_assert!(path.starts_with("/dc0/") && !path.starts_with("/dc0/r1/"));
            }
        }
        prop_assert_eq!(topology.choose_random("").is_some(), !hosts.is_empty());
    }

    #[test]
    fn sort_pins_local_candidates(ops in ops(), mask in any::<u64>(), pick in any::<prop::sample::Index>()) {
        let (topology, hosts) = replay(&ops, 7);
        let ids: Vec<NodeId> = hosts.values().copied().collect();
        prop_assume!(!ids.is_empty());
        let reader = ids[pick.index(ids.len())];

        let mut nodes: Vec<NodeId> = subset(&ids, mask).into_iter().collect();
        nodes.sort();
        let before: HashSet<NodeId> = nodes.iter().copied().collect();
        topology.sort_by_distance(Some(reader), &mut nodes);
        prop_assert_eq!(nodes.iter().copied().collect::<HashSet<_>>(), before);

        let has_reader = nodes.contains(&reader);
        let has_rack_local = nodes
            .iter()
            .any(|&n| n != reader && topology.same_rack(Some(reader), Some(n)));
        if has_reader {
            prop_assert_eq!(nodes[0], reader);
        }
        if has_rack_local {
            let slot = usize::from(has_reader);
            prop_assert!(nodes[slot] != reader);
            prop_assert!(topology.same_rack(Some(reader), Some(nodes[slot])));
        }

        let pinned = usize::from(has_reader) + usize::from(has_rack_local);
        let on_master = |id: NodeId| topology.node(id).unwrap().location == MASTER_RACK;
        if let Some(first_master) = (pinned..nodes.len()).find(|&i| on_master(nodes[i])) {
            prop_assert!(nodes[first_master..].iter().all(|&id| on_master(id)));
        }
    }

    #[test]
    fn pipeline_is_greedy(ops in ops(), mask in any::<u64>(), pick in any::<prop::sample::Index>()) {
        let (topology, hosts) = replay(&ops, 0);
        let ids: Vec<NodeId> = hosts.values().copied().collect();
        prop_assume!(!ids.is_empty());
        let writer = ids[pick.index(ids.len())];

        let mut nodes: Vec<NodeId> = subset(&ids, mask).into_iter().collect();
        nodes.sort();
        prop_assume!(!nodes.is_empty());
        topology.build_pipeline(Some(writer), &mut nodes);

        let mut current = writer;
        for i in 0..nodes.len() {
            let chosen = topology.distance(current, nodes[i]);
            for &later in &nodes[i + 1..] {
                prop_assert!(chosen <= topology.distance(current, later));
            }
            current = nodes[i];
        }
    }
}
