//! Network topology: the public, thread-safe face of the tree.
//!
//! A [`NetworkTopology`] models a cluster as a tree. Leaves are hosts, inner
//! nodes are switches: racks, then data centers, up to an unnamed root.
//!
//! ```text
//!                 /
//!          ┌──────┴──────┐
//!         dc1           dc2
//!       ┌──┴──┐          │
//!       r1    r2         r3
//!      ┌┴┐    │          │
//!     h1 h2   h3         h4
//! ```
//!
//! # Concurrency
//!
//! The tree and the rack registry are guarded together by one reader/writer
//! lock. Queries hold the read lock for their whole duration, so sorting and
//! pipeline construction see a single consistent snapshot; `add` and `remove`
//! hold the write lock. Random draws come from an injected generator behind
//! its own mutex, always taken after the state lock.
//!
//! Handles returned by queries stay valid only while the node is in the tree.
//! Use [`NetworkTopology::contains`] to re-validate a handle kept across a
//! mutation.

use std::collections::HashSet;
use std::fmt;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::TopologyConfig;
use crate::error::{Result, TopologyError};
use crate::ip_table::IpTable;
use crate::node::{normalize, Node, NodeId, NodeInfo, NodeKind};
use crate::racks::RackRegistry;
use crate::tree::{Insertion, Tree};

/// Tree and rack registry, always locked together.
#[derive(Debug, Default)]
pub(crate) struct TopologyState {
    pub(crate) tree: Tree,
    pub(crate) racks: RackRegistry,
}

impl fmt::Display for TopologyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of racks: {}", self.racks.len())?;
        writeln!(f, "Expected number of leaves:{}", self.tree.num_leaves())?;
        for leaf in self.tree.leaves() {
            if let Some(path) = self.tree.path_of(leaf) {
                writeln!(f, "{}", path)?;
            }
        }
        Ok(())
    }
}

/// A cluster of hosts arranged in a hierarchical network topology.
///
/// # Example
///
/// ```rust
/// use topology::{NetworkTopology, Node};
///
/// let topology = NetworkTopology::new();
/// let h1 = topology.add(Node::leaf("h1", "/r1")).unwrap();
/// let h2 = topology.add(Node::leaf("h2", "/r1")).unwrap();
/// let h3 = topology.add(Node::leaf("h3", "/r2")).unwrap();
///
/// assert_eq!(topology.distance(h1, h2), 2);
/// assert_eq!(topology.distance(h1, h3), 4);
/// assert!(topology.same_rack(Some(h1), Some(h2)));
/// assert_eq!(topology.num_racks(), 2);
/// ```
pub struct NetworkTopology<R = StdRng> {
    state: RwLock<TopologyState>,
    rng: Mutex<R>,
    ip_table: IpTable,
}

impl NetworkTopology<StdRng> {
    /// Create an empty topology with no master racks.
    pub fn new() -> Self {
        Self::with_config(TopologyConfig::default())
    }

    pub fn with_config(config: TopologyConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl Default for NetworkTopology<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> NetworkTopology<R> {
    /// Create an empty topology drawing random choices from `rng`.
    pub fn with_rng(config: TopologyConfig, rng: R) -> Self {
        Self {
            state: RwLock::new(TopologyState {
                tree: Tree::new(),
                racks: RackRegistry::new(config.master_racks),
            }),
            rng: Mutex::new(rng),
            ip_table: IpTable::new(),
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a host, creating the racks and data centers on its path.
    ///
    /// Adding a host whose name already exists in the target rack replaces it
    /// and returns the existing handle.
    ///
    /// # Errors
    ///
    /// `InvalidTopology` if `node` is a branch or its location is occupied by
    /// a leaf; `InvalidPath` if the location does not start with `/`.
    pub fn add(&self, node: Node) -> Result<NodeId> {
        if node.kind == NodeKind::Branch {
            return Err(TopologyError::invalid_topology(format!(
                "Not allow to add an inner node: {}",
                node.path()
            )));
        }
        let location = normalize(&node.location)?;

        let mut state = self.state.write();
        let rack = state.tree.resolve(&location);
        if rack.and_then(|id| state.tree.get(id)).map_or(false, |rack| rack.is_leaf()) {
            return Err(TopologyError::invalid_topology(format!(
                "Unexpected data node {} at an illegal network location",
                node
            )));
        }

        let insertion = state.tree.insert(&node.name, &location)?;
        match insertion {
            Insertion::Added(id) => {
                info!(node = %node, id = %id, "Adding a new node");
                if rack.is_none() && !state.racks.insert(&location) {
                    warn!(
                        rack = %location,
                        "Discrepancy between network topology and list of racks. \
                         New rack was already in the list of racks"
                    );
                }
            }
            Insertion::Replaced(id) => {
                debug!(node = %node, id = %id, "Replaced an existing node");
            }
        }
        self.ip_table.register(&node.name, insertion.id());
        debug!("NetworkTopology became:\n{}", *state);
        Ok(insertion.id())
    }

    /// Remove a host, pruning racks and data centers left empty.
    ///
    /// Returns `Ok(false)` if the host is not (or no longer) in the tree.
    ///
    /// # Errors
    ///
    /// `InvalidTopology` if `id` refers to a branch.
    pub fn remove(&self, id: NodeId) -> Result<bool> {
        let mut state = self.state.write();
        let (path, rack) = match state.tree.get(id) {
            None => return Ok(false),
            Some(node) if !node.is_leaf() => {
                return Err(TopologyError::invalid_topology(format!(
                    "Not allow to remove an inner node: {}",
                    node.path()
                )))
            }
            Some(node) => (node.path(), node.location.clone()),
        };
        info!(node = %path, id = %id, "Removing a node");

        if !state.tree.remove(id)? {
            return Ok(false);
        }
        if state.tree.resolve(&rack).is_none() && !state.racks.remove(&rack) {
            warn!(
                rack = %rack,
                "Discrepancy between network topology and list of racks. \
                 Removed rack was not in the rack list"
            );
        }
        self.ip_table.forget(id);
        debug!("NetworkTopology became:\n{}", *state);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Resolve a path such as `/dc1/r1/h1` to a node.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let path = normalize(path).ok()?;
        self.state.read().tree.resolve(&path)
    }

    /// Snapshot of a node, or `None` for a stale handle.
    pub fn node(&self, id: NodeId) -> Option<NodeInfo> {
        self.state.read().tree.info(id)
    }

    pub fn path_of(&self, id: NodeId) -> Option<String> {
        self.state.read().tree.path_of(id)
    }

    /// Copy of the children of the branch at `path`.
    pub fn children_of_rack(&self, path: &str) -> Option<Vec<NodeId>> {
        let path = normalize(path).ok()?;
        let state = self.state.read();
        let rack = state.tree.resolve(&path).and_then(|id| state.tree.get(id))?;
        if rack.is_leaf() {
            return None;
        }
        Some(rack.children().to_vec())
    }

    /// Whether the handle still refers to a node attached to this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.state.read().tree.contains(id)
    }

    /// Whether `candidate` (a branch) is an ancestor of `node`, by path prefix.
    pub fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> Result<bool> {
        self.state.read().is_ancestor(candidate, node)
    }

    /// Copy of the known racks, in the order they were first populated.
    pub fn get_racks(&self) -> Vec<String> {
        self.state.read().racks.racks().to_vec()
    }

    /// Known racks together with the configured master racks.
    pub fn get_all_racks(&self) -> HashSet<String> {
        self.state.read().racks.all()
    }

    pub fn num_racks(&self) -> usize {
        self.state.read().racks.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.state.read().tree.num_leaves()
    }

    /// Leaves under `path`; 1 for a host, 0 if nothing is there.
    pub fn leaf_count(&self, path: &str) -> usize {
        match normalize(path) {
            Ok(path) => self.state.read().leaves_under(&path),
            Err(_) => 0,
        }
    }

    // ------------------------------------------------------------------
    // Distance
    // ------------------------------------------------------------------

    /// Hops between two nodes via their closest common ancestor.
    ///
    /// Returns [`UNREACHABLE`](crate::UNREACHABLE) if either handle is
    /// not in the tree.
    pub fn distance(&self, a: NodeId, b: NodeId) -> u32 {
        self.state.read().distance(a, b)
    }

    pub fn same_rack(&self, a: Option<NodeId>, b: Option<NodeId>) -> bool {
        self.state.read().same_rack(a, b)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Number of hosts in `scope` (or outside it, for `~scope`) that are not in
    /// `excluded`.
    pub fn count_available(&self, scope: &str, excluded: &HashSet<NodeId>) -> Result<usize> {
        self.state.read().count_available(scope, excluded)
    }

    /// Uniformly pick a host under `scope`; `~scope` picks outside it.
    pub fn choose_random(&self, scope: &str) -> Option<NodeId> {
        let state = self.state.read();
        let mut rng = self.rng.lock();
        state.choose_random(scope, &mut *rng)
    }

    /// Uniformly pick a host under `scope` and outside `excluded_scope`.
    pub fn choose_random_excluding(&self, scope: &str, excluded_scope: Option<&str>) -> Option<NodeId> {
        let state = self.state.read();
        let mut rng = self.rng.lock();
        state.choose_random_excluding(scope, excluded_scope, &mut *rng)
    }

    /// Pick a rack that is not in `excluded`.
    pub fn choose_rack(&self, excluded: &HashSet<String>) -> Option<String> {
        let state = self.state.read();
        let mut rng = self.rng.lock();
        state.choose_rack(excluded, &mut *rng)
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Reorder replica candidates for a reader: the reader's own host first,
    /// then a host on its rack, master racks last.
    pub fn sort_by_distance(&self, reader: Option<NodeId>, nodes: &mut [NodeId]) {
        let state = self.state.read();
        let mut rng = self.rng.lock();
        state.sort_by_distance(reader, nodes, &mut *rng);
    }

    /// Order `nodes` as a low-cost write pipeline starting from `writer`.
    pub fn build_pipeline(&self, writer: Option<NodeId>, nodes: &mut [NodeId]) {
        self.state.read().build_pipeline(writer, nodes);
    }

    // ------------------------------------------------------------------
    // IP side table
    // ------------------------------------------------------------------

    /// Host registered under `ip` (the part of its name before `:`).
    pub fn node_by_ip(&self, ip: &str) -> Option<NodeId> {
        self.ip_table.get(ip)
    }

    /// A random host among those registered by IP.
    pub fn random_ip_node(&self) -> Option<NodeId> {
        let mut rng = self.rng.lock();
        self.ip_table.random(&mut *rng)
    }

    /// IPs of registered hosts, in insertion order, skipping `exclude`.
    pub fn ip_candidates(&self, exclude: &[&str]) -> Vec<String> {
        self.ip_table.candidates(exclude)
    }
}

impl<R> fmt::Display for NetworkTopology<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.state.read(), f)
    }
}

impl<R> fmt::Debug for NetworkTopology<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("NetworkTopology")
            .field("racks", &state.racks.len())
            .field("leaves", &state.tree.num_leaves())
            .finish()
    }
}
