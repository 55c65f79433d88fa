//! Read-only queries over a topology snapshot.
//!
//! Everything here runs against a [`TopologyState`] borrowed under the
//! topology's read lock, so multi-step queries see one consistent tree.

use std::collections::HashSet;

use rand::Rng;
use tracing::warn;

use crate::error::{Result, TopologyError};
use crate::node::{normalize, NodeId, ROOT, SCOPE_NEGATION};
use crate::topology::TopologyState;
use crate::tree::is_ancestor_path;

/// Distance reported when two nodes share no ancestor in the tree.
pub const UNREACHABLE: u32 = u32::MAX;

impl TopologyState {
    /// Hop count between two nodes through their closest common ancestor.
    ///
    /// Each edge costs 1; a node is 0 away from itself.
    pub(crate) fn distance(&self, a: NodeId, b: NodeId) -> u32 {
        if a == b {
            return 0;
        }
        let tree = &self.tree;
        let (Some(first), Some(second)) = (tree.get(a), tree.get(b)) else {
            warn!(node1 = %a, node2 = %b, "The cluster does not contain both nodes");
            return UNREACHABLE;
        };

        let (mut level1, mut level2) = (first.level, second.level);
        let (mut n1, mut n2) = (Some(a), Some(b));
        let mut dis = 0u32;
        while level1 > level2 {
            let Some(id) = n1 else { break };
            n1 = tree.parent_of(id);
            level1 -= 1;
            dis += 1;
        }
        while level2 > level1 {
            let Some(id) = n2 else { break };
            n2 = tree.parent_of(id);
            level2 -= 1;
            dis += 1;
        }
        while let (Some(x), Some(y)) = (n1, n2) {
            let (px, py) = (tree.parent_of(x), tree.parent_of(y));
            if px == py {
                break;
            }
            n1 = px;
            n2 = py;
            dis += 2;
        }

        match (n1, n2) {
            (None, _) => {
                warn!(node = %first.path(), "The cluster does not contain node");
                UNREACHABLE
            }
            (_, None) => {
                warn!(node = %second.path(), "The cluster does not contain node");
                UNREACHABLE
            }
            _ => dis + 2,
        }
    }

    /// Both nodes hang off the same parent branch.
    pub(crate) fn same_rack(&self, a: Option<NodeId>, b: Option<NodeId>) -> bool {
        let tree = &self.tree;
        match (a.and_then(|id| tree.get(id)), b.and_then(|id| tree.get(id))) {
            (Some(x), Some(y)) => x.parent == y.parent,
            _ => false,
        }
    }

    pub(crate) fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> Result<bool> {
        let branch = self
            .tree
            .get(candidate)
            .filter(|branch| !branch.is_leaf())
            .ok_or_else(|| TopologyError::invalid_topology(format!("{} is not a branch of this topology", candidate)))?;
        let node = self
            .tree
            .get(node)
            .ok_or_else(|| TopologyError::invalid_topology(format!("{} is not attached to this topology", node)))?;
        Ok(is_ancestor_path(&branch.path(), &node.location))
    }

    /// Leaves under a normalized path: 1 for a leaf, 0 if it does not resolve.
    pub(crate) fn leaves_under(&self, path: &str) -> usize {
        self.tree
            .resolve(path)
            .and_then(|id| self.tree.get(id))
            .map_or(0, |node| node.leaf_count())
    }

    /// Leaves in `scope` (or outside it, for `~scope`) that are not excluded.
    ///
    /// Excluded nodes are matched against the scope by raw string prefix of
    /// their full path, so `/ab/r/h` counts as inside `/a`.
    pub(crate) fn count_available(&self, scope: &str, excluded: &HashSet<NodeId>) -> Result<usize> {
        let (negated, scope) = match scope.strip_prefix(SCOPE_NEGATION) {
            Some(rest) => (true, rest),
            None => (false, scope),
        };
        let scope = normalize(scope)?;

        let excluded_paths: Vec<String> = excluded.iter().filter_map(|&id| self.tree.path_of(id)).collect();
        let overlap = excluded_paths.iter().filter(|path| path.starts_with(scope.as_str())).count() as i64;
        let in_scope = self.leaves_under(&scope) as i64;

        let count = if negated {
            self.tree.num_leaves() as i64 - in_scope - excluded_paths.len() as i64 + overlap
        } else {
            in_scope - overlap
        };
        Ok(count.max(0) as usize)
    }

    /// Uniformly pick a leaf from `scope`; `~scope` picks from outside it.
    pub(crate) fn choose_random<R: Rng + ?Sized>(&self, scope: &str, rng: &mut R) -> Option<NodeId> {
        match scope.strip_prefix(SCOPE_NEGATION) {
            Some(excluded) => self.choose_random_excluding(ROOT, Some(excluded), rng),
            None => self.choose_random_excluding(scope, None, rng),
        }
    }

    /// Uniformly pick a leaf under `scope` that is not under `excluded_scope`.
    ///
    /// Scopes relate by raw string prefix, as in the leaf counting above: an
    /// excluded `/a` covers scope `/ab`, and an excluded `/ab` is subtracted
    /// from scope `/a`.
    pub(crate) fn choose_random_excluding<R: Rng + ?Sized>(
        &self,
        scope: &str,
        excluded_scope: Option<&str>,
        rng: &mut R,
    ) -> Option<NodeId> {
        let scope = match normalize(scope) {
            Ok(scope) => scope,
            Err(err) => {
                warn!(%err, "Ignoring malformed scope");
                return None;
            }
        };
        let excluded_scope = match excluded_scope.map(normalize).transpose() {
            Ok(excluded) => excluded,
            Err(err) => {
                warn!(%err, "Ignoring malformed excluded scope");
                None
            }
        };
        let excluded_scope = match excluded_scope {
            Some(excluded) if scope.starts_with(excluded.as_str()) => return None,
            Some(excluded) if excluded.starts_with(scope.as_str()) => Some(excluded),
            _ => None,
        };

        let scope_id = self.tree.resolve(&scope)?;
        let scope_node = self.tree.get(scope_id)?;
        if scope_node.is_leaf() {
            return Some(scope_id);
        }

        let mut available = scope_node.leaf_count();
        let excluded_id = excluded_scope.and_then(|excluded| self.tree.resolve(&excluded));
        if let Some(excluded) = excluded_id.and_then(|id| self.tree.get(id)) {
            available = available.saturating_sub(excluded.leaf_count());
        }
        if available == 0 {
            return None;
        }

        let index = rng.gen_range(0..available);
        self.tree.leaf_at(scope_id, index, excluded_id)
    }

    /// Draw racks without replacement until one is not excluded.
    pub(crate) fn choose_rack<R: Rng + ?Sized>(&self, excluded: &HashSet<String>, rng: &mut R) -> Option<String> {
        let total = self.racks.len();
        if total <= excluded.len() {
            return None;
        }

        let mut remaining: Vec<usize> = (0..total).collect();
        while !remaining.is_empty() {
            let index = remaining.swap_remove(rng.gen_range(0..remaining.len()));
            let rack = self.racks.get(index)?;
            if !excluded.contains(rack) {
                return Some(rack.to_string());
            }
        }
        None
    }
}
