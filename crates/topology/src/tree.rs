//! Arena-backed topology tree.
//!
//! Every node lives in a slot of a flat arena and refers to its parent and
//! children by [`NodeId`]. Branches keep their children in insertion order
//! together with a cached count of the leaves below them. The cache is
//! maintained incrementally on insert and remove and never recomputed.
//!
//! The tree itself is not synchronized; `NetworkTopology` wraps it in a lock
//! together with the rack registry.

use crate::error::{Result, TopologyError};
use crate::node::{join_path, NodeId, NodeInfo, NodeKind, PATH_SEPARATOR, PATH_SEPARATOR_STR, ROOT};

#[derive(Debug, Clone)]
enum Kind {
    Leaf,
    Branch {
        children: Vec<NodeId>,
        leaf_count: usize,
    },
}

/// A node as stored in the arena.
#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    pub(crate) name: String,
    /// Normalized path of the parent (`""` for children of the root).
    pub(crate) location: String,
    pub(crate) level: usize,
    pub(crate) parent: Option<NodeId>,
    kind: Kind,
}

impl TreeNode {
    fn leaf(name: &str, location: &str, level: usize, parent: NodeId) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            level,
            parent: Some(parent),
            kind: Kind::Leaf,
        }
    }

    fn branch(name: &str, location: &str, level: usize, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            level,
            parent,
            kind: Kind::Branch {
                children: Vec::new(),
                leaf_count: 0,
            },
        }
    }

    /// Full path; `/` for the root.
    pub(crate) fn path(&self) -> String {
        join_path(&self.location, &self.name)
    }

    /// Location that children of this node carry.
    fn child_location(&self) -> String {
        if self.parent.is_none() {
            ROOT.to_string()
        } else {
            self.path()
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, Kind::Leaf)
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.kind {
            Kind::Leaf => NodeKind::Leaf,
            Kind::Branch { .. } => NodeKind::Branch,
        }
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        match &self.kind {
            Kind::Leaf => &[],
            Kind::Branch { children, .. } => children,
        }
    }

    /// Leaves at or below this node.
    pub(crate) fn leaf_count(&self) -> usize {
        match self.kind {
            Kind::Leaf => 1,
            Kind::Branch { leaf_count, .. } => leaf_count,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<TreeNode>,
}

/// Outcome of a successful leaf insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    /// A new leaf was attached and leaf counts were bumped.
    Added(NodeId),
    /// A leaf with the same name already existed and was replaced in place.
    Replaced(NodeId),
}

impl Insertion {
    pub(crate) fn id(self) -> NodeId {
        match self {
            Insertion::Added(id) | Insertion::Replaced(id) => id,
        }
    }
}

/// The topology tree: an arena of nodes rooted at an unnamed branch.
#[derive(Debug)]
pub(crate) struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub(crate) fn new() -> Self {
        let root = TreeNode::branch(ROOT, ROOT, 0, None);
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId::new(0, 0),
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a live node. Stale handles return `None`.
    pub(crate) fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: TreeNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.node = Some(node);
                return NodeId::new(index, slot.generation);
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::new(index, 0)
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.is_some() {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match self.get_mut(id).map(|node| &mut node.kind) {
            Some(Kind::Branch { children, .. }) => Some(children),
            _ => None,
        }
    }

    fn adjust_leaf_counts(&mut self, branches: &[NodeId], grow: bool) {
        for &id in branches {
            if let Some(Kind::Branch { leaf_count, .. }) = self.get_mut(id).map(|node| &mut node.kind) {
                *leaf_count = if grow {
                    *leaf_count + 1
                } else {
                    leaf_count.saturating_sub(1)
                };
            }
        }
    }

    pub(crate) fn info(&self, id: NodeId) -> Option<NodeInfo> {
        self.get(id).map(|node| NodeInfo {
            id,
            name: node.name.clone(),
            location: node.location.clone(),
            level: node.level,
            kind: node.kind(),
            parent: node.parent,
            leaf_count: node.leaf_count(),
        })
    }

    pub(crate) fn path_of(&self, id: NodeId) -> Option<String> {
        self.get(id).map(TreeNode::path)
    }

    pub(crate) fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub(crate) fn num_leaves(&self) -> usize {
        self.get(self.root).map_or(0, TreeNode::leaf_count)
    }

    /// A branch is a rack if it has no children or its first child is a leaf.
    pub(crate) fn is_rack(&self, id: NodeId) -> bool {
        match self.get(id) {
            Some(node) if !node.is_leaf() => match node.children().first() {
                None => true,
                Some(&first) => self.get(first).map_or(false, TreeNode::is_leaf),
            },
            _ => false,
        }
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?
            .children()
            .iter()
            .copied()
            .find(|&child| self.get(child).map_or(false, |node| node.name == name))
    }

    /// Walk the handle's ancestor chain for `level` steps looking for the root.
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let mut parent = node.parent;
        let mut level = node.level;
        while let Some(current) = parent {
            if level == 0 {
                break;
            }
            if current == self.root {
                return true;
            }
            parent = self.parent_of(current);
            level -= 1;
        }
        false
    }

    /// Resolve a normalized path to a node.
    pub(crate) fn resolve(&self, normalized: &str) -> Option<NodeId> {
        if normalized == ROOT {
            return Some(self.root);
        }
        let rest = normalized.strip_prefix(PATH_SEPARATOR)?;
        let mut current = self.root;
        for segment in rest.split(PATH_SEPARATOR) {
            if self.get(current)?.is_leaf() {
                return None;
            }
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }

    /// Attach a leaf at the normalized `location`, creating missing branches.
    ///
    /// A leaf with the same name under the same rack is replaced in place and
    /// keeps its handle.
    pub(crate) fn insert(&mut self, name: &str, location: &str) -> Result<Insertion> {
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(TopologyError::invalid_topology(format!(
                "Invalid leaf name {:?} at {}: names must be non-empty and contain no {}",
                name, location, PATH_SEPARATOR
            )));
        }
        if location == ROOT {
            return Err(TopologyError::invalid_topology(format!(
                "{} cannot be attached directly to the root",
                join_path(location, name)
            )));
        }

        let mut current = self.root;
        let mut walked = Vec::new();
        loop {
            let (here, level, child_location) = match self.get(current) {
                Some(node) => (node.path(), node.level, node.child_location()),
                None => return Err(TopologyError::invalid_topology("dangling branch handle")),
            };
            if !is_ancestor_path(&here, location) {
                return Err(TopologyError::invalid_topology(format!(
                    "{}, which is located at {}, is not a descendant of {}",
                    name, location, here
                )));
            }
            walked.push(current);

            if here == location {
                return self.attach_leaf(current, level, name, location, &walked);
            }

            let next = next_ancestor_name(&here, location).ok_or_else(|| {
                TopologyError::invalid_topology(format!("cannot descend from {} towards {}", here, location))
            })?;
            current = match self.child_named(current, next) {
                Some(child) => {
                    if self.get(child).map_or(false, TreeNode::is_leaf) {
                        return Err(TopologyError::invalid_topology(format!(
                            "{} is a leaf and cannot hold {}",
                            join_path(&child_location, next),
                            join_path(location, name)
                        )));
                    }
                    child
                }
                None => {
                    let branch = TreeNode::branch(next, &child_location, level + 1, Some(current));
                    let id = self.alloc(branch);
                    if let Some(children) = self.children_mut(current) {
                        children.push(id);
                    }
                    id
                }
            };
        }
    }

    fn attach_leaf(
        &mut self,
        parent: NodeId,
        parent_level: usize,
        name: &str,
        location: &str,
        walked: &[NodeId],
    ) -> Result<Insertion> {
        if let Some(existing) = self.child_named(parent, name) {
            return match self.get_mut(existing) {
                Some(node) if node.is_leaf() => {
                    node.location = location.to_string();
                    node.level = parent_level + 1;
                    Ok(Insertion::Replaced(existing))
                }
                _ => Err(TopologyError::invalid_topology(format!(
                    "{} is an inner node and cannot be replaced by a leaf",
                    join_path(location, name)
                ))),
            };
        }

        let id = self.alloc(TreeNode::leaf(name, location, parent_level + 1, parent));
        if let Some(children) = self.children_mut(parent) {
            children.push(id);
        }
        self.adjust_leaf_counts(walked, true);
        Ok(Insertion::Added(id))
    }

    /// Detach a leaf, pruning branches left without children.
    ///
    /// Returns `Ok(false)` if the leaf is no longer in the tree.
    pub(crate) fn remove(&mut self, id: NodeId) -> Result<bool> {
        let (name, location) = match self.get(id) {
            None => return Ok(false),
            Some(node) if !node.is_leaf() => {
                return Err(TopologyError::invalid_topology(format!(
                    "Not allow to remove an inner node: {}",
                    node.path()
                )))
            }
            Some(node) => (node.name.clone(), node.location.clone()),
        };

        let mut current = self.root;
        let mut walked = vec![current];
        loop {
            let here = match self.path_of(current) {
                Some(here) => here,
                None => return Ok(false),
            };
            if !is_ancestor_path(&here, &location) {
                return Err(TopologyError::invalid_topology(format!(
                    "{}, which is located at {}, is not a descendant of {}",
                    name, location, here
                )));
            }
            if here == location {
                break;
            }
            let next = match next_ancestor_name(&here, &location) {
                Some(next) => next,
                None => return Ok(false),
            };
            match self.child_named(current, next) {
                Some(child) if self.get(child).map_or(false, |node| !node.is_leaf()) => {
                    current = child;
                    walked.push(child);
                }
                _ => return Ok(false),
            }
        }

        let Some(position) = self.get(current).and_then(|rack| {
            rack.children()
                .iter()
                .position(|&child| self.get(child).map_or(false, |node| node.name == name))
        }) else {
            return Ok(false);
        };
        let removed = match self.children_mut(current) {
            Some(children) => children.remove(position),
            None => return Ok(false),
        };
        self.release(removed);
        self.adjust_leaf_counts(&walked, false);

        for pair in walked.windows(2).rev() {
            let (parent, child) = (pair[0], pair[1]);
            if !self.get(child).map_or(false, |node| node.children().is_empty()) {
                break;
            }
            if let Some(children) = self.children_mut(parent) {
                children.retain(|&c| c != child);
            }
            self.release(child);
        }
        Ok(true)
    }

    /// The `leaf_index`-th leaf below `branch`, skipping the `excluded` node
    /// (a single leaf or a whole subtree).
    pub(crate) fn leaf_at(&self, branch: NodeId, leaf_index: usize, excluded: Option<NodeId>) -> Option<NodeId> {
        let node = self.get(branch)?;
        let mut excluded = excluded.and_then(|id| self.get(id).map(|ex| (id, ex)));

        if self.is_rack(branch) {
            let mut index = leaf_index;
            if let Some((ex_id, ex)) = excluded {
                if ex.is_leaf() {
                    if let Some(ex_index) = node.children().iter().position(|&c| c == ex_id) {
                        if index >= ex_index {
                            index += 1;
                        }
                    }
                }
            }
            return node.children().get(index).copied();
        }

        let mut count = 0;
        for &child_id in node.children() {
            let child = self.get(child_id)?;
            if let Some((ex_id, _)) = excluded {
                if ex_id == child_id {
                    excluded = None;
                    continue;
                }
            }
            let mut leaves = child.leaf_count();
            if let Some((_, ex)) = excluded {
                if is_ancestor_path(&child.path(), &ex.location) {
                    leaves = leaves.saturating_sub(ex.leaf_count());
                }
            }
            if count + leaves > leaf_index {
                if child.is_leaf() {
                    return Some(child_id);
                }
                return self.leaf_at(child_id, leaf_index - count, excluded.map(|(id, _)| id));
            }
            count += leaves;
        }
        None
    }

    /// All leaves in enumeration order.
    pub(crate) fn leaves(&self) -> Vec<NodeId> {
        (0..self.num_leaves())
            .filter_map(|index| self.leaf_at(self.root, index, None))
            .collect()
    }
}

/// Path-prefix ancestry: the root is everyone's ancestor, otherwise
/// `location + "/"` must start with `candidate + "/"`.
pub(crate) fn is_ancestor_path(candidate: &str, location: &str) -> bool {
    candidate == PATH_SEPARATOR_STR || within(location, candidate)
}

/// `path + "/"` starts with `scope + "/"`.
pub(crate) fn within(path: &str, scope: &str) -> bool {
    match path.strip_prefix(scope) {
        Some(rest) => rest.is_empty() || rest.starts_with(PATH_SEPARATOR),
        None => false,
    }
}

/// Name of the child of `here` on the way down to `location`.
fn next_ancestor_name<'a>(here: &str, location: &'a str) -> Option<&'a str> {
    let rest = location.get(here.len()..)?;
    let rest = rest.strip_prefix(PATH_SEPARATOR).unwrap_or(rest);
    match rest.find(PATH_SEPARATOR) {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(hosts: &[(&str, &str)]) -> (Tree, Vec<NodeId>) {
        let mut tree = Tree::new();
        let ids = hosts
            .iter()
            .map(|(location, name)| tree.insert(name, location).unwrap().id())
            .collect();
        (tree, ids)
    }

    #[test]
    fn test_insert_creates_branches() {
        let (tree, ids) = build(&[("/dc1/r1", "h1")]);

        let rack = tree.resolve("/dc1/r1").unwrap();
        let dc = tree.resolve("/dc1").unwrap();
        assert_eq!(tree.get(dc).unwrap().level, 1);
        assert_eq!(tree.get(dc).unwrap().location, ROOT);
        assert_eq!(tree.get(rack).unwrap().level, 2);
        assert_eq!(tree.get(rack).unwrap().location, "/dc1");
        assert_eq!(tree.get(ids[0]).unwrap().level, 3);
        assert_eq!(tree.parent_of(ids[0]), Some(rack));
        assert!(tree.is_rack(rack));
        assert!(!tree.is_rack(dc));
        assert_eq!(tree.num_leaves(), 1);
    }

    #[test]
    fn test_duplicate_name_replaces() {
        let (mut tree, ids) = build(&[("/r1", "h1"), ("/r1", "h2")]);

        let again = tree.insert("h1", "/r1").unwrap();
        assert_eq!(again, Insertion::Replaced(ids[0]));
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.get(tree.resolve("/r1").unwrap()).unwrap().leaf_count(), 2);
    }

    #[test]
    fn test_insert_rejects_bad_locations() {
        let (mut tree, _) = build(&[("/r1", "h1")]);

        assert!(tree.insert("h9", ROOT).is_err());
        // Leaf in the middle of the path.
        assert!(tree.insert("h9", "/r1/h1").is_err());
        // Name collides with a branch.
        let (mut tree, _) = build(&[("/dc/r1", "h1")]);
        assert!(tree.insert("r1", "/dc").is_err());
        assert_eq!(tree.num_leaves(), 1);
    }

    #[test]
    fn test_remove_prunes_empty_branches() {
        let (mut tree, ids) = build(&[("/dc1/r1", "h1"), ("/dc1/r2", "h2")]);

        assert!(tree.remove(ids[0]).unwrap());
        assert!(tree.resolve("/dc1/r1").is_none());
        assert!(tree.resolve("/dc1").is_some());
        assert_eq!(tree.num_leaves(), 1);

        assert!(tree.remove(ids[1]).unwrap());
        assert!(tree.resolve("/dc1").is_none());
        assert!(tree.get(tree.root()).unwrap().children().is_empty());
        assert_eq!(tree.num_leaves(), 0);

        // Stale handle.
        assert!(!tree.remove(ids[1]).unwrap());
    }

    #[test]
    fn test_remove_rejects_branch() {
        let (mut tree, _) = build(&[("/r1", "h1")]);
        let rack = tree.resolve("/r1").unwrap();
        assert!(matches!(tree.remove(rack), Err(TopologyError::InvalidTopology(_))));
    }

    #[test]
    fn test_released_slot_never_aliases() {
        let (mut tree, ids) = build(&[("/r1", "h1")]);
        assert!(tree.remove(ids[0]).unwrap());

        let reused = tree.insert("h2", "/r1").unwrap().id();
        assert!(tree.get(ids[0]).is_none());
        assert!(tree.get(reused).is_some());
        assert_ne!(reused, ids[0]);
        assert!(!tree.contains(ids[0]));
        assert!(tree.contains(reused));
    }

    #[test]
    fn test_resolve() {
        let (tree, ids) = build(&[("/dc1/r1", "h1")]);

        assert_eq!(tree.resolve(ROOT), Some(tree.root()));
        assert_eq!(tree.resolve("/dc1/r1/h1"), Some(ids[0]));
        assert_eq!(tree.resolve("/dc1/r1/h1/x"), None);
        assert_eq!(tree.resolve("/dc1/r2"), None);
        assert_eq!(tree.resolve("dc1"), None);
    }

    #[test]
    fn test_leaf_at_skips_excluded() {
        let (tree, ids) = build(&[
            ("/dc1/r1", "h1"),
            ("/dc1/r1", "h2"),
            ("/dc1/r2", "h3"),
            ("/dc2/r3", "h4"),
        ]);
        let root = tree.root();

        assert_eq!(tree.leaves(), ids);

        // Excluding a single leaf shifts later indices within its rack.
        let picked: Vec<_> = (0..3).map(|i| tree.leaf_at(root, i, Some(ids[0])).unwrap()).collect();
        assert_eq!(picked, vec![ids[1], ids[2], ids[3]]);

        // Excluding a whole subtree.
        let r1 = tree.resolve("/dc1/r1").unwrap();
        let picked: Vec<_> = (0..2).map(|i| tree.leaf_at(root, i, Some(r1)).unwrap()).collect();
        assert_eq!(picked, vec![ids[2], ids[3]]);
        assert_eq!(tree.leaf_at(root, 2, Some(r1)), None);

        let dc1 = tree.resolve("/dc1").unwrap();
        assert_eq!(tree.leaf_at(root, 0, Some(dc1)), Some(ids[3]));
    }

    #[test]
    fn test_path_prefix_ancestry() {
        assert!(is_ancestor_path("/", "/anything"));
        assert!(is_ancestor_path("/a", "/a"));
        assert!(is_ancestor_path("/a", "/a/b"));
        assert!(!is_ancestor_path("/a", "/ab"));
        assert!(within("/a/h1", ROOT));
        assert!(!within("/ab/h1", "/a"));
    }

    #[test]
    fn test_next_ancestor_name() {
        assert_eq!(next_ancestor_name("/", "/dc1/r1"), Some("dc1"));
        assert_eq!(next_ancestor_name("/dc1", "/dc1/r1"), Some("r1"));
        assert_eq!(next_ancestor_name("/dc1", "/dc1/r1/x"), Some("r1"));
    }
}
