//! Node abstractions for the network topology tree.
//!
//! A node is either a *leaf* (a host) or a *branch* (a switch, rack or data
//! center). Nodes are addressed by a slash-delimited network location, the
//! path of their parent, plus their own name:
//!
//! ```text
//! /dc1/rack1/host7
//! └──┬─────┘ └─┬─┘
//!  location    name
//! ```
//!
//! Inside the tree every node lives in an arena slot and is referred to by a
//! compact [`NodeId`] handle.

use std::fmt;

use crate::error::{Result, TopologyError};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// [`PATH_SEPARATOR`] as a string slice.
pub const PATH_SEPARATOR_STR: &str = "/";

/// Canonical location of the root.
pub const ROOT: &str = "";

/// Rack used by callers that cannot resolve a host's real rack.
pub const DEFAULT_RACK: &str = "/default-rack";

/// Level of hosts in a `/rack/host` topology.
pub const DEFAULT_HOST_LEVEL: usize = 2;

/// Marker prefixed to a scope to negate it.
pub const SCOPE_NEGATION: char = '~';

/// Handle to a node stored in a topology.
///
/// The generation changes every time the arena slot is released, so a handle
/// kept across a removal never aliases whatever node reuses the slot.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Whether a node is a host or an inner switch.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    /// A host. Has no children.
    Leaf,
    /// A switch, rack or data center. Owns an ordered list of children.
    Branch,
}

/// Description of a node that is not (yet) part of a topology.
///
/// `NetworkTopology::add` only accepts leaves; branches are created
/// implicitly from the leaf's location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Host or switch name, unique among its siblings.
    pub name: String,
    /// Path of the parent, e.g. `/dc1/rack1`.
    pub location: String,
    pub kind: NodeKind,
}

impl Node {
    /// Describe a host named `name` attached to the rack at `location`.
    pub fn leaf(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            kind: NodeKind::Leaf,
        }
    }

    /// Describe an inner node.
    pub fn branch(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            kind: NodeKind::Branch,
        }
    }

    /// Full path of this node.
    pub fn path(&self) -> String {
        join_path(&self.location, &self.name)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Point-in-time view of a node stored in a topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub location: String,
    /// Depth in the tree; the root is level 0.
    pub level: usize,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Leaves under this node (1 for a leaf).
    pub leaf_count: usize,
}

impl NodeInfo {
    /// Full path of this node; `/` for the root.
    pub fn path(&self) -> String {
        join_path(&self.location, &self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }
}

/// Join a normalized location and a name into a full path.
pub(crate) fn join_path(location: &str, name: &str) -> String {
    let mut path = String::with_capacity(location.len() + name.len() + 1);
    path.push_str(location);
    path.push(PATH_SEPARATOR);
    path.push_str(name);
    path
}

/// Canonicalize a location string.
///
/// An empty path is the root. Any other path must start with `/`; trailing
/// separators are stripped, so `/` itself also becomes the root.
pub fn normalize(path: &str) -> Result<String> {
    if path.is_empty() {
        return Ok(ROOT.to_string());
    }
    if !path.starts_with(PATH_SEPARATOR) {
        return Err(TopologyError::InvalidPath(format!(
            "Network Location path does not start with {}: {}",
            PATH_SEPARATOR_STR, path
        )));
    }
    Ok(path.trim_end_matches(PATH_SEPARATOR).to_string())
}

/// Name of the IP-like prefix of a host name (`10.0.0.1:50010` -> `10.0.0.1`).
pub(crate) fn ip_prefix(name: &str) -> Option<&str> {
    match name.find(':') {
        Some(idx) if idx > 0 => Some(&name[..idx]),
        _ => None,
    }
}
