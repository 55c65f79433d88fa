//! Network topology for replica placement.
//!
//! This crate models the placement hierarchy of a storage cluster
//! (data centers → racks → hosts) and answers the queries placement and
//! read-path policies need:
//! - Tree construction and mutation under concurrent access
//! - Path-based lookup and leaf counting
//! - Distance, ancestry and same-rack checks
//! - Exclusion-aware random selection of hosts and racks
//! - Locality-aware replica sorting and write pipeline construction
//!
//! It performs no I/O; callers feed it hosts and ask it questions.

pub mod config;
pub mod error;
mod ip_table;
pub mod node;
mod ordering;
mod query;
mod racks;
mod topology;
mod tree;

pub use config::TopologyConfig;
pub use error::{Result, TopologyError};
pub use node::{Node, NodeId, NodeInfo, NodeKind};
pub use query::UNREACHABLE;
pub use topology::NetworkTopology;
