//! IP side table.
//!
//! Hosts registered under a name of the form `ip:port` are also indexed by
//! their IP. The table sits next to the tree rather than inside it: it has its
//! own synchronization and does not take part in the tree invariants.

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;

use crate::node::{ip_prefix, NodeId};

#[derive(Debug, Default)]
pub(crate) struct IpTable {
    by_ip: DashMap<String, NodeId>,
    /// Registered hosts in insertion order, with their IP.
    ordered: Mutex<Vec<(String, NodeId)>>,
}

impl IpTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Index `id` if `name` carries an IP prefix. The latest host wins.
    pub(crate) fn register(&self, name: &str, id: NodeId) {
        let Some(ip) = ip_prefix(name) else {
            return;
        };
        self.by_ip.insert(ip.to_string(), id);
        let mut ordered = self.ordered.lock();
        if !ordered.iter().any(|(_, existing)| *existing == id) {
            ordered.push((ip.to_string(), id));
        }
    }

    /// Drop `id`. If it was the host indexed under its IP, the most recently
    /// registered host left with that IP takes over.
    pub(crate) fn forget(&self, id: NodeId) {
        let mut ordered = self.ordered.lock();
        let Some(position) = ordered.iter().position(|(_, existing)| *existing == id) else {
            return;
        };
        let (ip, _) = ordered.remove(position);

        let indexed_here = self.by_ip.get(&ip).map_or(false, |entry| *entry.value() == id);
        if !indexed_here {
            return;
        }
        match ordered.iter().rev().find(|(other, _)| *other == ip) {
            Some((_, survivor)) => {
                self.by_ip.insert(ip, *survivor);
            }
            None => {
                self.by_ip.remove(&ip);
            }
        }
    }

    pub(crate) fn get(&self, ip: &str) -> Option<NodeId> {
        self.by_ip.get(ip).map(|entry| *entry.value())
    }

    pub(crate) fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NodeId> {
        let ordered = self.ordered.lock();
        if ordered.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..ordered.len());
        ordered.get(index).map(|(_, id)| *id)
    }

    /// IPs of registered hosts, in insertion order, minus `exclude`.
    pub(crate) fn candidates(&self, exclude: &[&str]) -> Vec<String> {
        self.ordered
            .lock()
            .iter()
            .filter(|(ip, _)| !exclude.contains(&ip.as_str()))
            .map(|(ip, _)| ip.clone())
            .collect()
    }
}
