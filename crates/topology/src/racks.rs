//! Rack registry.
//!
//! Keeps every rack location seen by the tree in insertion order so a rack can
//! be drawn uniformly by index, plus the configured set of special ("master")
//! racks that the read-path sort pushes to the tail.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub(crate) struct RackRegistry {
    racks: Vec<String>,
    special: HashSet<String>,
}

impl RackRegistry {
    pub(crate) fn new(special: impl IntoIterator<Item = String>) -> Self {
        Self {
            racks: Vec::new(),
            special: special.into_iter().collect(),
        }
    }

    /// Record a newly populated rack. Returns `false` if it was already known.
    pub(crate) fn insert(&mut self, rack: &str) -> bool {
        if self.contains(rack) {
            return false;
        }
        self.racks.push(rack.to_string());
        true
    }

    /// Forget a rack whose last leaf left. Returns `false` if it was unknown.
    pub(crate) fn remove(&mut self, rack: &str) -> bool {
        match self.racks.iter().position(|r| r == rack) {
            Some(index) => {
                self.racks.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, rack: &str) -> bool {
        self.racks.iter().any(|r| r == rack)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&str> {
        self.racks.get(index).map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.racks.len()
    }

    pub(crate) fn racks(&self) -> &[String] {
        &self.racks
    }

    pub(crate) fn is_special(&self, rack: &str) -> bool {
        self.special.contains(rack)
    }

    /// Known racks together with the special ones.
    pub(crate) fn all(&self) -> HashSet<String> {
        self.racks.iter().chain(self.special.iter()).cloned().collect()
    }
}
