//! Locality orderings: replica sort for readers and pipeline construction for
//! writers.
//!
//! # Read path
//!
//! `sort_by_distance` is a pseudo sort. It pins at most two candidates at the
//! front (the reader itself, then one host on the reader's rack), puts a
//! random candidate first when nothing was pinned, and finally moves every
//! unpinned candidate on a master rack behind the others. The order inside
//! each of the two final partitions is whatever the in-place two-pointer
//! scan leaves behind and is not otherwise specified.
//!
//! # Write path
//!
//! `build_pipeline` orders the targets as a nearest-neighbour chain starting
//! at the writer. It is a greedy approximation of the shortest path, with
//! O(n²) distance evaluations, which is fine for replication fan-out.

use rand::Rng;

use crate::node::NodeId;
use crate::topology::TopologyState;

impl TopologyState {
    pub(crate) fn sort_by_distance<R: Rng + ?Sized>(&self, reader: Option<NodeId>, nodes: &mut [NodeId], rng: &mut R) {
        let mut pinned = 0;
        if let Some(reader) = reader {
            let mut local_rack: Option<usize> = None;
            for i in 0..nodes.len() {
                if pinned == 0 && nodes[i] == reader {
                    if i != 0 {
                        nodes.swap(0, i);
                    }
                    pinned = 1;
                    if let Some(rack_index) = local_rack {
                        // The rack-local candidate was sitting in slot 0.
                        if rack_index == 0 {
                            local_rack = Some(i);
                        }
                        break;
                    }
                } else if local_rack.is_none() && self.same_rack(Some(reader), Some(nodes[i])) {
                    local_rack = Some(i);
                    if pinned != 0 {
                        break;
                    }
                }
            }

            if let Some(rack_index) = local_rack {
                if rack_index != pinned {
                    nodes.swap(pinned, rack_index);
                }
                pinned += 1;
            }
        }

        if pinned == 0 && !nodes.is_empty() {
            let index = rng.gen_range(0..nodes.len());
            nodes.swap(0, index);
        }

        self.partition_master_racks(nodes, pinned);
    }

    /// Move candidates on master racks after everyone else, from `start` on.
    fn partition_master_racks(&self, nodes: &mut [NodeId], start: usize) {
        let on_master_rack = |id: NodeId| {
            self.tree
                .get(id)
                .map_or(false, |node| self.racks.is_special(&node.location))
        };

        let Some(mut end) = nodes.len().checked_sub(1) else {
            return;
        };
        let mut start = start;
        while start < end {
            while start < end && on_master_rack(nodes[end]) {
                end -= 1;
            }
            while start < end && !on_master_rack(nodes[start]) {
                start += 1;
            }
            if start < end {
                nodes.swap(start, end);
                end -= 1;
                start += 1;
            }
        }
    }

    pub(crate) fn build_pipeline(&self, writer: Option<NodeId>, nodes: &mut [NodeId]) {
        let Some(&first) = nodes.first() else {
            return;
        };
        let mut writer = match writer {
            Some(writer) if self.tree.contains(writer) => writer,
            _ => first,
        };

        for index in 0..nodes.len() {
            let mut shortest_index = index;
            let mut shortest = self.distance(writer, nodes[index]);
            for i in index + 1..nodes.len() {
                let current = self.distance(writer, nodes[i]);
                if current < shortest {
                    shortest = current;
                    shortest_index = i;
                }
            }
            nodes.swap(index, shortest_index);
            writer = nodes[index];
        }
    }
}
