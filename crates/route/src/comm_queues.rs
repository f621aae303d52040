//! Per-communication-qubit nearest-free-qubit queues, built on [`crate::priority_queue::SparseBucketPriorityQueue`].
//!
//! One queue per communication qubit `p_c`, holding the intra-core distance
//! from `p_c` to every currently-free physical qubit in `p_c`'s own core.
//! The driver keeps these in lockstep with the live [`Layout`] and never
//! recomputes them from scratch after the initial build — only the two
//! physical slots touched by a committed move change occupancy, so only
//! those queues (and only the comm qubits sharing their core) need an
//! incremental update.

use telesabre_circuit::{Architecture, CoreId, Layout, PhysQubit};

use crate::priority_queue::SparseBucketPriorityQueue;

#[derive(Debug, Clone)]
pub struct CommQueueSet {
    queues: hashbrown::HashMap<u32, SparseBucketPriorityQueue<usize>>,
}

impl CommQueueSet {
    pub fn build(arch: &Architecture, layout: &Layout) -> Self {
        let mut queues = hashbrown::HashMap::new();
        for &p_c in arch.communication_qubits() {
            let mut q = SparseBucketPriorityQueue::new();
            let core = arch.qubit_to_core(p_c);
            for &free in arch.core_qubits(core) {
                if layout.is_free(free.index()) {
                    q.add_or_update(free.index(), arch.intra_distance(p_c, free));
                }
            }
            queues.insert(p_c.0, q);
        }
        CommQueueSet { queues }
    }

    pub fn queue_min(&self, p_c: PhysQubit) -> f64 {
        self.queues
            .get(&p_c.0)
            .and_then(|q| q.min_priority())
            .unwrap_or(f64::INFINITY)
    }

    pub fn nearest_free(&self, p_c: PhysQubit) -> Option<usize> {
        self.queues.get(&p_c.0).and_then(|q| q.min())
    }

    /// Called after a physical slot `phys` changes occupancy (freed or
    /// occupied). Refreshes every comm-qubit queue whose core matches
    /// `phys`'s core — §4.6's "update C1 queues for every comm qubit in the
    /// affected core".
    pub fn on_occupancy_change(&mut self, arch: &Architecture, layout: &Layout, phys: PhysQubit) {
        let core = arch.qubit_to_core(phys);
        for &p_c in arch.core_comm_qubits(core) {
            let entry = self.queues.entry(p_c.0).or_default();
            if layout.is_free(phys.index()) {
                entry.add_or_update(phys.index(), arch.intra_distance(p_c, phys));
            } else {
                entry.remove(phys.index());
            }
        }
    }

    pub fn core_capacity(&self, arch: &Architecture, layout: &Layout, core: CoreId) -> usize {
        layout.get_core_capacity(arch, core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telesabre_circuit::ArchitectureSpec;

    fn two_core() -> Architecture {
        let spec = ArchitectureSpec {
            name: "two-core".into(),
            num_cores: 2,
            num_qubits: 4,
            intra_core_edges: vec![[0, 1], [2, 3]],
            inter_core_edges: vec![[1, 2]],
            node_positions: vec![],
        };
        Architecture::from_spec(spec).unwrap()
    }

    #[test]
    fn build_seeds_queue_with_free_slots_in_same_core() {
        let arch = two_core();
        // virt 0,1,2 occupy phys 0,1,2; phys 3 is the only free slot.
        let layout = Layout::new(vec![0, 1, 2, 4], 4);
        let queues = CommQueueSet::build(&arch, &layout);
        assert_eq!(queues.nearest_free(PhysQubit::from(2u32)), Some(3));
    }

    #[test]
    fn occupancy_change_updates_same_core_queues_only() {
        let arch = two_core();
        let mut layout = Layout::new(vec![0, 1, 2, 4], 4);
        let mut queues = CommQueueSet::build(&arch, &layout);
        layout.swap(0, 3);
        queues.on_occupancy_change(&arch, &layout, PhysQubit::from(0u32));
        queues.on_occupancy_change(&arch, &layout, PhysQubit::from(3u32));
        // phys 0 (core 0) is now free: comm qubit 1's queue gains it.
        assert_eq!(queues.nearest_free(PhysQubit::from(1u32)), Some(0));
        // phys 3 (core 1) is now occupied: comm qubit 2 loses its only
        // free neighbor.
        assert_eq!(queues.nearest_free(PhysQubit::from(2u32)), None);
    }
}
