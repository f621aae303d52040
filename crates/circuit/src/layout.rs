//! The mutable virtual↔physical qubit bijection (§C3, §4.2).
//!
//! Mirrors `NLayout` from the single-core SABre router this crate
//! generalizes: plain `Vec<usize>` in both directions, no newtypes, because
//! this is the structure the routing loop mutates and inspects on every
//! iteration. Free physical slots hold a "virtual" id `>= num_virtual`,
//! distinct per slot, so `virt_to_phys` stays a genuine permutation of
//! `0..num_qubits` (Invariant I1) instead of needing an `Option`.

use crate::architecture::Architecture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    phys_to_virt: Vec<usize>,
    virt_to_phys: Vec<usize>,
    num_virtual: usize,
}

impl Layout {
    /// Builds a layout from an explicit `phys_to_virt` assignment. Entries
    /// `>= num_virtual` are free-slot sentinels and must themselves form a
    /// permutation of `[num_virtual, phys_to_virt.len())` so that the
    /// inverse mapping is well defined for them too.
    pub fn new(phys_to_virt: Vec<usize>, num_virtual: usize) -> Self {
        let mut virt_to_phys = vec![0usize; phys_to_virt.len()];
        for (phys, &virt) in phys_to_virt.iter().enumerate() {
            virt_to_phys[virt] = phys;
        }
        Layout {
            phys_to_virt,
            virt_to_phys,
            num_virtual,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.phys_to_virt.len()
    }

    pub fn num_virtual(&self) -> usize {
        self.num_virtual
    }

    #[inline]
    pub fn phys(&self, virt: usize) -> usize {
        self.virt_to_phys[virt]
    }

    #[inline]
    pub fn virt(&self, phys: usize) -> usize {
        self.phys_to_virt[phys]
    }

    #[inline]
    pub fn is_free(&self, phys: usize) -> bool {
        self.phys_to_virt[phys] >= self.num_virtual
    }

    pub fn free_qubits(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.phys_to_virt.len()).filter(move |&p| self.is_free(p))
    }

    /// Exchanges the contents of two physical slots. Legal only when
    /// `(p1, p2)` is an intra-core coupling edge; the caller is expected to
    /// have already checked this against the [`Architecture`] (kept out of
    /// this method so hypothetical apply/undo scoring, which calls this in
    /// a tight loop, doesn't pay for a repeated adjacency lookup).
    #[inline]
    pub fn swap(&mut self, p1: usize, p2: usize) {
        let (v1, v2) = (self.phys_to_virt[p1], self.phys_to_virt[p2]);
        self.phys_to_virt[p1] = v2;
        self.phys_to_virt[p2] = v1;
        self.virt_to_phys[v1] = p2;
        self.virt_to_phys[v2] = p1;
    }

    /// Teleports the occupant of `p_src` to `p_tgt` via the free mediator
    /// `p_med`. `p_med` is never written to directly — the primitive is
    /// "free mediator enables a long-distance swap" — but callers must
    /// still have verified `p_med` is free and adjacent on both hops before
    /// calling this, since those checks require the [`Architecture`].
    #[inline]
    pub fn teleport(&mut self, p_src: usize, p_med: usize, p_tgt: usize) {
        debug_assert!(!self.is_free(p_src), "teleport source must be occupied");
        debug_assert!(self.is_free(p_med), "teleport mediator must be free");
        debug_assert!(self.is_free(p_tgt), "teleport target must be free");
        self.swap(p_src, p_tgt);
    }

    pub fn get_core_capacity(&self, arch: &Architecture, core: crate::qubit::CoreId) -> usize {
        arch.core_qubits(core)
            .iter()
            .filter(|&&p| self.is_free(p.index()))
            .count()
    }

    pub fn can_execute_gate(&self, arch: &Architecture, qubits: &[usize]) -> bool {
        match qubits {
            [_] => true,
            [a, b] => {
                let (pa, pb) = (self.phys(*a), self.phys(*b));
                arch.has_intra_edge(pa.into(), pb.into())
            }
            _ => false,
        }
    }

    pub fn phys_to_virt(&self) -> &[usize] {
        &self.phys_to_virt
    }

    pub fn virt_to_phys(&self) -> &[usize] {
        &self.virt_to_phys
    }
}
