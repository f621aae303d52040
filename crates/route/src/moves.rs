//! Move enumerator (§C7, §4.5): candidate SWAP / TELEPORT / TELEGATE sets
//! for one iteration.

use std::collections::BTreeSet;

use telesabre_circuit::{Architecture, Circuit, CoreId, Layout, PhysQubit};

use crate::comm_queues::CommQueueSet;
use crate::contracted_graph::{ContractedGraphBuilder, TrafficTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Swap(PhysQubit, PhysQubit),
    Teleport {
        source: PhysQubit,
        mediator: PhysQubit,
        target: PhysQubit,
    },
    Telegate {
        gate: usize,
        path: [PhysQubit; 4],
    },
}

/// A frontier 2q gate whose target qubits currently sit on different cores.
#[derive(Debug, Clone)]
pub struct SeparatedPair {
    pub gate: usize,
    pub phys1: PhysQubit,
    pub phys2: PhysQubit,
    pub path: Vec<PhysQubit>,
}

pub fn separated_pairs(
    frontier: &[usize],
    circuit: &Circuit,
    layout: &Layout,
    arch: &Architecture,
    graph: &ContractedGraphBuilder<'_>,
    queues: &CommQueueSet,
    full_core_penalty: f64,
    traffic: &mut TrafficTable,
) -> Vec<SeparatedPair> {
    let mut out = Vec::new();
    for &gate in frontier {
        let g = &circuit.gates[gate];
        if g.qubits.len() != 2 {
            continue;
        }
        let phys1 = PhysQubit::from(layout.phys(g.qubits[0].index()));
        let phys2 = PhysQubit::from(layout.phys(g.qubits[1].index()));
        if arch.qubit_to_core(phys1) != arch.qubit_to_core(phys2) {
            let path = graph.shortest_path(layout, queues, full_core_penalty, traffic, phys1, phys2);
            out.push(SeparatedPair { gate, phys1, phys2, path });
        }
    }
    out
}

/// §4.5.2: all intra-core edges incident to a frontier-occupied physical
/// qubit or to the nearest free qubit of any comm qubit that a planned
/// route touches, excluding edges joining two free slots.
pub fn candidate_swaps(
    frontier: &[usize],
    separated: &[SeparatedPair],
    circuit: &Circuit,
    layout: &Layout,
    arch: &Architecture,
    queues: &CommQueueSet,
) -> Vec<(PhysQubit, PhysQubit)> {
    // A `BTreeSet` rather than a hashed set: §9's design notes require
    // candidate ordering to be a stable, sorted sequence so the tie-break
    // RNG draw lands on the same candidate for a given seed every run.
    let mut anchors: BTreeSet<u32> = BTreeSet::new();
    for &gate in frontier {
        for q in &circuit.gates[gate].qubits {
            anchors.insert(layout.phys(q.index()) as u32);
        }
    }
    for pair in separated {
        for &p in &pair.path {
            if arch.is_comm_qubit(p) {
                if let Some(free) = queues.nearest_free(p) {
                    anchors.insert(free as u32);
                }
            }
        }
    }

    let mut seen_edges: BTreeSet<(u32, u32)> = BTreeSet::new();
    let mut swaps = Vec::new();
    for &a in &anchors {
        let p = PhysQubit::from(a);
        for n in arch.intra_neighbors(p) {
            let key = if p.0 <= n.0 { (p.0, n.0) } else { (n.0, p.0) };
            if !seen_edges.insert(key) {
                continue;
            }
            if layout.is_free(p.index()) && layout.is_free(n.index()) {
                continue;
            }
            swaps.push((p, n));
        }
    }
    swaps
}

/// §4.5.3/4.5.4: teleport and telegate candidates from each separated
/// pair's planned path.
pub fn candidate_teleports_and_telegates(
    separated: &[SeparatedPair],
    layout: &Layout,
    arch: &Architecture,
) -> (Vec<Move>, Vec<Move>) {
    let mut teleports = Vec::new();
    let mut telegates = Vec::new();

    for pair in separated {
        let path = &pair.path;
        if path.len() == 4 {
            let (g1, m1, m2, g2) = (path[0], path[1], path[2], path[3]);
            if layout.is_free(m1.index())
                && layout.is_free(m2.index())
                && arch.is_comm_qubit(m1)
                && arch.is_comm_qubit(m2)
                && arch.has_intra_edge(g1, m1)
                && arch.has_intra_edge(g2, m2)
                && arch.has_inter_edge(m1, m2)
            {
                telegates.push(Move::Telegate {
                    gate: pair.gate,
                    path: [g1, m1, m2, g2],
                });
                continue;
            }
        }

        if path.len() >= 3 {
            if let Some(mv) = teleport_candidate(path[0], path[1], path[2], arch, layout) {
                teleports.push(mv);
            }
            let n = path.len();
            if let Some(mv) = teleport_candidate(path[n - 1], path[n - 2], path[n - 3], arch, layout) {
                teleports.push(mv);
            }
        }
    }

    (teleports, telegates)
}

fn teleport_candidate(
    source: PhysQubit,
    mediator: PhysQubit,
    target: PhysQubit,
    arch: &Architecture,
    layout: &Layout,
) -> Option<Move> {
    if !layout.is_free(mediator.index()) || !layout.is_free(target.index()) {
        return None;
    }
    let source_core = arch.qubit_to_core(source);
    let target_core = arch.qubit_to_core(target);
    if arch.qubit_to_core(mediator) != source_core || target_core == source_core {
        return None;
    }
    if !arch.has_intra_edge(source, mediator) || !arch.has_inter_edge(mediator, target) {
        return None;
    }
    if layout.get_core_capacity(arch, target_core) < 2 {
        return None;
    }
    Some(Move::Teleport {
        source,
        mediator,
        target,
    })
}

pub fn core_is_full(layout: &Layout, arch: &Architecture, core: CoreId) -> bool {
    layout.get_core_capacity(arch, core) < 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use telesabre_circuit::{ArchitectureSpec, Gate, VirtQubit};

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
    fn separated_pairs_finds_the_cross_core_frontier_gate() {
        let arch = two_core();
        let circuit = Circuit::new(2, vec![Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(1u32)])]).unwrap();
        let layout = Layout::new(vec![0, 2, 3, 1], 2);
        let queues = CommQueueSet::build(&arch, &layout);
        let graph = ContractedGraphBuilder::new(&arch);
        let mut traffic = TrafficTable::new();
        let pairs = separated_pairs(&[0], &circuit, &layout, &arch, &graph, &queues, 10.0, &mut traffic);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].phys1, PhysQubit::from(0u32));
        assert_eq!(pairs[0].phys2, PhysQubit::from(3u32));
    }

    #[test]
    fn candidate_swaps_excludes_free_to_free_edges() {
        let arch = two_core();
        let circuit = Circuit::new(1, vec![Gate::new("h", [VirtQubit::from(0u32)])]).unwrap();
        // virt 0 sits at phys0; phys1, phys2, phys3 are all free, so the
        // only anchor is phys0 and its sole intra edge (0, 1) is occupied-free.
        let layout = Layout::new(vec![0, 1, 2, 3], 1);
        let queues = CommQueueSet::build(&arch, &layout);
        let swaps = candidate_swaps(&[0], &[], &circuit, &layout, &arch, &queues);
        assert_eq!(swaps, vec![(PhysQubit::from(0u32), PhysQubit::from(1u32))]);
    }

    #[test]
    fn length_four_path_with_free_mediators_yields_a_telegate() {
        let arch = two_core();
        let layout = Layout::new(vec![0, 4, 5, 1], 2);
        let pair = SeparatedPair {
            gate: 0,
            phys1: PhysQubit::from(0u32),
            phys2: PhysQubit::from(3u32),
            path: vec![
                PhysQubit::from(0u32),
                PhysQubit::from(1u32),
                PhysQubit::from(2u32),
                PhysQubit::from(3u32),
            ],
        };
        let (teleports, telegates) = candidate_teleports_and_telegates(&[pair], &layout, &arch);
        assert!(teleports.is_empty());
        assert_eq!(telegates.len(), 1);
        assert!(matches!(telegates[0], Move::Telegate { gate: 0, .. }));
    }

    #[test]
    fn teleport_candidate_rejects_occupied_mediator() {
        let arch = two_core();
        let layout = Layout::new(vec![0, 1, 2, 3], 4);
        // phys1 (the mediator) is occupied by virt1, so no teleport is admissible.
        assert!(teleport_candidate(
            PhysQubit::from(0u32),
            PhysQubit::from(1u32),
            PhysQubit::from(2u32),
            &arch,
            &layout,
        )
        .is_none());
    }

    #[test]
    fn teleport_candidate_rejects_full_target_core() {
        let arch = two_core();
        // mediator (phys1) and target (phys2) are both free, but phys2 is
        // the only free slot in core 1 — teleporting into it would leave
        // that core with zero free slots.
        let layout = Layout::new(vec![0, 3, 4, 2], 3);
        assert!(teleport_candidate(
            PhysQubit::from(0u32),
            PhysQubit::from(1u32),
            PhysQubit::from(2u32),
            &arch,
            &layout,
        )
        .is_none());
    }
}
