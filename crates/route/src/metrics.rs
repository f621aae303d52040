//! Final metrics (§4.9): per-qubit completion times over the emitted
//! schedule, reduced to circuit depth and inter-core depth.
//!
//! The duration constants here (gate=1, swap=1, teleport=5, telegate=5) are
//! §4.9's own simplified weights for this reduction, deliberately distinct
//! from [`telesabre_circuit::Durations`] (the busy-offset model of §3 used
//! nowhere else in this crate) — see DESIGN.md for why both are kept.

use telesabre_circuit::PhysQubit;

use crate::driver::Op;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub depth: u64,
    pub inter_core_depth: u64,
    pub swaps: u64,
    pub teleports: u64,
    pub telegates: u64,
}

fn duration(op: &Op) -> u64 {
    match op {
        Op::Gate { .. } => 1,
        Op::Swap { .. } => 1,
        Op::Teleport { .. } => 5,
        Op::Telegate { .. } => 5,
    }
}

fn touches_inter_core(op: &Op) -> bool {
    matches!(op, Op::Teleport { .. } | Op::Telegate { .. })
}

fn qubits_of(op: &Op) -> Vec<usize> {
    match op {
        Op::Gate { qubits, .. } => qubits.iter().map(PhysQubit::index).collect(),
        Op::Swap { p1, p2 } => vec![p1.index(), p2.index()],
        Op::Teleport { source, mediator, target } => {
            vec![source.index(), mediator.index(), target.index()]
        }
        Op::Telegate { path, .. } => path.iter().map(PhysQubit::index).collect(),
    }
}

/// Walks `ops` in emission order, tracking per-physical-qubit completion
/// time on two parallel tracks (all ops, and teleport/telegate ops only),
/// and reduces each to its maximum — the circuit depth and the inter-core
/// depth.
pub fn compute(ops: &[Op], num_phys_qubits: usize) -> Metrics {
    let mut completion = vec![0u64; num_phys_qubits];
    let mut inter_core_completion = vec![0u64; num_phys_qubits];
    let mut metrics = Metrics::default();

    for op in ops {
        match op {
            Op::Swap { .. } => metrics.swaps += 1,
            Op::Teleport { .. } => metrics.teleports += 1,
            Op::Telegate { .. } => metrics.telegates += 1,
            Op::Gate { .. } => {}
        }

        let qubits = qubits_of(op);
        let d = duration(op);

        let start = qubits.iter().map(|&q| completion[q]).max().unwrap_or(0);
        let finish = start + d;
        for &q in &qubits {
            completion[q] = finish;
        }
        metrics.depth = metrics.depth.max(finish);

        if touches_inter_core(op) {
            let ic_start = qubits.iter().map(|&q| inter_core_completion[q]).max().unwrap_or(0);
            let ic_finish = ic_start + d;
            for &q in &qubits {
                inter_core_completion[q] = ic_finish;
            }
            metrics.inter_core_depth = metrics.inter_core_depth.max(ic_finish);
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_op(gate: usize, qubits: &[u32]) -> Op {
        Op::Gate {
            gate,
            qubits: qubits.iter().map(|&q| PhysQubit::from(q)).collect(),
        }
    }

    #[test]
    fn independent_gates_do_not_add_depth() {
        let ops = vec![gate_op(0, &[0, 1]), gate_op(1, &[2, 3])];
        let m = compute(&ops, 4);
        assert_eq!(m.depth, 1);
        assert_eq!(m.inter_core_depth, 0);
    }

    #[test]
    fn chained_ops_on_the_same_qubit_accumulate_depth() {
        let ops = vec![
            Op::Swap {
                p1: PhysQubit::from(0u32),
                p2: PhysQubit::from(1u32),
            },
            gate_op(0, &[1, 2]),
        ];
        let m = compute(&ops, 4);
        assert_eq!(m.depth, 2);
        assert_eq!(m.swaps, 1);
    }

    #[test]
    fn inter_core_depth_only_counts_teleport_and_telegate() {
        let ops = vec![
            Op::Swap {
                p1: PhysQubit::from(0u32),
                p2: PhysQubit::from(1u32),
            },
            Op::Teleport {
                source: PhysQubit::from(1u32),
                mediator: PhysQubit::from(2u32),
                target: PhysQubit::from(3u32),
            },
        ];
        let m = compute(&ops, 4);
        assert_eq!(m.depth, 1 + 5);
        assert_eq!(m.inter_core_depth, 5);
        assert_eq!(m.teleports, 1);
    }
}
