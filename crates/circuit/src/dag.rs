//! The gate dependency DAG (§C4).
//!
//! Dependencies are the last-writer-per-qubit relation: gate `b` depends on
//! gate `a` iff `a` is the most recent gate before `b` that touches a qubit
//! `b` also touches. This is exactly `generate_dependencies` from the
//! Python circuit model this crate generalizes, rebuilt here as a static,
//! owned structure instead of a `networkx.DiGraph`.
//!
//! The DAG itself is immutable. The routing loop's live frontier (which
//! gates currently have every dependency satisfied) is driver-owned mutable
//! state built on top of [`CircuitDag::successors`] and
//! [`CircuitDag::num_predecessors`] — mirroring `required_predecessors` in
//! the single-core SABRE router this crate generalizes.

use smallvec::SmallVec;

use crate::gate::Circuit;

#[derive(Debug, Clone)]
pub struct CircuitDag {
    successors: Vec<SmallVec<[u32; 4]>>,
    num_predecessors: Vec<u32>,
    layer: Vec<u32>,
    first_layer: Vec<usize>,
}

impl CircuitDag {
    pub fn build(circuit: &Circuit) -> Self {
        let num_gates = circuit.gates.len();
        let mut successors: Vec<SmallVec<[u32; 4]>> = vec![SmallVec::new(); num_gates];
        let mut num_predecessors = vec![0u32; num_gates];
        let mut last_touch: Vec<Option<usize>> = vec![None; circuit.num_qubits];

        for (g, gate) in circuit.gates.iter().enumerate() {
            let mut seen_preds: SmallVec<[usize; 2]> = SmallVec::new();
            for q in &gate.qubits {
                if let Some(prev) = last_touch[q.index()] {
                    if !seen_preds.contains(&prev) {
                        successors[prev].push(g as u32);
                        num_predecessors[g] += 1;
                        seen_preds.push(prev);
                    }
                }
                last_touch[q.index()] = Some(g);
            }
        }

        let layer = Self::compute_layers(&successors, &num_predecessors);
        let first_layer = (0..num_gates).filter(|&g| num_predecessors[g] == 0).collect();

        CircuitDag {
            successors,
            num_predecessors,
            layer,
            first_layer,
        }
    }

    /// Longest-path-from-a-root generation number per gate, via Kahn's
    /// algorithm. Gates with no predecessors sit in layer 0.
    fn compute_layers(successors: &[SmallVec<[u32; 4]>], num_predecessors: &[u32]) -> Vec<u32> {
        let num_gates = successors.len();
        let mut remaining = num_predecessors.to_vec();
        let mut layer = vec![0u32; num_gates];
        let mut queue: SmallVec<[usize; 16]> = (0..num_gates)
            .filter(|&g| remaining[g] == 0)
            .collect();
        let mut head = 0;
        while head < queue.len() {
            let g = queue[head];
            head += 1;
            for &s in &successors[g] {
                let s = s as usize;
                layer[s] = layer[s].max(layer[g] + 1);
                remaining[s] -= 1;
                if remaining[s] == 0 {
                    queue.push(s);
                }
            }
        }
        layer
    }

    pub fn num_gates(&self) -> usize {
        self.successors.len()
    }

    pub fn successors(&self, gate: usize) -> &[u32] {
        &self.successors[gate]
    }

    pub fn num_predecessors(&self, gate: usize) -> u32 {
        self.num_predecessors[gate]
    }

    /// Starting counts for a fresh traversal: clone and decrement as gates
    /// are scheduled, watching for zeroes to discover newly free gates.
    pub fn initial_predecessor_counts(&self) -> Vec<u32> {
        self.num_predecessors.clone()
    }

    pub fn layer_of(&self, gate: usize) -> u32 {
        self.layer[gate]
    }

    pub fn num_layers(&self) -> u32 {
        self.layer.iter().copied().max().map_or(0, |m| m + 1)
    }

    /// Gates with no predecessors at all, in ascending index order — the
    /// frontier a fresh traversal starts from.
    pub fn first_layer(&self) -> &[usize] {
        &self.first_layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Gate;
    use crate::qubit::VirtQubit;

    fn q(i: u32) -> VirtQubit {
        VirtQubit::from(i)
    }

    #[test]
    fn independent_gates_are_all_in_first_layer() {
        let circuit = Circuit::new(
            4,
            vec![Gate::new("h", [q(0)]), Gate::new("h", [q(1)]), Gate::new("h", [q(2)])],
        )
        .unwrap();
        let dag = CircuitDag::build(&circuit);
        assert_eq!(dag.first_layer(), &[0, 1, 2]);
        assert_eq!(dag.num_layers(), 1);
    }

    #[test]
    fn chained_two_qubit_gates_form_a_line() {
        // cx(0,1); cx(1,2); cx(2,3) — each depends on the previous.
        let circuit = Circuit::new(
            4,
            vec![
                Gate::new("cx", [q(0), q(1)]),
                Gate::new("cx", [q(1), q(2)]),
                Gate::new("cx", [q(2), q(3)]),
            ],
        )
        .unwrap();
        let dag = CircuitDag::build(&circuit);
        assert_eq!(dag.first_layer(), &[0]);
        assert_eq!(dag.successors(0), &[1]);
        assert_eq!(dag.successors(1), &[2]);
        assert!(dag.successors(2).is_empty());
        assert_eq!(dag.layer_of(2), 2);
        assert_eq!(dag.num_layers(), 3);
    }

    #[test]
    fn repeated_qubit_in_same_gate_counts_as_one_dependency() {
        // Two gates sharing two qubits should add exactly one dependency
        // edge, not two.
        let circuit = Circuit::new(
            2,
            vec![Gate::new("cx", [q(0), q(1)]), Gate::new("cx", [q(1), q(0)])],
        )
        .unwrap();
        let dag = CircuitDag::build(&circuit);
        assert_eq!(dag.num_predecessors(1), 1);
    }
}
