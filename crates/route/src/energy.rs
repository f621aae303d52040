//! Energy function (§C6, §4.4): scores a hypothetical layout against the
//! frontier and an extended lookahead window.

use telesabre_circuit::{Architecture, Circuit, Layout, PhysQubit};

use crate::comm_queues::CommQueueSet;
use crate::config::{Config, EnergyType};
use crate::contracted_graph::{ContractedGraphBuilder, TrafficTable};

pub struct EnergyContext<'a> {
    pub arch: &'a Architecture,
    pub circuit: &'a Circuit,
    pub graph: &'a ContractedGraphBuilder<'a>,
    pub queues: &'a CommQueueSet,
    pub config: &'a Config,
}

impl<'a> EnergyContext<'a> {
    /// Distance for a single two-qubit gate under `layout`: local distance
    /// if both qubits share a core, else the contracted-graph shortest path
    /// length (accumulating into `traffic` for subsequent gates in the same
    /// layer, per §4.3's traffic penalty).
    fn gate_distance(&self, layout: &Layout, gate: usize, traffic: &mut TrafficTable) -> Option<f64> {
        let g = &self.circuit.gates[gate];
        if g.qubits.len() != 2 {
            return None;
        }
        let p1 = PhysQubit::from(layout.phys(g.qubits[0].index()));
        let p2 = PhysQubit::from(layout.phys(g.qubits[1].index()));
        let c1 = self.arch.qubit_to_core(p1);
        let c2 = self.arch.qubit_to_core(p2);
        if c1 == c2 {
            Some(self.arch.intra_distance(p1, p2))
        } else {
            let path = self.graph.shortest_path(
                layout,
                self.queues,
                self.config.full_core_penalty,
                traffic,
                p1,
                p2,
            );
            Some((path.len() - 1) as f64)
        }
    }

    fn layer_aggregate(&self, layout: &Layout, gates: &[usize]) -> (f64, usize) {
        let mut traffic = TrafficTable::new();
        let mut sum = 0.0;
        let mut count = 0;
        for &g in gates {
            if let Some(d) = self.gate_distance(layout, g, &mut traffic) {
                sum += d;
                count += 1;
            }
        }
        (sum, count)
    }

    /// `layers[0]` is the frontier; `layers[1..]` is the extended-set
    /// lookahead, already capped to `extended_set_size` two-qubit gates by
    /// the caller (the driver's extended-set builder).
    pub fn score(&self, layout: &Layout, layers: &[Vec<usize>], decay_factor: f64) -> f64 {
        match self.config.energy_type {
            EnergyType::ExtendedSet => self.score_extended_set(layout, layers, decay_factor),
            EnergyType::Exponential => self.score_exponential(layout, layers, decay_factor),
        }
    }

    fn score_extended_set(&self, layout: &Layout, layers: &[Vec<usize>], decay_factor: f64) -> f64 {
        let empty = Vec::new();
        let frontier = layers.first().unwrap_or(&empty);
        let (front_sum, front_count) = self.layer_aggregate(layout, frontier);
        let front = front_sum / (front_count.max(1) as f64);

        let extended: Vec<usize> = layers.iter().skip(1).flatten().copied().collect();
        let (future_sum, future_count) = self.layer_aggregate(layout, &extended);
        let future = future_sum / (future_count.max(1) as f64);

        (front + 0.05 * future) * decay_factor
    }

    fn score_exponential(&self, layout: &Layout, layers: &[Vec<usize>], decay_factor: f64) -> f64 {
        let mut score = 0.0;
        for (depth, layer) in layers.iter().enumerate() {
            let multiplier = if depth == 0 { 100.0 } else { 2f64.powf(-(depth as f64) / 5.0) };
            let (sum, _) = self.layer_aggregate(layout, layer);
            score += sum * multiplier;
        }
        score * decay_factor
    }

    /// §4.4's deadlock-solving restriction: score only the first frontier
    /// two-qubit gate, ignoring everything else.
    pub fn score_deadlock(&self, layout: &Layout, stubborn_gate: usize, decay_factor: f64) -> f64 {
        self.score(layout, &[vec![stubborn_gate]], decay_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm_queues::CommQueueSet;
    use telesabre_circuit::{ArchitectureSpec, Gate, VirtQubit};

    fn chain4() -> Architecture {
        let spec = ArchitectureSpec {
            name: "chain".into(),
            num_cores: 1,
            num_qubits: 4,
            intra_core_edges: vec![[0, 1], [1, 2], [2, 3]],
            inter_core_edges: vec![],
            node_positions: vec![],
        };
        Architecture::from_spec(spec).unwrap()
    }

    #[test]
    fn same_core_energy_uses_local_distance() {
        let arch = chain4();
        let circuit = Circuit::new(4, vec![Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(3u32)])]).unwrap();
        let layout = Layout::new(vec![0, 1, 2, 3], 4);
        let queues = CommQueueSet::build(&arch, &layout);
        let graph = ContractedGraphBuilder::new(&arch);
        let config = Config::default();
        let ctx = EnergyContext {
            arch: &arch,
            circuit: &circuit,
            graph: &graph,
            queues: &queues,
            config: &config,
        };
        let score = ctx.score(&layout, &[vec![0]], 1.0);
        assert_eq!(score, 3.0);
    }

    #[test]
    fn closer_layout_scores_lower() {
        let arch = chain4();
        let circuit = Circuit::new(4, vec![Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(3u32)])]).unwrap();
        let far = Layout::new(vec![0, 1, 2, 3], 4);
        let near = Layout::new(vec![0, 3, 2, 1], 4);
        let queues_far = CommQueueSet::build(&arch, &far);
        let queues_near = CommQueueSet::build(&arch, &near);
        let graph = ContractedGraphBuilder::new(&arch);
        let config = Config::default();
        let ctx_far = EnergyContext {
            arch: &arch,
            circuit: &circuit,
            graph: &graph,
            queues: &queues_far,
            config: &config,
        };
        let ctx_near = EnergyContext {
            arch: &arch,
            circuit: &circuit,
            graph: &graph,
            queues: &queues_near,
            config: &config,
        };
        assert!(ctx_near.score(&near, &[vec![0]], 1.0) < ctx_far.score(&far, &[vec![0]], 1.0));
    }
}
