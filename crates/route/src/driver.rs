//! The TeleSABRE driver (§C8): execute-ready, enumerate, score, select,
//! commit, deadlock handling, and the three-pass initial-layout refinement.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use rand::Rng;
use rand_pcg::Pcg64Mcg;
use smallvec::SmallVec;
use tracing::{debug, error, warn};

use telesabre_circuit::{Architecture, Circuit, CircuitDag, Layout, PhysQubit};

use crate::comm_queues::CommQueueSet;
use crate::config::Config;
use crate::contracted_graph::{ContractedGraphBuilder, TrafficTable};
use crate::energy::EnergyContext;
use crate::error::{Error, Result};
use crate::initial_layout;
use crate::metrics::{self, Metrics};
use crate::moves::{self, Move};

/// One committed operation in the emitted schedule (§6 "Output").
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Gate {
        gate: usize,
        qubits: SmallVec<[PhysQubit; 2]>,
    },
    Swap {
        p1: PhysQubit,
        p2: PhysQubit,
    },
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

/// `numpy.isclose`'s default tolerances, used for the tie-break among
/// near-minimal candidate scores (§4.6).
const ISCLOSE_RTOL: f64 = 1e-5;
const ISCLOSE_ATOL: f64 = 1e-8;

fn isclose(a: f64, b: f64) -> bool {
    (a - b).abs() <= ISCLOSE_ATOL + ISCLOSE_RTOL * b.abs()
}

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub ops: Vec<Op>,
    pub first_layout: Layout,
    pub final_layout: Layout,
    pub aborted: bool,
    pub deadlocks_recovered: u32,
    pub iterations: u64,
    pub metrics: Metrics,
}

/// State captured at the most recent successful gate/telegate execution, to
/// roll back to when the safety valve trips (§4.7).
struct Snapshot {
    layout: Layout,
    queues: CommQueueSet,
    ops_len: usize,
    required_predecessors: Vec<u32>,
    frontier: Vec<usize>,
    decay: Vec<f64>,
}

pub struct Driver<'a> {
    arch: &'a Architecture,
    circuit: &'a Circuit,
    dag: CircuitDag,
    config: &'a Config,

    layout: Layout,
    queues: CommQueueSet,
    graph: ContractedGraphBuilder<'a>,

    required_predecessors: Vec<u32>,
    frontier: Vec<usize>,
    decay: Vec<f64>,

    ops: Vec<Op>,
    iteration: u64,
    since_progress: u32,
    solving_deadlock: bool,
    deadlock_iters: u32,
    deadlocks_recovered: u32,
    snapshot: Option<Snapshot>,
}

impl<'a> Driver<'a> {
    pub fn new(arch: &'a Architecture, circuit: &'a Circuit, config: &'a Config, layout: Layout) -> Self {
        let dag = CircuitDag::build(circuit);
        let required_predecessors = dag.initial_predecessor_counts();
        let mut frontier: Vec<usize> = dag.first_layer().to_vec();
        frontier.sort_unstable();
        let queues = CommQueueSet::build(arch, &layout);
        let graph = ContractedGraphBuilder::new(arch);
        let decay = vec![1.0; arch.num_qubits()];

        Driver {
            arch,
            circuit,
            dag,
            config,
            layout,
            queues,
            graph,
            required_predecessors,
            frontier,
            decay,
            ops: Vec::new(),
            iteration: 0,
            since_progress: 0,
            solving_deadlock: false,
            deadlock_iters: 0,
            deadlocks_recovered: 0,
            snapshot: None,
        }
    }

    /// Runs to completion (frontier empty), to the cooperative-stop signal,
    /// or to a deadlock abort. `rng` drives the single seeded stream §5
    /// requires for all tie-break draws.
    pub fn run(mut self, rng: &mut Pcg64Mcg, stop: &AtomicBool) -> Result<RouteResult> {
        let first_layout = self.layout.clone();

        while !self.frontier.is_empty() {
            if stop.load(AtomicOrdering::Relaxed) {
                warn!(iteration = self.iteration, "cooperative stop requested, emitting partial schedule");
                break;
            }
            self.iteration += 1;

            if self.drain_ready_gates() {
                continue;
            }

            if self.config.decay_reset > 0 && self.iteration % self.config.decay_reset as u64 == 0 {
                self.decay.iter_mut().for_each(|d| *d = 1.0);
            }

            self.step_move(rng)?;

            if self.solving_deadlock {
                self.deadlock_iters += 1;
                if self.deadlock_iters > self.config.max_solving_deadlock_iterations {
                    error!(
                        iteration = self.iteration,
                        frontier = ?self.frontier,
                        "deadlock exceeded its budget, aborting with a partial schedule"
                    );
                    return Ok(self.finish(first_layout, true));
                }
            } else if self.since_progress > self.config.safety_valve_iters {
                self.enter_deadlock_mode();
            }
        }

        Ok(self.finish(first_layout, false))
    }

    fn finish(self, first_layout: Layout, aborted: bool) -> RouteResult {
        let num_qubits = self.arch.num_qubits();
        let metrics = metrics::compute(&self.ops, num_qubits);
        RouteResult {
            ops: self.ops,
            first_layout,
            final_layout: self.layout,
            aborted,
            deadlocks_recovered: self.deadlocks_recovered,
            iterations: self.iteration,
            metrics,
        }
    }

    // --- frontier / gate execution ---------------------------------------

    fn can_execute(&self, gate: usize) -> bool {
        let g = &self.circuit.gates[gate];
        match g.qubits.len() {
            1 => true,
            2 => self
                .layout
                .can_execute_gate(self.arch, &[g.qubits[0].index(), g.qubits[1].index()]),
            _ => unreachable!("circuit validated arity 1-2 at construction"),
        }
    }

    fn gate_phys_qubits(&self, gate: usize) -> SmallVec<[PhysQubit; 2]> {
        self.circuit.gates[gate]
            .qubits
            .iter()
            .map(|q| PhysQubit::from(self.layout.phys(q.index())))
            .collect()
    }

    /// Drains every currently-executable frontier gate, in stable node-index
    /// order, repeating until no more become ready within this call.
    /// Returns whether anything executed.
    fn drain_ready_gates(&mut self) -> bool {
        let mut progressed = false;
        loop {
            let mut ready: Vec<usize> = self.frontier.iter().copied().filter(|&g| self.can_execute(g)).collect();
            if ready.is_empty() {
                break;
            }
            ready.sort_unstable();
            for gate in ready {
                let qubits = self.gate_phys_qubits(gate);
                self.ops.push(Op::Gate { gate, qubits });
                debug!(iteration = self.iteration, gate, "executed gate");
                self.on_gate_done(gate);
            }
            progressed = true;
        }
        progressed
    }

    /// Common tail of executing any DAG node (ordinary gate or telegate):
    /// drop it from the frontier, free up its successors, and reset
    /// deadlock bookkeeping.
    fn on_gate_done(&mut self, gate: usize) {
        self.frontier.retain(|&g| g != gate);
        for &s in self.dag.successors(gate) {
            let s = s as usize;
            self.required_predecessors[s] -= 1;
            if self.required_predecessors[s] == 0 {
                self.frontier.push(s);
            }
        }
        self.frontier.sort_unstable();
        self.since_progress = 0;
        self.solving_deadlock = false;
        self.deadlock_iters = 0;
        self.snapshot = Some(self.make_snapshot());
    }

    fn make_snapshot(&self) -> Snapshot {
        Snapshot {
            layout: self.layout.clone(),
            queues: self.queues.clone(),
            ops_len: self.ops.len(),
            required_predecessors: self.required_predecessors.clone(),
            frontier: self.frontier.clone(),
            decay: self.decay.clone(),
        }
    }

    /// §4.7: in deadlock-solving mode, both the frontier and the energy
    /// function are restricted to the single first (stable-ordered)
    /// frontier element.
    fn effective_frontier(&self) -> Vec<usize> {
        if self.solving_deadlock && !self.frontier.is_empty() {
            vec![self.frontier[0]]
        } else {
            self.frontier.clone()
        }
    }

    fn enter_deadlock_mode(&mut self) {
        let snapshot = self
            .snapshot
            .take()
            .expect("a snapshot exists by the time the safety valve can trip, taken at driver construction");
        warn!(
            iteration = self.iteration,
            frontier = ?self.frontier,
            "safety valve tripped, rolling back to last progress and entering deadlock-solving mode"
        );
        self.layout = snapshot.layout;
        self.queues = snapshot.queues;
        self.ops.truncate(snapshot.ops_len);
        self.required_predecessors = snapshot.required_predecessors;
        self.frontier = snapshot.frontier;
        self.decay = snapshot.decay;
        self.snapshot = Some(Snapshot {
            layout: self.layout.clone(),
            queues: self.queues.clone(),
            ops_len: self.ops.len(),
            required_predecessors: self.required_predecessors.clone(),
            frontier: self.frontier.clone(),
            decay: self.decay.clone(),
        });
        self.solving_deadlock = true;
        self.deadlock_iters = 0;
        self.since_progress = 0;
        self.deadlocks_recovered += 1;
    }

    // --- extended set / energy layers -------------------------------------

    /// BFS lookahead from the frontier's successors, grounded on the
    /// teacher's `populate_extended_set`: a scratch-decremented copy of the
    /// predecessor counts discovers newly-ready successors without touching
    /// the real `required_predecessors`, stopping once `extended_set_size`
    /// two-qubit gates have been collected.
    fn populate_extended_set(&self, frontier: &[usize]) -> Vec<usize> {
        let mut decremented: hashbrown::HashMap<usize, u32> = hashbrown::HashMap::new();
        let mut to_visit: Vec<usize> = frontier.to_vec();
        let mut extended = Vec::new();
        let mut two_qubit_count = 0usize;
        let mut i = 0;
        while i < to_visit.len() {
            if two_qubit_count >= self.config.extended_set_size {
                break;
            }
            let gate = to_visit[i];
            i += 1;
            for &succ in self.dag.successors(gate) {
                let succ = succ as usize;
                let remaining = decremented
                    .entry(succ)
                    .or_insert_with(|| self.required_predecessors[succ]);
                *remaining -= 1;
                if *remaining == 0 {
                    if self.circuit.gates[succ].is_two_qubit() {
                        two_qubit_count += 1;
                    }
                    extended.push(succ);
                    to_visit.push(succ);
                }
            }
        }
        extended
    }

    /// Groups the frontier and its extended set into relative-depth buckets
    /// for [`EnergyContext::score`]: bucket 0 is the frontier, bucket k the
    /// gates whose DAG layer sits k generations past the frontier's own
    /// minimum layer (exponential mode's `2^(-depth/5)` multiplier; extended
    /// mode simply flattens buckets 1.. back together).
    fn build_layers(&self, frontier: &[usize], extended: &[usize]) -> Vec<Vec<usize>> {
        let base_layer = frontier
            .iter()
            .map(|&g| self.dag.layer_of(g))
            .min()
            .unwrap_or(0);
        let mut layers: Vec<Vec<usize>> = vec![frontier.to_vec()];
        for &gate in extended {
            let depth = self.dag.layer_of(gate).saturating_sub(base_layer).max(1) as usize;
            if layers.len() <= depth {
                layers.resize_with(depth + 1, Vec::new);
            }
            layers[depth].push(gate);
        }
        layers
    }

    fn energy_context(&self) -> EnergyContext<'_> {
        EnergyContext {
            arch: self.arch,
            circuit: self.circuit,
            graph: &self.graph,
            queues: &self.queues,
            config: self.config,
        }
    }

    fn decay_factor_for(&self, qubits: &[PhysQubit]) -> f64 {
        qubits
            .iter()
            .map(|q| self.decay[q.index()])
            .fold(1.0, f64::max)
    }

    // --- move scoring and commit -------------------------------------------

    fn step_move(&mut self, rng: &mut Pcg64Mcg) -> Result<()> {
        let effective_frontier = self.effective_frontier();
        let extended = if self.solving_deadlock {
            Vec::new()
        } else {
            self.populate_extended_set(&effective_frontier)
        };
        let layers = self.build_layers(&effective_frontier, &extended);

        let mut traffic = TrafficTable::new();
        let separated = moves::separated_pairs(
            &effective_frontier,
            self.circuit,
            &self.layout,
            self.arch,
            &self.graph,
            &self.queues,
            self.config.full_core_penalty,
            &mut traffic,
        );
        let swaps = moves::candidate_swaps(
            &effective_frontier,
            &separated,
            self.circuit,
            &self.layout,
            self.arch,
            &self.queues,
        );
        let (teleports, telegates) = moves::candidate_teleports_and_telegates(&separated, &self.layout, self.arch);

        if swaps.is_empty() && teleports.is_empty() && telegates.is_empty() {
            return Err(Error::EmptyCandidateSet {
                iteration: self.iteration,
                frontier: effective_frontier,
            });
        }

        let mut scored: Vec<(f64, Move)> = Vec::with_capacity(swaps.len() + teleports.len() + telegates.len());
        for &(p1, p2) in &swaps {
            let score = self.score_swap(p1, p2, &layers);
            scored.push((score, Move::Swap(p1, p2)));
        }
        for &mv in teleports.iter() {
            let score = self.score_teleport(&mv, &layers) - self.config.teleport_bonus;
            scored.push((score, mv));
        }
        for &mv in telegates.iter() {
            let score = self.score_telegate(&mv, &layers) - self.config.telegate_bonus;
            scored.push((score, mv));
        }

        let best = scored.iter().map(|&(s, _)| s).fold(f64::INFINITY, f64::min);
        let candidates: Vec<Move> = scored
            .into_iter()
            .filter(|&(s, _)| isclose(s, best))
            .map(|(_, mv)| mv)
            .collect();
        let chosen = candidates[rng.gen_range(0..candidates.len())];

        self.commit(chosen);
        Ok(())
    }

    fn score_swap(&mut self, p1: PhysQubit, p2: PhysQubit, layers: &[Vec<usize>]) -> f64 {
        self.layout.swap(p1.index(), p2.index());
        self.queues.on_occupancy_change(self.arch, &self.layout, p1);
        self.queues.on_occupancy_change(self.arch, &self.layout, p2);

        let decay_factor = self.decay_factor_for(&[p1, p2]);
        let score = self.energy_context().score(&self.layout, layers, decay_factor);

        self.layout.swap(p1.index(), p2.index());
        self.queues.on_occupancy_change(self.arch, &self.layout, p1);
        self.queues.on_occupancy_change(self.arch, &self.layout, p2);
        score
    }

    fn score_teleport(&mut self, mv: &Move, layers: &[Vec<usize>]) -> f64 {
        let Move::Teleport { source, mediator, target } = *mv else {
            unreachable!("score_teleport called with a non-teleport move")
        };
        self.layout.teleport(source.index(), mediator.index(), target.index());
        self.queues.on_occupancy_change(self.arch, &self.layout, source);
        self.queues.on_occupancy_change(self.arch, &self.layout, target);

        let decay_factor = self.decay_factor_for(&[source, mediator, target]);
        let score = self.energy_context().score(&self.layout, layers, decay_factor);

        // Teleport's effect is a swap(p_src, p_tgt); undo with the same swap.
        self.layout.swap(source.index(), target.index());
        self.queues.on_occupancy_change(self.arch, &self.layout, source);
        self.queues.on_occupancy_change(self.arch, &self.layout, target);
        score
    }

    /// A telegate never moves data, so scoring it needs no apply/undo: it
    /// executes the gate it targets, and §4.4 restricts the energy to that
    /// one gate directly.
    fn score_telegate(&self, mv: &Move, layers: &[Vec<usize>]) -> f64 {
        let Move::Telegate { gate, path } = *mv else {
            unreachable!("score_telegate called with a non-telegate move")
        };
        let decay_factor = self.decay_factor_for(&path);
        if self.solving_deadlock {
            self.energy_context().score_deadlock(&self.layout, gate, decay_factor)
        } else {
            self.energy_context().score(&self.layout, layers, decay_factor)
        }
    }

    fn commit(&mut self, mv: Move) {
        match mv {
            Move::Swap(p1, p2) => {
                self.layout.swap(p1.index(), p2.index());
                self.decay[p1.index()] += self.config.swap_decay;
                self.decay[p2.index()] += self.config.swap_decay;
                self.queues.on_occupancy_change(self.arch, &self.layout, p1);
                self.queues.on_occupancy_change(self.arch, &self.layout, p2);
                debug!(iteration = self.iteration, ?p1, ?p2, "committed swap");
                self.ops.push(Op::Swap { p1, p2 });
                self.since_progress += 1;
            }
            Move::Teleport { source, mediator, target } => {
                self.layout.teleport(source.index(), mediator.index(), target.index());
                self.decay[source.index()] += self.config.teleport_decay;
                self.decay[mediator.index()] += self.config.teleport_decay;
                self.decay[target.index()] += self.config.teleport_decay;
                self.queues.on_occupancy_change(self.arch, &self.layout, source);
                self.queues.on_occupancy_change(self.arch, &self.layout, target);
                debug!(iteration = self.iteration, ?source, ?mediator, ?target, "committed teleport");
                self.ops.push(Op::Teleport { source, mediator, target });
                self.since_progress += 1;
            }
            Move::Telegate { gate, path } => {
                for &p in &path {
                    self.decay[p.index()] += self.config.telegate_decay;
                }
                debug!(iteration = self.iteration, gate, ?path, "committed telegate");
                self.ops.push(Op::Telegate { gate, path });
                self.on_gate_done(gate);
            }
        }
    }
}

/// Runs the (optional) three-pass initial-layout refinement of §4.8 and
/// then the emitting pass, consuming a single seeded RNG stream for both
/// the initial layout and every tie-break draw across all passes, per §5.
pub fn route(arch: &Architecture, circuit: &Circuit, config: &Config, seed: u64, stop: &AtomicBool) -> Result<RouteResult> {
    let mut rng = Pcg64Mcg::new(seed as u128);
    let seed_layout = initial_layout::build(circuit, arch, config)?;

    let refined_layout = if config.optimize_initial {
        let pass0 = Driver::new(arch, circuit, config, seed_layout).run(&mut rng, stop)?;
        let reversed = circuit.reversed();
        let pass1 = Driver::new(arch, &reversed, config, pass0.final_layout).run(&mut rng, stop)?;
        pass1.final_layout
    } else {
        seed_layout
    };

    Driver::new(arch, circuit, config, refined_layout).run(&mut rng, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn two_core() -> Architecture {
        let spec = ArchitectureSpec {
            name: "two-core".into(),
            num_cores: 2,
            num_qubits: 8,
            intra_core_edges: vec![[0, 1], [1, 2], [2, 3], [4, 5], [5, 6], [6, 7]],
            inter_core_edges: vec![[3, 4]],
            node_positions: vec![],
        };
        Architecture::from_spec(spec).unwrap()
    }

    #[test]
    fn s1_single_core_needs_at_least_one_swap() {
        let arch = chain4();
        let circuit = Circuit::new(
            4,
            vec![
                Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(2u32)]),
                Gate::new("cx", [VirtQubit::from(1u32), VirtQubit::from(3u32)]),
            ],
        )
        .unwrap();
        let config = Config::default();
        let stop = AtomicBool::new(false);
        let result = route(&arch, &circuit, &config, 1, &stop).unwrap();

        assert!(!result.aborted);
        let gate_count = result.ops.iter().filter(|op| matches!(op, Op::Gate { .. })).count();
        assert_eq!(gate_count, 2);
        assert!(result.ops.iter().any(|op| matches!(op, Op::Swap { .. })));
        assert!(result.metrics.depth >= 4);
    }

    #[test]
    fn already_local_circuit_emits_no_moves() {
        let arch = chain4();
        let circuit = Circuit::new(4, vec![Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(1u32)])]).unwrap();
        let config = Config::default();
        let stop = AtomicBool::new(false);
        let result = route(&arch, &circuit, &config, 1, &stop).unwrap();
        assert_eq!(result.ops.len(), 1);
        assert!(matches!(result.ops[0], Op::Gate { .. }));
    }

    #[test]
    fn single_core_architecture_never_emits_teleports_or_telegates() {
        let arch = chain4();
        let circuit = Circuit::new(
            4,
            vec![
                Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(3u32)]),
                Gate::new("cx", [VirtQubit::from(1u32), VirtQubit::from(2u32)]),
            ],
        )
        .unwrap();
        let config = Config::default();
        let stop = AtomicBool::new(false);
        let result = route(&arch, &circuit, &config, 7, &stop).unwrap();
        assert_eq!(result.metrics.teleports, 0);
        assert_eq!(result.metrics.telegates, 0);
    }

    #[test]
    fn determinism_same_seed_same_ops() {
        let arch = two_core();
        // 6 virtual qubits on this 8-physical, two-core machine, so each
        // core keeps its required free slot (Invariant I2).
        let circuit = Circuit::new(
            6,
            vec![
                Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(5u32)]),
                Gate::new("cx", [VirtQubit::from(2u32), VirtQubit::from(4u32)]),
            ],
        )
        .unwrap();
        let config = Config::default();
        let stop = AtomicBool::new(false);
        let a = route(&arch, &circuit, &config, 42, &stop).unwrap();
        let b = route(&arch, &circuit, &config, 42, &stop).unwrap();
        assert_eq!(a.ops, b.ops);
    }

    #[test]
    fn empty_candidate_set_error_names_the_stuck_frontier() {
        let err = Error::EmptyCandidateSet {
            iteration: 12,
            frontier: vec![3],
        };
        let message = err.to_string();
        assert!(message.contains("iteration 12"));
        assert!(message.contains('3'));
    }

    #[test]
    fn cooperative_stop_signal_yields_a_partial_schedule() {
        let arch = chain4();
        let circuit = Circuit::new(
            4,
            vec![
                Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(2u32)]),
                Gate::new("cx", [VirtQubit::from(1u32), VirtQubit::from(3u32)]),
            ],
        )
        .unwrap();
        let config = Config::default();
        let stop = AtomicBool::new(true);
        let result = route(&arch, &circuit, &config, 1, &stop).unwrap();
        assert!(!result.aborted);
        assert_eq!(result.iterations, 0);
    }
}
