//! The static architecture model (§C2, §4.1).
//!
//! An [`Architecture`] is built once from the JSON contract of §6 and never
//! mutated again; every table derived from the raw edge lists (teleport
//! edges, per-core qubit lists, distance matrices) is computed eagerly at
//! construction so the routing loop never recomputes them.

use hashbrown::HashSet;
use rustworkx_core::petgraph::graph::UnGraph;
use rustworkx_core::petgraph::prelude::NodeIndex;
use rustworkx_core::shortest_path::dijkstra;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::qubit::{CoreId, PhysQubit};

/// An undirected intra-core or inter-core coupling edge between two
/// physical qubits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub p1: PhysQubit,
    pub p2: PhysQubit,
}

impl Edge {
    pub fn new(p1: impl Into<PhysQubit>, p2: impl Into<PhysQubit>) -> Self {
        Edge {
            p1: p1.into(),
            p2: p2.into(),
        }
    }

    fn other(&self, p: PhysQubit) -> PhysQubit {
        if self.p1 == p {
            self.p2
        } else {
            self.p1
        }
    }
}

/// A directed triadic teleport edge: teleport the contents of `source` to
/// `target`, using the free communication qubit `mediator` as the hop.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportEdge {
    pub source: PhysQubit,
    pub mediator: PhysQubit,
    pub target: PhysQubit,
}

/// The wire format of §6's "Architecture input contract".
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchitectureSpec {
    pub name: String,
    pub num_cores: usize,
    pub num_qubits: usize,
    pub intra_core_edges: Vec<[u32; 2]>,
    pub inter_core_edges: Vec<[u32; 2]>,
    #[serde(default)]
    pub node_positions: Vec<[f64; 2]>,
}

/// Timing constants for the depth metric (§3, §4.9). These are not tuned by
/// [`crate::Config`]-style knobs: they model physical teleport timing and
/// are fixed for the lifetime of this spec.
#[derive(Copy, Clone, Debug)]
pub struct Durations {
    pub swap: u32,
    pub teleport: u32,
    pub tp_source_busy_offset: u32,
    pub tp_source_busy_duration: u32,
    pub tp_mediator_busy_offset: u32,
    pub tp_mediator_busy_duration: u32,
    pub tp_target_busy_offset: u32,
    pub tp_target_busy_duration: u32,
}

impl Default for Durations {
    fn default() -> Self {
        // teleport = max(1+3, 0+3, 0+5) = 5, per §3.
        Durations {
            swap: 3,
            teleport: 5,
            tp_source_busy_offset: 1,
            tp_source_busy_duration: 3,
            tp_mediator_busy_offset: 0,
            tp_mediator_busy_duration: 3,
            tp_target_busy_offset: 0,
            tp_target_busy_duration: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Architecture {
    name: String,
    num_qubits: usize,
    num_cores: usize,

    edges: Vec<Edge>,
    qubit_to_edges: Vec<Vec<usize>>,
    intra_adjacency: Vec<HashSet<u32>>,

    inter_core_edges: Vec<Edge>,
    inter_adjacency: Vec<HashSet<u32>>,

    teleport_edges: Vec<TeleportEdge>,
    qubit_to_teleport_edges_as_source: Vec<Vec<usize>>,
    qubit_to_teleport_edges_as_mediator: Vec<Vec<usize>>,
    qubit_to_teleport_edges_as_target: Vec<Vec<usize>>,

    qubit_to_core: Vec<CoreId>,
    core_qubits: Vec<Vec<PhysQubit>>,
    communication_qubits: Vec<PhysQubit>,
    is_comm_qubit: Vec<bool>,
    core_comm_qubits: Vec<Vec<PhysQubit>>,

    intra_core_distance: Vec<Vec<f64>>,
    inter_core_distance: Vec<Vec<f64>>,

    node_positions: Vec<(f64, f64)>,
    durations: Durations,
}

impl Architecture {
    /// Build from the explicit topology described by `spec`, validating the
    /// input invariants of §7 before deriving anything.
    pub fn from_spec(spec: ArchitectureSpec) -> Result<Self> {
        let num_qubits = spec.num_qubits;
        for [p1, p2] in &spec.intra_core_edges {
            Self::check_in_range(*p1, num_qubits)?;
            Self::check_in_range(*p2, num_qubits)?;
        }
        for [p1, p2] in &spec.inter_core_edges {
            Self::check_in_range(*p1, num_qubits)?;
            Self::check_in_range(*p2, num_qubits)?;
        }

        let edges: Vec<Edge> = spec
            .intra_core_edges
            .iter()
            .map(|[a, b]| Edge::new(*a, *b))
            .collect();
        let inter_core_edges: Vec<Edge> = spec
            .inter_core_edges
            .iter()
            .map(|[a, b]| Edge::new(*a, *b))
            .collect();

        let qubit_to_edges = Self::build_qubit_to_edges(num_qubits, &edges);
        let intra_adjacency = Self::build_adjacency(num_qubits, &edges);
        let inter_adjacency = Self::build_adjacency(num_qubits, &inter_core_edges);

        // §4.1: for each undirected inter-core edge (a, b) and each
        // intra-core neighbor x of a, emit the teleport edge (x, a, b); and
        // symmetrically for b.
        let mut teleport_edges = Vec::new();
        let mut communication = HashSet::new();
        for edge in &inter_core_edges {
            communication.insert(edge.p1.0);
            communication.insert(edge.p2.0);
            for &e in &qubit_to_edges[edge.p1.index()] {
                let neighbor = edges[e].other(edge.p1);
                teleport_edges.push(TeleportEdge {
                    source: neighbor,
                    mediator: edge.p1,
                    target: edge.p2,
                });
            }
            for &e in &qubit_to_edges[edge.p2.index()] {
                let neighbor = edges[e].other(edge.p2);
                teleport_edges.push(TeleportEdge {
                    source: neighbor,
                    mediator: edge.p2,
                    target: edge.p1,
                });
            }
        }

        let mut qubit_to_teleport_edges_as_source = vec![Vec::new(); num_qubits];
        let mut qubit_to_teleport_edges_as_mediator = vec![Vec::new(); num_qubits];
        let mut qubit_to_teleport_edges_as_target = vec![Vec::new(); num_qubits];
        for (i, te) in teleport_edges.iter().enumerate() {
            qubit_to_teleport_edges_as_source[te.source.index()].push(i);
            qubit_to_teleport_edges_as_mediator[te.mediator.index()].push(i);
            qubit_to_teleport_edges_as_target[te.target.index()].push(i);
        }

        // qubit_to_core: derived from connected components of the intra-core
        // edge graph augmented with explicit singleton cores for isolated
        // qubits. When `num_cores == 1` every qubit is core 0.
        let qubit_to_core = Self::infer_cores(num_qubits, spec.num_cores, &edges, &inter_core_edges)?;
        let num_cores = spec.num_cores.max(1);

        let mut core_qubits = vec![Vec::new(); num_cores];
        for p in 0..num_qubits {
            core_qubits[qubit_to_core[p].index()].push(PhysQubit::from(p));
        }
        for (c, qubits) in core_qubits.iter().enumerate() {
            if qubits.is_empty() {
                return Err(Error::EmptyCore { core: c as u32 });
            }
        }

        let mut communication_qubits: Vec<PhysQubit> =
            communication.iter().map(|&p| PhysQubit::from(p)).collect();
        communication_qubits.sort_unstable_by_key(|q| q.0);
        let mut is_comm_qubit = vec![false; num_qubits];
        for q in &communication_qubits {
            is_comm_qubit[q.index()] = true;
        }

        let mut core_comm_qubits = vec![Vec::new(); num_cores];
        for &p in &communication_qubits {
            core_comm_qubits[qubit_to_core[p.index()].index()].push(p);
        }

        let intra_core_distance = Self::floyd_warshall_by_core(num_qubits, &edges, &qubit_to_core);
        let inter_core_distance = Self::core_quotient_distance(num_cores, &qubit_to_core, &inter_core_edges);

        let node_positions = if spec.node_positions.is_empty() {
            vec![(0.0, 0.0); num_qubits]
        } else {
            spec.node_positions.iter().map(|[x, y]| (*x, *y)).collect()
        };

        Ok(Architecture {
            name: spec.name,
            num_qubits,
            num_cores,
            edges,
            qubit_to_edges,
            intra_adjacency,
            inter_core_edges,
            inter_adjacency,
            teleport_edges,
            qubit_to_teleport_edges_as_source,
            qubit_to_teleport_edges_as_mediator,
            qubit_to_teleport_edges_as_target,
            qubit_to_core,
            core_qubits,
            communication_qubits,
            is_comm_qubit,
            core_comm_qubits,
            intra_core_distance,
            inter_core_distance,
            node_positions,
            durations: Durations::default(),
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let spec: ArchitectureSpec = serde_json::from_str(text)
            .map_err(|e| Error::InvalidArchitectureJson(e.to_string()))?;
        Self::from_spec(spec)
    }

    fn check_in_range(qubit: u32, num_qubits: usize) -> Result<()> {
        if qubit as usize >= num_qubits {
            return Err(Error::QubitOutOfRange {
                qubit,
                num_qubits: num_qubits as u32,
            });
        }
        Ok(())
    }

    fn build_qubit_to_edges(num_qubits: usize, edges: &[Edge]) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); num_qubits];
        for (i, e) in edges.iter().enumerate() {
            out[e.p1.index()].push(i);
            out[e.p2.index()].push(i);
        }
        out
    }

    fn build_adjacency(num_qubits: usize, edges: &[Edge]) -> Vec<HashSet<u32>> {
        let mut out = vec![HashSet::new(); num_qubits];
        for e in edges {
            out[e.p1.index()].insert(e.p2.0);
            out[e.p2.index()].insert(e.p1.0);
        }
        out
    }

    /// Assigns each qubit to a core. If the caller supplied exactly one
    /// core, every qubit belongs to it. Otherwise cores are the connected
    /// components of the intra-core graph; this requires the intra-core
    /// edges to partition the qubits into exactly `num_cores` connected
    /// components, which holds for every architecture built from §6's
    /// contract (intra-core edges never cross cores, inter-core edges
    /// always do).
    fn infer_cores(
        num_qubits: usize,
        num_cores: usize,
        edges: &[Edge],
        inter_core_edges: &[Edge],
    ) -> Result<Vec<CoreId>> {
        if num_cores <= 1 {
            return Ok(vec![CoreId::from(0u32); num_qubits]);
        }
        let mut component = vec![usize::MAX; num_qubits];
        let mut adjacency = vec![Vec::new(); num_qubits];
        for e in edges {
            adjacency[e.p1.index()].push(e.p2.index());
            adjacency[e.p2.index()].push(e.p1.index());
        }
        let mut next_component = 0;
        for start in 0..num_qubits {
            if component[start] != usize::MAX {
                continue;
            }
            let mut stack = vec![start];
            component[start] = next_component;
            while let Some(node) = stack.pop() {
                for &neigh in &adjacency[node] {
                    if component[neigh] == usize::MAX {
                        component[neigh] = next_component;
                        stack.push(neigh);
                    }
                }
            }
            next_component += 1;
        }
        for e in inter_core_edges {
            if component[e.p1.index()] == component[e.p2.index()] {
                return Err(Error::InconsistentCorePartition(e.p1.0, e.p2.0));
            }
        }
        Ok(component.into_iter().map(|c| CoreId::from(c as u32)).collect())
    }

    fn floyd_warshall_by_core(
        num_qubits: usize,
        edges: &[Edge],
        qubit_to_core: &[CoreId],
    ) -> Vec<Vec<f64>> {
        let mut graph = UnGraph::<(), f64>::with_capacity(num_qubits, edges.len());
        let nodes: Vec<NodeIndex> = (0..num_qubits).map(|_| graph.add_node(())).collect();
        for e in edges {
            graph.add_edge(nodes[e.p1.index()], nodes[e.p2.index()], 1.0);
        }
        let mut dist = vec![vec![f64::INFINITY; num_qubits]; num_qubits];
        for start in 0..num_qubits {
            let result: hashbrown::HashMap<NodeIndex, f64> =
                dijkstra(&graph, nodes[start], None, |e| *e.weight())
                    .into_iter()
                    .collect();
            for (node, d) in result {
                // Only meaningful within one core; cross-core entries stay
                // at infinity since intra-core edges never cross cores.
                if qubit_to_core[node.index()] == qubit_to_core[start] {
                    dist[start][node.index()] = d;
                }
            }
            dist[start][start] = 0.0;
        }
        dist
    }

    fn core_quotient_distance(
        num_cores: usize,
        qubit_to_core: &[CoreId],
        inter_core_edges: &[Edge],
    ) -> Vec<Vec<f64>> {
        let mut graph = UnGraph::<(), f64>::with_capacity(num_cores, inter_core_edges.len());
        let nodes: Vec<NodeIndex> = (0..num_cores).map(|_| graph.add_node(())).collect();
        for e in inter_core_edges {
            let c1 = qubit_to_core[e.p1.index()].index();
            let c2 = qubit_to_core[e.p2.index()].index();
            graph.update_edge(nodes[c1], nodes[c2], 1.0);
        }
        let mut dist = vec![vec![f64::INFINITY; num_cores]; num_cores];
        for start in 0..num_cores {
            let result: hashbrown::HashMap<NodeIndex, f64> =
                dijkstra(&graph, nodes[start], None, |e| *e.weight())
                    .into_iter()
                    .collect();
            for (node, d) in result {
                dist[start][node.index()] = d;
            }
            dist[start][start] = 0.0;
        }
        dist
    }

    // --- accessors -------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn num_cores(&self) -> usize {
        self.num_cores
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn inter_core_edges(&self) -> &[Edge] {
        &self.inter_core_edges
    }

    pub fn teleport_edges(&self) -> &[TeleportEdge] {
        &self.teleport_edges
    }

    pub fn teleport_edges_as_source(&self, qubit: PhysQubit) -> &[usize] {
        &self.qubit_to_teleport_edges_as_source[qubit.index()]
    }

    pub fn teleport_edges_as_mediator(&self, qubit: PhysQubit) -> &[usize] {
        &self.qubit_to_teleport_edges_as_mediator[qubit.index()]
    }

    pub fn teleport_edges_as_target(&self, qubit: PhysQubit) -> &[usize] {
        &self.qubit_to_teleport_edges_as_target[qubit.index()]
    }

    pub fn qubit_to_core(&self, qubit: PhysQubit) -> CoreId {
        self.qubit_to_core[qubit.index()]
    }

    pub fn core_qubits(&self, core: CoreId) -> &[PhysQubit] {
        &self.core_qubits[core.index()]
    }

    pub fn communication_qubits(&self) -> &[PhysQubit] {
        &self.communication_qubits
    }

    pub fn is_comm_qubit(&self, qubit: PhysQubit) -> bool {
        self.is_comm_qubit[qubit.index()]
    }

    pub fn core_comm_qubits(&self, core: CoreId) -> &[PhysQubit] {
        &self.core_comm_qubits[core.index()]
    }

    pub fn has_intra_edge(&self, p1: PhysQubit, p2: PhysQubit) -> bool {
        self.intra_adjacency[p1.index()].contains(&p2.0)
    }

    pub fn has_inter_edge(&self, p1: PhysQubit, p2: PhysQubit) -> bool {
        self.inter_adjacency[p1.index()].contains(&p2.0)
    }

    pub fn intra_neighbors(&self, qubit: PhysQubit) -> impl Iterator<Item = PhysQubit> + '_ {
        self.intra_adjacency[qubit.index()]
            .iter()
            .map(|&p| PhysQubit::from(p))
    }

    /// Intra-core distance; `f64::INFINITY` if the two qubits are in
    /// different cores (callers must route cross-core distances through the
    /// contracted graph of §4.3 instead).
    pub fn intra_distance(&self, p1: PhysQubit, p2: PhysQubit) -> f64 {
        self.intra_core_distance[p1.index()][p2.index()]
    }

    pub fn inter_core_distance(&self, c1: CoreId, c2: CoreId) -> f64 {
        self.inter_core_distance[c1.index()][c2.index()]
    }

    pub fn node_position(&self, qubit: PhysQubit) -> (f64, f64) {
        self.node_positions[qubit.index()]
    }

    pub fn durations(&self) -> Durations {
        self.durations
    }
}
