//! Gates and the circuit they come from (§6 "Circuit input contract").

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::qubit::VirtQubit;

/// A one- or two-qubit operation over virtual qubits. `op` is kept as a
/// plain name (`"cx"`, `"h"`, ...); the router never branches on it beyond
/// arity, since gate semantics are the concern of the (out-of-scope)
/// simulator/synthesizer consuming this crate's output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub op: String,
    pub qubits: SmallVec<[VirtQubit; 2]>,
}

impl Gate {
    pub fn new(op: impl Into<String>, qubits: impl IntoIterator<Item = VirtQubit>) -> Self {
        Gate {
            op: op.into(),
            qubits: qubits.into_iter().collect(),
        }
    }

    pub fn is_two_qubit(&self) -> bool {
        self.qubits.len() == 2
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Circuit {
    pub num_qubits: usize,
    pub gates: Vec<Gate>,
}

impl Circuit {
    pub fn new(num_qubits: usize, gates: Vec<Gate>) -> Result<Self> {
        for (i, gate) in gates.iter().enumerate() {
            if gate.qubits.is_empty() || gate.qubits.len() > 2 {
                return Err(Error::UnsupportedGateArity {
                    gate_index: i,
                    num_qubits: gate.qubits.len(),
                });
            }
            for q in &gate.qubits {
                if q.index() >= num_qubits {
                    return Err(Error::GateQubitOutOfRange {
                        gate_index: i,
                        qubit: q.0,
                        num_qubits: num_qubits as u32,
                    });
                }
            }
        }
        Ok(Circuit { num_qubits, gates })
    }

    /// The same gates in reverse order. Used by the three-pass
    /// initial-layout refinement (§4.8): routing the reversed circuit
    /// forward is equivalent to routing the original circuit backward.
    pub fn reversed(&self) -> Circuit {
        Circuit {
            num_qubits: self.num_qubits,
            gates: self.gates.iter().rev().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_three_qubit_gate() {
        let gates = vec![Gate::new(
            "ccx",
            [VirtQubit::from(0u32), VirtQubit::from(1u32), VirtQubit::from(2u32)],
        )];
        assert!(matches!(
            Circuit::new(3, gates),
            Err(Error::UnsupportedGateArity { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_qubit() {
        let gates = vec![Gate::new("h", [VirtQubit::from(5u32)])];
        assert!(matches!(
            Circuit::new(2, gates),
            Err(Error::GateQubitOutOfRange { .. })
        ));
    }

    #[test]
    fn reversed_reverses_gate_order_only() {
        let gates = vec![
            Gate::new("h", [VirtQubit::from(0u32)]),
            Gate::new("cx", [VirtQubit::from(0u32), VirtQubit::from(1u32)]),
        ];
        let circuit = Circuit::new(2, gates).unwrap();
        let rev = circuit.reversed();
        assert_eq!(rev.gates[0].op, "cx");
        assert_eq!(rev.gates[1].op, "h");
    }
}
