//! Input-invariant-violation errors (§7 of the design). These are the only
//! errors this crate raises: everything here fails at construction time,
//! before a [`crate::layout::Layout`] or [`crate::architecture::Architecture`]
//! value exists for a caller to hold onto.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("architecture edge ({0}, {1}) is not symmetric: {1} does not list {0} as a neighbor")]
    UnsymmetricArchitecture(u32, u32),

    #[error("qubit index {qubit} is out of range for a {num_qubits}-qubit architecture")]
    QubitOutOfRange { qubit: u32, num_qubits: u32 },

    #[error("gate {gate_index} references qubit {qubit}, out of range for a {num_qubits}-qubit circuit")]
    GateQubitOutOfRange {
        gate_index: usize,
        qubit: u32,
        num_qubits: u32,
    },

    #[error("gate {gate_index} has {num_qubits} target qubits; only 1- and 2-qubit gates are supported")]
    UnsupportedGateArity { gate_index: usize, num_qubits: usize },

    #[error(
        "core {core} has {free} free slot(s); at least 2 free slots are required machine-wide \
         (and preferably per core) for teleportation to be possible at all"
    )]
    InsufficientFreeSlots { core: u32, free: usize },

    #[error("core {core} contains no qubits")]
    EmptyCore { core: u32 },

    #[error("malformed architecture JSON: {0}")]
    InvalidArchitectureJson(String),

    #[error(
        "inter-core edge ({0}, {1}) connects two qubits in the same intra-core connected \
         component; inter-core edges must cross cores"
    )]
    InconsistentCorePartition(u32, u32),
}

pub type Result<T> = std::result::Result<T, Error>;
