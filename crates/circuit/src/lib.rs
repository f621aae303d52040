//! Static data model for the TeleSABRE multi-core router: architecture
//! topology, the virtual/physical layout bijection, and the gate
//! dependency DAG. The search itself lives in `telesabre-route`; nothing
//! here mutates beyond `Layout`, and `Layout` is deliberately dumb about
//! the architecture it's paired with.

pub mod architecture;
pub mod dag;
pub mod error;
pub mod gate;
pub mod layout;
pub mod qubit;

pub use architecture::{Architecture, ArchitectureSpec, Durations, Edge, TeleportEdge};
pub use dag::CircuitDag;
pub use error::{Error, Result};
pub use gate::{Circuit, Gate};
pub use layout::Layout;
pub use qubit::{CoreId, PhysQubit, VirtQubit};
