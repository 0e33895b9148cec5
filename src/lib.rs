//! Four-valued, multi-bit gate-level circuit simulation
//!
//! Circuits are described with a [CircuitBuilder] (or imported from a Yosys
//! netlist), then finalized into a [Circuit] that propagates values in
//! synchronous rounds.

pub mod circuit_builder;
pub mod circuit_sim;
pub mod components;
pub mod error;
pub mod import;

mod circuit;
mod graph;
mod logic;

pub use circuit::Circuit;
pub use circuit_builder::CircuitBuilder;
pub use circuit_sim::{CircuitSim, RunResult};
pub use error::{BuildError, SimulationError};
pub use graph::{GateId, GateKind, WireId};
pub use logic::{LogicBitState, LogicState, LogicWidth, ParseLogicStateError, MAX_LOGIC_WIDTH};
