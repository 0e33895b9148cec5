//! Usage errors of the builder and the simulation kernel

use thiserror::Error;

use crate::graph::{GateId, GateKind, WireId};
use crate::logic::LogicWidth;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{0:?} does not exist in this builder")]
    InvalidWireId(WireId),

    #[error("{0:?} belongs to a different builder")]
    ForeignWire(WireId),

    #[error("{0} lines is not a supported width")]
    InvalidWidth(u32),

    #[error("{wire:?} is already driven by {driver:?}")]
    WireAlreadyDriven { wire: WireId, driver: GateId },

    #[error("{kind} gate cannot take {actual} inputs")]
    InvalidInputCount {
        kind: GateKind,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("{kind} gate {gate:?}: {reason}")]
    WidthMismatch {
        gate: GateId,
        kind: GateKind,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("{0:?} does not exist in this circuit")]
    InvalidWireId(WireId),

    #[error("{0:?} belongs to a different circuit")]
    ForeignWire(WireId),
}

/// The widths a gate sees, for rejecting structurally impossible wiring
pub(crate) fn check_gate_widths(
    gate: GateId,
    kind: GateKind,
    inputs: &[LogicWidth],
    output: LogicWidth,
) -> Result<(), BuildError> {
    let mismatch = |reason| BuildError::WidthMismatch { gate, kind, reason };
    match kind {
        GateKind::Mux => {
            let select = inputs[2].get();
            if select != 1 && select != output.get() {
                return Err(mismatch("select must be 1 line or as wide as the output"));
            }
        }
        GateKind::Slice { offset } => {
            let end = offset.checked_add(output.get());
            if end.map_or(true, |end| end > inputs[0].get()) {
                return Err(mismatch("slice reaches past the end of its input"));
            }
        }
        GateKind::Merge => {
            let total: u32 = inputs.iter().map(|w| w.get()).sum();
            if total != output.get() {
                return Err(mismatch("merged inputs must add up to the output width"));
            }
        }
        _ => {}
    }
    Ok(())
}
