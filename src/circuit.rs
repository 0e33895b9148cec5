use std::ops::Range;

use crate::circuit_sim::{CircuitSim, Step};
use crate::error::SimulationError;
use crate::graph::{CircuitTag, Gate, GateId, WireId, WireInfo, WireStates};
use crate::logic::{self, ops, Atom, LogicState, LogicWidth};

/// A finalized circuit advancing in synchronous rounds
///
/// Gates scheduled for a round all read the wire states as they were when the
/// round began; their outputs are committed together once every one of them
/// has been evaluated.
#[derive(Debug, Clone)]
pub struct Circuit {
    tag: CircuitTag,
    step: Step,
    wires: Box<[WireInfo]>,
    wire_offsets: Box<[usize]>,
    wire_readers: Box<[Box<[GateId]>]>,
    gates: Box<[Gate]>,
    /// Resolved states, what gates and callers observe
    wire_states: Vec<Atom>,
    /// External drives, Z where nothing is driven
    wire_drives: Vec<Atom>,
    /// Last committed output of each wire's driving gate, Z without one
    driven_states: Vec<Atom>,
    pending: Vec<GateId>,
    is_pending: Vec<bool>,
    round_buffer: Vec<Atom>,
}

impl Circuit {
    pub(crate) fn new(
        tag: CircuitTag,
        wires: Vec<WireInfo>,
        drives: &[LogicState],
        gates: Vec<Gate>,
    ) -> Self {
        let mut wire_offsets = Vec::with_capacity(wires.len() + 1);
        let mut total = 0;
        for wire in &wires {
            wire_offsets.push(total);
            total += wire.width.atom_count();
        }
        wire_offsets.push(total);

        let mut readers = vec![Vec::new(); wires.len()];
        for (index, gate) in gates.iter().enumerate() {
            let id = GateId {
                tag,
                index: index as u32,
            };
            for input in gate.inputs.iter() {
                let readers = &mut readers[input.index()];
                if readers.last() != Some(&id) {
                    readers.push(id);
                }
            }
        }

        let mut wire_drives = Vec::with_capacity(total);
        let mut driven_states = Vec::with_capacity(total);
        for (wire, drive) in wires.iter().zip(drives) {
            let count = wire.width.atom_count();
            let start = wire_drives.len();
            wire_drives.extend_from_slice(&drive.atoms[..count]);
            logic::canonicalize(&mut wire_drives[start..], wire.width);
            driven_states.extend_from_slice(&LogicState::HIGH_Z.atoms[..count]);
            logic::canonicalize(&mut driven_states[start..], wire.width);
        }
        let wire_states = wire_drives
            .iter()
            .zip(&driven_states)
            .map(|(&drive, &driven)| ops::resolve(drive, driven))
            .collect();

        let pending = (0..gates.len() as u32)
            .map(|index| GateId { tag, index })
            .collect();

        Self {
            tag,
            step: 0,
            wire_offsets: wire_offsets.into(),
            wire_readers: readers.into_iter().map(Vec::into_boxed_slice).collect(),
            is_pending: vec![true; gates.len()],
            gates: gates.into(),
            wires: wires.into(),
            wire_states,
            wire_drives,
            driven_states,
            pending,
            round_buffer: Vec::new(),
        }
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    fn check_wire(&self, wire: WireId) -> Result<&WireInfo, SimulationError> {
        if wire.tag != self.tag {
            return Err(SimulationError::ForeignWire(wire));
        }
        self.wires
            .get(wire.index())
            .ok_or(SimulationError::InvalidWireId(wire))
    }

    #[inline]
    fn atom_range(&self, wire: WireId) -> Range<usize> {
        self.wire_offsets[wire.index()]..self.wire_offsets[wire.index() + 1]
    }

    pub fn wire_width(&self, wire: WireId) -> Result<LogicWidth, SimulationError> {
        Ok(self.check_wire(wire)?.width)
    }

    pub fn wire_name(&self, wire: WireId) -> Result<Option<&str>, SimulationError> {
        Ok(self.check_wire(wire)?.name.as_deref())
    }

    /// The first wire carrying `name`
    pub fn find_wire(&self, name: &str) -> Option<WireId> {
        self.wires
            .iter()
            .position(|wire| wire.name.as_deref() == Some(name))
            .map(|index| WireId {
                tag: self.tag,
                index: index as u32,
            })
    }

    /// The drive last set on `wire`, Z if it was never driven
    pub fn get_wire_drive(&self, wire: WireId) -> Result<LogicState, SimulationError> {
        self.check_wire(wire)?;
        Ok(LogicState::from_atoms(&self.wire_drives[self.atom_range(wire)]))
    }

    fn schedule_readers(&mut self, wire: WireId) {
        for &gate in self.wire_readers[wire.index()].iter() {
            let flag = &mut self.is_pending[gate.index()];
            if !*flag {
                *flag = true;
                self.pending.push(gate);
            }
        }
    }

    /// Recombines drive and driven value; readers are scheduled if the result changed
    fn update_wire_state(&mut self, wire: WireId) {
        let mut changed = false;
        for i in self.atom_range(wire) {
            let state = ops::resolve(self.wire_drives[i], self.driven_states[i]);
            if state != self.wire_states[i] {
                self.wire_states[i] = state;
                changed = true;
            }
        }
        if changed {
            self.schedule_readers(wire);
        }
    }

    fn commit_driven(&mut self, wire: WireId, result: &[Atom]) {
        let range = self.atom_range(wire);
        if self.driven_states[range.clone()] == *result {
            return;
        }
        self.driven_states[range].copy_from_slice(result);
        self.update_wire_state(wire);
    }
}

impl WireStates for Circuit {
    #[inline]
    fn state(&self, wire: WireId) -> (&[Atom], LogicWidth) {
        (
            &self.wire_states[self.atom_range(wire)],
            self.wires[wire.index()].width,
        )
    }
}

impl CircuitSim for Circuit {
    type WireId = WireId;
    type State = LogicState;
    type Error = SimulationError;

    fn steps(&self) -> Step {
        self.step
    }

    fn work_left(&self) -> bool {
        !self.pending.is_empty()
    }

    fn step(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        log::trace!("step {}: evaluating {} gates", self.step, pending.len());
        for gate in &pending {
            self.is_pending[gate.index()] = false;
        }

        let mut buffer = std::mem::take(&mut self.round_buffer);
        buffer.clear();
        for gate in &pending {
            let gate = &self.gates[gate.index()];
            let width = self.wires[gate.output.index()].width;
            let start = buffer.len();
            buffer.resize(start + width.atom_count(), Atom::HIGH_Z);
            gate.evaluate(&*self, &mut buffer[start..], width);
        }

        let mut start = 0;
        for gate in &pending {
            let output = self.gates[gate.index()].output;
            let end = start + self.wires[output.index()].width.atom_count();
            self.commit_driven(output, &buffer[start..end]);
            start = end;
        }

        self.round_buffer = buffer;
        self.step += 1;
    }

    /// Replaces the external drive of `wire`; readers are scheduled even if nothing changed
    fn set_wire_drive(&mut self, wire: WireId, state: &LogicState) -> Result<(), SimulationError> {
        let width = self.check_wire(wire)?.width;
        let range = self.atom_range(wire);
        let drive = &mut self.wire_drives[range];
        drive.copy_from_slice(&state.atoms[..width.atom_count()]);
        logic::canonicalize(drive, width);
        self.update_wire_state(wire);
        self.schedule_readers(wire);
        Ok(())
    }

    fn get_wire_state(&self, wire: WireId) -> Result<LogicState, SimulationError> {
        self.check_wire(wire)?;
        Ok(LogicState::from_atoms(&self.wire_states[self.atom_range(wire)]))
    }
}
