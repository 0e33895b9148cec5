use std::{cell::RefCell, rc::Rc};

use crate::circuit::Circuit;
use crate::error::{check_gate_widths, BuildError};
use crate::graph::{CircuitTag, Gate, GateId, GateKind, WireId, WireInfo};
use crate::import::{ModuleConnections, ModuleImporter};
use crate::logic::{LogicState, LogicWidth};

/// Mutable description of a circuit, finalized into a [Circuit] by [CircuitBuilder::build]
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    tag: CircuitTag,
    wires: Vec<WireInfo>,
    drives: Vec<LogicState>,
    gates: Vec<Gate>,
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self {
            tag: CircuitTag::new(),
            wires: Vec::new(),
            drives: Vec::new(),
            gates: Vec::new(),
        }
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn add_wire(&mut self, width: LogicWidth) -> WireId {
        let wire = WireId {
            tag: self.tag,
            index: self.wires.len() as u32,
        };
        self.wires.push(WireInfo {
            width,
            name: None,
            driver: None,
        });
        self.drives.push(LogicState::HIGH_Z);
        wire
    }

    pub fn add_named_wire(&mut self, name: &str, width: LogicWidth) -> WireId {
        let wire = self.add_wire(width);
        self.wires[wire.index()].name = Some(name.into());
        wire
    }

    fn check_wire(&self, wire: WireId) -> Result<&WireInfo, BuildError> {
        if wire.tag != self.tag {
            return Err(BuildError::ForeignWire(wire));
        }
        self.wires
            .get(wire.index())
            .ok_or(BuildError::InvalidWireId(wire))
    }

    pub fn wire_width(&self, wire: WireId) -> Result<LogicWidth, BuildError> {
        Ok(self.check_wire(wire)?.width)
    }

    pub fn wire_name(&self, wire: WireId) -> Result<Option<&str>, BuildError> {
        Ok(self.check_wire(wire)?.name.as_deref())
    }

    pub fn set_wire_name(&mut self, wire: WireId, name: &str) -> Result<(), BuildError> {
        self.check_wire(wire)?;
        self.wires[wire.index()].name = Some(name.into());
        Ok(())
    }

    /// Sets the drive a wire starts out with once the circuit is built
    pub fn set_wire_drive(&mut self, wire: WireId, state: &LogicState) -> Result<(), BuildError> {
        self.check_wire(wire)?;
        self.drives[wire.index()] = *state;
        Ok(())
    }

    /// Adds a gate driving `output` from `inputs`
    ///
    /// Fails right away if a handle is invalid or foreign, if the input count
    /// does not suit `kind`, or if `output` already has a driving gate.
    pub fn add_gate(
        &mut self,
        kind: GateKind,
        inputs: &[WireId],
        output: WireId,
    ) -> Result<GateId, BuildError> {
        for &input in inputs {
            self.check_wire(input)?;
        }
        if let Some(driver) = self.check_wire(output)?.driver {
            return Err(BuildError::WireAlreadyDriven {
                wire: output,
                driver,
            });
        }

        let (min, max) = kind.input_count();
        if inputs.len() < min || inputs.len() > max {
            return Err(BuildError::InvalidInputCount {
                kind,
                min,
                max,
                actual: inputs.len(),
            });
        }

        let gate = GateId {
            tag: self.tag,
            index: self.gates.len() as u32,
        };
        self.gates.push(Gate {
            kind,
            inputs: inputs.into(),
            output,
        });
        self.wires[output.index()].driver = Some(gate);
        Ok(gate)
    }

    /// Imports a module; the builder is left untouched if the import fails
    pub fn import_module<I: ModuleImporter>(
        &mut self,
        importer: &I,
    ) -> Result<ModuleConnections, I::Error> {
        let mut scratch = self.clone();
        let connections = importer.import_into(&mut scratch)?;
        *self = scratch;
        Ok(connections)
    }

    /// Checks gate widths and freezes the topology into a runnable circuit
    pub fn build(&self) -> Result<Circuit, BuildError> {
        for (index, gate) in self.gates.iter().enumerate() {
            let inputs: Vec<_> = gate
                .inputs
                .iter()
                .map(|wire| self.wires[wire.index()].width)
                .collect();
            let id = GateId {
                tag: self.tag,
                index: index as u32,
            };
            check_gate_widths(id, gate.kind, &inputs, self.wires[gate.output.index()].width)?;
        }

        log::debug!(
            "building circuit with {} wires and {} gates",
            self.wires.len(),
            self.gates.len()
        );
        Ok(Circuit::new(
            self.tag,
            self.wires.clone(),
            &self.drives,
            self.gates.clone(),
        ))
    }
}

/// A wire inside a shared builder, for describing circuits gate by gate
#[derive(Debug, Clone)]
pub struct Connector {
    builder: Rc<RefCell<CircuitBuilder>>,
    pub wire: WireId,
}

impl Connector {
    fn from_wire(builder: Rc<RefCell<CircuitBuilder>>, wire: WireId) -> Self {
        Connector { builder, wire }
    }

    /// A fresh, undriven wire; drive it from outside or [Connector::connect] into it
    pub fn new(builder: Rc<RefCell<CircuitBuilder>>, width: LogicWidth) -> Self {
        let wire = builder.borrow_mut().add_wire(width);
        Self::from_wire(builder, wire)
    }

    pub fn builder(&self) -> Rc<RefCell<CircuitBuilder>> {
        self.builder.clone()
    }

    pub fn width(&self) -> LogicWidth {
        self.builder.borrow().wires[self.wire.index()].width
    }

    /// The builder every input lives in, once the input count suits `kind`
    fn shared_builder(
        kind: GateKind,
        inputs: &[&Self],
    ) -> Result<Rc<RefCell<CircuitBuilder>>, BuildError> {
        let (min, max) = kind.input_count();
        let first = match inputs.first() {
            Some(first) if (min..=max).contains(&inputs.len()) => first,
            _ => {
                return Err(BuildError::InvalidInputCount {
                    kind,
                    min,
                    max,
                    actual: inputs.len(),
                })
            }
        };
        if let Some(stranger) = inputs.iter().find(|c| !Rc::ptr_eq(&first.builder, &c.builder)) {
            return Err(BuildError::ForeignWire(stranger.wire));
        }
        Ok(first.builder.clone())
    }

    fn gate_with_width(
        kind: GateKind,
        inputs: &[&Self],
        width: LogicWidth,
    ) -> Result<Self, BuildError> {
        let builder = Self::shared_builder(kind, inputs)?;
        let wires: Vec<_> = inputs.iter().map(|c| c.wire).collect();
        let output = {
            let mut builder = builder.borrow_mut();
            let output = builder.add_wire(width);
            builder.add_gate(kind, &wires, output)?;
            output
        };
        Ok(Self::from_wire(builder, output))
    }

    /// Output as wide as the narrowest input
    fn gate_gen(kind: GateKind, inputs: &[&Self]) -> Result<Self, BuildError> {
        let width = inputs
            .iter()
            .map(|c| c.width())
            .min()
            .unwrap_or(LogicWidth::MIN);
        Self::gate_with_width(kind, inputs, width)
    }

    /// Drives this connector's wire with a new gate, for closing feedback loops
    pub fn drive_from(&self, kind: GateKind, inputs: &[&Self]) -> Result<GateId, BuildError> {
        let builder = Self::shared_builder(kind, inputs)?;
        if !Rc::ptr_eq(&builder, &self.builder) {
            return Err(BuildError::ForeignWire(self.wire));
        }
        let wires: Vec<_> = inputs.iter().map(|c| c.wire).collect();
        self.builder.borrow_mut().add_gate(kind, &wires, self.wire)
    }

    pub fn slice(&self, offset: u32, width: LogicWidth) -> Result<Self, BuildError> {
        Self::gate_with_width(GateKind::Slice { offset }, &[self], width)
    }

    pub fn mark(&self, name: &str) -> Result<&Self, BuildError> {
        self.builder.borrow_mut().set_wire_name(self.wire, name)?;
        Ok(self)
    }

    pub fn invert(&self) -> Result<Self, BuildError> {
        Self::gate_gen(GateKind::Not, &[self])
    }

    /// Drives `output` with this connector's value through a buffer
    pub fn connect(&self, output: &Connector) -> Result<GateId, BuildError> {
        if !Rc::ptr_eq(&self.builder, &output.builder) {
            return Err(BuildError::ForeignWire(output.wire));
        }
        self.builder
            .borrow_mut()
            .add_gate(GateKind::Buffer, &[self.wire], output.wire)
    }
}

pub mod ops {
    use crate::error::BuildError;
    use crate::graph::GateKind;
    use crate::logic::LogicWidth;

    use super::Connector;

    pub use crate::{and, nand, nor, or, xnor, xor};

    macro_rules! gate_fn_gen {
        ( $gate_lowercase:ident, $gate_uppercase:ident ) => {
            pub fn $gate_lowercase(inputs: Vec<&Connector>) -> Result<Connector, BuildError> {
                Connector::gate_gen(GateKind::$gate_uppercase, &inputs)
            }
        };
    }

    gate_fn_gen!(or, Or);
    gate_fn_gen!(nor, Nor);
    gate_fn_gen!(and, And);
    gate_fn_gen!(nand, Nand);
    gate_fn_gen!(xor, Xor);
    gate_fn_gen!(xnor, Xnor);

    /// Concatenates `inputs`, the first one in the lowest lines
    pub fn merge(inputs: Vec<&Connector>) -> Result<Connector, BuildError> {
        let total: u32 = inputs.iter().map(|c| c.width().get()).sum();
        let width = LogicWidth::new(total).ok_or(BuildError::InvalidWidth(total))?;
        Connector::gate_with_width(GateKind::Merge, &inputs, width)
    }

    /// `select` 0 picks `a`, 1 picks `b`
    pub fn mux(a: &Connector, b: &Connector, select: &Connector) -> Result<Connector, BuildError> {
        let width = a.width().min(b.width());
        Connector::gate_with_width(GateKind::Mux, &[a, b, select], width)
    }

    #[macro_export]
    macro_rules! or {
        ( $( $inputs:expr ),+ ) => {
            or(vec!($(&$inputs),+))
        };
    }

    #[macro_export]
    macro_rules! nor {
        ( $( $inputs:expr ),+ ) => {
            nor(vec!($(&$inputs),+))
        };
    }

    #[macro_export]
    macro_rules! and {
        ( $( $inputs:expr ),+ ) => {
            and(vec!($(&$inputs),+))
        };
    }

    #[macro_export]
    macro_rules! nand {
        ( $( $inputs:expr ),+ ) => {
            nand(vec!($(&$inputs),+))
        };
    }

    #[macro_export]
    macro_rules! xor {
        ( $( $inputs:expr ),+ ) => {
            xor(vec!($(&$inputs),+))
        };
    }

    #[macro_export]
    macro_rules! xnor {
        ( $( $inputs:expr ),+ ) => {
            xnor(vec!($(&$inputs),+))
        };
    }
}
