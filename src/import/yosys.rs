//! Yosys `write_json` netlists
//!
//! The importer expects a flattened netlist of combinational cells: logic
//! gates, reductions, muxes, adders, shifters and comparators. Cells holding
//! state (flip-flops, latches, memories) and multipliers or dividers are
//! rejected. Running `synth -flatten -noalumacc -nordff -run begin:fine`
//! followed by `write_json` produces such a netlist.

use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use super::{ModuleConnections, ModuleImporter};
use crate::circuit_builder::CircuitBuilder;
use crate::error::BuildError;
use crate::graph::{GateKind, WireId};
use crate::logic::{LogicBitState, LogicState, LogicWidth};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum YosysImportError {
    #[error("malformed netlist: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected one module or exactly one marked `top`, found {count} candidates")]
    NoTopModule { count: usize },

    #[error("port `{port}` is inout")]
    InOutPort { port: Box<str> },

    #[error("port `{port}` of cell `{cell}` is inout")]
    CellInOutPort { cell: Box<str>, port: Box<str> },

    #[error("`{name}` has {width} lines, expected between 1 and 256")]
    UnsupportedWidth { name: Box<str>, width: usize },

    #[error("cell `{cell}` has unsupported type `{cell_type}`")]
    UnsupportedCellType { cell: Box<str>, cell_type: Box<str> },

    #[error("cell `{cell}` has no port `{port}`")]
    MissingCellPort { cell: Box<str>, port: Box<str> },

    #[error("port `{port}` of cell `{cell}` has no direction")]
    MissingPortDirection { cell: Box<str>, port: Box<str> },

    #[error("`{0}` is not a constant bit")]
    InvalidConstant(Box<str>),

    #[error("parameter `{parameter}` of cell `{cell}` is not a number")]
    InvalidParameter { cell: Box<str>, parameter: Box<str> },

    #[error("net {net} is driven more than once")]
    MultipleDrivers { net: usize },

    #[error("net {net} is read but never driven")]
    UndrivenNet { net: usize },

    #[error(transparent)]
    Build(#[from] BuildError),
}

type Result<T> = std::result::Result<T, YosysImportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PortDirection {
    Input,
    Output,
    Inout,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawBit {
    Net(usize),
    Constant(String),
}

#[derive(Debug, Clone, Deserialize)]
struct Port {
    direction: PortDirection,
    bits: Vec<RawBit>,
}

#[derive(Debug, Clone, Deserialize)]
struct Cell {
    #[serde(rename = "type")]
    cell_type: String,
    #[serde(default)]
    parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    port_directions: HashMap<String, PortDirection>,
    #[serde(default)]
    connections: IndexMap<String, Vec<RawBit>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Module {
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    ports: IndexMap<String, Port>,
    #[serde(default)]
    cells: IndexMap<String, Cell>,
}

#[derive(Debug, Deserialize)]
struct Netlist {
    #[serde(default)]
    modules: IndexMap<String, Module>,
}

/// Yosys writes numbers as binary strings, older versions as plain integers
fn parse_number(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => {
            let digits = s.trim_start_matches('0');
            if digits.is_empty() {
                Some(0)
            } else {
                u64::from_str_radix(digits, 2).ok()
            }
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bit {
    Net(usize),
    Constant(LogicBitState),
}

fn convert_bits(raw: &[RawBit]) -> Result<Vec<Bit>> {
    raw.iter()
        .map(|bit| match bit {
            RawBit::Net(net) => Ok(Bit::Net(*net)),
            RawBit::Constant(s) => {
                let mut chars = s.chars();
                match (chars.next().and_then(LogicBitState::from_char), chars.next()) {
                    (Some(state), None) => Ok(Bit::Constant(state)),
                    _ => Err(YosysImportError::InvalidConstant(s.as_str().into())),
                }
            }
        })
        .collect()
}

/// Zero- or sign-extends `bits` to `width`, or cuts them down to it
fn extend_bits(mut bits: Vec<Bit>, width: usize, signed: bool) -> Vec<Bit> {
    let fill = match bits.last() {
        Some(&msb) if signed => msb,
        _ => Bit::Constant(LogicBitState::Logic0),
    };
    bits.resize(width, fill);
    bits
}

fn port_width(name: &str, len: usize) -> Result<LogicWidth> {
    u32::try_from(len)
        .ok()
        .and_then(LogicWidth::new)
        .ok_or_else(|| YosysImportError::UnsupportedWidth {
            name: name.into(),
            width: len,
        })
}

/// How an input pin is fitted to its gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    /// Taken as is
    Plain,
    /// Extended or cut to the width of `Y`
    Output,
    /// Extended to the widest of the cell's `Widest` pins
    Widest,
    /// Reduced to a truth value first
    Truth,
}

type Operands = &'static [(&'static str, Operand)];

const BINARY: Operands = &[("A", Operand::Output), ("B", Operand::Output)];
const UNARY: Operands = &[("A", Operand::Output)];
const REDUCE: Operands = &[("A", Operand::Plain)];
const MUX: Operands = &[("A", Operand::Output), ("B", Operand::Output), ("S", Operand::Plain)];
const SHIFT: Operands = &[("A", Operand::Output), ("B", Operand::Plain)];
const COMPARE: Operands = &[("A", Operand::Widest), ("B", Operand::Widest)];
const LOGIC: Operands = &[("A", Operand::Truth), ("B", Operand::Truth)];

enum CellShape {
    Skip,
    Gate { kind: GateKind, operands: Operands },
}

fn classify(cell_type: &str) -> Option<CellShape> {
    let (kind, operands) = match cell_type {
        "$scopeinfo" => return Some(CellShape::Skip),
        "$and" | "$_AND_" => (GateKind::And, BINARY),
        "$or" | "$_OR_" => (GateKind::Or, BINARY),
        "$xor" | "$_XOR_" => (GateKind::Xor, BINARY),
        "$xnor" | "$_XNOR_" => (GateKind::Xnor, BINARY),
        "$_NAND_" => (GateKind::Nand, BINARY),
        "$_NOR_" => (GateKind::Nor, BINARY),
        "$not" | "$_NOT_" => (GateKind::Not, UNARY),
        "$pos" | "$_BUF_" => (GateKind::Buffer, UNARY),
        "$mux" | "$_MUX_" => (GateKind::Mux, MUX),
        "$reduce_and" => (GateKind::ReduceAnd, REDUCE),
        "$reduce_or" | "$reduce_bool" => (GateKind::ReduceOr, REDUCE),
        "$reduce_xor" => (GateKind::ReduceXor, REDUCE),
        "$reduce_xnor" => (GateKind::ReduceXnor, REDUCE),
        "$logic_not" => (GateKind::ReduceNor, REDUCE),
        "$logic_and" => (GateKind::And, LOGIC),
        "$logic_or" => (GateKind::Or, LOGIC),
        "$add" => (GateKind::Add, BINARY),
        "$sub" => (GateKind::Sub, BINARY),
        "$neg" => (GateKind::Neg, UNARY),
        "$shl" | "$sshl" => (GateKind::ShiftLeft, SHIFT),
        "$shr" => (GateKind::ShiftRight, SHIFT),
        "$sshr" => (GateKind::ShiftRightArithmetic, SHIFT),
        "$eq" => (GateKind::Eq, COMPARE),
        "$ne" => (GateKind::Ne, COMPARE),
        "$lt" => (GateKind::Lt { signed: false }, COMPARE),
        "$le" => (GateKind::Le { signed: false }, COMPARE),
        "$gt" => (GateKind::Gt { signed: false }, COMPARE),
        "$ge" => (GateKind::Ge { signed: false }, COMPARE),
        _ => return None,
    };
    Some(CellShape::Gate { kind, operands })
}

/// Applies the signedness of a cell's operands to the kinds that depend on it
fn signed_kind(kind: GateKind, a_signed: bool, b_signed: bool) -> GateKind {
    let signed = a_signed && b_signed;
    match kind {
        GateKind::ShiftRightArithmetic if !a_signed => GateKind::ShiftRight,
        GateKind::Lt { .. } => GateKind::Lt { signed },
        GateKind::Le { .. } => GateKind::Le { signed },
        GateKind::Gt { .. } => GateKind::Gt { signed },
        GateKind::Ge { .. } => GateKind::Ge { signed },
        other => other,
    }
}

/// Imports the single (or top) module of a Yosys JSON netlist
#[derive(Debug, Clone)]
pub struct YosysModuleImporter {
    module_name: Box<str>,
    module: Module,
}

impl YosysModuleImporter {
    fn from_netlist(netlist: Netlist) -> Result<Self> {
        let candidates: Vec<_> = if netlist.modules.len() == 1 {
            netlist.modules.into_iter().collect()
        } else {
            netlist
                .modules
                .into_iter()
                .filter(|(_, module)| {
                    module
                        .attributes
                        .get("top")
                        .and_then(parse_number)
                        .is_some_and(|top| top != 0)
                })
                .collect()
        };
        let [(name, module)] = <[_; 1]>::try_from(candidates).map_err(|candidates| {
            YosysImportError::NoTopModule {
                count: candidates.len(),
            }
        })?;

        Ok(Self {
            module_name: name.into(),
            module,
        })
    }

    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Self::from_netlist(serde_json::from_reader(reader)?)
    }

    pub fn from_json_slice(slice: &[u8]) -> Result<Self> {
        Self::from_netlist(serde_json::from_slice(slice)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Self::from_netlist(serde_json::from_str(s)?)
    }
}

/// Maps bit vectors to the wires carrying them
#[derive(Default)]
struct NetResolver {
    /// Net index to the wire and line it is sourced from
    sources: HashMap<usize, (WireId, u32)>,
    wires: HashMap<Box<[Bit]>, WireId>,
}

impl NetResolver {
    /// Records `wire` as the source of every net in `bits`
    fn add_source(&mut self, wire: WireId, bits: &[Bit]) -> Result<()> {
        for (line, bit) in bits.iter().enumerate() {
            if let Bit::Net(net) = *bit {
                if self.sources.insert(net, (wire, line as u32)).is_some() {
                    return Err(YosysImportError::MultipleDrivers { net });
                }
            }
        }
        self.wires.insert(bits.into(), wire);
        Ok(())
    }

    fn source(&self, net: usize) -> Result<(WireId, u32)> {
        self.sources
            .get(&net)
            .copied()
            .ok_or(YosysImportError::UndrivenNet { net })
    }

    /// Splits `bits` into runs that each come from one place: all constants, or
    /// consecutive lines of one source wire
    fn runs(&self, bits: &[Bit]) -> Result<Vec<Range<usize>>> {
        let mut runs = Vec::new();
        let mut start = 0;
        for i in 1..=bits.len() {
            let continues = match (bits[i - 1], bits.get(i)) {
                (Bit::Constant(_), Some(Bit::Constant(_))) => true,
                (Bit::Net(prev), Some(&Bit::Net(next))) => {
                    let (prev_wire, prev_line) = self.source(prev)?;
                    let (next_wire, next_line) = self.source(next)?;
                    prev_wire == next_wire && prev_line + 1 == next_line
                }
                (Bit::Net(prev), _) => {
                    self.source(prev)?;
                    false
                }
                _ => false,
            };
            if !continues {
                runs.push(start..i);
                start = i;
            }
        }
        Ok(runs)
    }

    fn wire_for_bits(&mut self, builder: &mut CircuitBuilder, bits: &[Bit]) -> Result<WireId> {
        if let Some(&wire) = self.wires.get(bits) {
            return Ok(wire);
        }
        let width = port_width("bit vector", bits.len())?;

        let runs = self.runs(bits)?;
        let wire = if runs.len() > 1 {
            let mut pieces = Vec::with_capacity(runs.len());
            for run in runs {
                pieces.push(self.wire_for_bits(builder, &bits[run])?);
            }
            let merged = builder.add_wire(width);
            builder.add_gate(GateKind::Merge, &pieces, merged)?;
            merged
        } else {
            match bits[0] {
                Bit::Constant(_) => {
                    let states: Vec<_> = bits
                        .iter()
                        .map(|bit| match bit {
                            Bit::Constant(state) => *state,
                            Bit::Net(_) => LogicBitState::Undefined,
                        })
                        .collect();
                    let wire = builder.add_wire(width);
                    builder.set_wire_drive(wire, &LogicState::from_bits(&states))?;
                    wire
                }
                Bit::Net(net) => {
                    let (source, offset) = self.source(net)?;
                    if offset == 0 && builder.wire_width(source)? == width {
                        source
                    } else {
                        let slice = builder.add_wire(width);
                        builder.add_gate(GateKind::Slice { offset }, &[source], slice)?;
                        slice
                    }
                }
            }
        };

        self.wires.insert(bits.into(), wire);
        Ok(wire)
    }
}

struct CellGate<'a> {
    name: &'a str,
    kind: GateKind,
    /// Bits of each input pin, and whether it is reduced to a truth value
    operands: Vec<(Vec<Bit>, bool)>,
    output: WireId,
}

impl YosysModuleImporter {
    fn cell_port<'a>(name: &str, cell: &'a Cell, port: &str) -> Result<&'a [RawBit]> {
        cell.connections
            .get(port)
            .map(Vec::as_slice)
            .ok_or_else(|| YosysImportError::MissingCellPort {
                cell: name.into(),
                port: port.into(),
            })
    }

    fn cell_flag(name: &str, cell: &Cell, parameter: &str) -> Result<bool> {
        match cell.parameters.get(parameter) {
            None => Ok(false),
            Some(value) => parse_number(value).map(|v| v != 0).ok_or_else(|| {
                YosysImportError::InvalidParameter {
                    cell: name.into(),
                    parameter: parameter.into(),
                }
            }),
        }
    }

    /// Checks pin directions and allocates the cell's output wire
    fn prepare_cell<'a>(
        name: &'a str,
        cell: &Cell,
        kind: GateKind,
        operands: Operands,
        builder: &mut CircuitBuilder,
        resolver: &mut NetResolver,
    ) -> Result<CellGate<'a>> {
        for port in cell.connections.keys() {
            match cell.port_directions.get(port) {
                None => {
                    return Err(YosysImportError::MissingPortDirection {
                        cell: name.into(),
                        port: port.as_str().into(),
                    })
                }
                Some(PortDirection::Inout) => {
                    return Err(YosysImportError::CellInOutPort {
                        cell: name.into(),
                        port: port.as_str().into(),
                    })
                }
                Some(_) => {}
            }
        }

        let y = convert_bits(Self::cell_port(name, cell, "Y")?)?;
        let output = builder.add_wire(port_width(name, y.len())?);
        resolver.add_source(output, &y)?;

        let a_signed = Self::cell_flag(name, cell, "A_SIGNED")?;
        let b_signed = Self::cell_flag(name, cell, "B_SIGNED")?;
        let mut pins = Vec::with_capacity(operands.len());
        for &(port, operand) in operands {
            let bits = convert_bits(Self::cell_port(name, cell, port)?)?;
            let signed = match port {
                "A" => a_signed,
                "B" => b_signed,
                _ => false,
            };
            pins.push((bits, operand, signed));
        }

        let widest = pins
            .iter()
            .filter(|(_, operand, _)| *operand == Operand::Widest)
            .map(|(bits, _, _)| bits.len())
            .max()
            .unwrap_or(0);
        let operands = pins
            .into_iter()
            .map(|(bits, operand, signed)| match operand {
                Operand::Plain => (bits, false),
                Operand::Truth => (bits, true),
                Operand::Output => (extend_bits(bits, y.len(), signed), false),
                Operand::Widest => (extend_bits(bits, widest, signed), false),
            })
            .collect();

        Ok(CellGate {
            name,
            kind: signed_kind(kind, a_signed, b_signed),
            operands,
            output,
        })
    }
}

impl ModuleImporter for YosysModuleImporter {
    type Error = YosysImportError;

    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn import_into(&self, builder: &mut CircuitBuilder) -> Result<ModuleConnections> {
        log::debug!(
            "importing yosys module `{}` with {} ports and {} cells",
            self.module_name,
            self.module.ports.len(),
            self.module.cells.len()
        );

        let mut resolver = NetResolver::default();
        let mut connections = ModuleConnections::default();

        for (name, port) in &self.module.ports {
            match port.direction {
                PortDirection::Inout => {
                    return Err(YosysImportError::InOutPort {
                        port: name.as_str().into(),
                    })
                }
                PortDirection::Input => {
                    let bits = convert_bits(&port.bits)?;
                    let wire = builder.add_named_wire(name, port_width(name, bits.len())?);
                    resolver.add_source(wire, &bits)?;
                    connections.inputs.insert(name.as_str().into(), wire);
                }
                PortDirection::Output => {}
            }
        }

        let mut gates = Vec::with_capacity(self.module.cells.len());
        for (name, cell) in &self.module.cells {
            match classify(&cell.cell_type) {
                Some(CellShape::Skip) => {}
                Some(CellShape::Gate { kind, operands }) => {
                    gates.push(Self::prepare_cell(
                        name,
                        cell,
                        kind,
                        operands,
                        builder,
                        &mut resolver,
                    )?);
                }
                None => {
                    return Err(YosysImportError::UnsupportedCellType {
                        cell: name.as_str().into(),
                        cell_type: cell.cell_type.as_str().into(),
                    })
                }
            }
        }

        for gate in gates {
            let mut inputs = Vec::with_capacity(gate.operands.len());
            for (bits, truth) in &gate.operands {
                let mut wire = resolver.wire_for_bits(builder, bits)?;
                if *truth {
                    let width = builder.wire_width(gate.output)?;
                    let flag = builder.add_wire(width);
                    builder.add_gate(GateKind::ReduceOr, &[wire], flag)?;
                    wire = flag;
                }
                inputs.push(wire);
            }
            log::trace!("cell `{}` becomes a {} gate", gate.name, gate.kind);
            builder.add_gate(gate.kind, &inputs, gate.output)?;
        }

        for (name, port) in &self.module.ports {
            if port.direction != PortDirection::Output {
                continue;
            }
            let bits = convert_bits(&port.bits)?;
            port_width(name, bits.len())?;
            let wire = resolver.wire_for_bits(builder, &bits)?;
            if builder.wire_name(wire)?.is_none() {
                builder.set_wire_name(wire, name)?;
            }
            connections.outputs.insert(name.as_str().into(), wire);
        }

        Ok(connections)
    }
}
