//! Structural circuit nodes: wire and gate handles, gate kinds and their evaluation

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use crate::logic::{self, arith, ops, Atom, LogicWidth, ATOM_BITS};

/// Identifies the builder (and every circuit finalized from it) a handle belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CircuitTag(u32);

impl CircuitTag {
    pub(crate) fn new() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        CircuitTag(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireId {
    pub(crate) tag: CircuitTag,
    pub(crate) index: u32,
}

impl WireId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireId({}:{})", self.tag.0, self.index)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateId {
    pub(crate) tag: CircuitTag,
    pub(crate) index: u32,
}

impl GateId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GateId({}:{})", self.tag.0, self.index)
    }
}

/// The operation a gate performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    Not,
    Buffer,
    /// Inputs `[a, b, select]`; select 0 picks `a`
    Mux,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    ReduceXnor,
    ReduceNor,
    /// Copies the input lines starting at `offset`
    Slice { offset: u32 },
    /// Concatenates the inputs, the first one in the lowest lines
    Merge,
    /// Sum of `[a, b]` modulo the output width
    Add,
    /// Difference `a - b` modulo the output width
    Sub,
    /// Two's complement negation
    Neg,
    /// Inputs `[a, amount]`; vacated lines are 0
    ShiftLeft,
    /// Inputs `[a, amount]`; vacated lines are 0
    ShiftRight,
    /// Inputs `[a, amount]`; vacated lines copy the top line of `a`
    ShiftRightArithmetic,
    Eq,
    Ne,
    /// `a < b` on line 0, as two's complement when `signed`
    Lt { signed: bool },
    Le { signed: bool },
    Gt { signed: bool },
    Ge { signed: bool },
}

impl GateKind {
    /// Allowed number of inputs, as an inclusive range
    pub(crate) fn input_count(self) -> (usize, usize) {
        match self {
            Self::And | Self::Or | Self::Xor | Self::Nand | Self::Nor | Self::Xnor => {
                (2, usize::MAX)
            }
            Self::Not
            | Self::Buffer
            | Self::ReduceAnd
            | Self::ReduceOr
            | Self::ReduceXor
            | Self::ReduceXnor
            | Self::ReduceNor
            | Self::Slice { .. }
            | Self::Neg => (1, 1),
            Self::Add
            | Self::Sub
            | Self::ShiftLeft
            | Self::ShiftRight
            | Self::ShiftRightArithmetic
            | Self::Eq
            | Self::Ne
            | Self::Lt { .. }
            | Self::Le { .. }
            | Self::Gt { .. }
            | Self::Ge { .. } => (2, 2),
            Self::Mux => (3, 3),
            Self::Merge => (1, usize::MAX),
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, signed) = match *self {
            Self::Slice { offset } => return write!(f, "slice@{offset}"),
            Self::Lt { signed } => ("lt", signed),
            Self::Le { signed } => ("le", signed),
            Self::Gt { signed } => ("gt", signed),
            Self::Ge { signed } => ("ge", signed),
            other => return write!(f, "{}", format!("{other:?}").to_lowercase()),
        };
        if signed {
            write!(f, "signed {name}")
        } else {
            f.write_str(name)
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct WireInfo {
    pub(crate) width: LogicWidth,
    pub(crate) name: Option<Box<str>>,
    pub(crate) driver: Option<GateId>,
}

#[derive(Clone, Debug)]
pub(crate) struct Gate {
    pub(crate) kind: GateKind,
    pub(crate) inputs: Box<[WireId]>,
    pub(crate) output: WireId,
}

/// Read access to the current line values of every wire
pub(crate) trait WireStates {
    fn state(&self, wire: WireId) -> (&[Atom], LogicWidth);
}

impl Gate {
    /// Computes the gate's output into `out`, which spans the output wire
    pub(crate) fn evaluate<S: WireStates>(&self, wires: &S, out: &mut [Atom], out_width: LogicWidth) {
        match self.kind {
            GateKind::And => self.fold(wires, out, out_width, ops::and, false),
            GateKind::Or => self.fold(wires, out, out_width, ops::or, false),
            GateKind::Xor => self.fold(wires, out, out_width, ops::xor, false),
            GateKind::Nand => self.fold(wires, out, out_width, ops::and, true),
            GateKind::Nor => self.fold(wires, out, out_width, ops::or, true),
            GateKind::Xnor => self.fold(wires, out, out_width, ops::xor, true),
            GateKind::Not => self.fold(wires, out, out_width, |a, _| a, true),
            GateKind::Buffer => self.fold(wires, out, out_width, |a, _| a, false),
            GateKind::Mux => self.mux(wires, out, out_width),
            GateKind::ReduceAnd => self.reduce(wires, out, |r| r.and(), false),
            GateKind::ReduceOr => self.reduce(wires, out, |r| r.or(), false),
            GateKind::ReduceXor => self.reduce(wires, out, |r| r.xor(), false),
            GateKind::ReduceXnor => self.reduce(wires, out, |r| r.xor(), true),
            GateKind::ReduceNor => self.reduce(wires, out, |r| r.or(), true),
            GateKind::Slice { offset } => {
                let (input, _) = wires.state(self.inputs[0]);
                logic::copy_lines(input, offset, out, 0, out_width.get());
            }
            GateKind::Merge => {
                let mut offset = 0;
                for &wire in self.inputs.iter() {
                    let (input, width) = wires.state(wire);
                    logic::copy_lines(input, 0, out, offset, width.get());
                    offset += width.get();
                }
            }
            GateKind::Add => self.arithmetic(wires, out, out_width, |v, w| {
                arith::add(&v[0], &v[1], false, w)
            }),
            GateKind::Sub => self.arithmetic(wires, out, out_width, |v, w| arith::sub(&v[0], &v[1], w)),
            GateKind::Neg => self.arithmetic(wires, out, out_width, |v, w| arith::neg(&v[0], w)),
            GateKind::ShiftLeft => self.shift(wires, out, out_width, |a, n, w| {
                arith::shift_left(a, n, w)
            }),
            GateKind::ShiftRight => self.shift(wires, out, out_width, |a, n, w| {
                arith::shift_right(a, n, false, w)
            }),
            GateKind::ShiftRightArithmetic => self.shift(wires, out, out_width, |a, n, w| {
                arith::shift_right(a, n, true, w)
            }),
            GateKind::Eq => self.equality(wires, out, false),
            GateKind::Ne => self.equality(wires, out, true),
            GateKind::Lt { signed } => self.compare(wires, out, signed, Ordering::is_lt),
            GateKind::Le { signed } => self.compare(wires, out, signed, Ordering::is_le),
            GateKind::Gt { signed } => self.compare(wires, out, signed, Ordering::is_gt),
            GateKind::Ge { signed } => self.compare(wires, out, signed, Ordering::is_ge),
        }
        logic::canonicalize(out, out_width);
    }

    /// Lines at or above the narrowest operand have no defined result
    fn common_width<S: WireStates>(&self, wires: &S, out_width: LogicWidth) -> u32 {
        self.inputs
            .iter()
            .map(|&wire| wires.state(wire).1.get())
            .fold(out_width.get(), u32::min)
    }

    fn fold<S: WireStates>(
        &self,
        wires: &S,
        out: &mut [Atom],
        out_width: LogicWidth,
        op: fn(Atom, Atom) -> Atom,
        invert: bool,
    ) {
        let width = self.common_width(wires, out_width);
        for (i, atom) in out.iter_mut().enumerate() {
            let mut inputs = self.inputs.iter().map(|&wire| {
                let (input, _) = wires.state(wire);
                input.get(i).copied().unwrap_or(Atom::UNDEFINED)
            });
            // single-input kinds still pass through `buffer`: Z reads as X
            let first = inputs.next().map(ops::buffer).unwrap_or(Atom::UNDEFINED);
            let folded = inputs.fold(first, op);
            *atom = if invert { ops::not(folded) } else { folded };
        }
        mark_undefined_above(out, width);
    }

    fn mux<S: WireStates>(&self, wires: &S, out: &mut [Atom], out_width: LogicWidth) {
        let (a, a_width) = wires.state(self.inputs[0]);
        let (b, b_width) = wires.state(self.inputs[1]);
        let (select, select_width) = wires.state(self.inputs[2]);
        let (value, unknown) = select[0].bit(0).to_planes();
        let broadcast = Atom {
            value: if value { u32::MAX } else { 0 },
            unknown: if unknown { u32::MAX } else { 0 },
        };

        for (i, atom) in out.iter_mut().enumerate() {
            let sel = if select_width.get() == 1 {
                broadcast
            } else {
                select.get(i).copied().unwrap_or(Atom::UNDEFINED)
            };
            let a = a.get(i).copied().unwrap_or(Atom::UNDEFINED);
            let b = b.get(i).copied().unwrap_or(Atom::UNDEFINED);
            *atom = ops::mux(a, b, sel);
        }

        let mut width = out_width.get().min(a_width.get()).min(b_width.get());
        if select_width.get() != 1 {
            width = width.min(select_width.get());
        }
        mark_undefined_above(out, width);
    }

    fn reduce<S: WireStates>(
        &self,
        wires: &S,
        out: &mut [Atom],
        finish: fn(ops::Reduction) -> Atom,
        invert: bool,
    ) {
        let (input, width) = wires.state(self.inputs[0]);
        let mut reduction = ops::Reduction::default();
        for (atom, mask) in input.iter().zip(logic::atom_masks(width)) {
            reduction.accumulate(*atom, mask);
        }
        let result = finish(reduction);
        write_flag(out, if invert { ops::not(result) } else { result });
    }

    /// Any unknown operand line makes every result line X
    fn arithmetic<S: WireStates>(
        &self,
        wires: &S,
        out: &mut [Atom],
        out_width: LogicWidth,
        op: impl Fn(&[arith::Words], u32) -> arith::Words,
    ) {
        let width = self.common_width(wires, out_width);
        let operands: Option<Vec<_>> = self
            .inputs
            .iter()
            .map(|&wire| arith::defined(wires.state(wire).0, width))
            .collect();
        match operands {
            Some(operands) => arith::write(&op(&operands[..], width), out),
            None => out.fill(Atom::UNDEFINED),
        }
        mark_undefined_above(out, width);
    }

    fn shift<S: WireStates>(
        &self,
        wires: &S,
        out: &mut [Atom],
        out_width: LogicWidth,
        op: fn(&arith::Words, u32, u32) -> arith::Words,
    ) {
        let (a, a_width) = wires.state(self.inputs[0]);
        let (amount, amount_width) = wires.state(self.inputs[1]);
        let width = a_width.get().min(out_width.get());
        let operands = arith::defined(a, width).zip(arith::defined(amount, amount_width.get()));
        match operands {
            Some((a, amount)) => {
                let amount = arith::shift_amount(&amount, width);
                arith::write(&op(&a, amount, width), out);
            }
            None => out.fill(Atom::UNDEFINED),
        }
        mark_undefined_above(out, width);
    }

    /// A defined mismatch on any line decides, otherwise an unknown line gives X
    fn equality<S: WireStates>(&self, wires: &S, out: &mut [Atom], invert: bool) {
        let (a, a_width) = wires.state(self.inputs[0]);
        let (b, b_width) = wires.state(self.inputs[1]);
        let width = a_width.min(b_width);
        let mut reduction = ops::Reduction::default();
        for ((a, b), mask) in a.iter().zip(b).zip(logic::atom_masks(width)) {
            reduction.accumulate(ops::xor(*a, *b), mask);
        }
        let differs = reduction.or();
        write_flag(out, if invert { differs } else { ops::not(differs) });
    }

    fn compare<S: WireStates>(
        &self,
        wires: &S,
        out: &mut [Atom],
        signed: bool,
        holds: fn(Ordering) -> bool,
    ) {
        let (a, a_width) = wires.state(self.inputs[0]);
        let (b, b_width) = wires.state(self.inputs[1]);
        let width = a_width.get().min(b_width.get());
        let result = match arith::defined(a, width).zip(arith::defined(b, width)) {
            Some((a, b)) => {
                if holds(arith::compare(&a, &b, signed, width)) {
                    Atom::LOGIC_1
                } else {
                    Atom::LOGIC_0
                }
            }
            None => Atom::UNDEFINED,
        };
        write_flag(out, result);
    }
}

/// Writes a truth value to line 0 and logic 0 to the lines above
fn write_flag(out: &mut [Atom], result: Atom) {
    out.fill(Atom::LOGIC_0);
    out[0] = result.masked(1);
}

/// Sets every line from `width` upwards to X
fn mark_undefined_above(out: &mut [Atom], width: u32) {
    for (i, atom) in out.iter_mut().enumerate() {
        let start = i as u32 * ATOM_BITS;
        if start + ATOM_BITS <= width {
            continue;
        }
        let keep = logic::line_mask(width.saturating_sub(start));
        atom.value |= !keep;
        atom.unknown |= !keep;
    }
}
