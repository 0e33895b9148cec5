//! Word-parallel gate algebra over [Atom]s
//!
//! X and Z are both "unknown" to combinational logic; no function here ever
//! produces Z except [resolve], which models an undriven side.

use super::Atom;

#[inline]
fn defined_0(a: Atom) -> u32 {
    !a.unknown & !a.value
}

#[inline]
fn defined_1(a: Atom) -> u32 {
    !a.unknown & a.value
}

/// `0` controls: any defined 0 gives 0, otherwise any unknown gives X
#[inline]
pub(crate) fn and(a: Atom, b: Atom) -> Atom {
    let zero = defined_0(a) | defined_0(b);
    Atom {
        value: !zero,
        unknown: (a.unknown | b.unknown) & !zero,
    }
}

/// `1` controls: any defined 1 gives 1, otherwise any unknown gives X
#[inline]
pub(crate) fn or(a: Atom, b: Atom) -> Atom {
    let one = defined_1(a) | defined_1(b);
    let unknown = (a.unknown | b.unknown) & !one;
    Atom {
        value: one | unknown,
        unknown,
    }
}

#[inline]
pub(crate) fn xor(a: Atom, b: Atom) -> Atom {
    let unknown = a.unknown | b.unknown;
    Atom {
        value: (a.value ^ b.value) | unknown,
        unknown,
    }
}

/// 0 and 1 swap, X and Z both become X
#[inline]
pub(crate) fn not(a: Atom) -> Atom {
    Atom {
        value: !a.value | a.unknown,
        unknown: a.unknown,
    }
}

/// Defined lines pass, Z becomes X
#[inline]
pub(crate) fn buffer(a: Atom) -> Atom {
    Atom {
        value: a.value | a.unknown,
        unknown: a.unknown,
    }
}

/// Per line: `select` 0 takes `a`, 1 takes `b`, unknown keeps lines where both agree
#[inline]
pub(crate) fn mux(a: Atom, b: Atom, select: Atom) -> Atom {
    let a = buffer(a);
    let b = buffer(b);
    let take_a = defined_0(select);
    let take_b = defined_1(select);
    let either = select.unknown;
    let agree = !a.unknown & !b.unknown & !(a.value ^ b.value);
    let conflict = either & !agree;
    Atom {
        value: (take_a & a.value) | (take_b & b.value) | (either & a.value) | conflict,
        unknown: (take_a & a.unknown) | (take_b & b.unknown) | conflict,
    }
}

/// Combines an external drive with a gate-driven value
///
/// Z yields the other side, equal defined values agree, anything else is X.
#[inline]
pub(crate) fn resolve(drive: Atom, driven: Atom) -> Atom {
    let drive_z = drive.unknown & !drive.value;
    let driven_z = driven.unknown & !driven.value;
    let agree = !drive.unknown & !driven.unknown & !(drive.value ^ driven.value);
    let conflict = !drive_z & !driven_z & !agree;
    Atom {
        value: (drive_z & driven.value) | (!drive_z & drive.value) | conflict,
        unknown: (drive_z & driven.unknown) | (!drive_z & drive.unknown) | conflict,
    }
}

/// Outcome of folding every line of a word: the controlling value, an unknown, or neither
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Reduction {
    pub(crate) any_0: bool,
    pub(crate) any_1: bool,
    pub(crate) any_unknown: bool,
    pub(crate) parity: bool,
}

impl Reduction {
    #[inline]
    pub(crate) fn accumulate(&mut self, a: Atom, mask: u32) {
        self.any_0 |= defined_0(a) & mask != 0;
        self.any_1 |= defined_1(a) & mask != 0;
        self.any_unknown |= a.unknown & mask != 0;
        self.parity ^= (defined_1(a) & mask).count_ones() % 2 == 1;
    }

    pub(crate) fn and(self) -> Atom {
        if self.any_0 {
            Atom::LOGIC_0
        } else if self.any_unknown {
            Atom::UNDEFINED
        } else {
            Atom::LOGIC_1
        }
    }

    pub(crate) fn or(self) -> Atom {
        if self.any_1 {
            Atom::LOGIC_1
        } else if self.any_unknown {
            Atom::UNDEFINED
        } else {
            Atom::LOGIC_0
        }
    }

    pub(crate) fn xor(self) -> Atom {
        if self.any_unknown {
            Atom::UNDEFINED
        } else if self.parity {
            Atom::LOGIC_1
        } else {
            Atom::LOGIC_0
        }
    }
}
