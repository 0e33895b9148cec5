//! Four-valued, width-parallel logic values

pub(crate) mod arith;
pub(crate) mod ops;

use std::fmt;
use std::str::FromStr;

use num_traits::{NumCast, PrimInt, Unsigned};

/// The maximum number of lines a single wire can carry
pub const MAX_LOGIC_WIDTH: u32 = 256;

pub(crate) const ATOM_BITS: u32 = u32::BITS;
pub(crate) const MAX_ATOM_COUNT: usize = (MAX_LOGIC_WIDTH / ATOM_BITS) as usize;

/// The number of parallel lines in a wire, between 1 and [MAX_LOGIC_WIDTH]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicWidth(u16);

impl LogicWidth {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(MAX_LOGIC_WIDTH as u16);

    pub const fn new(width: u32) -> Option<Self> {
        if width >= 1 && width <= MAX_LOGIC_WIDTH {
            Some(Self(width as u16))
        } else {
            None
        }
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0 as u32
    }

    /// Number of 32-line words needed to store this many lines
    #[inline]
    pub(crate) const fn atom_count(self) -> usize {
        self.get().div_ceil(ATOM_BITS) as usize
    }

    /// Mask of the significant lines in the last word
    #[inline]
    pub(crate) const fn last_atom_mask(self) -> u32 {
        line_mask(self.get() - (self.atom_count() as u32 - 1) * ATOM_BITS)
    }
}

impl TryFrom<u32> for LogicWidth {
    type Error = u32;

    fn try_from(width: u32) -> Result<Self, Self::Error> {
        Self::new(width).ok_or(width)
    }
}

impl fmt::Debug for LogicWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

impl fmt::Display for LogicWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.get(), f)
    }
}

/// Mask with the low `len` bits set, `len` in 0..=32
#[inline]
pub(crate) const fn line_mask(len: u32) -> u32 {
    if len >= ATOM_BITS {
        u32::MAX
    } else {
        (1u32 << len) - 1
    }
}

/// The value of a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicBitState {
    Logic0,
    Logic1,
    HighZ,
    Undefined,
}

impl LogicBitState {
    #[inline]
    pub(crate) const fn from_planes(value: bool, unknown: bool) -> Self {
        match (value, unknown) {
            (false, false) => Self::Logic0,
            (true, false) => Self::Logic1,
            (false, true) => Self::HighZ,
            (true, true) => Self::Undefined,
        }
    }

    #[inline]
    pub(crate) const fn to_planes(self) -> (bool, bool) {
        match self {
            Self::Logic0 => (false, false),
            Self::Logic1 => (true, false),
            Self::HighZ => (false, true),
            Self::Undefined => (true, true),
        }
    }

    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::Logic1
        } else {
            Self::Logic0
        }
    }

    pub const fn to_bool(self) -> Option<bool> {
        match self {
            Self::Logic0 => Some(false),
            Self::Logic1 => Some(true),
            Self::HighZ | Self::Undefined => None,
        }
    }

    /// Accepts `0`, `1`, `x`/`X` and `z`/`Z`
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Logic0),
            '1' => Some(Self::Logic1),
            'z' | 'Z' => Some(Self::HighZ),
            'x' | 'X' => Some(Self::Undefined),
            _ => None,
        }
    }

    pub const fn to_char(self) -> char {
        match self {
            Self::Logic0 => '0',
            Self::Logic1 => '1',
            Self::HighZ => 'Z',
            Self::Undefined => 'X',
        }
    }
}

impl fmt::Display for LogicBitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// 32 lines of logic stored as two bit planes
//
//  value | unknown | line
// -------|---------|------
//    v   |    0    | logic v
//    0   |    1    | Z
//    1   |    1    | X
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct Atom {
    pub(crate) value: u32,
    pub(crate) unknown: u32,
}

impl Atom {
    pub(crate) const LOGIC_0: Self = Self {
        value: 0,
        unknown: 0,
    };
    pub(crate) const LOGIC_1: Self = Self {
        value: u32::MAX,
        unknown: 0,
    };
    pub(crate) const HIGH_Z: Self = Self {
        value: 0,
        unknown: u32::MAX,
    };
    pub(crate) const UNDEFINED: Self = Self {
        value: u32::MAX,
        unknown: u32::MAX,
    };

    #[inline]
    pub(crate) const fn from_int(value: u32) -> Self {
        Self { value, unknown: 0 }
    }

    #[inline]
    pub(crate) const fn masked(self, mask: u32) -> Self {
        Self {
            value: self.value & mask,
            unknown: self.unknown & mask,
        }
    }

    #[inline]
    pub(crate) fn eq_masked(self, other: Self, mask: u32) -> bool {
        ((self.value ^ other.value) | (self.unknown ^ other.unknown)) & mask == 0
    }

    #[inline]
    pub(crate) fn bit(self, index: u32) -> LogicBitState {
        LogicBitState::from_planes(
            (self.value >> index) & 1 != 0,
            (self.unknown >> index) & 1 != 0,
        )
    }
}

/// Iterates the word masks of a wire of the given width
pub(crate) fn atom_masks(width: LogicWidth) -> impl Iterator<Item = u32> {
    let count = width.atom_count();
    let last = width.last_atom_mask();
    (0..count).map(move |i| if i + 1 == count { last } else { u32::MAX })
}

/// Zeroes every line above `width`
pub(crate) fn canonicalize(atoms: &mut [Atom], width: LogicWidth) {
    for (atom, mask) in atoms.iter_mut().zip(atom_masks(width)) {
        *atom = atom.masked(mask);
    }
}

/// Reads up to 32 lines starting at `offset`; lines past the end read as logic 0
pub(crate) fn get_lines(atoms: &[Atom], offset: u32, len: u32) -> Atom {
    debug_assert!(len >= 1 && len <= ATOM_BITS);
    let index = (offset / ATOM_BITS) as usize;
    let shift = offset % ATOM_BITS;
    let low = atoms.get(index).copied().unwrap_or_default();
    let high = atoms.get(index + 1).copied().unwrap_or_default();
    let join = |lo: u32, hi: u32| ((((hi as u64) << 32) | lo as u64) >> shift) as u32;
    Atom {
        value: join(low.value, high.value),
        unknown: join(low.unknown, high.unknown),
    }
    .masked(line_mask(len))
}

/// Writes the low `len` lines of `lines` starting at `offset`
pub(crate) fn set_lines(atoms: &mut [Atom], offset: u32, len: u32, lines: Atom) {
    debug_assert!(len >= 1 && len <= ATOM_BITS);
    let index = (offset / ATOM_BITS) as usize;
    let shift = offset % ATOM_BITS;
    let mask = (line_mask(len) as u64) << shift;

    let splice = |lo: &mut u32, hi: Option<&mut u32>, src: u32| {
        let old = ((hi.as_deref().copied().unwrap_or(0) as u64) << 32) | *lo as u64;
        let new = (old & !mask) | (((src as u64) << shift) & mask);
        *lo = new as u32;
        if let Some(hi) = hi {
            *hi = (new >> 32) as u32;
        }
    };

    let (head, tail) = atoms.split_at_mut(index + 1);
    let low = &mut head[index];
    let mut high = tail.first_mut();
    splice(
        &mut low.value,
        high.as_mut().map(|h| &mut h.value),
        lines.value,
    );
    splice(&mut low.unknown, high.map(|h| &mut h.unknown), lines.unknown);
}

/// Copies `len` lines between two atom slices at arbitrary line offsets
pub(crate) fn copy_lines(src: &[Atom], src_offset: u32, dst: &mut [Atom], dst_offset: u32, len: u32) {
    let mut done = 0;
    while done < len {
        let chunk = (len - done).min(ATOM_BITS);
        let lines = get_lines(src, src_offset + done, chunk);
        set_lines(dst, dst_offset + done, chunk, lines);
        done += chunk;
    }
}

/// The state of up to [MAX_LOGIC_WIDTH] parallel lines
///
/// A state carries no width of its own: the broadcasting constants fill every
/// line, and the integer constructors leave the lines above the given value at
/// logic 0. A state is cut down to the width of the wire it is driven onto.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicState {
    pub(crate) atoms: [Atom; MAX_ATOM_COUNT],
}

impl LogicState {
    /// Every line floating
    pub const HIGH_Z: Self = Self {
        atoms: [Atom::HIGH_Z; MAX_ATOM_COUNT],
    };
    /// Every line undefined
    pub const UNDEFINED: Self = Self {
        atoms: [Atom::UNDEFINED; MAX_ATOM_COUNT],
    };
    /// Every line at logic 0
    pub const LOGIC_0: Self = Self {
        atoms: [Atom::LOGIC_0; MAX_ATOM_COUNT],
    };
    /// Every line at logic 1
    pub const LOGIC_1: Self = Self {
        atoms: [Atom::LOGIC_1; MAX_ATOM_COUNT],
    };

    /// Treats the word as a plain binary pattern, every line defined
    pub const fn from_int(value: u32) -> Self {
        let mut atoms = [Atom::LOGIC_0; MAX_ATOM_COUNT];
        atoms[0] = Atom::from_int(value);
        Self { atoms }
    }

    pub const fn from_u64(value: u64) -> Self {
        let mut atoms = [Atom::LOGIC_0; MAX_ATOM_COUNT];
        atoms[0] = Atom::from_int(value as u32);
        atoms[1] = Atom::from_int((value >> 32) as u32);
        Self { atoms }
    }

    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::from_int(1)
        } else {
            Self::from_int(0)
        }
    }

    /// Creates a state from words, least significant first
    pub fn from_big_int(words: &[u32]) -> Self {
        let mut state = Self::LOGIC_0;
        for (atom, &word) in state.atoms.iter_mut().zip(words) {
            *atom = Atom::from_int(word);
        }
        state
    }

    /// Creates a state from any unsigned primitive integer
    pub fn from_unsigned<T: PrimInt + Unsigned>(value: T) -> Self {
        let bits = value.count_ones() + value.count_zeros();
        let word_mask = <T as NumCast>::from(u32::MAX).unwrap_or_else(T::max_value);
        let mut state = Self::LOGIC_0;
        for (i, atom) in state.atoms.iter_mut().enumerate() {
            let shift = i as u32 * ATOM_BITS;
            if shift >= bits {
                break;
            }
            let word = (value >> shift as usize) & word_mask;
            *atom = Atom::from_int(word.to_u32().unwrap_or(0));
        }
        state
    }

    /// A single line broadcast over every line
    pub const fn from_bit(bit: LogicBitState) -> Self {
        match bit {
            LogicBitState::Logic0 => Self::LOGIC_0,
            LogicBitState::Logic1 => Self::LOGIC_1,
            LogicBitState::HighZ => Self::HIGH_Z,
            LogicBitState::Undefined => Self::UNDEFINED,
        }
    }

    /// Creates a state from individual lines, least significant first
    pub fn from_bits(bits: &[LogicBitState]) -> Self {
        let mut state = Self::LOGIC_0;
        for (i, bit) in bits.iter().take(MAX_LOGIC_WIDTH as usize).enumerate() {
            state.set_bit_state(i as u32, *bit);
        }
        state
    }

    /// The line at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [MAX_LOGIC_WIDTH].
    pub fn get_bit_state(&self, index: u32) -> LogicBitState {
        assert!(index < MAX_LOGIC_WIDTH, "line index out of range");
        self.atoms[(index / ATOM_BITS) as usize].bit(index % ATOM_BITS)
    }

    /// Overwrites the line at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [MAX_LOGIC_WIDTH].
    pub fn set_bit_state(&mut self, index: u32, bit: LogicBitState) {
        assert!(index < MAX_LOGIC_WIDTH, "line index out of range");
        let atom = &mut self.atoms[(index / ATOM_BITS) as usize];
        let mask = 1u32 << (index % ATOM_BITS);
        let (value, unknown) = bit.to_planes();
        atom.value = if value { atom.value | mask } else { atom.value & !mask };
        atom.unknown = if unknown {
            atom.unknown | mask
        } else {
            atom.unknown & !mask
        };
    }

    /// Compares only the lowest `width` lines
    pub fn eq(&self, other: &Self, width: LogicWidth) -> bool {
        self.atoms
            .iter()
            .zip(other.atoms.iter())
            .zip(atom_masks(width))
            .all(|((a, b), mask)| a.eq_masked(*b, mask))
    }

    /// True if none of the lowest `width` lines is X or Z
    pub fn is_defined(&self, width: LogicWidth) -> bool {
        self.atoms
            .iter()
            .zip(atom_masks(width))
            .all(|(atom, mask)| atom.unknown & mask == 0)
    }

    /// Reads the lowest `width` lines as an integer, if all of them are defined
    ///
    /// Lines that do not fit into `T` are ignored.
    pub fn to_unsigned<T: PrimInt + Unsigned>(&self, width: LogicWidth) -> Option<T> {
        if !self.is_defined(width) {
            return None;
        }

        let bits = T::zero().count_zeros();
        let mut result = T::zero();
        for (i, (atom, mask)) in self.atoms.iter().zip(atom_masks(width)).enumerate() {
            let shift = i as u32 * ATOM_BITS;
            if shift >= bits {
                break;
            }
            let word = atom.value & mask & line_mask(bits - shift);
            result = result | (<T as NumCast>::from(word)? << shift as usize);
        }
        Some(result)
    }

    /// Renders the lowest `width` lines, most significant first
    pub fn display(&self, width: LogicWidth) -> impl fmt::Display + '_ {
        struct Lines<'a>(&'a LogicState, LogicWidth);

        impl fmt::Display for Lines<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for i in (0..self.1.get()).rev() {
                    write!(f, "{}", self.0.get_bit_state(i))?;
                }
                Ok(())
            }
        }

        Lines(self, width)
    }

    pub(crate) fn from_atoms(atoms: &[Atom]) -> Self {
        let mut state = Self::LOGIC_0;
        state.atoms[..atoms.len()].copy_from_slice(atoms);
        state
    }
}

impl Default for LogicState {
    fn default() -> Self {
        Self::HIGH_Z
    }
}

impl From<bool> for LogicState {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl From<LogicBitState> for LogicState {
    fn from(bit: LogicBitState) -> Self {
        Self::from_bit(bit)
    }
}

impl fmt::Debug for LogicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicState({})", self.display(LogicWidth::MAX))
    }
}

/// Why a string could not be parsed as a [LogicState]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLogicStateError {
    #[error("expected between 1 and 256 lines")]
    InvalidWidth,
    #[error("illegal character {0:?}, expected one of 0 1 x X z Z")]
    IllegalCharacter(char),
}

impl FromStr for LogicState {
    type Err = ParseLogicStateError;

    /// Parses lines most significant first; `_` separators are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .chars()
            .filter(|&c| c != '_')
            .map(|c| LogicBitState::from_char(c).ok_or(ParseLogicStateError::IllegalCharacter(c)))
            .collect::<Result<Vec<_>, _>>()?;

        if bits.is_empty() || bits.len() > MAX_LOGIC_WIDTH as usize {
            return Err(ParseLogicStateError::InvalidWidth);
        }

        let lsb_first: Vec<_> = bits.into_iter().rev().collect();
        Ok(Self::from_bits(&lsb_first))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn width(w: u32) -> LogicWidth {
        LogicWidth::new(w).unwrap()
    }

    #[test]
    fn width_bounds() {
        assert!(LogicWidth::new(0).is_none());
        assert!(LogicWidth::new(257).is_none());
        assert_eq!(width(1).atom_count(), 1);
        assert_eq!(width(32).atom_count(), 1);
        assert_eq!(width(33).atom_count(), 2);
        assert_eq!(width(33).last_atom_mask(), 1);
        assert_eq!(width(64).last_atom_mask(), u32::MAX);
        assert_eq!(width(256).atom_count(), MAX_ATOM_COUNT);
    }

    #[test]
    fn plane_encoding() {
        assert_eq!(LogicState::LOGIC_0.get_bit_state(5), LogicBitState::Logic0);
        assert_eq!(LogicState::LOGIC_1.get_bit_state(200), LogicBitState::Logic1);
        assert_eq!(LogicState::HIGH_Z.get_bit_state(31), LogicBitState::HighZ);
        assert_eq!(LogicState::UNDEFINED.get_bit_state(32), LogicBitState::Undefined);

        let raw = LogicState::from_int(0b10);
        assert_eq!(raw.get_bit_state(0), LogicBitState::Logic0);
        assert_eq!(raw.get_bit_state(1), LogicBitState::Logic1);
        assert_eq!(raw.get_bit_state(100), LogicBitState::Logic0);
    }

    #[test]
    fn eq_ignores_lines_above_width() {
        let a = LogicState::from_int(0x0F);
        let b = LogicState::from_int(0xFF);
        assert!(a.eq(&b, width(4)));
        assert!(!a.eq(&b, width(5)));

        let c = LogicState::from_u64(1 << 32);
        assert!(c.eq(&LogicState::LOGIC_0, width(32)));
        assert!(!c.eq(&LogicState::LOGIC_0, width(33)));
    }

    #[test]
    fn parse_and_display() {
        let state: LogicState = "1x_z0".parse().unwrap();
        assert_eq!(state.get_bit_state(0), LogicBitState::Logic0);
        assert_eq!(state.get_bit_state(1), LogicBitState::HighZ);
        assert_eq!(state.get_bit_state(2), LogicBitState::Undefined);
        assert_eq!(state.get_bit_state(3), LogicBitState::Logic1);
        assert_eq!(state.display(width(4)).to_string(), "1XZ0");

        assert_eq!(
            "10q".parse::<LogicState>(),
            Err(ParseLogicStateError::IllegalCharacter('q'))
        );
        assert_eq!("".parse::<LogicState>(), Err(ParseLogicStateError::InvalidWidth));
    }

    #[test]
    fn unsigned_conversions() {
        let state = LogicState::from_unsigned(0xDEAD_BEEF_0123_4567u64);
        assert_eq!(state.to_unsigned::<u64>(width(64)), Some(0xDEAD_BEEF_0123_4567));
        assert_eq!(state.to_unsigned::<u16>(width(64)), Some(0x4567));
        assert_eq!(state.to_unsigned::<u64>(width(8)), Some(0x67));

        let byte = LogicState::from_unsigned(0xA5u8);
        assert_eq!(byte.to_unsigned::<u32>(width(32)), Some(0xA5));

        let wide = LogicState::from_unsigned(u128::MAX);
        assert_eq!(wide.to_unsigned::<u128>(width(128)), Some(u128::MAX));
        assert_eq!(wide.to_unsigned::<u128>(width(129)), Some(u128::MAX));

        assert_eq!(LogicState::HIGH_Z.to_unsigned::<u8>(width(1)), None);
    }

    #[test]
    #[should_panic(expected = "line index out of range")]
    fn reading_past_the_last_line_panics() {
        LogicState::LOGIC_0.get_bit_state(MAX_LOGIC_WIDTH);
    }

    #[test]
    #[should_panic(expected = "line index out of range")]
    fn writing_past_the_last_line_panics() {
        let mut state = LogicState::LOGIC_0;
        state.set_bit_state(MAX_LOGIC_WIDTH, LogicBitState::Logic1);
    }

    #[test]
    fn line_copies_cross_word_boundaries() {
        let src = [Atom::from_int(0xF000_0000), Atom::from_int(0x0000_000A)];
        assert_eq!(get_lines(&src, 28, 8), Atom::from_int(0xAF));

        let mut dst = [Atom::HIGH_Z; 2];
        set_lines(&mut dst, 30, 4, Atom::from_int(0b0110));
        assert_eq!(dst[0].bit(30), LogicBitState::Logic0);
        assert_eq!(dst[0].bit(31), LogicBitState::Logic1);
        assert_eq!(dst[1].bit(0), LogicBitState::Logic1);
        assert_eq!(dst[1].bit(1), LogicBitState::Logic0);
        assert_eq!(dst[1].bit(2), LogicBitState::HighZ);
        assert_eq!(dst[0].bit(29), LogicBitState::HighZ);

        let mut out = [Atom::LOGIC_0; 3];
        let wide = LogicState::from_u64(0x1234_5678_9ABC_DEF0);
        copy_lines(&wide.atoms, 4, &mut out, 40, 60);
        let copied = LogicState::from_atoms(&out);
        for i in 0..60 {
            assert_eq!(copied.get_bit_state(40 + i), wide.get_bit_state(4 + i));
        }
        assert_eq!(copied.get_bit_state(39), LogicBitState::Logic0);
    }
}
