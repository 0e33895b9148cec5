//! Integer arithmetic over fully defined lines
//!
//! Values are little-endian arrays of 32-line words. Every function takes the
//! number of significant lines and leaves the lines above it at 0.

use std::cmp::Ordering;

use super::{line_mask, Atom, ATOM_BITS, MAX_ATOM_COUNT};

pub(crate) type Words = [u32; MAX_ATOM_COUNT];

/// Mask of the significant lines of word `index`
#[inline]
fn word_mask(index: usize, width: u32) -> u32 {
    line_mask(width.saturating_sub(index as u32 * ATOM_BITS).min(ATOM_BITS))
}

fn truncate(words: &mut Words, width: u32) {
    for (i, word) in words.iter_mut().enumerate() {
        *word &= word_mask(i, width);
    }
}

/// The low `width` lines as words, or `None` if any of them is X or Z
pub(crate) fn defined(atoms: &[Atom], width: u32) -> Option<Words> {
    let mut words = [0; MAX_ATOM_COUNT];
    for (i, word) in words.iter_mut().enumerate() {
        let mask = word_mask(i, width);
        if mask == 0 {
            break;
        }
        let atom = atoms.get(i).copied().unwrap_or(Atom::UNDEFINED);
        if atom.unknown & mask != 0 {
            return None;
        }
        *word = atom.value & mask;
    }
    Some(words)
}

pub(crate) fn write(words: &Words, out: &mut [Atom]) {
    for (atom, &word) in out.iter_mut().zip(words) {
        *atom = Atom::from_int(word);
    }
}

#[inline]
fn msb(a: &Words, width: u32) -> bool {
    let top = width - 1;
    (a[(top / ATOM_BITS) as usize] >> (top % ATOM_BITS)) & 1 != 0
}

pub(crate) fn add(a: &Words, b: &Words, carry_in: bool, width: u32) -> Words {
    let mut sum = [0; MAX_ATOM_COUNT];
    let mut carry = carry_in as u64;
    for (s, (&x, &y)) in sum.iter_mut().zip(a.iter().zip(b)) {
        let total = x as u64 + y as u64 + carry;
        *s = total as u32;
        carry = total >> ATOM_BITS;
    }
    truncate(&mut sum, width);
    sum
}

pub(crate) fn sub(a: &Words, b: &Words, width: u32) -> Words {
    add(a, &b.map(|w| !w), true, width)
}

pub(crate) fn neg(a: &Words, width: u32) -> Words {
    sub(&[0; MAX_ATOM_COUNT], a, width)
}

/// Reads a shift distance, saturating at `limit`
pub(crate) fn shift_amount(words: &Words, limit: u32) -> u32 {
    if words[1..].iter().any(|&w| w != 0) {
        limit
    } else {
        words[0].min(limit)
    }
}

pub(crate) fn shift_left(a: &Words, amount: u32, width: u32) -> Words {
    let mut out = [0; MAX_ATOM_COUNT];
    let (skip, bits) = ((amount / ATOM_BITS) as usize, amount % ATOM_BITS);
    for i in skip..MAX_ATOM_COUNT {
        let carried = if bits > 0 && i > skip {
            a[i - skip - 1] >> (ATOM_BITS - bits)
        } else {
            0
        };
        out[i] = (a[i - skip] << bits) | carried;
    }
    truncate(&mut out, width);
    out
}

/// Right shift filling the vacated lines with 0, or with the sign line if `arithmetic`
pub(crate) fn shift_right(a: &Words, amount: u32, arithmetic: bool, width: u32) -> Words {
    let mut out = [0; MAX_ATOM_COUNT];
    let (skip, bits) = ((amount / ATOM_BITS) as usize, amount % ATOM_BITS);
    for i in 0..MAX_ATOM_COUNT.saturating_sub(skip) {
        let carried = match a.get(i + skip + 1) {
            Some(&hi) if bits > 0 => hi << (ATOM_BITS - bits),
            _ => 0,
        };
        out[i] = (a[i + skip] >> bits) | carried;
    }
    if arithmetic && msb(a, width) {
        let kept = width.saturating_sub(amount);
        for (i, word) in out.iter_mut().enumerate() {
            *word |= !word_mask(i, kept);
        }
    }
    truncate(&mut out, width);
    out
}

/// Orders two values, reading them as two's complement when `signed`
pub(crate) fn compare(a: &Words, b: &Words, signed: bool, width: u32) -> Ordering {
    if signed {
        match (msb(a, width), msb(b, width)) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }
    a.iter().rev().cmp(b.iter().rev())
}

#[cfg(test)]
mod test {
    use super::*;

    fn words(value: u64) -> Words {
        let mut w = [0; MAX_ATOM_COUNT];
        w[0] = value as u32;
        w[1] = (value >> 32) as u32;
        w
    }

    fn value(w: &Words) -> u64 {
        w[0] as u64 | (w[1] as u64) << 32
    }

    #[test]
    fn add_and_sub_wrap_at_width() {
        assert_eq!(value(&add(&words(0xFF), &words(1), false, 8)), 0);
        assert_eq!(value(&add(&words(0xFF), &words(1), false, 9)), 0x100);
        assert_eq!(value(&add(&words(u32::MAX as u64), &words(0), true, 40)), 1 << 32);
        assert_eq!(value(&sub(&words(3), &words(5), 8)), 0xFE);
        assert_eq!(value(&neg(&words(1), 40)), (1 << 40) - 1);
        assert_eq!(value(&neg(&words(0), 40)), 0);

        let top = add(&[u32::MAX; MAX_ATOM_COUNT], &words(1), false, 256);
        assert_eq!(top, [0; MAX_ATOM_COUNT]);
    }

    #[test]
    fn shifts_cross_words() {
        assert_eq!(value(&shift_left(&words(0b1011), 30, 64)), 0b1011 << 30);
        assert_eq!(value(&shift_left(&words(0b1011), 62, 64)), 0b11 << 62);
        assert_eq!(value(&shift_right(&words(0b1011 << 30), 31, false, 64)), 0b101);
        assert_eq!(value(&shift_right(&words(0x80), 4, true, 8)), 0xF8);
        assert_eq!(value(&shift_right(&words(0x80), 4, false, 8)), 0x08);
        assert_eq!(value(&shift_right(&words(0x80), 8, true, 8)), 0xFF);
        assert_eq!(value(&shift_right(&words(0x40), 8, true, 8)), 0);
        assert_eq!(value(&shift_left(&words(1), 256, 256)), 0);
    }

    #[test]
    fn shift_amount_saturates() {
        assert_eq!(shift_amount(&words(3), 8), 3);
        assert_eq!(shift_amount(&words(300), 8), 8);
        assert_eq!(shift_amount(&words(1 << 40), 256), 256);
    }

    #[test]
    fn signed_and_unsigned_order() {
        // 0xFF is 255 unsigned, -1 signed
        assert_eq!(compare(&words(0xFF), &words(1), false, 8), Ordering::Greater);
        assert_eq!(compare(&words(0xFF), &words(1), true, 8), Ordering::Less);
        assert_eq!(compare(&words(0xFE), &words(0xFF), true, 8), Ordering::Less);
        assert_eq!(compare(&words(1 << 40), &words(5), false, 48), Ordering::Greater);
        assert_eq!(compare(&words(7), &words(7), true, 3), Ordering::Equal);
    }

    #[test]
    fn unknown_lines_are_not_defined() {
        let atoms = [Atom::from_int(0xF), Atom::HIGH_Z];
        assert_eq!(defined(&atoms, 32).map(|w| w[0]), Some(0xF));
        assert_eq!(defined(&atoms, 33), None);
        let mut x = Atom::from_int(0);
        x.unknown = 1 << 4;
        x.value = 1 << 4;
        assert_eq!(defined(&[x], 4).map(|w| w[0]), Some(0));
        assert_eq!(defined(&[x], 5), None);
    }
}
