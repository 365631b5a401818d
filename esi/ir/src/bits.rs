//! Fixed-width bit vectors used as runtime values by the simulator.
use bitvec::prelude::*;
use std::fmt::{self, Write};

pub type BitString = BitVec<u64, Lsb0>;

/// A fixed-width vector of bits. Bit 0 is the least significant.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bits {
    vec: BitString,
}

impl Bits {
    /// All-zero value of `width` bits.
    pub fn zero(width: u64) -> Self {
        Self {
            vec: BitString::repeat(false, width as usize),
        }
    }

    /// The low `width` bits of `val`.
    pub fn from_u64(width: u64, val: u64) -> Self {
        let mut vec = BitString::repeat(false, width as usize);
        for i in 0..(width.min(64) as usize) {
            vec.set(i, (val >> i) & 1 == 1);
        }
        Self { vec }
    }

    /// The low `width` bits of the two's complement representation of `val`,
    /// sign extended past 64 bits.
    pub fn from_i64(width: u64, val: i64) -> Self {
        let mut out = Self::from_u64(width, val as u64);
        if val < 0 {
            for i in 64..(width as usize) {
                out.vec.set(i, true);
            }
        }
        out
    }

    /// Little-endian bytes, i.e. bit `b` of the value is bit `b % 8` of byte
    /// `b / 8`.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            vec: bytes.iter().flat_map(|b| (0..8).map(move |i| (b >> i) & 1 == 1)).collect(),
        }
    }

    /// Build a value from 64-bit words, word 0 being the least significant.
    pub fn from_words(words: &[u64]) -> Self {
        Bits::from_le_bytes(
            &words.iter().flat_map(|w| w.to_le_bytes()).collect::<Vec<_>>(),
        )
    }

    /// Concatenate `parts`, the first one ending up in the most significant
    /// bits.
    pub fn concat(parts: &[Bits]) -> Self {
        let mut vec = BitString::new();
        for part in parts.iter().rev() {
            vec.extend_from_bitslice(&part.vec);
        }
        Self { vec }
    }

    /// Pack array elements, element 0 ending up in the least significant bits.
    pub fn from_elements(elems: &[Bits]) -> Self {
        let mut vec = BitString::new();
        for elem in elems {
            vec.extend_from_bitslice(&elem.vec);
        }
        Self { vec }
    }

    pub fn width(&self) -> u64 {
        self.vec.len() as u64
    }

    pub fn bit(&self, idx: u64) -> bool {
        self.vec.get(idx as usize).is_some_and(|b| *b)
    }

    /// `width` bits starting at `low`. Bits past the end read as zero.
    pub fn slice(&self, low: u64, width: u64) -> Self {
        let mut vec = BitString::repeat(false, width as usize);
        for i in 0..width {
            let src = low.saturating_add(i);
            vec.set(i as usize, self.bit(src));
        }
        Self { vec }
    }

    /// The value as an unsigned integer. Only the low 64 bits are considered.
    pub fn to_u64(&self) -> u64 {
        self.vec
            .iter()
            .take(64)
            .enumerate()
            .fold(0, |acc, (idx, bit)| acc | ((*bit as u64) << idx))
    }

    /// The value as a two's complement signed integer of its width.
    pub fn to_i64(&self) -> i64 {
        let width = self.width();
        let raw = self.to_u64();
        if width == 0 || width >= 64 {
            raw as i64
        } else if self.bit(width - 1) {
            (raw | (!0u64 << width)) as i64
        } else {
            raw as i64
        }
    }

    /// The value as 64-bit words, word 0 holding the least significant bits.
    /// The last word is zero padded.
    pub fn to_words(&self) -> Vec<u64> {
        (0..self.width().div_ceil(64))
            .map(|w| self.slice(w * 64, 64).to_u64())
            .collect()
    }

    /// Wrapping addition of two values of the same width.
    pub fn wrapping_add(&self, other: &Bits) -> Bits {
        assert_eq!(self.width(), other.width(), "Adding values of different widths");
        let mut out = BitString::repeat(false, self.vec.len());
        let mut carry = false;
        for i in 0..self.vec.len() {
            let (a, b) = (self.vec[i], other.vec[i]);
            out.set(i, a ^ b ^ carry);
            carry = (a & b) | (carry & (a ^ b));
        }
        Bits { vec: out }
    }

    /// Unsigned comparison of two values of the same width.
    pub fn cmp_unsigned(&self, other: &Bits) -> std::cmp::Ordering {
        assert_eq!(self.width(), other.width(), "Comparing values of different widths");
        for i in (0..self.vec.len()).rev() {
            match (self.vec[i], other.vec[i]) {
                (true, false) => return std::cmp::Ordering::Greater,
                (false, true) => return std::cmp::Ordering::Less,
                _ => {}
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl fmt::Display for Bits {
    /// Most significant bit first, prefixed with the width.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'b", self.width())?;
        for bit in self.vec.iter().rev() {
            f.write_char(if *bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width() <= 64 {
            write!(f, "{}'h{:x}", self.width(), self.to_u64())
        } else {
            write!(f, "{}'words{:x?}", self.width(), self.to_words())
        }
    }
}
