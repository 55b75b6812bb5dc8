//! Galois Field Kernel
//!
//! Scalar and region arithmetic over GF(2^w) for the three supported word
//! sizes. GF(2^8) is delegated to `reed-solomon-erasure`'s table-driven
//! implementation; GF(2^16) and GF(2^32) use carry-less multiplication for
//! scalars and per-coefficient split tables for regions.
//!
//! Region operations treat a shard as a sequence of little-endian words of
//! `w / 8` bytes, so shard files are portable across hosts.

use std::fmt;

use reed_solomon_erasure::galois_8;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// x^16 + x^12 + x^3 + x + 1
const POLY_W16: u64 = 0x1_100B;

/// x^32 + x^22 + x^2 + x + 1
const POLY_W32: u64 = 0x1_0040_0007;

// =============================================================================
// Word Size
// =============================================================================

/// Field word width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum WordSize {
    W8,
    W16,
    W32,
}

impl WordSize {
    /// Parse a bit width, rejecting anything outside {8, 16, 32}.
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::W8),
            16 => Ok(Self::W16),
            32 => Ok(Self::W32),
            other => Err(Error::InvalidConfig(format!(
                "w must be one of {{8, 16, 32}}, got {}",
                other
            ))),
        }
    }

    /// Width in bits
    pub fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
        }
    }

    /// Width in bytes
    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Largest k + m for which a Vandermonde coding matrix exists.
    pub fn max_shards(self) -> u64 {
        1u64 << self.bits()
    }
}

impl TryFrom<u32> for WordSize {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl From<WordSize> for u32 {
    fn from(w: WordSize) -> u32 {
        w.bits()
    }
}

impl fmt::Display for WordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// =============================================================================
// Field Arithmetic
// =============================================================================

/// Arithmetic over GF(2^w) for a fixed word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Galois {
    word_size: WordSize,
}

impl Galois {
    pub fn new(word_size: WordSize) -> Self {
        Self { word_size }
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// Multiply two field elements.
    pub fn multiply(&self, a: u32, b: u32) -> u32 {
        match self.word_size {
            WordSize::W8 => galois_8::mul(a as u8, b as u8) as u32,
            WordSize::W16 => clmul_reduce(a, b, 16, POLY_W16),
            WordSize::W32 => clmul_reduce(a, b, 32, POLY_W32),
        }
    }

    /// Raise `a` to the power `exp`.
    pub fn pow(&self, a: u32, mut exp: u64) -> u32 {
        let mut base = a;
        let mut acc = 1;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = self.multiply(acc, base);
            }
            base = self.multiply(base, base);
            exp >>= 1;
        }
        acc
    }

    /// Multiplicative inverse; `None` for zero.
    pub fn inverse(&self, a: u32) -> Option<u32> {
        if a == 0 {
            return None;
        }
        match self.word_size {
            WordSize::W8 => Some(galois_8::div(1, a as u8) as u32),
            // a^(2^w - 2) == a^-1 in GF(2^w)
            _ => Some(self.pow(a, self.word_size.max_shards() - 2)),
        }
    }

    /// `a / b`; `None` when `b` is zero.
    pub fn divide(&self, a: u32, b: u32) -> Option<u32> {
        self.inverse(b).map(|inv| self.multiply(a, inv))
    }

    /// `dst = c * src` (or `dst ^= c * src` when `accumulate`).
    ///
    /// Both regions must have the same length, a multiple of `w / 8`.
    pub fn region_multiply(&self, src: &[u8], c: u32, dst: &mut [u8], accumulate: bool) {
        debug_assert_eq!(src.len(), dst.len());
        debug_assert_eq!(src.len() % self.word_size.bytes(), 0);

        match c {
            0 => {
                if !accumulate {
                    dst.fill(0);
                }
                return;
            }
            1 => {
                if accumulate {
                    Self::region_xor(src, dst);
                } else {
                    dst.copy_from_slice(src);
                }
                return;
            }
            _ => {}
        }

        match self.word_size {
            WordSize::W8 => {
                if accumulate {
                    galois_8::mul_slice_xor(c as u8, src, dst);
                } else {
                    galois_8::mul_slice(c as u8, src, dst);
                }
            }
            WordSize::W16 | WordSize::W32 => {
                SplitTable::new(self, c).apply(src, dst, accumulate);
            }
        }
    }

    /// `dst ^= src`
    pub fn region_xor(src: &[u8], dst: &mut [u8]) {
        debug_assert_eq!(src.len(), dst.len());
        for (d, s) in dst.iter_mut().zip(src) {
            *d ^= *s;
        }
    }
}

/// Shift-and-add multiplication reduced by `poly` (which includes x^bits).
fn clmul_reduce(a: u32, b: u32, bits: u32, poly: u64) -> u32 {
    let top = 1u64 << bits;
    let mut a = a as u64;
    let mut b = b as u64;
    let mut product = 0u64;
    while b != 0 {
        if b & 1 == 1 {
            product ^= a;
        }
        b >>= 1;
        a <<= 1;
        if a & top != 0 {
            a ^= poly;
        }
    }
    product as u32
}

// =============================================================================
// Split Tables (w = 16, 32)
// =============================================================================

/// Products of one coefficient with every byte value at every byte position
/// of a word, so a word product is one lookup per byte.
struct SplitTable {
    tables: Vec<[u32; 256]>,
}

impl SplitTable {
    fn new(gf: &Galois, c: u32) -> Self {
        let width = gf.word_size().bytes();
        let mut tables = vec![[0u32; 256]; width];

        for (position, table) in tables.iter_mut().enumerate() {
            for bit in 0..8 {
                table[1 << bit] = gf.multiply(c, 1u32 << (bit + 8 * position));
            }
            // Multiplication is linear over XOR: fill composites from their lowest bit.
            for x in 1..256usize {
                let low = x & x.wrapping_neg();
                if low != x {
                    table[x] = table[x ^ low] ^ table[low];
                }
            }
        }

        Self { tables }
    }

    fn lookup(&self, word: u32) -> u32 {
        self.tables
            .iter()
            .enumerate()
            .fold(0, |acc, (i, table)| {
                acc ^ table[((word >> (8 * i)) & 0xff) as usize]
            })
    }

    fn apply(&self, src: &[u8], dst: &mut [u8], accumulate: bool) {
        let width = self.tables.len();
        for (s, d) in src.chunks_exact(width).zip(dst.chunks_exact_mut(width)) {
            let mut product = self.lookup(read_le(s));
            if accumulate {
                product ^= read_le(d);
            }
            write_le(d, product);
        }
    }
}

fn read_le(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn write_le(bytes: &mut [u8], value: u32) {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (value >> (8 * i)) as u8;
    }
}

// =============================================================================
// Tests
// =============================================================================
