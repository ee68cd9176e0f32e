//! Deterministic digit stream: the only source of pseudo-randomness.
//!
//! `digits_of(k, base)` renders `ln(k) / ln(base)` with 15 fractional digits
//! and keeps exactly those 15 digits. A stream of length `n` concatenates
//! `digits_of(k, i + n)` for `i = 2, 3, …` until at least `n` digits exist.
//! Nothing here is seeded from time or OS entropy.

use crate::key::KeyScalar;

/// Fractional digits kept from each logarithm.
pub const DIGITS_PER_LOG: usize = 15;

/// The 15 fractional digits of `log_base(k)`, as digit values 0..=9.
pub fn digits_of(key: &KeyScalar, base: f64) -> [u8; DIGITS_PER_LOG] {
    let quotient = (key.value() as f64).ln() / base.ln();
    let rendered = format!("{:.*}", DIGITS_PER_LOG, quotient);

    let mut out = [0u8; DIGITS_PER_LOG];
    let fraction = rendered
        .split_once('.')
        .map(|(_, frac)| frac)
        .unwrap_or("");
    for (slot, ch) in out.iter_mut().zip(fraction.bytes()) {
        *slot = ch.wrapping_sub(b'0');
    }
    out
}

/// A finite run of decimal digits derived from a key and a length parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct DigitStream {
    digits: Vec<u8>,
}

impl DigitStream {
    /// Generate at least `length` digits. The length also shifts the
    /// logarithm bases, so streams of different lengths are not prefixes of
    /// each other.
    pub fn generate(key: &KeyScalar, length: usize) -> Self {
        let mut digits = Vec::with_capacity(length + DIGITS_PER_LOG);
        let mut i = 2usize;
        while digits.len() < length {
            digits.extend_from_slice(&digits_of(key, (i + length) as f64));
            i += 1;
        }
        Self { digits }
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Digit at `index`. Panics when out of range, like slice indexing.
    pub fn digit(&self, index: usize) -> u8 {
        self.digits[index]
    }

    /// Digits from the start, wrapping around when exhausted.
    pub fn cycle(&self) -> impl Iterator<Item = u8> + '_ {
        self.digits.iter().copied().cycle()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.digits
    }
}

impl std::fmt::Debug for DigitStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitStream")
            .field("len", &self.digits.len())
            .finish()
    }
}
