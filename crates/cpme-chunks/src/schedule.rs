//! Chunk scheduling strategies
//!
//! Every chunk is transformed by a matrix of exactly its own length, so a
//! schedule is a list of `(offset, length)` pairs that tiles the buffer.
//!
//! - Fixed (`dimension_mode > 0`): chunks of `min(mode, max)` bytes, then one
//!   shorter remainder chunk (if any). The full-size matrix is built up front;
//!   the remainder matrix is built on demand by whichever worker reaches it.
//! - Variable (`dimension_mode == 0`): while at least `max` bytes remain, the
//!   next key digit picks one of nine candidate sizes:
//!
//! ```text
//! digit 0, 1 → max
//! digit d    → max - max / d      (d = 2..9)
//! ```
//!
//!   The final remainder gets its own matrix. All candidates plus the
//!   remainder are built up front.

use cpme_crypto::{DigitStream, KeyScalar};

/// A contiguous run of `length` bytes transformed by one `length`-dimension matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub length: usize,
}

impl Chunk {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Chunk-sizing strategy for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fixed { dimension: usize },
    Variable,
}

impl Strategy {
    /// `mode == 0` is variable; anything else is fixed, capped at `max_dimension`.
    pub fn for_mode(mode: usize, max_dimension: usize) -> Self {
        if mode == 0 {
            Strategy::Variable
        } else {
            Strategy::Fixed {
                dimension: mode.min(max_dimension),
            }
        }
    }
}

/// Chunk size selected by a variable-mode digit. Digits 0 and 1 both map to `max`.
pub fn dimension_for_digit(digit: u8, max_dimension: usize) -> usize {
    match digit {
        0 | 1 => max_dimension,
        d => max_dimension - max_dimension / d as usize,
    }
}

/// The nine variable-mode candidate sizes, for digits 1..=9.
pub fn candidate_dimensions(max_dimension: usize) -> [usize; 9] {
    let mut out = [0usize; 9];
    for (slot, digit) in out.iter_mut().zip(1u8..=9) {
        *slot = dimension_for_digit(digit, max_dimension);
    }
    out
}

/// Chunk layout plus the matrix dimensions it needs.
#[derive(Debug, Clone)]
pub struct Schedule {
    strategy: Strategy,
    chunks: Vec<Chunk>,
    eager: Vec<usize>,
    lazy: Vec<usize>,
}

impl Schedule {
    /// Plan chunks covering `[0, file_len)`.
    pub fn plan(
        strategy: Strategy,
        file_len: usize,
        key: &KeyScalar,
        max_dimension: usize,
    ) -> Self {
        let schedule = match strategy {
            Strategy::Fixed { dimension } => Self::plan_fixed(dimension, file_len),
            Strategy::Variable => Self::plan_variable(file_len, key, max_dimension),
        };
        tracing::debug!(
            strategy = ?strategy,
            chunks = schedule.chunks.len(),
            eager = schedule.eager.len(),
            lazy = schedule.lazy.len(),
            "planned chunk schedule"
        );
        schedule
    }

    fn plan_fixed(dimension: usize, file_len: usize) -> Self {
        let dimension = dimension.max(1);
        let full = file_len / dimension;
        let remainder = file_len % dimension;

        let mut chunks: Vec<Chunk> = (0..full)
            .map(|n| Chunk {
                offset: n * dimension,
                length: dimension,
            })
            .collect();
        let eager = if full > 0 { vec![dimension] } else { Vec::new() };
        let mut lazy = Vec::new();
        if remainder > 0 {
            chunks.push(Chunk {
                offset: full * dimension,
                length: remainder,
            });
            lazy.push(remainder);
        }

        Self {
            strategy: Strategy::Fixed { dimension },
            chunks,
            eager,
            lazy,
        }
    }

    fn plan_variable(file_len: usize, key: &KeyScalar, max_dimension: usize) -> Self {
        let stream = DigitStream::generate(key, 2 * (file_len / max_dimension) + 1);
        let mut digits = stream.cycle();

        let mut chunks = Vec::new();
        let mut offset = 0usize;
        while file_len - offset >= max_dimension {
            let digit = digits.next().unwrap_or(1);
            let length = dimension_for_digit(digit, max_dimension);
            chunks.push(Chunk { offset, length });
            offset += length;
        }

        let mut eager: Vec<usize> = Vec::with_capacity(10);
        for dimension in candidate_dimensions(max_dimension) {
            if !eager.contains(&dimension) {
                eager.push(dimension);
            }
        }
        let remainder = file_len - offset;
        if remainder > 0 {
            chunks.push(Chunk {
                offset,
                length: remainder,
            });
            if !eager.contains(&remainder) {
                eager.push(remainder);
            }
        }

        Self {
            strategy: Strategy::Variable,
            chunks,
            eager,
            lazy: Vec::new(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Dimensions to build in parallel before any transform work starts.
    pub fn eager_dimensions(&self) -> &[usize] {
        &self.eager
    }

    /// Dimensions built on first use, under the cache lock.
    pub fn lazy_dimensions(&self) -> &[usize] {
        &self.lazy
    }

    /// Sum of chunk lengths.
    pub fn total_len(&self) -> usize {
        self.chunks.iter().map(|c| c.length).sum()
    }
}
