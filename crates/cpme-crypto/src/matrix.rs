//! Key-derived permutation matrices in compressed sparse column form
//!
//! Build (dimension D, key scalar k):
//! ```text
//! linked = DigitStream(k, 2D)
//! for each k in 0..D:
//!     i = I-pool.take(((linked[2k]   + 1) * D) mod remaining)
//!     j = J-pool.take(((linked[2k+1] + 1) * D) mod remaining)
//!     row_of[j] = i
//! ```
//! Each pool is drained exactly once, so `row_of` is a bijection on `[0, D)`.
//! The inverse is the transpose (`row_of'[row_of[j]] = j`), since a
//! permutation matrix is orthogonal.
//!
//! `check_before[j] = j` and `check_after = M · check_before` back the
//! per-chunk integrity check in [`crate::transform`].

use cpme_core::{CpmeError, CpmeResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::digits::DigitStream;
use crate::key::KeyScalar;
use crate::node_pool::NodePool;

/// A D×D permutation matrix. Zeroized on drop.
#[derive(Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct PermutationMatrix {
    pub(crate) dimension: usize,
    /// Row index of the nonzero in each column
    pub(crate) row_of: Vec<usize>,
    /// Column pointers: `col_of[j] = j`, sentinel `col_of[D] = D`
    pub(crate) col_of: Vec<usize>,
    pub(crate) values: Vec<f64>,
    pub(crate) check_before: Vec<f64>,
    pub(crate) check_after: Vec<f64>,
    pub(crate) inverse: bool,
}

impl PermutationMatrix {
    /// Build the matrix for `dimension` from `key`; `inverse` yields its transpose.
    pub fn build(dimension: usize, key: &KeyScalar, inverse: bool) -> CpmeResult<Self> {
        if dimension == 0 {
            return Err(CpmeError::InvalidDimension { dimension });
        }

        let linked = DigitStream::generate(key, 2 * dimension);
        let mut rows = NodePool::new(dimension);
        let mut cols = NodePool::new(dimension);
        let mut row_of = vec![0usize; dimension];

        for k in 0..dimension {
            let remaining = rows.remaining();
            let (i, j) = if remaining == 1 {
                (rows.take_last(), cols.take_last())
            } else {
                let row_sel = ((linked.digit(2 * k) as usize + 1) * dimension) % remaining;
                let col_sel = ((linked.digit(2 * k + 1) as usize + 1) * dimension) % remaining;
                (rows.take(row_sel), cols.take(col_sel))
            };
            match (i, j) {
                (Some(i), Some(j)) => row_of[j] = i,
                _ => return Err(CpmeError::InvalidMatrixReference { dimension }),
            }
        }
        // Both pools are dropped here, in one go.

        let matrix = Self::assemble(row_of, false);
        tracing::trace!(dimension, inverse, "built permutation matrix");
        Ok(if inverse { matrix.transpose() } else { matrix })
    }

    fn assemble(row_of: Vec<usize>, inverse: bool) -> Self {
        let dimension = row_of.len();
        let mut matrix = Self {
            dimension,
            row_of,
            col_of: (0..=dimension).collect(),
            values: vec![1.0; dimension],
            check_before: (0..dimension).map(|j| j as f64).collect(),
            check_after: Vec::new(),
            inverse,
        };
        matrix.check_after = matrix.apply(&matrix.check_before);
        matrix
    }

    /// The transpose, which for a permutation matrix is also the inverse.
    /// `check_before` is carried over unchanged; `check_after` is recomputed.
    pub fn transpose(&self) -> Self {
        let mut transposed = vec![0usize; self.dimension];
        for (j, &i) in self.row_of.iter().enumerate() {
            transposed[i] = j;
        }
        Self::assemble(transposed, !self.inverse)
    }

    /// Sparse matrix-vector product `M · v`.
    pub fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.dimension];
        self.apply_into(v, &mut out);
        out
    }

    /// `M · v` written into `out` (both of length D).
    pub fn apply_into(&self, v: &[f64], out: &mut [f64]) {
        debug_assert_eq!(v.len(), self.dimension);
        debug_assert_eq!(out.len(), self.dimension);
        out.fill(0.0);
        for (j, &x) in v.iter().enumerate() {
            for p in self.col_of[j]..self.col_of[j + 1] {
                out[self.row_of[p]] += self.values[p] * x;
            }
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn row_of(&self) -> &[usize] {
        &self.row_of
    }

    pub fn col_of(&self) -> &[usize] {
        &self.col_of
    }

    pub fn check_before(&self) -> &[f64] {
        &self.check_before
    }

    pub fn check_after(&self) -> &[f64] {
        &self.check_after
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// True when `row_of` hits every index in `[0, D)` exactly once.
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.dimension];
        for &i in &self.row_of {
            if i >= self.dimension || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        true
    }
}

#[cfg(any(test, feature = "test-util"))]
impl PermutationMatrix {
    /// A matrix that permutes like `moves` but carries the check vectors of
    /// `checks`. The integrity check rejects it for any input whose bytes are
    /// strictly increasing, unless both permutations coincide.
    pub fn mismatched(moves: &Self, checks: &Self) -> Self {
        let mut m = checks.clone();
        m.row_of = moves.row_of.clone();
        m
    }
}

impl std::fmt::Debug for PermutationMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermutationMatrix")
            .field("dimension", &self.dimension)
            .field("inverse", &self.inverse)
            .finish_non_exhaustive()
    }
}
