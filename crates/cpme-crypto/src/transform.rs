//! Per-chunk transform: `out = M · bytes`, with an optional integrity check.
//!
//! Because M is orthogonal and `check_after = M · check_before`,
//! `dot(M·v, check_after) == dot(v, check_before)` for a correct multiply.
//! Both dot products are truncated to integers before comparison. A mismatch
//! means a corrupted buffer, a buggy multiply, or a matrix whose check
//! vectors do not belong to it; the chunk is then left untouched.
//!
//! With the check disabled a mismatched matrix produces wrong bytes silently.

use thiserror::Error;

use crate::matrix::PermutationMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("integrity mismatch on {dimension}-byte chunk: before={before}, after={after}")]
pub struct IntegrityMismatch {
    pub dimension: usize,
    pub before: i64,
    pub after: i64,
}

/// Reusable f64 buffers for one worker, so chunks don't allocate.
#[derive(Debug, Default)]
pub struct Scratch {
    input: Vec<f64>,
    output: Vec<f64>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }
}

fn truncated_dot(a: &[f64], b: &[f64]) -> i64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>() as i64
}

/// Permute `bytes` in place with `matrix`.
///
/// `bytes.len()` must equal the matrix dimension.
pub fn transform_chunk(
    matrix: &PermutationMatrix,
    bytes: &mut [u8],
    integrity_check: bool,
    scratch: &mut Scratch,
) -> Result<(), IntegrityMismatch> {
    let dimension = matrix.dimension();
    debug_assert_eq!(bytes.len(), dimension);

    scratch.input.clear();
    scratch.input.extend(bytes.iter().map(|b| *b as f64));
    scratch.output.resize(dimension, 0.0);
    matrix.apply_into(&scratch.input, &mut scratch.output);

    if integrity_check {
        let before = truncated_dot(&scratch.input, matrix.check_before());
        let after = truncated_dot(&scratch.output, matrix.check_after());
        if before != after {
            return Err(IntegrityMismatch {
                dimension,
                before,
                after,
            });
        }
    }

    for (dst, value) in bytes.iter_mut().zip(&scratch.output) {
        *dst = *value as u8;
    }
    Ok(())
}
