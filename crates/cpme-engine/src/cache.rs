//! Per-job matrix cache, keyed by dimension.
//!
//! Eager dimensions are built in parallel before any transform work is
//! scheduled. Lazy dimensions are built by the first worker that needs one,
//! under the cache lock, so no dimension is ever built twice. The cache is
//! purged between instructions; matrices zeroize themselves on drop once the
//! last worker releases its `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cpme_core::{CpmeError, CpmeResult};
use cpme_crypto::{KeyScalar, PermutationMatrix};
use rayon::prelude::*;
use tracing::debug;

use crate::workers::{lock, WorkerPool};

#[derive(Debug, Default)]
pub struct MatrixCache {
    matrices: Mutex<HashMap<usize, Arc<PermutationMatrix>>>,
}

impl MatrixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every dimension in `dimensions` on the worker pool and cache them.
    pub fn prebuild(
        &self,
        dimensions: &[usize],
        key: &KeyScalar,
        inverse: bool,
        workers: &WorkerPool,
    ) -> CpmeResult<()> {
        let built: Vec<(usize, PermutationMatrix)> = workers.install(|| {
            dimensions
                .par_iter()
                .map(|&dimension| {
                    PermutationMatrix::build(dimension, key, inverse).map(|m| (dimension, m))
                })
                .collect::<CpmeResult<Vec<_>>>()
        })?;

        let mut matrices = lock(&self.matrices);
        for (dimension, matrix) in built {
            matrices.insert(dimension, Arc::new(matrix));
        }
        debug!(
            count = dimensions.len(),
            cached = matrices.len(),
            inverse,
            "prebuilt matrices"
        );
        Ok(())
    }

    /// A matrix that must already be cached.
    pub fn get(&self, dimension: usize) -> CpmeResult<Arc<PermutationMatrix>> {
        lock(&self.matrices)
            .get(&dimension)
            .cloned()
            .ok_or(CpmeError::InvalidMatrixReference { dimension })
    }

    /// The cached matrix for `dimension`, building it under the lock if absent.
    pub fn get_or_build(
        &self,
        dimension: usize,
        key: &KeyScalar,
        inverse: bool,
    ) -> CpmeResult<Arc<PermutationMatrix>> {
        let mut matrices = lock(&self.matrices);
        if let Some(matrix) = matrices.get(&dimension) {
            return Ok(Arc::clone(matrix));
        }
        let matrix = Arc::new(PermutationMatrix::build(dimension, key, inverse)?);
        matrices.insert(dimension, Arc::clone(&matrix));
        debug!(dimension, inverse, "built matrix on demand");
        Ok(matrix)
    }

    /// Seed a matrix directly, replacing any cached one of that dimension.
    #[cfg(test)]
    pub(crate) fn insert(&self, dimension: usize, matrix: PermutationMatrix) {
        lock(&self.matrices).insert(dimension, Arc::new(matrix));
    }

    /// Drop every cached matrix. Returns how many were released.
    pub fn purge(&self) -> usize {
        let drained: Vec<_> = lock(&self.matrices).drain().collect();
        let count = drained.len();
        drop(drained);
        if count > 0 {
            debug!(count, "purged matrix cache");
        }
        count
    }

    pub fn len(&self) -> usize {
        lock(&self.matrices).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, dimension: usize) -> bool {
        lock(&self.matrices).contains_key(&dimension)
    }
}
