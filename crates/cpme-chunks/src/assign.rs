//! Work assignment: group scheduled chunks into disjoint buffer slices.
//!
//! Each [`WorkChunk`] owns a `&mut` view of its byte range, so workers can
//! transform in place with no locking on the buffer itself. Units are cut at
//! chunk boundaries only; a chunk is never split between two units.

use std::mem;

use cpme_core::{CpmeError, CpmeResult, Direction};

use crate::schedule::Chunk;

/// Target number of work units per worker thread.
pub const UNITS_PER_WORKER: usize = 4;

/// A contiguous group of chunks handed to one worker.
#[derive(Debug)]
pub struct WorkChunk<'a> {
    /// Absolute offset of `bytes[0]` in the job buffer
    pub offset: usize,
    pub bytes: &'a mut [u8],
    /// Chunks in this unit, with absolute offsets
    pub chunks: Vec<Chunk>,
    pub direction: Direction,
}

impl WorkChunk<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Visit every chunk with its slice of `bytes`. Stops at the first error.
    pub fn for_each_chunk<E>(
        &mut self,
        mut f: impl FnMut(Chunk, &mut [u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        let base = self.offset;
        for chunk in &self.chunks {
            let start = chunk.offset - base;
            f(*chunk, &mut self.bytes[start..start + chunk.length])?;
        }
        Ok(())
    }
}

/// Split `buffer` into work units covering `chunks`.
///
/// `chunks` must tile `buffer` exactly; anything else is a `LengthMismatch`.
pub fn assign<'a>(
    buffer: &'a mut [u8],
    chunks: &[Chunk],
    workers: usize,
    direction: Direction,
) -> CpmeResult<Vec<WorkChunk<'a>>> {
    let covered: usize = chunks.iter().map(|c| c.length).sum();
    if covered != buffer.len() {
        return Err(CpmeError::LengthMismatch {
            expected: buffer.len() as u64,
            actual: covered as u64,
        });
    }
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let target_units = workers.max(1) * UNITS_PER_WORKER;
    let per_unit = chunks.len().div_ceil(target_units);

    let mut units = Vec::with_capacity(chunks.len().div_ceil(per_unit));
    let mut rest: &'a mut [u8] = buffer;
    let mut offset = 0usize;
    for group in chunks.chunks(per_unit) {
        let len: usize = group.iter().map(|c| c.length).sum();
        let (head, tail) = mem::take(&mut rest).split_at_mut(len);
        rest = tail;
        units.push(WorkChunk {
            offset,
            bytes: head,
            chunks: group.to_vec(),
            direction,
        });
        offset += len;
    }

    tracing::trace!(
        units = units.len(),
        chunks = chunks.len(),
        per_unit,
        "assigned work units"
    );
    Ok(units)
}
