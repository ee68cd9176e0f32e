//! Layered instruction pipeline
//!
//! ```text
//! Idle ─run→ { Setup → GenerateMatrices → Transform → Purge }* ─→ Complete
//!                                 any error ─→ Failed
//! ```
//!
//! Encrypt applies instructions front to back with forward matrices; decrypt
//! applies them back to front with transposed ones. Each instruction is a full
//! pass over the buffer and instructions never overlap.

use std::fmt;

use cpme_chunks::{assign, Schedule, Strategy};
use cpme_core::{CipherConfig, CpmeError, CpmeResult, Direction, Instruction};
use cpme_crypto::{transform_chunk, KeyScalar, Scratch};
use tracing::{debug, info, trace, warn};

use crate::cache::MatrixCache;
use crate::progress::{Progress, ProgressFn};
use crate::workers::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Setup,
    GenerateMatrices,
    Transform,
    Purge,
    /// Every instruction ran; the buffer may be written out.
    Complete,
    /// A pass failed part way; the buffer is neither plaintext nor ciphertext.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Setup => "setup",
            Stage::GenerateMatrices => "generate-matrices",
            Stage::Transform => "transform",
            Stage::Purge => "purge",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct InstructionPipeline {
    workers: WorkerPool,
    cache: MatrixCache,
    progress: Progress,
    on_progress: Option<ProgressFn>,
    max_dimension: usize,
    stage: Stage,
}

impl InstructionPipeline {
    pub fn new(config: &CipherConfig) -> CpmeResult<Self> {
        config.validate()?;
        Ok(Self {
            workers: WorkerPool::new(config.effective_threads())?,
            cache: MatrixCache::new(),
            progress: Progress::new(),
            on_progress: None,
            max_dimension: config.max_dimension,
            stage: Stage::Idle,
        })
    }

    pub fn set_progress_fn(&mut self, report: ProgressFn) {
        self.on_progress = Some(report);
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn cache(&self) -> &MatrixCache {
        &self.cache
    }

    pub fn max_dimension(&self) -> usize {
        self.max_dimension
    }

    pub fn threads(&self) -> usize {
        self.workers.threads()
    }

    /// Apply every instruction to `buffer` in `direction` order.
    ///
    /// A pipeline that has failed refuses to run again.
    pub fn run(
        &mut self,
        buffer: &mut [u8],
        instructions: &[Instruction],
        direction: Direction,
    ) -> CpmeResult<()> {
        if self.stage == Stage::Failed {
            return Err(CpmeError::JobFailed);
        }
        if instructions.is_empty() {
            return Err(CpmeError::MissingInstructions);
        }

        let count = instructions.len();
        let order: Vec<usize> = match direction {
            Direction::Encrypt => (0..count).collect(),
            Direction::Decrypt => (0..count).rev().collect(),
        };

        for (pass, index) in order.into_iter().enumerate() {
            let label = format!("{direction} pass {}/{count}", pass + 1);
            if let Err(e) = self.run_instruction(index, &instructions[index], buffer, direction, &label)
            {
                self.cache.purge();
                self.enter(Stage::Failed);
                return Err(e);
            }
        }

        self.enter(Stage::Complete);
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
    }

    fn run_instruction(
        &mut self,
        index: usize,
        instruction: &Instruction,
        buffer: &mut [u8],
        direction: Direction,
        label: &str,
    ) -> CpmeResult<()> {
        let file_len = buffer.len();
        let inverse = direction.is_inverse();
        info!(
            index,
            mode = instruction.dimension_mode(),
            integrity = instruction.integrity_check(),
            %direction,
            bytes = file_len,
            "running instruction"
        );

        self.enter(Stage::Setup);
        self.progress.reset(file_len as u64);
        let key = KeyScalar::from_secret(instruction.key())?;
        let strategy = Strategy::for_mode(instruction.dimension_mode(), self.max_dimension);
        let schedule = Schedule::plan(strategy, file_len, &key, self.max_dimension);

        self.enter(Stage::GenerateMatrices);
        self.cache
            .prebuild(schedule.eager_dimensions(), &key, inverse, &self.workers)?;

        self.enter(Stage::Transform);
        self.transform(
            buffer,
            &schedule,
            &key,
            instruction.integrity_check(),
            direction,
            label,
        )?;

        self.enter(Stage::Purge);
        self.cache.purge();
        Ok(())
    }

    fn transform(
        &self,
        buffer: &mut [u8],
        schedule: &Schedule,
        key: &KeyScalar,
        integrity_check: bool,
        direction: Direction,
        label: &str,
    ) -> CpmeResult<()> {
        let lazy = schedule.lazy_dimensions();
        let total = self.progress.total();
        let units = assign(buffer, schedule.chunks(), self.workers.threads(), direction)?;
        debug!(units = units.len(), chunks = schedule.chunks().len(), "dispatching work units");

        self.workers.execute(units, |mut unit| {
            let inverse = unit.direction.is_inverse();
            trace!(
                offset = unit.offset,
                bytes = unit.len(),
                chunks = unit.chunks.len(),
                direction = %unit.direction,
                "work unit started"
            );
            let mut scratch = Scratch::new();
            unit.for_each_chunk(|chunk, bytes| {
                let matrix = if lazy.contains(&chunk.length) {
                    self.cache.get_or_build(chunk.length, key, inverse)?
                } else {
                    self.cache.get(chunk.length)?
                };

                transform_chunk(&matrix, bytes, integrity_check, &mut scratch).map_err(
                    |mismatch| {
                        let bytes_remaining = self.progress.remaining();
                        warn!(
                            offset = chunk.offset,
                            dimension = mismatch.dimension,
                            before = mismatch.before,
                            after = mismatch.after,
                            bytes_remaining,
                            "integrity check failed"
                        );
                        CpmeError::IntegrityViolation {
                            offset: chunk.offset,
                            dimension: mismatch.dimension,
                            before: mismatch.before,
                            after: mismatch.after,
                            bytes_remaining,
                        }
                    },
                )?;

                let done = self.progress.advance(chunk.length as u64);
                if let Some(report) = &self.on_progress {
                    report(done, total, label);
                }
                Ok(())
            })
        })
    }
}

impl fmt::Debug for InstructionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionPipeline")
            .field("stage", &self.stage)
            .field("max_dimension", &self.max_dimension)
            .field("workers", &self.workers)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
