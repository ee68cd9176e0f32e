//! Cipher job lifecycle
//!
//! ```text
//! create(path, len, config) → set_instructions(list) → run(direction)
//!                           → write_output(path) → close()
//! ```
//!
//! The whole file is buffered in memory. The buffer is reserved when the job
//! is created and filled on the first `run`; it is zeroized when the job is
//! closed or dropped.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use cpme_core::types::check_instruction_count;
use cpme_core::{CipherConfig, CpmeError, CpmeResult, Direction, Instruction};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::pipeline::{InstructionPipeline, Stage};
use crate::progress::ProgressFn;

pub struct CipherJob {
    path: Option<PathBuf>,
    file_len: u64,
    buffer: Vec<u8>,
    loaded: bool,
    instructions: Vec<Instruction>,
    pipeline: InstructionPipeline,
}

impl CipherJob {
    /// Reserve a buffer for the `file_len`-byte file at `path`. Nothing is
    /// read until [`CipherJob::run`].
    pub fn create(
        path: impl Into<PathBuf>,
        file_len: u64,
        config: &CipherConfig,
    ) -> CpmeResult<Self> {
        let requested = usize::try_from(file_len).map_err(|_| CpmeError::AllocationFailure {
            what: "file buffer",
            requested: usize::MAX,
        })?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(requested)
            .map_err(|_| CpmeError::AllocationFailure {
                what: "file buffer",
                requested,
            })?;

        let path = path.into();
        debug!(path = %path.display(), file_len, "created cipher job");
        Ok(Self {
            path: Some(path),
            file_len,
            buffer,
            loaded: false,
            instructions: Vec::new(),
            pipeline: InstructionPipeline::new(config)?,
        })
    }

    /// A job over bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>, config: &CipherConfig) -> CpmeResult<Self> {
        Ok(Self {
            path: None,
            file_len: bytes.len() as u64,
            buffer: bytes,
            loaded: true,
            instructions: Vec::new(),
            pipeline: InstructionPipeline::new(config)?,
        })
    }

    /// Replace the instruction list. Between 1 and `MAX_INSTRUCTIONS` entries.
    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) -> CpmeResult<()> {
        check_instruction_count(instructions.len())?;
        self.instructions = instructions;
        Ok(())
    }

    pub fn set_progress_fn(&mut self, report: ProgressFn) {
        self.pipeline.set_progress_fn(report);
    }

    /// Load the input if needed, then apply every instruction in `direction`.
    pub fn run(&mut self, direction: Direction) -> CpmeResult<()> {
        if self.instructions.is_empty() {
            return Err(CpmeError::MissingInstructions);
        }
        if self.pipeline.stage() == Stage::Failed {
            return Err(CpmeError::JobFailed);
        }
        if !self.loaded {
            self.load()?;
        }

        info!(
            %direction,
            instructions = self.instructions.len(),
            bytes = self.file_len,
            threads = self.pipeline.threads(),
            "starting job"
        );
        self.pipeline
            .run(&mut self.buffer, &self.instructions, direction)
    }

    fn load(&mut self) -> CpmeResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = File::open(path)?;
        let actual = file.metadata()?.len();
        if actual != self.file_len {
            return Err(CpmeError::LengthMismatch {
                expected: self.file_len,
                actual,
            });
        }
        file.read_to_end(&mut self.buffer)?;
        if self.buffer.len() as u64 != self.file_len {
            let actual = self.buffer.len() as u64;
            self.buffer.zeroize();
            return Err(CpmeError::LengthMismatch {
                expected: self.file_len,
                actual,
            });
        }
        self.loaded = true;
        debug!(path = %path.display(), bytes = self.file_len, "loaded input");
        Ok(())
    }

    /// Write the transformed buffer to `path`. Only a completed run may be written.
    pub fn write_output(&self, path: &Path) -> CpmeResult<()> {
        match self.pipeline.stage() {
            Stage::Complete => {}
            Stage::Failed => return Err(CpmeError::NotWritable("the last run failed")),
            _ => return Err(CpmeError::NotWritable("no run has completed")),
        }
        std::fs::write(path, &self.buffer)?;
        info!(path = %path.display(), bytes = self.buffer.len(), "wrote output");
        Ok(())
    }

    /// Zeroize the buffer and release the matrix cache.
    pub fn close(self) {
        drop(self);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn stage(&self) -> Stage {
        self.pipeline.stage()
    }

    pub fn bytes_remaining(&self) -> u64 {
        self.pipeline.progress().remaining()
    }

    pub fn bytes_processed(&self) -> u64 {
        self.pipeline.progress().processed()
    }
}

impl Drop for CipherJob {
    fn drop(&mut self) {
        self.buffer.zeroize();
        self.pipeline.cache().purge();
    }
}

impl std::fmt::Debug for CipherJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherJob")
            .field("path", &self.path)
            .field("file_len", &self.file_len)
            .field("instructions", &self.instructions.len())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CipherConfig {
        CipherConfig {
            max_dimension: 64,
            threads: 2,
        }
    }

    #[test]
    fn run_without_instructions() {
        let mut job = CipherJob::from_bytes(vec![1, 2, 3], &config()).unwrap();
        assert!(matches!(
            job.run(Direction::Encrypt),
            Err(CpmeError::MissingInstructions)
        ));
    }

    #[test]
    fn too_many_instructions() {
        let mut job = CipherJob::from_bytes(vec![0; 8], &config()).unwrap();
        let list: Vec<Instruction> = (0..11)
            .map(|i| Instruction::new(4, format!("key{i}"), true).unwrap())
            .collect();
        assert!(matches!(
            job.set_instructions(list),
            Err(CpmeError::TooManyInstructions { count: 11, max: 10 })
        ));
    }

    #[test]
    fn huge_length_is_allocation_failure() {
        let err = CipherJob::create("/nonexistent", u64::MAX, &config()).unwrap_err();
        assert!(matches!(err, CpmeError::AllocationFailure { .. }));
    }

    #[test]
    fn write_refused_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let job = CipherJob::from_bytes(vec![9; 4], &config()).unwrap();
        let err = job.write_output(&dir.path().join("out")).unwrap_err();
        assert!(matches!(err, CpmeError::NotWritable(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn integrity_failure_blocks_output() {
        use cpme_crypto::{KeyScalar, PermutationMatrix};

        let build = |key: &str| {
            PermutationMatrix::build(8, &KeyScalar::derive(key).unwrap(), false).unwrap()
        };
        let config = CipherConfig {
            max_dimension: 64,
            threads: 1,
        };
        let mut job = CipherJob::from_bytes((0..40).collect(), &config).unwrap();
        job.set_instructions(vec![Instruction::new(16, "stage-key", true).unwrap()])
            .unwrap();
        job.pipeline.cache().insert(
            8,
            PermutationMatrix::mismatched(&build("wrong-key"), &build("stage-key")),
        );

        let err = job.run(Direction::Encrypt).unwrap_err();
        assert!(matches!(
            err,
            CpmeError::IntegrityViolation {
                offset: 32,
                bytes_remaining: 8,
                ..
            }
        ));
        assert_eq!(job.stage(), Stage::Failed);
        assert_eq!(job.bytes_remaining(), 8);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("data.fbz");
        assert!(matches!(
            job.write_output(&out),
            Err(CpmeError::NotWritable(_))
        ));
        assert!(!out.exists());
        assert!(matches!(job.run(Direction::Encrypt), Err(CpmeError::JobFailed)));
    }

    #[test]
    fn in_memory_round_trip_and_counters() {
        let original: Vec<u8> = (0..=255).collect();
        let mut job = CipherJob::from_bytes(original.clone(), &config()).unwrap();
        job.set_instructions(vec![Instruction::new(0, "memory", true).unwrap()])
            .unwrap();
        job.run(Direction::Encrypt).unwrap();
        assert_eq!(job.stage(), Stage::Complete);
        assert_eq!(job.bytes_processed(), 256);
        assert_eq!(job.bytes_remaining(), 0);
        job.run(Direction::Decrypt).unwrap();
        assert_eq!(job.bytes(), &original[..]);
        job.close();
    }
}
