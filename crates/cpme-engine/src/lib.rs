//! cpme-engine: runs layered permutation-matrix passes over a buffered file.
//!
//! A [`CipherJob`] owns the file buffer, the instruction list and an
//! [`InstructionPipeline`]; the pipeline owns the worker pool, the matrix
//! cache and the progress counters. Nothing is process-global.

pub mod cache;
pub mod fatal;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod workers;

pub use cache::MatrixCache;
pub use fatal::append_fatal;
pub use job::CipherJob;
pub use pipeline::{InstructionPipeline, Stage};
pub use progress::{Progress, ProgressFn};
pub use workers::{Completion, Semaphore, WorkerPool};
