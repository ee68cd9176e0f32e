//! cpme-chunks: chunk boundaries and work assignment
//!
//! # Overview
//! - `schedule`: fixed and variable chunk-dimension strategies; which matrix
//!   dimensions an instruction needs, and when they are built
//! - `assign`: contiguous runs of chunks handed to workers as disjoint
//!   mutable slices of the job buffer

pub mod assign;
pub mod schedule;

pub use assign::{assign, WorkChunk, UNITS_PER_WORKER};
pub use schedule::{candidate_dimensions, dimension_for_digit, Chunk, Schedule, Strategy};
