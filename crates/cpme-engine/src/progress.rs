//! Byte counters for the running instruction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Progress callback type (bytes_done, bytes_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// `bytes_remaining` / `bytes_processed`, reset at the start of every
/// instruction and advanced by workers as chunks complete.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicU64,
    remaining: AtomicU64,
    processed: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.remaining.store(total, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
    }

    /// Record `bytes` as done; returns the new processed count.
    pub fn advance(&self, bytes: u64) -> u64 {
        self.remaining.fetch_sub(bytes, Ordering::Relaxed);
        self.processed.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}
