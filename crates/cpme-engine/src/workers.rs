//! Bounded worker pool
//!
//! Work units run on a fixed-size rayon pool. Admission goes through a
//! counting [`Semaphore`] with one permit per worker thread, so at most
//! `threads` units are in flight at once. The orchestrating thread blocks on
//! the semaphore to start each unit and on a [`Completion`] barrier until all
//! admitted units are done.
//!
//! There is no cancellation. A unit that has started runs to completion; after
//! the first failure no further units are admitted, and the error is returned
//! once the barrier is reached.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use cpme_core::{CpmeError, CpmeResult};
use tracing::debug;

/// Lock, recovering the guard if a worker panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counting semaphore. Permits are returned when the [`Permit`] drops.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut permits = lock(&self.permits);
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
        Permit { semaphore: self }
    }

    pub fn available(&self) -> usize {
        *lock(&self.permits)
    }
}

#[derive(Debug)]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        *lock(&self.semaphore.permits) += 1;
        self.semaphore.available.notify_one();
    }
}

/// Wait-group: counts finished units and wakes the waiter on each one.
#[derive(Debug, Default)]
pub struct Completion {
    finished: AtomicUsize,
    lock: Mutex<()>,
    done: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&self) {
        self.finished.fetch_add(1, Ordering::Release);
        // Notify under the lock so a waiter between its check and its wait
        // cannot miss the wakeup.
        let _guard = lock(&self.lock);
        self.done.notify_all();
    }

    /// Marks one unit finished when dropped, including on unwind.
    pub fn guard(&self) -> FinishGuard<'_> {
        FinishGuard { completion: self }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    /// Block until at least `expected` units have finished.
    pub fn wait_for(&self, expected: usize) {
        let mut guard = lock(&self.lock);
        while self.finished.load(Ordering::Acquire) < expected {
            guard = self.done.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Debug)]
pub struct FinishGuard<'a> {
    completion: &'a Completion,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.completion.finish();
    }
}

/// Fixed-size pool of worker threads owned by one job.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    admission: Semaphore,
    threads: usize,
}

impl WorkerPool {
    /// `threads` of 0 is treated as 1; resolve "all cores" before calling.
    pub fn new(threads: usize) -> CpmeResult<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("cpme-worker-{i}"))
            .build()
            .context("building worker pool")?;
        debug!(threads, "worker pool started");
        Ok(Self {
            pool,
            admission: Semaphore::new(threads),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `op` inside the pool, so rayon parallel iterators use its threads.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Run `work` once per unit and wait for all admitted units to finish.
    ///
    /// Returns the first error any unit produced.
    pub fn execute<T, F>(&self, units: Vec<T>, work: F) -> CpmeResult<()>
    where
        T: Send,
        F: Fn(T) -> CpmeResult<()> + Sync,
    {
        let total = units.len();
        let completion = Completion::new();
        let first_error: Mutex<Option<CpmeError>> = Mutex::new(None);
        let failed = AtomicBool::new(false);
        let mut admitted = 0usize;

        self.pool.in_place_scope(|scope| {
            for unit in units {
                let permit = self.admission.acquire();
                if failed.load(Ordering::Acquire) {
                    break;
                }
                admitted += 1;

                let (completion, first_error, failed, work) =
                    (&completion, &first_error, &failed, &work);
                scope.spawn(move |_| {
                    let _permit = permit;
                    let _done = completion.guard();
                    if let Err(e) = work(unit) {
                        failed.store(true, Ordering::Release);
                        let mut slot = lock(first_error);
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                });
            }
            completion.wait_for(admitted);
        });

        debug!(total, admitted, "work units finished");
        match first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("permits_available", &self.admission.available())
            .finish()
    }
}
