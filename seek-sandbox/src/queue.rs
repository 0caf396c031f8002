//! Admission control: a fixed pool of execution slots plus a bounded wait
//! queue. Requests beyond both bounds are rejected immediately rather than
//! buffered without limit.

use crate::config::ServiceConfig;
use seek_common::ExecError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds concurrent executions and the depth of the wait queue.
#[derive(Debug, Clone)]
pub struct QueueController {
    slots: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    max_queue_depth: usize,
}

/// Possession of one execution slot. Returning the slot is tied to the value
/// itself, so a panicking or abandoned submission still frees capacity.
#[derive(Debug)]
pub struct ExecutionSlot {
    _permit: OwnedSemaphorePermit,
}

impl QueueController {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.max_concurrency)),
            waiting: Arc::new(AtomicUsize::new(0)),
            max_queue_depth: config.max_queue_depth,
        }
    }

    /// Wait for an execution slot, or fail fast with `Capacity` when the
    /// queue is already at its depth bound.
    pub async fn admit(&self) -> Result<ExecutionSlot, ExecError> {
        // Fast path: a slot is free, nobody waits.
        if let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() {
            return Ok(ExecutionSlot { _permit: permit });
        }

        let _guard = WaitGuard::enter(&self.waiting, self.max_queue_depth)?;
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ExecError::Canceled)?;
        Ok(ExecutionSlot { _permit: permit })
    }

    /// Free slots right now. Zero while fully loaded.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Submissions currently waiting for a slot.
    pub fn queue_len(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

/// Occupies one queue position for as long as the admission wait lasts,
/// including when the waiting future is dropped.
struct WaitGuard {
    waiting: Arc<AtomicUsize>,
}

impl WaitGuard {
    fn enter(waiting: &Arc<AtomicUsize>, max_depth: usize) -> Result<Self, ExecError> {
        let mut current = waiting.load(Ordering::SeqCst);
        loop {
            if current >= max_depth {
                return Err(ExecError::Capacity);
            }
            match waiting.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Ok(Self {
                        waiting: Arc::clone(waiting),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}
