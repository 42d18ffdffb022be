//! Process-wide concurrency limiter
//!
//! Bounds the number of fetch attempts executing at once. Admission is FIFO
//! (tokio's semaphore queues waiters in order), so a waiting acquire always
//! succeeds once earlier holders release.
//!
//! The limiter also keeps current and peak in-flight counters for
//! observability. These are the only counters mutated by concurrent attempts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned when acquiring from a limiter that has been closed
#[derive(Debug, Error)]
#[error("concurrency limiter is closed")]
pub struct LimiterClosed;

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounded-parallelism gate shared by every fetch attempt
///
/// Cloning is cheap and yields a handle to the same limiter.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    capacity: usize,
}

/// A held slot; the slot returns to the limiter when this is dropped
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting at most `capacity` concurrent holders
    ///
    /// A capacity of zero is raised to one so that acquire can never block
    /// forever.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(Counters::default()),
            capacity,
        }
    }

    /// Suspends until a slot is free, then returns it
    pub async fn acquire(&self) -> Result<Slot, LimiterClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)?;

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);

        Ok(Slot {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Returns a slot to the limiter
    ///
    /// Equivalent to dropping the slot; provided so call sites can make the
    /// release point explicit.
    pub fn release(&self, slot: Slot) {
        drop(slot);
    }

    /// Rejects all current and future acquires
    ///
    /// Slots already held stay valid until released.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns true once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots held at once since creation or the last reset
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Resets the peak counter to the current in-flight count
    pub fn reset_peak(&self) {
        self.counters
            .peak
            .store(self.in_flight(), Ordering::SeqCst);
    }
}
