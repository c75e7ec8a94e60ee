//! Time source capability for the engine.
//!
//! All timing-dependent logic in this crate (adaptive flush cadence,
//! recording duration budgets) reads milliseconds through the [`Clock`]
//! trait rather than calling into the OS directly. Production code uses
//! [`MonotonicClock`]; tests use [`ManualClock`], which only moves when
//! explicitly advanced, so interval selection and hysteresis can be
//! exercised without real delays.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic millisecond time source.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Milliseconds elapsed since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

// =============================================================================
// MonotonicClock
// =============================================================================

/// Wall-time clock backed by [`Instant`], anchored at construction.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// =============================================================================
// ManualClock
// =============================================================================

/// Manually advanceable clock for tests.
///
/// Clones share the same underlying time, so a test can hold one handle
/// while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given millisecond timestamp.
    #[must_use]
    pub fn starting_at(now_ms: u64) -> Self {
        let clock = Self::new();
        clock.set_ms(now_ms);
        clock
    }

    /// Advance the clock by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute millisecond timestamp.
    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================
