//! Adaptive flush cadence selection.
//!
//! For every inbound chunk the scheduler picks how long the shared timer
//! may wait before the stream's next flush. The decision blends an
//! explicit burst signature with a smoothed view of the stream's recent
//! flush history:
//!
//! 1. Flushed < 100 ms ago AND the chunk is > 50 chars → high-frequency
//!    interval. Catches rapid bulk producers (builds, log floods) on the
//!    first large chunk of a burst.
//! 2. Chunk length ≥ the adaptive threshold → fast interval.
//! 3. The EWMA of inter-flush gaps is already below the normal interval
//!    (the stream has recently been flushing fast) → fast interval.
//! 4. Otherwise → normal interval.
//!
//! The explicit signature is evaluated before the EWMA check, so when both
//! apply to one chunk the high-frequency interval wins deterministically.
//!
//! On each flush the gap EWMA updates as
//!
//! > average = average · 0.8 + gap · 0.2
//!
//! an effective ~5-sample window. A stream under sustained rapid output
//! converges to minimal latency; an interactive stream relaxes back to the
//! normal cadence, bounding redraw cost.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Gap below which a large chunk counts as part of a rapid burst (ms).
pub const HIGH_FREQUENCY_WINDOW_MS: u64 = 100;

/// Chunk length above which the burst signature applies (chars).
pub const HIGH_FREQUENCY_CHUNK_CHARS: usize = 50;

/// Weight of the newest inter-flush gap in the EWMA.
const INTERVAL_EWMA_WEIGHT: f64 = 0.2;

// =============================================================================
// StreamStats
// =============================================================================

/// Per-stream flush bookkeeping.
///
/// Created with the stream, mutated only on push and flush, deleted with
/// the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStats {
    /// Timestamp of the last flush (seeded to creation time).
    pub last_flush_ms: u64,
    /// Number of flushes delivered.
    pub flush_count: u64,
    /// Total bytes ever buffered for this stream.
    pub total_bytes: u64,
    /// EWMA of inter-flush gaps, seeded to the normal interval.
    pub average_interval_ms: f64,
}

impl StreamStats {
    /// Create stats for a new stream at the given time.
    #[must_use]
    pub fn new(now_ms: u64, normal_interval_ms: u64) -> Self {
        Self {
            last_flush_ms: now_ms,
            flush_count: 0,
            total_bytes: 0,
            average_interval_ms: normal_interval_ms as f64,
        }
    }
}

// =============================================================================
// FlushCadence
// =============================================================================

/// The interval class chosen for a stream's next scheduled flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushCadence {
    /// Rapid bursty producer: fastest configured interval.
    HighFrequency,
    /// Large chunks or a recently-fast stream.
    Fast,
    /// Idle or interactive stream: comfortable UI refresh cadence.
    Normal,
}

// =============================================================================
// AdaptiveScheduler
// =============================================================================

/// Per-chunk flush-delay decision logic.
#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    normal_interval_ms: u64,
    fast_interval_ms: u64,
    high_frequency_interval_ms: u64,
    adaptive_threshold_chars: usize,
}

impl AdaptiveScheduler {
    /// Build a scheduler from the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            normal_interval_ms: config.normal_flush_interval_ms,
            fast_interval_ms: config.fast_flush_interval_ms,
            high_frequency_interval_ms: config.high_frequency_flush_interval_ms,
            adaptive_threshold_chars: config.adaptive_threshold_chars,
        }
    }

    /// Choose the cadence for a stream's next scheduled flush, given the
    /// chunk that just arrived.
    #[must_use]
    pub fn decide(&self, stats: &StreamStats, chunk_chars: usize, now_ms: u64) -> FlushCadence {
        let gap_ms = now_ms.saturating_sub(stats.last_flush_ms);
        if gap_ms < HIGH_FREQUENCY_WINDOW_MS && chunk_chars > HIGH_FREQUENCY_CHUNK_CHARS {
            return FlushCadence::HighFrequency;
        }
        if chunk_chars >= self.adaptive_threshold_chars {
            return FlushCadence::Fast;
        }
        if stats.average_interval_ms < self.normal_interval_ms as f64 {
            return FlushCadence::Fast;
        }
        FlushCadence::Normal
    }

    /// Resolve a cadence to its configured delay in milliseconds.
    #[must_use]
    pub fn delay_ms(&self, cadence: FlushCadence) -> u64 {
        match cadence {
            FlushCadence::HighFrequency => self.high_frequency_interval_ms,
            FlushCadence::Fast => self.fast_interval_ms,
            FlushCadence::Normal => self.normal_interval_ms,
        }
    }

    /// The normal (slowest) configured interval.
    #[must_use]
    pub fn normal_interval_ms(&self) -> u64 {
        self.normal_interval_ms
    }

    /// Record a flush: fold the measured gap into the EWMA and advance the
    /// stream's flush bookkeeping.
    pub fn on_flush(&self, stats: &mut StreamStats, now_ms: u64) {
        let gap_ms = now_ms.saturating_sub(stats.last_flush_ms) as f64;
        stats.average_interval_ms = stats.average_interval_ms * (1.0 - INTERVAL_EWMA_WEIGHT)
            + gap_ms * INTERVAL_EWMA_WEIGHT;
        stats.last_flush_ms = now_ms;
        stats.flush_count += 1;
    }
}

// =============================================================================
// Tests
// =============================================================================
