//! Engine configuration.
//!
//! One options structure covers buffering, adaptive scheduling, flow
//! control, and recording budgets. Fields deserialize individually with
//! sensible defaults, so a host can supply a partial configuration and the
//! rest fills in. [`EngineConfig::validate`] rejects nonsensical values
//! (zero capacity, inverted watermarks) before any stream state exists;
//! nothing past construction can fail on configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the buffering and flow-control engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduled flush interval for idle and interactive streams (ms).
    /// Tuned to a comfortable UI refresh cadence.
    pub normal_flush_interval_ms: u64,

    /// Scheduled flush interval for streams producing large or frequent
    /// chunks (ms).
    pub fast_flush_interval_ms: u64,

    /// Scheduled flush interval for streams matching the high-frequency
    /// burst signature (ms).
    pub high_frequency_flush_interval_ms: u64,

    /// Maximum buffered chunks per stream. When full, the oldest chunk is
    /// evicted; the immediate-flush threshold below is meant to keep this
    /// from happening in practice.
    pub max_buffer_capacity: usize,

    /// Chunk length (chars) at or above which the scheduler selects the
    /// fast interval.
    pub adaptive_threshold_chars: usize,

    /// Chunk length (chars) at or above which the chunk's stream is
    /// flushed immediately, bypassing the shared timer.
    pub immediate_flush_threshold_chars: usize,

    /// Accumulated recording size (bytes) after which a recording session
    /// stops capturing.
    pub max_recording_size_bytes: usize,

    /// Elapsed recording duration (ms) after which a recording session
    /// stops capturing.
    pub max_recording_duration_ms: u64,

    /// Unacknowledged chars at or above which pause advice is given.
    pub flow_control_high_watermark: usize,

    /// Unacknowledged chars at or below which resume advice is given.
    /// The gap below the high watermark is deliberate hysteresis.
    pub flow_control_low_watermark: usize,

    /// Recommended granularity for consumers batching their
    /// `acknowledge_chars` calls.
    pub char_ack_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normal_flush_interval_ms: 16,
            fast_flush_interval_ms: 8,
            high_frequency_flush_interval_ms: 4,
            max_buffer_capacity: 100,
            adaptive_threshold_chars: 100,
            immediate_flush_threshold_chars: 1024,
            max_recording_size_bytes: 10 * 1024 * 1024,
            max_recording_duration_ms: 10_000,
            flow_control_high_watermark: 100_000,
            flow_control_low_watermark: 5_000,
            char_ack_batch_size: 5_000,
        }
    }
}

impl EngineConfig {
    /// Set the three scheduled flush intervals.
    #[must_use]
    pub fn with_flush_intervals(mut self, normal_ms: u64, fast_ms: u64, high_frequency_ms: u64) -> Self {
        self.normal_flush_interval_ms = normal_ms;
        self.fast_flush_interval_ms = fast_ms;
        self.high_frequency_flush_interval_ms = high_frequency_ms;
        self
    }

    /// Set the per-stream buffer capacity (chunks).
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.max_buffer_capacity = capacity;
        self
    }

    /// Set the flow-control watermarks.
    #[must_use]
    pub fn with_watermarks(mut self, high: usize, low: usize) -> Self {
        self.flow_control_high_watermark = high;
        self.flow_control_low_watermark = low;
        self
    }

    /// Set the recording budgets.
    #[must_use]
    pub fn with_recording_budget(mut self, max_bytes: usize, max_duration_ms: u64) -> Self {
        self.max_recording_size_bytes = max_bytes;
        self.max_recording_duration_ms = max_duration_ms;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_capacity == 0 {
            return Err(Error::config("max_buffer_capacity must be greater than zero"));
        }
        if self.normal_flush_interval_ms == 0
            || self.fast_flush_interval_ms == 0
            || self.high_frequency_flush_interval_ms == 0
        {
            return Err(Error::config("flush intervals must be greater than zero"));
        }
        if self.fast_flush_interval_ms > self.normal_flush_interval_ms {
            return Err(Error::config(
                "fast_flush_interval_ms must not exceed normal_flush_interval_ms",
            ));
        }
        if self.high_frequency_flush_interval_ms > self.fast_flush_interval_ms {
            return Err(Error::config(
                "high_frequency_flush_interval_ms must not exceed fast_flush_interval_ms",
            ));
        }
        if self.immediate_flush_threshold_chars == 0 {
            return Err(Error::config(
                "immediate_flush_threshold_chars must be greater than zero",
            ));
        }
        if self.flow_control_low_watermark >= self.flow_control_high_watermark {
            return Err(Error::config(
                "flow_control_low_watermark must be below flow_control_high_watermark",
            ));
        }
        if self.max_recording_size_bytes == 0 || self.max_recording_duration_ms == 0 {
            return Err(Error::config("recording budgets must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
