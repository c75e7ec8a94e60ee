//! Watermark-based flow-control advice.
//!
//! The gate counts characters the consumer has not yet acknowledged, per
//! stream. Crossing the high watermark advises pausing the PTY producer;
//! only draining all the way down to the low watermark advises resuming.
//! A query in the band between the two yields neither signal. That gap is
//! deliberate hysteresis, so borderline load cannot oscillate the producer
//! between paused and resumed.
//!
//! The gate is advisory only: it stops nothing itself. A pty-control
//! collaborator polls [`FlowGate::should_pause`] / [`FlowGate::should_resume`]
//! and acts on the answers.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

// =============================================================================
// FlowState
// =============================================================================

/// Per-stream unacknowledged-character accounting.
#[derive(Debug, Clone, Default)]
pub struct FlowState {
    unacknowledged_chars: usize,
    total_inbound_chars: u64,
    total_acked_chars: u64,
    pause_advisories: u64,
    resume_advisories: u64,
}

impl FlowState {
    /// Create state for a new stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters delivered but not yet acknowledged by the consumer.
    #[must_use]
    pub fn unacknowledged_chars(&self) -> usize {
        self.unacknowledged_chars
    }
}

// =============================================================================
// FlowGate
// =============================================================================

/// Watermark thresholds shared by all streams.
#[derive(Debug, Clone)]
pub struct FlowGate {
    high_watermark: usize,
    low_watermark: usize,
    ack_batch_size: usize,
}

impl FlowGate {
    /// Build a gate from the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            high_watermark: config.flow_control_high_watermark,
            low_watermark: config.flow_control_low_watermark,
            ack_batch_size: config.char_ack_batch_size,
        }
    }

    /// Count an inbound chunk against the stream.
    pub fn note_inbound(&self, state: &mut FlowState, chars: usize) {
        let before = state.unacknowledged_chars;
        state.unacknowledged_chars += chars;
        state.total_inbound_chars += chars as u64;
        if before < self.high_watermark && state.unacknowledged_chars >= self.high_watermark {
            state.pause_advisories += 1;
        }
    }

    /// Credit characters the consumer has rendered, floored at zero.
    pub fn acknowledge(&self, state: &mut FlowState, chars: usize) {
        let before = state.unacknowledged_chars;
        state.unacknowledged_chars = state.unacknowledged_chars.saturating_sub(chars);
        state.total_acked_chars += chars.min(before) as u64;
        if before > self.low_watermark && state.unacknowledged_chars <= self.low_watermark {
            state.resume_advisories += 1;
        }
    }

    /// Whether the producer should be paused: unacknowledged volume has
    /// reached the high watermark.
    #[must_use]
    pub fn should_pause(&self, state: &FlowState) -> bool {
        state.unacknowledged_chars >= self.high_watermark
    }

    /// Whether a paused producer may resume: unacknowledged volume has
    /// drained to the low watermark.
    #[must_use]
    pub fn should_resume(&self, state: &FlowState) -> bool {
        state.unacknowledged_chars <= self.low_watermark
    }

    /// Recommended granularity for consumers batching acknowledgements.
    #[must_use]
    pub fn ack_batch_size(&self) -> usize {
        self.ack_batch_size
    }

    /// Get a serializable snapshot for a stream.
    #[must_use]
    pub fn stats(&self, state: &FlowState) -> FlowStats {
        FlowStats {
            unacknowledged_chars: state.unacknowledged_chars,
            total_inbound_chars: state.total_inbound_chars,
            total_acked_chars: state.total_acked_chars,
            pause_advisories: state.pause_advisories,
            resume_advisories: state.resume_advisories,
            pause_advised: self.should_pause(state),
        }
    }
}

// =============================================================================
// FlowStats (serializable)
// =============================================================================

/// Serializable flow-control snapshot for one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStats {
    /// Characters awaiting acknowledgement.
    pub unacknowledged_chars: usize,
    /// Total characters ever counted inbound.
    pub total_inbound_chars: u64,
    /// Total characters ever acknowledged.
    pub total_acked_chars: u64,
    /// Times the high watermark was crossed upward.
    pub pause_advisories: u64,
    /// Times the low watermark was reached by draining.
    pub resume_advisories: u64,
    /// Whether pause advice currently stands.
    pub pause_advised: bool,
}

// =============================================================================
// Tests
// =============================================================================
