//! Bounded per-stream capture of output history for replay.
//!
//! A recording session taps a stream's inbound chunks independently of the
//! live flush path: the ring buffer feeds the renderer now, the session
//! feeds a replay collaborator later. Capture is bounded by both size and
//! elapsed time; crossing either budget sets a sticky truncation flag and
//! silently drops further data while keeping everything captured so far.
//! Truncation is not an error; it surfaces to the host only as a flag on
//! stats and replay exports, so a higher layer can warn without
//! interrupting anything.
//!
//! Entries carry the terminal dimensions current at capture time, so a
//! replay can resize accurately mid-stream.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

// =============================================================================
// RecordedData
// =============================================================================

/// One captured chunk with the dimensions and relative time it arrived at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedData {
    /// Terminal columns at capture time.
    pub cols: u16,
    /// Terminal rows at capture time.
    pub rows: u16,
    /// The captured text.
    pub data: String,
    /// Milliseconds since the session started.
    pub offset_ms: u64,
}

// =============================================================================
// RecordingLimits
// =============================================================================

/// Size and duration budget shared by all sessions.
#[derive(Debug, Clone, Copy)]
pub struct RecordingLimits {
    /// Accumulated bytes after which capture stops.
    pub max_bytes: usize,
    /// Elapsed milliseconds after which capture stops.
    pub max_duration_ms: u64,
}

impl RecordingLimits {
    /// Build limits from the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_bytes: config.max_recording_size_bytes,
            max_duration_ms: config.max_recording_duration_ms,
        }
    }
}

// =============================================================================
// SerializeOptions
// =============================================================================

/// Bounds for [`RecordingSession::serialized_data`].
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Reconstruct at most this many trailing lines (newline-counted).
    pub line_limit: Option<usize>,
    /// Restrict to a window of entry indices before applying the line
    /// limit.
    pub range: Option<Range<usize>>,
}

impl SerializeOptions {
    /// Bound the reconstruction to the last `lines` lines.
    #[must_use]
    pub fn with_line_limit(mut self, lines: usize) -> Self {
        self.line_limit = Some(lines);
        self
    }

    /// Restrict to a window of entry indices.
    #[must_use]
    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }
}

// =============================================================================
// ReplayEvent
// =============================================================================

/// In-memory export of a session for an external replay collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEvent {
    /// All captured entries, oldest first.
    pub events: Vec<RecordedData>,
    /// Total captured bytes.
    pub total_size: usize,
    /// Offset of the last entry (ms); 0 when nothing was captured.
    pub duration_ms: u64,
    /// Whether a size or time budget truncated the capture.
    pub truncated: bool,
}

// =============================================================================
// RecordingSession
// =============================================================================

/// One stream's bounded capture history.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    entries: Vec<RecordedData>,
    total_size: usize,
    started_at_ms: u64,
    cols: u16,
    rows: u16,
    is_recording: bool,
    size_limit_reached: bool,
    time_limit_reached: bool,
}

impl RecordingSession {
    /// Start a new session at the given time and dimensions.
    #[must_use]
    pub fn new(cols: u16, rows: u16, now_ms: u64) -> Self {
        Self {
            entries: Vec::new(),
            total_size: 0,
            started_at_ms: now_ms,
            cols,
            rows,
            is_recording: true,
            size_limit_reached: false,
            time_limit_reached: false,
        }
    }

    /// Resume capture. History and truncation flags are untouched.
    pub fn resume(&mut self) {
        self.is_recording = true;
    }

    /// Pause capture without discarding history.
    pub fn stop(&mut self) {
        self.is_recording = false;
    }

    /// Capture a chunk, unless paused or a budget has been crossed.
    ///
    /// The entry that pushes `total_size` past the size budget is kept;
    /// the sticky flag then drops everything after it. Data arriving after
    /// the duration budget is dropped the same way.
    pub fn record(&mut self, chunk: &str, now_ms: u64, limits: &RecordingLimits) {
        if !self.is_recording || self.size_limit_reached || self.time_limit_reached {
            return;
        }
        let offset_ms = now_ms.saturating_sub(self.started_at_ms);
        if offset_ms > limits.max_duration_ms {
            self.time_limit_reached = true;
            tracing::debug!(offset_ms, "recording duration budget crossed, capture stopped");
            return;
        }
        self.entries.push(RecordedData {
            cols: self.cols,
            rows: self.rows,
            data: chunk.to_string(),
            offset_ms,
        });
        self.total_size += chunk.len();
        if self.total_size > limits.max_bytes {
            self.size_limit_reached = true;
            tracing::debug!(
                total_size = self.total_size,
                "recording size budget crossed, capture stopped"
            );
        }
    }

    /// Record a terminal resize: applies to the most recent entry (for
    /// accurate replay sizing) and to everything captured afterward.
    pub fn update_dimensions(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        if let Some(last) = self.entries.last_mut() {
            last.cols = cols;
            last.rows = rows;
        }
    }

    /// Reconstruct a bounded tail of the captured text.
    ///
    /// Walks entries backward accumulating newline counts until the line
    /// limit is met, then concatenates the selected suffix oldest-first.
    /// Cost is proportional to the requested window, not total history.
    #[must_use]
    pub fn serialized_data(&self, opts: &SerializeOptions) -> String {
        let end = opts
            .range
            .as_ref()
            .map_or(self.entries.len(), |r| r.end.min(self.entries.len()));
        let start = opts.range.as_ref().map_or(0, |r| r.start.min(end));
        let window = &self.entries[start..end];

        let first = match opts.line_limit {
            None => 0,
            Some(0) => window.len(),
            Some(limit) => {
                let mut lines = 0;
                let mut first = window.len();
                while first > 0 {
                    first -= 1;
                    lines += window[first].data.matches('\n').count();
                    if lines >= limit {
                        break;
                    }
                }
                first
            }
        };

        window[first..]
            .iter()
            .map(|entry| entry.data.as_str())
            .collect()
    }

    /// Export the full capture for replay.
    #[must_use]
    pub fn replay_event(&self) -> ReplayEvent {
        ReplayEvent {
            events: self.entries.clone(),
            total_size: self.total_size,
            duration_ms: self.entries.last().map_or(0, |entry| entry.offset_ms),
            truncated: self.size_limit_reached || self.time_limit_reached,
        }
    }

    /// Whether capture is currently active.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Total captured bytes.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Number of captured entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the size budget has been crossed (sticky).
    #[must_use]
    pub fn size_limit_reached(&self) -> bool {
        self.size_limit_reached
    }

    /// Whether the duration budget has been crossed (sticky).
    #[must_use]
    pub fn time_limit_reached(&self) -> bool {
        self.time_limit_reached
    }

    /// Get a serializable snapshot of the session's counters.
    #[must_use]
    pub fn stats(&self) -> RecordingStats {
        RecordingStats {
            is_recording: self.is_recording,
            entries: self.entries.len(),
            total_size: self.total_size,
            size_limit_reached: self.size_limit_reached,
            time_limit_reached: self.time_limit_reached,
        }
    }
}

// =============================================================================
// RecordingStats (serializable)
// =============================================================================

/// Serializable snapshot of a session's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Whether capture is active.
    pub is_recording: bool,
    /// Captured entry count.
    pub entries: usize,
    /// Captured bytes.
    pub total_size: usize,
    /// Size budget crossed (sticky).
    pub size_limit_reached: bool,
    /// Duration budget crossed (sticky).
    pub time_limit_reached: bool,
}

// =============================================================================
// Tests
// =============================================================================
