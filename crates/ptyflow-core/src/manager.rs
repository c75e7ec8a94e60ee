//! The buffer manager: one instance owns every per-stream table.
//!
//! A producer collaborator pushes decoded output through
//! [`BufferManager::buffer_data`]; registered flush handlers receive the
//! batched text; a pty-control collaborator polls the flow-control advice.
//! The manager composes the ring buffers, the adaptive scheduler, the flow
//! gate, and the recording sessions, and owns the shared-timer contract
//! that [`crate::driver`] (or a test) realizes:
//!
//! ```text
//! buffer_data ──► ring push ──► immediate flush?  ──yes──► handlers
//!      │                            │ no
//!      │                            └──► arm / narrow shared timer
//!      ├──► flow gate (unacked chars)
//!      └──► recording session (if capturing)
//!
//! tick ──► flush every pending stream ──► disarm timer
//! ```
//!
//! Exactly one timer interval is armed while any stream holds unflushed
//! data; it is the minimum of the pending streams' scheduled delays, and
//! it resets when the last pending byte is delivered. There is no
//! process-wide state: independent managers coexist, and tests construct
//! one per case with a [`ManualClock`](crate::clock::ManualClock).

use serde::{Deserialize, Serialize};

use crate::chunk_ring::{ChunkRing, ChunkRingStats};
use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::flow_gate::{FlowGate, FlowState, FlowStats};
use crate::recording::{
    RecordingLimits, RecordingSession, RecordingStats, ReplayEvent, SerializeOptions,
};
use crate::scheduler::{AdaptiveScheduler, StreamStats};
use crate::stream_table::{StreamHandle, StreamTable};

/// Callback receiving `(stream_id, flushed_text)` once per flush.
///
/// A returned error is logged and isolated: other handlers still run, and
/// the flushed data counts as delivered regardless.
pub type FlushHandler = Box<dyn FnMut(&str, &str) -> Result<()> + Send>;

/// Identifies a registered flush handler for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// All per-stream state, stored densely in the stream table.
struct StreamState {
    ring: ChunkRing,
    stats: StreamStats,
    flow: FlowState,
    recording: Option<RecordingSession>,
}

// =============================================================================
// BufferManager
// =============================================================================

/// Orchestrator for buffering, scheduling, flow control, and recording
/// across all streams.
pub struct BufferManager {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    scheduler: AdaptiveScheduler,
    gate: FlowGate,
    recording_limits: RecordingLimits,
    streams: StreamTable<StreamState>,
    handlers: Vec<(HandlerId, FlushHandler)>,
    next_handler_id: u64,
    timer_interval_ms: Option<u64>,
    total_flushes: u64,
    total_bytes_in: u64,
}

impl BufferManager {
    /// Create a manager with the given configuration and a monotonic
    /// wall clock.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, MonotonicClock::new())
    }

    /// Create a manager with an injected clock (tests use
    /// [`ManualClock`](crate::clock::ManualClock)).
    pub fn with_clock(config: EngineConfig, clock: impl Clock + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: AdaptiveScheduler::from_config(&config),
            gate: FlowGate::from_config(&config),
            recording_limits: RecordingLimits::from_config(&config),
            config,
            clock: Box::new(clock),
            streams: StreamTable::new(),
            handlers: Vec::new(),
            next_handler_id: 0,
            timer_interval_ms: None,
            total_flushes: 0,
            total_bytes_in: 0,
        })
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Handlers ---------------------------------------------------------------

    /// Register a flush handler. Handlers run in registration order.
    pub fn add_flush_handler(&mut self, handler: FlushHandler) -> HandlerId {
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Unregister a flush handler. Returns whether it was registered.
    pub fn remove_flush_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    // -- Producer path ----------------------------------------------------------

    /// Buffer a chunk of decoded output for a stream.
    ///
    /// Never fails: empty chunks are ignored, overflow evicts the oldest
    /// chunk, and overload is signalled through the flow gate rather than
    /// errors. The stream is created on first use.
    pub fn buffer_data(&mut self, stream: &str, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let now = self.clock.now_ms();
        let handle = self.ensure_stream(stream, now);
        self.total_bytes_in += chunk.len() as u64;

        let mut immediate = false;
        let mut delay_ms = 0;
        if let Some(state) = self.streams.get_mut(handle) {
            state.stats.total_bytes += chunk.len() as u64;
            self.gate.note_inbound(&mut state.flow, chunk.len());
            if let Some(session) = state.recording.as_mut() {
                session.record(chunk, now, &self.recording_limits);
            }
            if let Some(evicted) = state.ring.push(chunk.to_string()) {
                tracing::debug!(
                    stream,
                    evicted_bytes = evicted.len(),
                    "buffer full, dropped oldest chunk"
                );
            }
            // A full ring or an oversized chunk bounds worst-case latency by
            // bypassing the timer entirely.
            immediate = state.ring.is_full()
                || chunk.len() >= self.config.immediate_flush_threshold_chars;
            if !immediate {
                let cadence = self.scheduler.decide(&state.stats, chunk.len(), now);
                delay_ms = self.scheduler.delay_ms(cadence);
            }
        }

        if immediate {
            self.flush_handle(handle);
            self.disarm_if_idle();
        } else {
            self.timer_interval_ms = Some(
                self.timer_interval_ms
                    .map_or(delay_ms, |current| current.min(delay_ms)),
            );
        }
    }

    // -- Flushing ---------------------------------------------------------------

    /// Synchronously flush one stream's pending data to all handlers.
    pub fn flush_terminal(&mut self, stream: &str) {
        if let Some(handle) = self.streams.lookup(stream) {
            self.flush_handle(handle);
            self.disarm_if_idle();
        }
    }

    /// Synchronously flush every stream's pending data.
    pub fn flush_all(&mut self) {
        for handle in self.streams.handles() {
            self.flush_handle(handle);
        }
        self.disarm_if_idle();
    }

    /// Shared-timer tick: flush every pending stream and disarm.
    ///
    /// The timer re-arms lazily on the next `buffer_data`.
    pub fn tick(&mut self) {
        for handle in self.streams.handles() {
            self.flush_handle(handle);
        }
        self.timer_interval_ms = None;
    }

    /// The interval the next tick should run at, while armed.
    #[must_use]
    pub fn timer_interval_ms(&self) -> Option<u64> {
        self.timer_interval_ms
    }

    /// Whether the shared timer is currently armed.
    #[must_use]
    pub fn timer_armed(&self) -> bool {
        self.timer_interval_ms.is_some()
    }

    fn flush_handle(&mut self, handle: StreamHandle) {
        let now = self.clock.now_ms();
        let Some((id, state)) = self.streams.get_full_mut(handle) else {
            return;
        };
        if state.ring.is_empty() {
            return;
        }
        let data = state.ring.flush();
        self.scheduler.on_flush(&mut state.stats, now);
        self.total_flushes += 1;
        for (handler_id, handler) in &mut self.handlers {
            if let Err(error) = handler(id, &data) {
                tracing::warn!(
                    stream = id,
                    handler = handler_id.0,
                    %error,
                    "flush handler failed"
                );
            }
        }
    }

    fn disarm_if_idle(&mut self) {
        if self.timer_interval_ms.is_some()
            && !self.streams.iter().any(|(_, state)| !state.ring.is_empty())
        {
            self.timer_interval_ms = None;
        }
    }

    // -- Lifecycle --------------------------------------------------------------

    /// Flush a stream's remaining data, then delete all its state.
    pub fn remove_terminal(&mut self, stream: &str) {
        let Some(handle) = self.streams.lookup(stream) else {
            return;
        };
        self.flush_handle(handle);
        self.streams.remove(stream);
        self.disarm_if_idle();
        tracing::debug!(stream, "terminal removed");
    }

    /// Discard a stream's pending chunks without delivering them.
    pub fn clear_buffer(&mut self, stream: &str) {
        if let Some(handle) = self.streams.lookup(stream) {
            if let Some(state) = self.streams.get_mut(handle) {
                state.ring.clear();
            }
            self.disarm_if_idle();
        }
    }

    /// Flush everything, stop the timer, and drop all state. Idempotent.
    pub fn dispose(&mut self) {
        self.flush_all();
        self.streams.clear();
        self.timer_interval_ms = None;
        tracing::debug!("buffer manager disposed");
    }

    /// Number of live streams.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    // -- Flow control -----------------------------------------------------------

    /// Credit characters the consumer has rendered for a stream.
    pub fn acknowledge_chars(&mut self, stream: &str, chars: usize) {
        if let Some(handle) = self.streams.lookup(stream) {
            if let Some(state) = self.streams.get_mut(handle) {
                self.gate.acknowledge(&mut state.flow, chars);
            }
        }
    }

    /// Whether the producer for this stream should be paused.
    #[must_use]
    pub fn should_pause_pty(&self, stream: &str) -> bool {
        self.streams
            .lookup(stream)
            .and_then(|handle| self.streams.get(handle))
            .is_some_and(|state| self.gate.should_pause(&state.flow))
    }

    /// Whether a paused producer for this stream may resume.
    #[must_use]
    pub fn should_resume_pty(&self, stream: &str) -> bool {
        self.streams
            .lookup(stream)
            .and_then(|handle| self.streams.get(handle))
            .is_none_or(|state| self.gate.should_resume(&state.flow))
    }

    /// Recommended granularity for batched acknowledgements.
    #[must_use]
    pub fn ack_batch_size(&self) -> usize {
        self.gate.ack_batch_size()
    }

    // -- Recording --------------------------------------------------------------

    /// Start (or resume) capturing a stream's output for replay.
    pub fn start_recording(&mut self, stream: &str, cols: u16, rows: u16) {
        let now = self.clock.now_ms();
        let handle = self.ensure_stream(stream, now);
        if let Some(state) = self.streams.get_mut(handle) {
            match state.recording.as_mut() {
                Some(session) => session.resume(),
                None => state.recording = Some(RecordingSession::new(cols, rows, now)),
            }
        }
    }

    /// Pause capture for a stream without discarding history.
    pub fn stop_recording(&mut self, stream: &str) {
        if let Some(session) = self.recording_mut(stream) {
            session.stop();
        }
    }

    /// Drop a stream's recording history entirely.
    pub fn clear_recording(&mut self, stream: &str) {
        if let Some(handle) = self.streams.lookup(stream) {
            if let Some(state) = self.streams.get_mut(handle) {
                state.recording = None;
            }
        }
    }

    /// Record a terminal resize against the stream's recording session.
    pub fn update_dimensions(&mut self, stream: &str, cols: u16, rows: u16) {
        if let Some(session) = self.recording_mut(stream) {
            session.update_dimensions(cols, rows);
        }
    }

    /// Reconstruct a bounded tail of a stream's recorded history.
    /// Returns `""` for unknown streams or streams without a recording.
    #[must_use]
    pub fn serialized_data(&self, stream: &str, opts: &SerializeOptions) -> String {
        self.recording(stream)
            .map_or_else(String::new, |session| session.serialized_data(opts))
    }

    /// Export a stream's full capture for replay.
    #[must_use]
    pub fn replay_event(&self, stream: &str) -> Option<ReplayEvent> {
        self.recording(stream).map(RecordingSession::replay_event)
    }

    fn recording(&self, stream: &str) -> Option<&RecordingSession> {
        self.streams
            .lookup(stream)
            .and_then(|handle| self.streams.get(handle))
            .and_then(|state| state.recording.as_ref())
    }

    fn recording_mut(&mut self, stream: &str) -> Option<&mut RecordingSession> {
        let handle = self.streams.lookup(stream)?;
        self.streams
            .get_mut(handle)
            .and_then(|state| state.recording.as_mut())
    }

    // -- Stats ------------------------------------------------------------------

    /// Manager-wide counters. Observability only.
    #[must_use]
    pub fn manager_stats(&self) -> ManagerStats {
        let mut buffered_chunks = 0;
        let mut buffered_bytes = 0;
        for (_, state) in self.streams.iter() {
            buffered_chunks += state.ring.len();
            buffered_bytes += state.ring.buffered_bytes();
        }
        ManagerStats {
            active_streams: self.streams.len(),
            timer_armed: self.timer_armed(),
            timer_interval_ms: self.timer_interval_ms,
            buffered_chunks,
            buffered_bytes,
            total_flushes: self.total_flushes,
            total_bytes_in: self.total_bytes_in,
            handler_count: self.handlers.len(),
        }
    }

    /// Per-stream counters. Observability only.
    #[must_use]
    pub fn terminal_stats(&self, stream: &str) -> Option<TerminalStats> {
        let state = self
            .streams
            .lookup(stream)
            .and_then(|handle| self.streams.get(handle))?;
        Some(TerminalStats {
            stream: stream.to_string(),
            ring: state.ring.stats(),
            flush: state.stats.clone(),
            flow: self.gate.stats(&state.flow),
            recording: state.recording.as_ref().map(RecordingSession::stats),
        })
    }

    /// Combined manager and per-stream counters.
    #[must_use]
    pub fn all_stats(&self) -> AllStats {
        let mut terminals: Vec<TerminalStats> = self
            .streams
            .iter()
            .map(|(id, state)| TerminalStats {
                stream: id.to_string(),
                ring: state.ring.stats(),
                flush: state.stats.clone(),
                flow: self.gate.stats(&state.flow),
                recording: state.recording.as_ref().map(RecordingSession::stats),
            })
            .collect();
        terminals.sort_by(|a, b| a.stream.cmp(&b.stream));
        AllStats {
            manager: self.manager_stats(),
            terminals,
        }
    }

    // -- Internal ---------------------------------------------------------------

    fn ensure_stream(&mut self, stream: &str, now_ms: u64) -> StreamHandle {
        if let Some(handle) = self.streams.lookup(stream) {
            return handle;
        }
        let state = StreamState {
            ring: ChunkRing::new(self.config.max_buffer_capacity),
            stats: StreamStats::new(now_ms, self.scheduler.normal_interval_ms()),
            flow: FlowState::new(),
            recording: None,
        };
        tracing::debug!(stream, "stream registered");
        self.streams.insert(stream, state)
    }
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("active_streams", &self.streams.len())
            .field("timer_interval_ms", &self.timer_interval_ms)
            .field("total_flushes", &self.total_flushes)
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

// =============================================================================
// Stats (serializable)
// =============================================================================

/// Serializable manager-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Live stream count.
    pub active_streams: usize,
    /// Whether the shared timer is armed.
    pub timer_armed: bool,
    /// Armed interval, if any.
    pub timer_interval_ms: Option<u64>,
    /// Chunks currently buffered across all streams.
    pub buffered_chunks: usize,
    /// Bytes currently buffered across all streams.
    pub buffered_bytes: usize,
    /// Flushes delivered since construction.
    pub total_flushes: u64,
    /// Bytes accepted since construction.
    pub total_bytes_in: u64,
    /// Registered flush handlers.
    pub handler_count: usize,
}

/// Serializable per-stream counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalStats {
    /// Stream ID.
    pub stream: String,
    /// Ring buffer counters.
    pub ring: ChunkRingStats,
    /// Flush cadence bookkeeping.
    pub flush: StreamStats,
    /// Flow-control counters.
    pub flow: FlowStats,
    /// Recording counters, when a session exists.
    pub recording: Option<RecordingStats>,
}

/// Serializable combined snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllStats {
    /// Manager-wide counters.
    pub manager: ManagerStats,
    /// Per-stream counters, sorted by stream ID.
    pub terminals: Vec<TerminalStats>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, String)>>>;

    fn manager_with_capture(config: EngineConfig) -> (BufferManager, Captured, ManualClock) {
        let clock = ManualClock::new();
        let mut manager =
            BufferManager::with_clock(config, clock.clone()).expect("config should validate");
        let seen: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.add_flush_handler(Box::new(move |stream, data| {
            sink.lock()
                .expect("lock")
                .push((stream.to_string(), data.to_string()));
            Ok(())
        }));
        (manager, seen, clock)
    }

    fn flushed(seen: &Captured) -> Vec<(String, String)> {
        seen.lock().expect("lock").clone()
    }

    // -- Construction -----------------------------------------------------------

    #[test]
    fn invalid_config_rejected_at_construction() {
        let result = BufferManager::new(EngineConfig::default().with_buffer_capacity(0));
        assert!(result.is_err());
    }

    // -- Producer path ----------------------------------------------------------

    #[test]
    fn empty_chunk_is_ignored() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "");
        assert_eq!(manager.active_streams(), 0);
        assert!(!manager.timer_armed());
        manager.tick();
        assert!(flushed(&seen).is_empty());
    }

    #[test]
    fn buffered_chunks_flush_in_order_on_tick() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "hello ");
        manager.buffer_data("term-1", "world");
        assert!(manager.timer_armed());
        manager.tick();
        assert_eq!(
            flushed(&seen),
            vec![("term-1".to_string(), "hello world".to_string())]
        );
        assert!(!manager.timer_armed());
    }

    #[test]
    fn streams_are_independent() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("a", "1");
        manager.buffer_data("b", "2");
        manager.tick();
        let mut results = flushed(&seen);
        results.sort();
        assert_eq!(
            results,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn oversized_chunk_flushes_immediately() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        let big = "x".repeat(1024);
        manager.buffer_data("term-1", &big);
        assert_eq!(flushed(&seen).len(), 1);
        assert_eq!(flushed(&seen)[0].1.len(), 1024);
        // Nothing left pending, so the timer never needed to stay armed.
        assert!(!manager.timer_armed());
    }

    #[test]
    fn full_ring_flushes_immediately() {
        let config = EngineConfig::default().with_buffer_capacity(3);
        let (mut manager, seen, _clock) = manager_with_capture(config);
        manager.buffer_data("term-1", "a");
        manager.buffer_data("term-1", "b");
        assert!(flushed(&seen).is_empty());
        // The third chunk fills the ring and triggers an immediate flush,
        // before anything can be evicted.
        manager.buffer_data("term-1", "c");
        assert_eq!(
            flushed(&seen),
            vec![("term-1".to_string(), "abc".to_string())]
        );
    }

    // -- Timer contract ---------------------------------------------------------

    #[test]
    fn timer_narrows_to_fastest_pending_cadence() {
        let (mut manager, _seen, clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("busy", "warmup");
        manager.tick();
        clock.advance(500);

        manager.buffer_data("slow", "hi");
        assert_eq!(manager.timer_interval_ms(), Some(16));
        // A large chunk on another stream narrows the shared interval.
        manager.buffer_data("busy", &"y".repeat(200));
        assert_eq!(manager.timer_interval_ms(), Some(8));
        // A later normal-cadence chunk cannot widen it back.
        manager.buffer_data("slow", "again");
        assert_eq!(manager.timer_interval_ms(), Some(8));
    }

    #[test]
    fn burst_arms_high_frequency_interval() {
        let (mut manager, _seen, clock) = manager_with_capture(EngineConfig::default());
        clock.set_ms(1_000);
        manager.buffer_data("term-1", &"z".repeat(60));
        // Stream created at the same instant: gap 0 < 100ms and chunk > 50
        // chars matches the burst signature.
        assert_eq!(manager.timer_interval_ms(), Some(4));
    }

    #[test]
    fn idle_stream_gets_normal_interval() {
        let (mut manager, _seen, clock) = manager_with_capture(EngineConfig::default());
        // A 10-char chunk on a quiet stream after >200ms of wall time gets
        // the comfortable UI cadence.
        clock.set_ms(250);
        manager.buffer_data("term-1", "0123456789");
        assert_eq!(manager.timer_interval_ms(), Some(16));
    }

    #[test]
    fn tick_with_no_data_disarms() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "a");
        manager.flush_terminal("term-1");
        // Explicit flush already drained the stream; the timer disarmed.
        assert!(!manager.timer_armed());
        manager.tick();
        assert!(!manager.timer_armed());
    }

    // -- Explicit flush and lifecycle -------------------------------------------

    #[test]
    fn flush_terminal_delivers_synchronously() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "data");
        manager.flush_terminal("term-1");
        assert_eq!(flushed(&seen).len(), 1);
        // Flushing again without new data delivers nothing.
        manager.flush_terminal("term-1");
        assert_eq!(flushed(&seen).len(), 1);
    }

    #[test]
    fn flush_all_covers_every_stream() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("a", "1");
        manager.buffer_data("b", "2");
        manager.flush_all();
        assert_eq!(flushed(&seen).len(), 2);
        assert!(!manager.timer_armed());
    }

    #[test]
    fn remove_terminal_flushes_then_deletes() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "leftover");
        manager.remove_terminal("term-1");
        assert_eq!(
            flushed(&seen),
            vec![("term-1".to_string(), "leftover".to_string())]
        );
        assert_eq!(manager.active_streams(), 0);
        assert!(manager.terminal_stats("term-1").is_none());
        // Unknown stream: no-op.
        manager.remove_terminal("term-1");
    }

    #[test]
    fn clear_buffer_discards_without_delivery() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "secret");
        manager.clear_buffer("term-1");
        manager.tick();
        assert!(flushed(&seen).is_empty());
        assert!(!manager.timer_armed());
    }

    #[test]
    fn dispose_flushes_everything_and_is_idempotent() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("a", "1");
        manager.buffer_data("b", "2");
        manager.dispose();
        assert_eq!(flushed(&seen).len(), 2);
        assert_eq!(manager.active_streams(), 0);
        assert!(!manager.timer_armed());

        manager.dispose();
        assert_eq!(flushed(&seen).len(), 2);
    }

    // -- Handlers ---------------------------------------------------------------

    #[test]
    fn failing_handler_does_not_block_others() {
        let (mut manager, seen, _clock) = manager_with_capture(EngineConfig::default());
        // Register a failing handler ahead of a second recorder.
        let id = manager.add_flush_handler(Box::new(|_, _| {
            Err(Error::handler("renderer disconnected"))
        }));
        let late: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&late);
        manager.add_flush_handler(Box::new(move |stream, data| {
            sink.lock()
                .expect("lock")
                .push((stream.to_string(), data.to_string()));
            Ok(())
        }));

        manager.buffer_data("term-1", "once");
        manager.flush_terminal("term-1");

        // Every registered handler saw the flush exactly once.
        assert_eq!(flushed(&seen).len(), 1);
        assert_eq!(late.lock().expect("lock").len(), 1);
        // Buffer state survived the failure.
        manager.buffer_data("term-1", "again");
        manager.flush_terminal("term-1");
        assert_eq!(flushed(&seen).len(), 2);

        assert!(manager.remove_flush_handler(id));
        assert!(!manager.remove_flush_handler(id));
    }

    // -- Flow control -----------------------------------------------------------

    #[test]
    fn flow_advice_through_manager() {
        let config = EngineConfig::default().with_watermarks(100, 20);
        let (mut manager, _seen, _clock) = manager_with_capture(config);
        manager.buffer_data("term-1", &"x".repeat(150));
        assert!(manager.should_pause_pty("term-1"));
        assert!(!manager.should_resume_pty("term-1"));

        manager.acknowledge_chars("term-1", 100);
        assert!(!manager.should_pause_pty("term-1"));
        assert!(!manager.should_resume_pty("term-1"));

        manager.acknowledge_chars("term-1", 40);
        assert!(manager.should_resume_pty("term-1"));
    }

    #[test]
    fn flow_queries_on_unknown_stream_are_neutral() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        assert!(!manager.should_pause_pty("ghost"));
        assert!(manager.should_resume_pty("ghost"));
        // Unknown-stream acks are silently dropped.
        manager.acknowledge_chars("ghost", 1_000);
        assert_eq!(manager.active_streams(), 0);
    }

    // -- Recording --------------------------------------------------------------

    #[test]
    fn recording_taps_buffered_data() {
        let (mut manager, _seen, clock) = manager_with_capture(EngineConfig::default());
        manager.start_recording("term-1", 80, 24);
        clock.advance(50);
        manager.buffer_data("term-1", "captured");
        manager.buffer_data("other", "not captured");

        let replay = manager.replay_event("term-1").expect("session should exist");
        assert_eq!(replay.events.len(), 1);
        assert_eq!(replay.events[0].data, "captured");
        assert_eq!(replay.events[0].offset_ms, 50);
        assert!(manager.replay_event("other").is_none());
    }

    #[test]
    fn stop_recording_keeps_history() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.start_recording("term-1", 80, 24);
        manager.buffer_data("term-1", "kept");
        manager.stop_recording("term-1");
        manager.buffer_data("term-1", "dropped");

        let replay = manager.replay_event("term-1").expect("session should exist");
        assert_eq!(replay.events.len(), 1);

        manager.start_recording("term-1", 80, 24);
        manager.buffer_data("term-1", "resumed");
        let replay = manager.replay_event("term-1").expect("session should exist");
        assert_eq!(replay.events.len(), 2);
    }

    #[test]
    fn dimension_updates_reach_the_session() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.start_recording("term-1", 80, 24);
        manager.buffer_data("term-1", "a");
        manager.update_dimensions("term-1", 132, 43);
        let replay = manager.replay_event("term-1").expect("session should exist");
        assert_eq!((replay.events[0].cols, replay.events[0].rows), (132, 43));
        // No session, no panic.
        manager.update_dimensions("ghost", 1, 1);
    }

    #[test]
    fn serialized_data_bounded_by_lines() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.start_recording("term-1", 80, 24);
        manager.buffer_data("term-1", "one\n");
        manager.buffer_data("term-1", "two\n");
        manager.buffer_data("term-1", "three\n");

        let tail =
            manager.serialized_data("term-1", &SerializeOptions::default().with_line_limit(1));
        assert_eq!(tail, "three\n");
        assert_eq!(
            manager.serialized_data("ghost", &SerializeOptions::default()),
            ""
        );
    }

    #[test]
    fn clear_recording_drops_history() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.start_recording("term-1", 80, 24);
        manager.buffer_data("term-1", "gone");
        manager.clear_recording("term-1");
        assert!(manager.replay_event("term-1").is_none());
    }

    // -- Stats ------------------------------------------------------------------

    #[test]
    fn stats_reflect_buffered_state() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("a", "12345");
        manager.buffer_data("b", "678");

        let stats = manager.manager_stats();
        assert_eq!(stats.active_streams, 2);
        assert!(stats.timer_armed);
        assert_eq!(stats.buffered_chunks, 2);
        assert_eq!(stats.buffered_bytes, 8);
        assert_eq!(stats.total_bytes_in, 8);
        assert_eq!(stats.handler_count, 1);

        manager.tick();
        let stats = manager.manager_stats();
        assert_eq!(stats.buffered_chunks, 0);
        assert_eq!(stats.total_flushes, 2);
    }

    #[test]
    fn terminal_stats_for_one_stream() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("term-1", "abc");
        let stats = manager.terminal_stats("term-1").expect("stream should exist");
        assert_eq!(stats.stream, "term-1");
        assert_eq!(stats.ring.len, 1);
        assert_eq!(stats.flush.total_bytes, 3);
        assert_eq!(stats.flow.unacknowledged_chars, 3);
        assert!(stats.recording.is_none());
        assert!(manager.terminal_stats("ghost").is_none());
    }

    #[test]
    fn all_stats_serializes() {
        let (mut manager, _seen, _clock) = manager_with_capture(EngineConfig::default());
        manager.buffer_data("b", "2");
        manager.buffer_data("a", "1");
        let all = manager.all_stats();
        assert_eq!(all.terminals.len(), 2);
        assert_eq!(all.terminals[0].stream, "a");
        let json = serde_json::to_string(&all).expect("should serialize");
        assert!(json.contains("\"active_streams\":2"));
    }
}
