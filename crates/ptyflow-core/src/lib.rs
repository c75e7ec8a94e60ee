//! ptyflow-core: adaptive buffering and flow control for multiplexed
//! terminal output.
//!
//! A host process that renders many live pseudo-terminals feeds each
//! terminal's decoded output through one [`BufferManager`]. The engine
//! batches bursty, high-volume output into bounded-latency flushes, keeps
//! per-stream memory bounded with fixed-capacity ring buffers, and hands
//! hysteresis-based pause/resume advice back to the PTY layer.
//!
//! # Architecture
//!
//! ```text
//! PTY producer ──► BufferManager::buffer_data
//!                        │
//!        ┌───────────────┼──────────────────┐
//!        ▼               ▼                  ▼
//!   ChunkRing      FlowGate           RecordingSession
//!   (per stream)   (unacked chars)    (bounded replay capture)
//!        │
//!        ▼
//!   AdaptiveScheduler ──► shared timer (FlushDriver)
//!        │
//!        ▼
//!   flush handlers ──► rendering surface
//! ```
//!
//! Pty spawning, the rendering surface, persistence, and UI layout are the
//! host's concern; this crate is only the buffering engine between them.
//!
//! # Modules
//!
//! - `manager`: the orchestrator owning all per-stream state
//! - `chunk_ring`: fixed-capacity chunk FIFO with oldest-eviction
//! - `scheduler`: adaptive flush cadence from live per-stream statistics
//! - `flow_gate`: watermark hysteresis for producer pause/resume advice
//! - `recording`: size/time-bounded capture of stream history for replay
//! - `driver`: tokio task realizing the shared flush timer
//! - `stream_table`: dense arena keyed by integer handles
//! - `clock`: injectable time source (manual clock in tests)
//! - `config`: one options structure for the whole engine
//! - `logging`: optional tracing-subscriber setup for hosts
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod chunk_ring;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod flow_gate;
pub mod logging;
pub mod manager;
pub mod recording;
pub mod scheduler;
pub mod stream_table;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::EngineConfig;
pub use driver::FlushDriver;
pub use error::{Error, Result};
pub use manager::{BufferManager, FlushHandler, HandlerId};
pub use recording::{RecordedData, ReplayEvent, SerializeOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
