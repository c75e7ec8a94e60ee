//! Tokio realization of the shared flush timer.
//!
//! The manager itself never sleeps: it only publishes the interval the
//! next tick should run at. This module owns the one task that turns that
//! contract into wall-clock behavior: it sleeps for the armed interval,
//! calls [`BufferManager::tick`], and parks on a [`Notify`] while no
//! stream holds data. Producers go through [`FlushDriver::buffer_data`],
//! which wakes the loop whenever arming or narrowing changes the deadline.
//!
//! All state lives behind one mutex, so producer calls and timer ticks
//! serialize exactly as the engine's single-logical-thread model requires.
//! Tests drive the loop with tokio's paused virtual time instead of real
//! delays.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::manager::BufferManager;

fn lock(manager: &Mutex<BufferManager>) -> MutexGuard<'_, BufferManager> {
    manager.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a spawned flush loop.
pub struct FlushDriver {
    manager: Arc<Mutex<BufferManager>>,
    wake: Arc<Notify>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl FlushDriver {
    /// Spawn the flush loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(manager: BufferManager) -> Self {
        let manager = Arc::new(Mutex::new(manager));
        let wake = Arc::new(Notify::new());
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(run_loop(
            Arc::clone(&manager),
            Arc::clone(&wake),
            Arc::clone(&shutdown),
        ));
        Self {
            manager,
            wake,
            shutdown,
            task,
        }
    }

    /// Buffer a chunk, waking the loop if the armed deadline changed.
    pub fn buffer_data(&self, stream: &str, chunk: &str) {
        let mut guard = lock(&self.manager);
        let before = guard.timer_interval_ms();
        guard.buffer_data(stream, chunk);
        let after = guard.timer_interval_ms();
        drop(guard);
        if after != before {
            self.wake.notify_one();
        }
    }

    /// Run a closure against the manager, for everything that is not the
    /// producer hot path: flow-control queries, recording, explicit
    /// flushes, stats.
    pub fn with_manager<R>(&self, f: impl FnOnce(&mut BufferManager) -> R) -> R {
        let result = {
            let mut guard = lock(&self.manager);
            f(&mut guard)
        };
        // The closure may have armed, narrowed, or drained the timer.
        self.wake.notify_one();
        result
    }

    /// Stop the loop and flush everything still pending.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "flush loop terminated abnormally");
        }
        lock(&self.manager).dispose();
    }
}

impl std::fmt::Debug for FlushDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushDriver").finish_non_exhaustive()
    }
}

async fn run_loop(manager: Arc<Mutex<BufferManager>>, wake: Arc<Notify>, shutdown: Arc<Notify>) {
    loop {
        let armed = lock(&manager).timer_interval_ms();
        match armed {
            Some(interval_ms) => {
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(interval_ms)) => {
                        lock(&manager).tick();
                    }
                    () = wake.notified() => {}
                    () = shutdown.notified() => break,
                }
            }
            None => {
                tokio::select! {
                    () = wake.notified() => {}
                    () = shutdown.notified() => break,
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
