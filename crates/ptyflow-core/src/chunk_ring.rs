//! Fixed-capacity ring of buffered output chunks.
//!
//! Each terminal stream owns one [`ChunkRing`]: a circular array of the
//! most recent text chunks awaiting flush. Push is O(1) and always
//! succeeds; when the ring is full the oldest chunk is evicted rather than
//! the new one rejected. That lossy overflow behavior is intentional:
//! under sustained overload bounded memory wins over completeness, and the
//! manager's immediate-flush threshold is sized to make overflow rare in
//! practice.
//!
//! Flushing concatenates the chunks in FIFO order, so delivery order
//! within a stream always matches push order.

use serde::{Deserialize, Serialize};

// =============================================================================
// ChunkRing
// =============================================================================

/// A fixed-capacity FIFO of text chunks with oldest-eviction on overflow.
///
/// # Example
///
/// ```ignore
/// let mut ring = ChunkRing::new(3);
/// ring.push("a".into());
/// ring.push("b".into());
/// ring.push("c".into());
/// ring.push("d".into()); // evicts "a"
/// assert_eq!(ring.flush(), "bcd");
/// ```
pub struct ChunkRing {
    slots: Vec<Option<String>>,
    capacity: usize,
    head: usize, // next write position
    len: usize,  // current number of chunks
    buffered_bytes: usize,
    total_pushed: u64,
    total_evicted: u64,
}

impl ChunkRing {
    /// Create a ring with the given chunk capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0. Capacity comes from
    /// [`EngineConfig`](crate::config::EngineConfig), which rejects zero at
    /// validation time.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(None);
        }
        Self {
            slots,
            capacity,
            head: 0,
            len: 0,
            buffered_bytes: 0,
            total_pushed: 0,
            total_evicted: 0,
        }
    }

    /// Push a chunk, evicting and returning the oldest if the ring is full.
    pub fn push(&mut self, chunk: String) -> Option<String> {
        let evicted = self.slots[self.head].take();
        self.buffered_bytes += chunk.len();
        self.slots[self.head] = Some(chunk);
        self.head = (self.head + 1) % self.capacity;
        self.total_pushed += 1;
        if self.len < self.capacity {
            self.len += 1;
            None
        } else {
            if let Some(old) = &evicted {
                self.buffered_bytes -= old.len();
                self.total_evicted += 1;
            }
            evicted
        }
    }

    /// Concatenate all chunks in FIFO order, clear the ring, and return the
    /// result. Returns `""` on an empty ring with no side effects.
    pub fn flush(&mut self) -> String {
        if self.len == 0 {
            return String::new();
        }
        let mut out = String::with_capacity(self.buffered_bytes);
        let start = self.oldest_index();
        for i in 0..self.len {
            let idx = (start + i) % self.capacity;
            if let Some(chunk) = self.slots[idx].take() {
                out.push_str(&chunk);
            }
        }
        self.head = 0;
        self.len = 0;
        self.buffered_bytes = 0;
        out
    }

    /// Concatenate all chunks in FIFO order without draining.
    #[must_use]
    pub fn peek(&self) -> String {
        let mut out = String::with_capacity(self.buffered_bytes);
        let start = self.oldest_index();
        for i in 0..self.len {
            let idx = (start + i) % self.capacity;
            if let Some(chunk) = &self.slots[idx] {
                out.push_str(chunk);
            }
        }
        out
    }

    /// Discard all buffered chunks without delivering them.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
        self.buffered_bytes = 0;
    }

    /// Current number of buffered chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next push will evict.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Maximum chunk capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes across all buffered chunks.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Total chunks ever pushed, including evicted ones.
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Total chunks lost to overflow eviction.
    #[must_use]
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }

    fn oldest_index(&self) -> usize {
        if self.len < self.capacity {
            // Not yet wrapped: slot 0 is the oldest. After a flush/clear the
            // ring restarts at 0, so this also covers the post-drain state.
            self.head - self.len
        } else {
            self.head
        }
    }
}

impl std::fmt::Debug for ChunkRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRing")
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("buffered_bytes", &self.buffered_bytes)
            .field("total_pushed", &self.total_pushed)
            .field("total_evicted", &self.total_evicted)
            .finish()
    }
}

// =============================================================================
// ChunkRingStats (serializable)
// =============================================================================

/// Serializable snapshot of a ring's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRingStats {
    /// Maximum chunk capacity.
    pub capacity: usize,
    /// Current number of buffered chunks.
    pub len: usize,
    /// Total bytes across buffered chunks.
    pub buffered_bytes: usize,
    /// Total chunks ever pushed.
    pub total_pushed: u64,
    /// Total chunks lost to overflow eviction.
    pub total_evicted: u64,
}

impl ChunkRing {
    /// Get a snapshot of the ring's counters.
    #[must_use]
    pub fn stats(&self) -> ChunkRingStats {
        ChunkRingStats {
            capacity: self.capacity,
            len: self.len,
            buffered_bytes: self.buffered_bytes,
            total_pushed: self.total_pushed,
            total_evicted: self.total_evicted,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
