//! Watch-mode debouncing and rate limiting
//!
//! Per-path intelligent debouncer: an event opens a batch window; quiet
//! paths flush after the debounce delay, bursty batches flush when the
//! window closes or the batch cap is hit. A token-bucket rate limiter in
//! front drops event storms before they reach the queue. Batches for the
//! same file preserve FIFO order.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet time before a lone event flushes (default 300 ms)
    pub debounce_delay: Duration,
    /// Maximum age of a batch before it flushes (default 2 s)
    pub batch_window: Duration,
    /// Maximum files per batch (default 50)
    pub max_batch_size: usize,
    /// Token bucket refill rate (default 100 events/s)
    pub max_events_per_second: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(300),
            batch_window: Duration::from_secs(2),
            max_batch_size: 50,
            max_events_per_second: 100,
        }
    }
}

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Token bucket rate limiter.
pub struct RateLimiter {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_events_per_second: u32) -> Self {
        let capacity = max_events_per_second.max(1) as f64;
        Self {
            capacity,
            refill_per_second: capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token; false drops the event.
    pub fn should_allow(&self) -> bool {
        let mut state = self.state.lock();
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = Instant::now();

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            warn!("rate_limit_exceeded");
            false
        }
    }
}

struct PendingEvent {
    event: FileChangeEvent,
    /// When the latest event for this path arrived
    last_seen: Instant,
    /// When the first event of the current batch arrived
    batch_started: Instant,
    /// Arrival index, preserving FIFO order per flush
    sequence: u64,
}

/// Per-path debouncer with batch windows.
pub struct IntelligentDebouncer {
    config: WatchConfig,
    pending: Mutex<HashMap<PathBuf, PendingEvent>>,
    sequence: Mutex<u64>,
}

impl IntelligentDebouncer {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(HashMap::new()),
            sequence: Mutex::new(0),
        }
    }

    /// Record an event. Later events for the same path supersede earlier
    /// ones within the window (the latest kind wins).
    pub fn add_event(&self, event: FileChangeEvent) {
        let now = Instant::now();
        let sequence = {
            let mut seq = self.sequence.lock();
            *seq += 1;
            *seq
        };

        let mut pending = self.pending.lock();
        match pending.get_mut(&event.path) {
            Some(existing) => {
                existing.event = event;
                existing.last_seen = now;
                existing.sequence = sequence;
            }
            None => {
                pending.insert(
                    event.path.clone(),
                    PendingEvent {
                        event,
                        last_seen: now,
                        batch_started: now,
                        sequence,
                    },
                );
            }
        }
    }

    /// Drain everything ready to flush: paths quiet past the debounce
    /// delay or batches older than the window. Capped at max_batch_size,
    /// FIFO by arrival.
    pub fn drain_ready(&self) -> Vec<FileChangeEvent> {
        let now = Instant::now();
        let mut pending = self.pending.lock();

        let mut ready: Vec<(u64, PathBuf)> = pending
            .iter()
            .filter(|(_, p)| {
                now.duration_since(p.last_seen) >= self.config.debounce_delay
                    || now.duration_since(p.batch_started) >= self.config.batch_window
            })
            .map(|(path, p)| (p.sequence, path.clone()))
            .collect();

        ready.sort_by_key(|(seq, _)| *seq);
        ready.truncate(self.config.max_batch_size);

        let batch: Vec<FileChangeEvent> = ready
            .into_iter()
            .filter_map(|(_, path)| pending.remove(&path).map(|p| p.event))
            .collect();

        if !batch.is_empty() {
            debug!(batch_size = batch.len(), "debounce_batch_ready");
        }
        batch
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
