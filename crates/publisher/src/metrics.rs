//! Publisher metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared by the producer handles and the sender task
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    /// Entries pending in the queue
    queue_len: AtomicUsize,
    /// Accepted `publish` calls
    published: AtomicU64,
    /// Publishes that replaced an unsent frame of the same topic
    coalesced: AtomicU64,
    /// Pending frames dropped to admit a new topic
    evicted: AtomicU64,
    /// Frames handed to the transport
    sent: AtomicU64,
    /// Per-subscriber drops reported by the transport
    send_dropped: AtomicU64,
    /// Transport send errors
    send_failed: AtomicU64,
    /// Frames that failed to encode on the sender task
    encode_failed: AtomicU64,
}

impl PublisherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn inc_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn inc_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn send_dropped(&self) -> u64 {
        self.send_dropped.load(Ordering::Relaxed)
    }

    pub fn add_send_dropped(&self, n: usize) {
        self.send_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn send_failed(&self) -> u64 {
        self.send_failed.load(Ordering::Relaxed)
    }

    pub fn inc_send_failed(&self) {
        self.send_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encode_failed(&self) -> u64 {
        self.encode_failed.load(Ordering::Relaxed)
    }

    pub fn inc_encode_failed(&self) {
        self.encode_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PublisherMetricsSnapshot {
        PublisherMetricsSnapshot {
            queue_len: self.queue_len(),
            published: self.published(),
            coalesced: self.coalesced(),
            evicted: self.evicted(),
            sent: self.sent(),
            send_dropped: self.send_dropped(),
            send_failed: self.send_failed(),
            encode_failed: self.encode_failed(),
        }
    }
}

/// Snapshot of publisher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherMetricsSnapshot {
    pub queue_len: usize,
    pub published: u64,
    pub coalesced: u64,
    pub evicted: u64,
    pub sent: u64,
    pub send_dropped: u64,
    pub send_failed: u64,
    pub encode_failed: u64,
}

impl std::fmt::Display for PublisherMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "published={}, coalesced={}, evicted={}, sent={}, send_dropped={}, send_failed={}, pending={}",
            self.published,
            self.coalesced,
            self.evicted,
            self.sent,
            self.send_dropped,
            self.send_failed,
            self.queue_len
        )
    }
}
