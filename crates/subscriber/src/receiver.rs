//! ConflatingReceiver - poll, decode, overwrite
//!
//! Each poll waits at most `poll_timeout` for one message. A decoded frame
//! unconditionally replaces the cached value for its topic; a frame that
//! fails to decode is dropped and the previous value stays.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContractError, ElementKind, FrameSource, LatencySample, SubscriberSettings, TopicKey,
    WireMessage,
};
use frame_codec::FrameCodec;
use observability::LatencyStats;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::cache::LatestValueCache;

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Longest wait for one message when nothing is buffered
    pub poll_timeout: Duration,
    /// Element kind carried by the stream
    pub element_kind: ElementKind,
    /// Recent latency samples kept for percentiles
    pub latency_window: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::from_settings(&SubscriberSettings::default(), ElementKind::default())
    }
}

impl ReceiverConfig {
    pub fn from_settings(settings: &SubscriberSettings, element_kind: ElementKind) -> Self {
        Self {
            poll_timeout: Duration::from_millis(settings.poll_timeout_ms),
            element_kind,
            latency_window: settings.latency_window,
        }
    }
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A frame was decoded into the cache
    Updated(TopicKey),
    /// A frame arrived but failed to decode
    Rejected,
    /// Nothing ready
    Idle,
    /// The transport is closed; nothing more will arrive
    Closed,
}

/// Result of one bounded drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Topics updated, in arrival order (a topic may repeat)
    pub updated: Vec<TopicKey>,
    /// Frames dropped by decode errors
    pub rejected: usize,
    /// Polls performed
    pub polled: usize,
    /// Transport reported closed during the drain
    pub closed: bool,
}

impl DrainStats {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    fn record(&mut self, outcome: &PollOutcome) {
        self.polled += 1;
        match outcome {
            PollOutcome::Updated(topic) => self.updated.push(topic.clone()),
            PollOutcome::Rejected => self.rejected += 1,
            PollOutcome::Idle => {}
            PollOutcome::Closed => self.closed = true,
        }
    }
}

/// Receive-side counters
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    received: AtomicU64,
    decoded: AtomicU64,
    rejected: AtomicU64,
    transport_errors: AtomicU64,
}

impl ReceiverMetrics {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ReceiverMetricsSnapshot {
        ReceiverMetricsSnapshot {
            received: self.received(),
            decoded: self.decoded(),
            rejected: self.rejected(),
            transport_errors: self.transport_errors(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverMetricsSnapshot {
    pub received: u64,
    pub decoded: u64,
    pub rejected: u64,
    pub transport_errors: u64,
}

/// Decodes frames from a [`FrameSource`] into a [`LatestValueCache`]
pub struct ConflatingReceiver<S: FrameSource> {
    source: S,
    codec: FrameCodec,
    config: ReceiverConfig,
    cache: Arc<LatestValueCache>,
    metrics: Arc<ReceiverMetrics>,
    latency: LatencyStats,
    closed: bool,
}

impl<S: FrameSource> ConflatingReceiver<S> {
    pub fn new(source: S, config: ReceiverConfig) -> Self {
        Self::with_cache(source, config, Arc::new(LatestValueCache::new()))
    }

    /// Receiver writing into an existing cache
    pub fn with_cache(source: S, config: ReceiverConfig, cache: Arc<LatestValueCache>) -> Self {
        Self {
            source,
            codec: FrameCodec::new(config.element_kind),
            latency: LatencyStats::new(config.latency_window),
            config,
            cache,
            metrics: Arc::new(ReceiverMetrics::default()),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &Arc<LatestValueCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<ReceiverMetrics> {
        &self.metrics
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Messages the transport already holds
    pub fn ready_len(&self) -> usize {
        self.source.ready_len()
    }

    /// Wait up to `timeout` for one message and apply it
    pub async fn poll_once(&mut self, timeout: Duration) -> PollOutcome {
        if self.closed {
            return PollOutcome::Closed;
        }
        let result = self.source.recv_timeout(timeout).await;
        self.apply(result)
    }

    /// Apply one already-buffered message, never waiting
    pub fn try_poll(&mut self) -> PollOutcome {
        if self.closed {
            return PollOutcome::Closed;
        }
        let result = self.source.try_recv();
        self.apply(result)
    }

    /// One receive pass
    ///
    /// Polls once (waiting up to `poll_timeout` if nothing is buffered), then
    /// applies the messages that were already buffered at that point without
    /// waiting again. Never waits for messages that have not arrived.
    pub async fn receive(&mut self) -> DrainStats {
        let mut stats = DrainStats::default();

        let mut budget = self.source.ready_len();
        if budget == 0 {
            let outcome = self.poll_once(self.config.poll_timeout).await;
            stats.record(&outcome);
            if matches!(outcome, PollOutcome::Idle | PollOutcome::Closed) {
                return stats;
            }
            budget = self.source.ready_len();
        }

        for _ in 0..budget {
            let outcome = self.try_poll();
            stats.record(&outcome);
            if matches!(outcome, PollOutcome::Idle | PollOutcome::Closed) {
                break;
            }
        }
        stats
    }

    /// Receive until cancelled or the transport closes
    #[instrument(name = "receiver_run", skip_all, fields(source = %self.source.name()))]
    pub async fn run(&mut self, cancel: CancellationToken) -> ReceiverMetricsSnapshot {
        info!("Receiver loop started");
        loop {
            let stats = tokio::select! {
                _ = cancel.cancelled() => break,
                stats = self.receive() => stats,
            };
            if stats.closed {
                info!("Transport closed, receiver loop ending");
                break;
            }
            if !stats.updated.is_empty() {
                observability::record_cache_topics(self.cache.len());
            }
        }
        let snapshot = self.metrics.snapshot();
        debug!(?snapshot, "Receiver loop stopped");
        snapshot
    }

    /// Close the underlying transport
    pub async fn close(&mut self) -> Result<(), ContractError> {
        self.closed = true;
        self.source.close().await
    }

    pub fn into_source(self) -> S {
        self.source
    }

    fn apply(&mut self, result: Result<Option<WireMessage>, ContractError>) -> PollOutcome {
        match result {
            Ok(Some(message)) => self.handle_message(message),
            Ok(None) => PollOutcome::Idle,
            Err(e) if e.is_closed() => {
                debug!(source = %self.source.name(), "Transport closed");
                self.closed = true;
                PollOutcome::Closed
            }
            Err(e) => {
                self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                warn!(source = %self.source.name(), error = %e, "Receive failed");
                PollOutcome::Idle
            }
        }
    }

    fn handle_message(&mut self, message: WireMessage) -> PollOutcome {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);

        if let Some(sample) = LatencySample::observe(&message) {
            self.latency.push(&sample);
            observability::record_latency(&sample);
        }

        match self.codec.decode(&message.frame) {
            Ok(frame) => {
                self.metrics.decoded.fetch_add(1, Ordering::Relaxed);
                observability::record_frame_received(&message.topic, message.frame.len());
                let sequence = self.cache.store(message.topic.clone(), frame);
                trace!(topic = %message.topic, sequence, "Cache updated");
                PollOutcome::Updated(message.topic)
            }
            Err(e) => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                observability::record_decode_error(e.kind());
                debug!(topic = %message.topic, error = %e, "Frame dropped, keeping previous value");
                PollOutcome::Rejected
            }
        }
    }
}
