//! Publisher - owns the queue, the sender task and the transport

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use contracts::{
    ArrayFrame, ElementKind, EncodeError, FrameSink, PublisherSettings, TopicKey, WireMessage,
};
use frame_codec::FrameCodec;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::PublisherError;
use crate::metrics::PublisherMetrics;
use crate::queue::{PendingFrame, PublishOutcome, PublishQueue};

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Distinct topics that may be pending at once
    pub max_pending_topics: usize,
    /// Upper bound on `stop()` waiting for the sender task
    pub stop_timeout: Duration,
    /// Element kind carried by this stream
    pub element_kind: ElementKind,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_pending_topics: 64,
            stop_timeout: Duration::from_secs(1),
            element_kind: ElementKind::F32,
        }
    }
}

impl PublisherConfig {
    pub fn from_settings(settings: &PublisherSettings, element_kind: ElementKind) -> Self {
        Self {
            max_pending_topics: settings.max_pending_topics,
            stop_timeout: Duration::from_millis(settings.stop_timeout_ms),
            element_kind,
        }
    }
}

/// Cheap, cloneable producer side of a [`Publisher`]
///
/// `publish` is synchronous and can be called from plain OS threads.
#[derive(Debug, Clone)]
pub struct PublisherHandle {
    codec: FrameCodec,
    queue: Arc<PublishQueue>,
    metrics: Arc<PublisherMetrics>,
}

impl PublisherHandle {
    /// Enqueue `frame` for `topic` (`None` = the anonymous slot)
    ///
    /// Never waits on the transport.
    ///
    /// # Errors
    /// The frame cannot travel on this stream (rank above the codec maximum,
    /// or a different element kind). Queue and sender state are untouched.
    pub fn publish(
        &self,
        topic: Option<TopicKey>,
        frame: ArrayFrame,
    ) -> Result<PublishOutcome, EncodeError> {
        self.codec.check(&frame)?;

        let topic = TopicKey::from_option(topic);
        let outcome = self.queue.push(topic.clone(), frame);
        match outcome {
            PublishOutcome::Queued => self.metrics.inc_published(),
            PublishOutcome::Coalesced => {
                self.metrics.inc_published();
                self.metrics.inc_coalesced();
            }
            PublishOutcome::Evicted => {
                self.metrics.inc_published();
                self.metrics.inc_evicted();
            }
            PublishOutcome::Closed => {
                trace!(topic = %topic, "Publisher stopped, frame discarded");
            }
        }
        self.metrics.set_queue_len(self.queue.len());
        observability::record_frame_published(&topic, outcome_label(outcome));
        Ok(outcome)
    }

    pub fn metrics(&self) -> &Arc<PublisherMetrics> {
        &self.metrics
    }
}

fn outcome_label(outcome: PublishOutcome) -> &'static str {
    match outcome {
        PublishOutcome::Queued => "queued",
        PublishOutcome::Coalesced => "coalesced",
        PublishOutcome::Evicted => "evicted",
        PublishOutcome::Closed => "closed",
    }
}

enum Lifecycle<S> {
    Idle(S),
    Running(JoinHandle<S>),
    Stopped,
}

/// Publish Queue + sender task over one [`FrameSink`]
pub struct Publisher<S: FrameSink + 'static> {
    name: String,
    config: PublisherConfig,
    handle: PublisherHandle,
    cancel: CancellationToken,
    lifecycle: Lifecycle<S>,
}

impl<S: FrameSink + 'static> Publisher<S> {
    pub fn new(sink: S, config: PublisherConfig) -> Self {
        let handle = PublisherHandle {
            codec: FrameCodec::new(config.element_kind),
            queue: Arc::new(PublishQueue::new(config.max_pending_topics)),
            metrics: Arc::new(PublisherMetrics::new()),
        };
        Self {
            name: sink.name().to_string(),
            config,
            handle,
            cancel: CancellationToken::new(),
            lifecycle: Lifecycle::Idle(sink),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Producer handle for other threads
    pub fn handle(&self) -> PublisherHandle {
        self.handle.clone()
    }

    pub fn metrics(&self) -> &Arc<PublisherMetrics> {
        self.handle.metrics()
    }

    /// See [`PublisherHandle::publish`]
    pub fn publish(
        &self,
        topic: Option<TopicKey>,
        frame: ArrayFrame,
    ) -> Result<PublishOutcome, EncodeError> {
        self.handle.publish(topic, frame)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running(_))
    }

    /// Spawn the sender task. Must be called inside a Tokio runtime.
    ///
    /// Frames published before `start` are kept and sent once it runs.
    #[instrument(name = "publisher_start", skip(self), fields(sink = %self.name))]
    pub fn start(&mut self) -> Result<(), PublisherError> {
        let sink = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(sink) => sink,
            running @ Lifecycle::Running(_) => {
                self.lifecycle = running;
                return Err(PublisherError::AlreadyStarted);
            }
            Lifecycle::Stopped => return Err(PublisherError::Stopped),
        };

        let task = tokio::spawn(sender_loop(
            sink,
            self.handle.codec,
            Arc::clone(&self.handle.queue),
            Arc::clone(&self.handle.metrics),
            self.cancel.clone(),
            self.name.clone(),
        ));
        self.lifecycle = Lifecycle::Running(task);

        info!(
            sink = %self.name,
            element_kind = %self.config.element_kind,
            max_pending_topics = self.config.max_pending_topics,
            "Publisher started"
        );
        Ok(())
    }

    /// Stop the sender task and close the transport
    ///
    /// Returns within roughly `stop_timeout`; a sender that overruns is
    /// aborted and its transport handle dropped. Pending frames are discarded.
    #[instrument(name = "publisher_stop", skip(self), fields(sink = %self.name))]
    pub async fn stop(&mut self) -> Result<(), PublisherError> {
        self.cancel.cancel();
        self.handle.queue.close();
        self.handle.metrics.set_queue_len(0);

        let sink = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(sink) => Some(sink),
            Lifecycle::Running(mut task) => {
                match tokio::time::timeout(self.config.stop_timeout, &mut task).await {
                    Ok(Ok(sink)) => Some(sink),
                    Ok(Err(e)) => {
                        error!(sink = %self.name, error = ?e, "Sender task panicked");
                        None
                    }
                    Err(_) => {
                        warn!(
                            sink = %self.name,
                            timeout_ms = self.config.stop_timeout.as_millis() as u64,
                            "Sender task did not stop in time, aborting"
                        );
                        task.abort();
                        None
                    }
                }
            }
            Lifecycle::Stopped => return Ok(()),
        };

        if let Some(mut sink) = sink {
            sink.close().await?;
        }

        info!(sink = %self.name, metrics = %self.handle.metrics.snapshot(), "Publisher stopped");
        Ok(())
    }
}

impl<S: FrameSink + 'static> Drop for Publisher<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.queue.close();
    }
}

/// Sender task: wait for pending frames, encode, stamp, hand to the transport
#[instrument(name = "publisher_sender_loop", skip_all, fields(sink = %name))]
async fn sender_loop<S: FrameSink>(
    mut sink: S,
    codec: FrameCodec,
    queue: Arc<PublishQueue>,
    metrics: Arc<PublisherMetrics>,
    cancel: CancellationToken,
    name: String,
) -> S {
    debug!("Sender task started");
    let mut buffer = BytesMut::new();

    loop {
        let Some(PendingFrame { topic, frame }) = queue.pop() else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = queue.notified() => {}
            }
            continue;
        };
        metrics.set_queue_len(queue.len());
        observability::record_queue_depth(queue.len());

        if let Err(e) = codec.encode_into(&frame, &mut buffer) {
            metrics.inc_encode_failed();
            observability::record_encode_failure();
            error!(topic = %topic, error = %e, "Encode failed, frame dropped");
            buffer.clear();
            continue;
        }
        let message = WireMessage::new(topic, buffer.split().freeze()).stamped();

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = sink.send(message) => result,
        };
        match result {
            Ok(report) => {
                metrics.inc_sent();
                observability::record_send_report(&report);
                if report.has_drops() {
                    metrics.add_send_dropped(report.dropped);
                    trace!(dropped = report.dropped, "Subscriber queues full");
                }
            }
            Err(e) if e.is_closed() => {
                metrics.inc_send_failed();
                observability::record_send_failure();
                warn!(error = %e, "Transport closed, sender stopping");
                break;
            }
            Err(e) => {
                metrics.inc_send_failed();
                observability::record_send_failure();
                debug!(error = %e, "Send failed, frame dropped");
            }
        }
    }

    debug!("Sender task stopped");
    sink
}
