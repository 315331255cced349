//! StreamAggregator - drain + snapshot for a caller-driven cadence
//!
//! No timing logic lives here. The caller decides when to tick (see
//! [`RenderTicker`](crate::RenderTicker)) and calls `drain()` then
//! `snapshot()` once per tick.

use std::sync::Arc;

use contracts::{ArrayFrame, ContractError, FrameSource, TopicKey};
use tracing::{debug, instrument};

use crate::cache::{CacheSnapshot, LatestValueCache};
use crate::receiver::{ConflatingReceiver, DrainStats};

pub struct StreamAggregator<S: FrameSource> {
    receiver: ConflatingReceiver<S>,
    expected_topics: Vec<TopicKey>,
}

impl<S: FrameSource> StreamAggregator<S> {
    /// `expected_topics` is only used to report which topics have not shown up
    pub fn new(receiver: ConflatingReceiver<S>, expected_topics: Vec<TopicKey>) -> Self {
        Self {
            receiver,
            expected_topics,
        }
    }

    /// Apply every frame buffered at call time
    ///
    /// Terminates even under a producer that outruns the loop: frames that
    /// arrive during the drain wait for the next call.
    #[instrument(name = "aggregator_drain", skip(self), level = "trace")]
    pub async fn drain(&mut self) -> DrainStats {
        let stats = self.receiver.receive().await;
        observability::record_drain(stats.updated_count(), stats.rejected);
        if !stats.updated.is_empty() {
            observability::record_cache_topics(self.receiver.cache().len());
        }
        stats
    }

    /// Current topic → latest frame view
    pub fn snapshot(&self) -> CacheSnapshot {
        self.receiver.cache().snapshot()
    }

    pub fn latest(&self, topic: &str) -> Option<Arc<ArrayFrame>> {
        self.receiver.cache().get(topic).map(|entry| entry.frame)
    }

    pub fn expected_topics(&self) -> &[TopicKey] {
        &self.expected_topics
    }

    /// Expected topics with no frame yet
    pub fn missing_topics(&self) -> Vec<TopicKey> {
        let snapshot = self.snapshot();
        self.expected_topics
            .iter()
            .filter(|topic| !snapshot.contains(topic.as_str()))
            .cloned()
            .collect()
    }

    pub fn cache(&self) -> &Arc<LatestValueCache> {
        self.receiver.cache()
    }

    pub fn receiver(&self) -> &ConflatingReceiver<S> {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut ConflatingReceiver<S> {
        &mut self.receiver
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }

    pub async fn close(&mut self) -> Result<(), ContractError> {
        debug!(source = %self.receiver.name(), "Closing aggregator");
        self.receiver.close().await
    }
}
