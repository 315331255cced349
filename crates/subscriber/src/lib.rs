//! # Subscriber
//!
//! Conflating receive path: transport → decode → latest value per topic.
//!
//! ```text
//! FrameSource ──poll──▶ ConflatingReceiver ──store──▶ LatestValueCache
//!                                                          │ snapshot
//!                       RenderTicker ──tick──▶ StreamAggregator::drain + snapshot
//! ```
//!
//! The cache holds exactly one frame per topic, so memory stays bounded by
//! the number of topics no matter how fast the producer runs. Readers take
//! lock-free snapshots and never block the receiver.

mod aggregator;
mod cache;
mod receiver;
mod ticker;

pub use aggregator::StreamAggregator;
pub use cache::{CacheEntry, CacheSnapshot, LatestValueCache};
pub use receiver::{
    ConflatingReceiver, DrainStats, PollOutcome, ReceiverConfig, ReceiverMetrics,
    ReceiverMetricsSnapshot,
};
pub use ticker::RenderTicker;
