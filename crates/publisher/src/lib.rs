//! # Publisher
//!
//! Publish Queue + sender task.
//!
//! ## 架构
//!
//! ```text
//! producer threads ──publish()──▶ PublishQueue ──notify──▶ sender task ──▶ FrameSink
//!        (never block)          (one slot / topic)        (encode, stamp)   (drops on full)
//! ```
//!
//! ## 设计要点
//!
//! - `publish` 是同步函数，只持有一次短暂的互斥锁，从不等待下游
//! - 同一 topic 未发送的帧被新帧替换 (coalescing)
//! - 发送失败只计数和记录日志，不重试
//! - `stop()` 在 `stop_timeout` 内结束发送任务并关闭传输

mod error;
mod metrics;
mod publisher;
mod queue;

pub use error::PublisherError;
pub use metrics::{PublisherMetrics, PublisherMetricsSnapshot};
pub use publisher::{Publisher, PublisherConfig, PublisherHandle};
pub use queue::{PendingFrame, PublishOutcome, PublishQueue};
