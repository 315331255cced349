//! # Transport
//!
//! Best-effort pub/sub transport for encoded array frames.
//!
//! Provides:
//! - `TcpFramePublisher`: one bound endpoint, fan-out to N subscribers, bounded
//!   per-connection queue with drop-on-full
//! - `TcpFrameSubscriber`: connect + auto-reconnect, TCP keep-alive, conflating inbox
//! - `MemoryBus`: the same semantics in-process, for tests and single-process demos
//!
//! All of them implement the `FrameSink` / `FrameSource` contracts.

pub mod envelope;
pub mod inbox;
mod keepalive;
pub mod memory;
pub mod tcp_publisher;
pub mod tcp_subscriber;

pub use contracts::{FrameSink, FrameSource, InboxMode, KeepaliveConfig, WireMessage};
pub use envelope::EnvelopeError;
pub use inbox::{Inbox, InboxClosed, InboxStats, PushOutcome};
pub use memory::{MemoryBus, MemoryFrameSink, MemoryFrameSource};
pub use tcp_publisher::{TcpFramePublisher, TcpPublisherConfig};
pub use tcp_subscriber::{TcpFrameSubscriber, TcpSubscriberConfig};
