//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the array stream.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Data Model
//! - [`ArrayFrame`]: one immutable n-dimensional array (rank, dims, element kind, row-major payload)
//! - [`TopicKey`]: logical sub-stream name; the empty key is the anonymous single-stream slot
//! - [`WireMessage`]: one transport message (topic part + frame part)
//!
//! ## Time Model
//! - Send timestamps are unix-epoch microseconds stamped by the publisher
//! - They are diagnostic only and never drive control flow

mod blueprint;
mod error;
mod frame;
mod message;
mod topic;
mod transport;

pub use blueprint::*;
pub use error::*;
pub use frame::{ArrayFrame, ElementKind};
pub use message::{now_micros, LatencySample, SendReport, WireMessage};
pub use topic::TopicKey;
pub use transport::{FrameSink, FrameSource, LocalFrameSink, LocalFrameSource};
