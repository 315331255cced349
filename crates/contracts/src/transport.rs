//! Transport traits - the pub/sub collaborator boundary
//!
//! The core only needs fan-out delivery on the publish side and a
//! poll-with-timeout primitive on the subscribe side.

use std::time::Duration;

use crate::{ContractError, SendReport, WireMessage};

/// Publishing end of a transport
///
/// Admission is the transport's decision: a full per-subscriber queue drops
/// the message for that subscriber and reports it in [`SendReport`].
#[trait_variant::make(FrameSink: Send)]
pub trait LocalFrameSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Offer one message to every connected subscriber
    ///
    /// # Errors
    /// Transport-level failure. Callers log and continue; nothing is retried.
    async fn send(&mut self, message: WireMessage) -> Result<SendReport, ContractError>;

    /// Release the transport handle
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Receiving end of a transport
#[trait_variant::make(FrameSource: Send)]
pub trait LocalFrameSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Wait at most `timeout` for a message
    ///
    /// `Ok(None)` means nothing arrived in time, which is the common case.
    ///
    /// # Errors
    /// `ContractError::TransportClosed` once the source is closed.
    async fn recv_timeout(&mut self, timeout: Duration)
        -> Result<Option<WireMessage>, ContractError>;

    /// Take an already-buffered message without waiting
    fn try_recv(&mut self) -> Result<Option<WireMessage>, ContractError>;

    /// Messages buffered right now
    fn ready_len(&self) -> usize;

    /// Release the transport handle
    async fn close(&mut self) -> Result<(), ContractError>;
}
