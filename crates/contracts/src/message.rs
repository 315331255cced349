//! Transport-level message types

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::TopicKey;

/// One transport message: `[topic bytes][frame bytes]`
///
/// The frame part is an encoded [`ArrayFrame`](crate::ArrayFrame); the transport
/// never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Topic part (anonymous for single-stream channels)
    pub topic: TopicKey,
    /// Encoded frame
    pub frame: Bytes,
    /// Unix-epoch microseconds when the publisher sent it (0 = unknown)
    pub sent_at_micros: u64,
}

impl WireMessage {
    pub fn new(topic: TopicKey, frame: Bytes) -> Self {
        Self {
            topic,
            frame,
            sent_at_micros: 0,
        }
    }

    /// Stamp with the current wall-clock time
    pub fn stamped(mut self) -> Self {
        self.sent_at_micros = now_micros();
        self
    }
}

/// Outcome of offering one message to a fan-out transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Subscribers that accepted the message into their outbound queue
    pub delivered: usize,
    /// Subscribers whose queue was full (message dropped for them)
    pub dropped: usize,
}

impl SendReport {
    /// True if at least one subscriber declined the message
    pub fn has_drops(&self) -> bool {
        self.dropped > 0
    }
}

/// Send/receive time pair. Purely observational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub sent_at_micros: u64,
    pub received_at_micros: u64,
}

impl LatencySample {
    /// Sample for a message received now, `None` if the send time is unknown
    pub fn observe(message: &WireMessage) -> Option<Self> {
        (message.sent_at_micros != 0).then(|| Self {
            sent_at_micros: message.sent_at_micros,
            received_at_micros: now_micros(),
        })
    }

    /// End-to-end latency; clock skew never makes it negative
    pub fn latency_ms(&self) -> f64 {
        self.received_at_micros.saturating_sub(self.sent_at_micros) as f64 / 1000.0
    }
}

/// Current wall-clock time in unix-epoch microseconds
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_never_negative() {
        let sample = LatencySample {
            sent_at_micros: 5_000,
            received_at_micros: 2_000,
        };
        assert_eq!(sample.latency_ms(), 0.0);

        let sample = LatencySample {
            sent_at_micros: 1_000,
            received_at_micros: 3_500,
        };
        assert_eq!(sample.latency_ms(), 2.5);
    }

    #[test]
    fn test_unstamped_message_has_no_sample() {
        let msg = WireMessage::new(TopicKey::anonymous(), Bytes::from_static(b"x"));
        assert!(LatencySample::observe(&msg).is_none());
        assert!(LatencySample::observe(&msg.stamped()).is_some());
    }
}
