//! Subscriber-side receive buffer with conflation
//!
//! One inbox per subscription. The transport's reader pushes, a single
//! consumer pops. Memory stays bounded by the policy:
//! - `PerTopic`: at most one pending message per topic
//! - `Latest`: at most one pending message overall
//! - `Queue { depth }`: at most `depth` messages, oldest dropped first

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{InboxMode, WireMessage};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Returned by pops once the inbox is closed and empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxClosed;

/// What happened to a pushed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Added behind the pending messages
    Appended,
    /// Overwrote an unread message (same topic, or the only slot)
    Replaced,
    /// Added after evicting the oldest pending message
    DroppedOldest,
    /// Inbox closed, message discarded
    Closed,
}

/// Counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxStats {
    pub pushed: u64,
    pub replaced: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct InboxState {
    queue: VecDeque<WireMessage>,
    closed: bool,
    stats: InboxStats,
}

/// Conflating receive buffer
#[derive(Debug)]
pub struct Inbox {
    mode: InboxMode,
    state: Mutex<InboxState>,
    notify: Notify,
}

impl Inbox {
    pub fn new(mode: InboxMode) -> Self {
        Self {
            mode,
            state: Mutex::new(InboxState::default()),
            notify: Notify::new(),
        }
    }

    pub fn mode(&self) -> InboxMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer one message according to the policy and wake the consumer
    pub fn push(&self, message: WireMessage) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            state.stats.pushed += 1;

            let outcome = match self.mode {
                InboxMode::PerTopic => {
                    match state.queue.iter_mut().find(|m| m.topic == message.topic) {
                        Some(slot) => {
                            *slot = message;
                            PushOutcome::Replaced
                        }
                        None => {
                            state.queue.push_back(message);
                            PushOutcome::Appended
                        }
                    }
                }
                InboxMode::Latest => {
                    let had_pending = !state.queue.is_empty();
                    state.queue.clear();
                    state.queue.push_back(message);
                    if had_pending {
                        PushOutcome::Replaced
                    } else {
                        PushOutcome::Appended
                    }
                }
                InboxMode::Queue { depth } => {
                    let depth = depth.max(1);
                    let mut outcome = PushOutcome::Appended;
                    while state.queue.len() >= depth {
                        state.queue.pop_front();
                        outcome = PushOutcome::DroppedOldest;
                    }
                    state.queue.push_back(message);
                    outcome
                }
            };

            match outcome {
                PushOutcome::Replaced => state.stats.replaced += 1,
                PushOutcome::DroppedOldest => state.stats.dropped += 1,
                _ => {}
            }
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Take the oldest pending message without waiting
    ///
    /// Pending messages are still handed out after close.
    pub fn try_pop(&self) -> Result<Option<WireMessage>, InboxClosed> {
        let mut state = self.lock();
        match state.queue.pop_front() {
            Some(message) => Ok(Some(message)),
            None if state.closed => Err(InboxClosed),
            None => Ok(None),
        }
    }

    /// Wait at most `timeout` for a message
    pub async fn pop_timeout(&self, timeout: Duration) -> Result<Option<WireMessage>, InboxClosed> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_pop()? {
                return Ok(Some(message));
            }
            // notify_one keeps a permit when nobody waits, so a push between
            // try_pop and here is not lost
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    /// Pending message count
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting messages and wake the consumer
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> InboxStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn msg(topic: &str, payload: &'static [u8]) -> WireMessage {
        WireMessage::new(topic.into(), Bytes::from_static(payload))
    }

    #[test]
    fn test_per_topic_keeps_latest_of_each() {
        let inbox = Inbox::new(InboxMode::PerTopic);
        assert_eq!(inbox.push(msg("a", b"a1")), PushOutcome::Appended);
        assert_eq!(inbox.push(msg("b", b"b1")), PushOutcome::Appended);
        assert_eq!(inbox.push(msg("a", b"a2")), PushOutcome::Replaced);
        assert_eq!(inbox.push(msg("a", b"a3")), PushOutcome::Replaced);
        assert_eq!(inbox.len(), 2);

        let first = inbox.try_pop().unwrap().unwrap();
        assert_eq!(first.topic, "a");
        assert_eq!(&first.frame[..], b"a3");
        let second = inbox.try_pop().unwrap().unwrap();
        assert_eq!(&second.frame[..], b"b1");
        assert!(inbox.try_pop().unwrap().is_none());
        assert_eq!(inbox.stats().replaced, 2);
    }

    #[test]
    fn test_latest_keeps_single_message() {
        let inbox = Inbox::new(InboxMode::Latest);
        inbox.push(msg("a", b"a1"));
        assert_eq!(inbox.push(msg("b", b"b1")), PushOutcome::Replaced);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.try_pop().unwrap().unwrap().topic, "b");
    }

    #[test]
    fn test_queue_drops_oldest() {
        let inbox = Inbox::new(InboxMode::Queue { depth: 2 });
        inbox.push(msg("a", b"1"));
        inbox.push(msg("a", b"2"));
        assert_eq!(inbox.push(msg("a", b"3")), PushOutcome::DroppedOldest);
        assert_eq!(&inbox.try_pop().unwrap().unwrap().frame[..], b"2");
        assert_eq!(&inbox.try_pop().unwrap().unwrap().frame[..], b"3");
        assert_eq!(inbox.stats().dropped, 1);
    }

    #[test]
    fn test_close_drains_then_reports_closed() {
        let inbox = Inbox::new(InboxMode::PerTopic);
        inbox.push(msg("a", b"1"));
        inbox.close();
        assert_eq!(inbox.push(msg("b", b"2")), PushOutcome::Closed);
        assert!(inbox.try_pop().unwrap().is_some());
        assert_eq!(inbox.try_pop(), Err(InboxClosed));
    }

    #[tokio::test]
    async fn test_pop_timeout_returns_none_when_idle() {
        let inbox = Inbox::new(InboxMode::PerTopic);
        let start = std::time::Instant::now();
        assert!(inbox
            .pop_timeout(Duration::from_millis(5))
            .await
            .unwrap()
            .is_none());
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_pop_timeout_wakes_on_push() {
        let inbox = std::sync::Arc::new(Inbox::new(InboxMode::PerTopic));
        let producer = std::sync::Arc::clone(&inbox);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.push(msg("cam0", b"x"));
        });
        let got = inbox.pop_timeout(Duration::from_secs(5)).await.unwrap();
        assert_eq!(got.unwrap().topic, "cam0");
    }

    #[tokio::test]
    async fn test_close_wakes_waiter() {
        let inbox = std::sync::Arc::new(Inbox::new(InboxMode::PerTopic));
        let closer = std::sync::Arc::clone(&inbox);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            closer.close();
        });
        assert_eq!(
            inbox.pop_timeout(Duration::from_secs(5)).await,
            Err(InboxClosed)
        );
    }
}
