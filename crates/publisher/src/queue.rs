//! PublishQueue - coalescing hand-off between producers and the sender task
//!
//! Holds at most one unsent frame per topic. Topics are served in the order
//! they first became pending; a newer frame for a pending topic takes over
//! its slot without moving it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ArrayFrame, TopicKey};
use tokio::sync::Notify;

/// Result of one `publish`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// New pending entry
    Queued,
    /// Replaced an unsent frame of the same topic
    Coalesced,
    /// Queue was full of other topics; the oldest pending one was dropped
    Evicted,
    /// Publisher is stopped; the array was discarded
    Closed,
}

/// One dequeued entry
#[derive(Debug, Clone)]
pub struct PendingFrame {
    pub topic: TopicKey,
    pub frame: ArrayFrame,
}

#[derive(Debug, Default)]
struct QueueState {
    order: VecDeque<TopicKey>,
    pending: HashMap<TopicKey, ArrayFrame>,
    closed: bool,
}

#[derive(Debug)]
pub struct PublishQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    max_pending_topics: usize,
}

impl PublishQueue {
    pub fn new(max_pending_topics: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            max_pending_topics: max_pending_topics.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue without waiting
    pub fn push(&self, topic: TopicKey, frame: ArrayFrame) -> PublishOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PublishOutcome::Closed;
            }

            if let Some(slot) = state.pending.get_mut(&topic) {
                *slot = frame;
                PublishOutcome::Coalesced
            } else {
                let mut outcome = PublishOutcome::Queued;
                if state.pending.len() >= self.max_pending_topics {
                    if let Some(oldest) = state.order.pop_front() {
                        state.pending.remove(&oldest);
                        outcome = PublishOutcome::Evicted;
                    }
                }
                state.order.push_back(topic.clone());
                state.pending.insert(topic, frame);
                outcome
            }
        };

        self.notify.notify_one();
        outcome
    }

    /// Dequeue the oldest pending topic, if any
    pub fn pop(&self) -> Option<PendingFrame> {
        let mut state = self.lock();
        while let Some(topic) = state.order.pop_front() {
            if let Some(frame) = state.pending.remove(&topic) {
                return Some(PendingFrame { topic, frame });
            }
        }
        None
    }

    /// Wait until something may have been pushed or the queue closed
    ///
    /// A push that races with the caller's empty `pop` leaves a permit, so
    /// the wake-up is never lost.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Reject further pushes and drop everything pending
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.order.clear();
            state.pending.clear();
        }
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn frame(value: f32) -> ArrayFrame {
        ArrayFrame::from_f32(vec![1], &[value]).unwrap()
    }

    #[test]
    fn test_same_topic_coalesces() {
        let queue = PublishQueue::new(8);
        assert_eq!(queue.push("cam0".into(), frame(1.0)), PublishOutcome::Queued);
        assert_eq!(queue.push("cam0".into(), frame(2.0)), PublishOutcome::Coalesced);
        assert_eq!(queue.push("cam0".into(), frame(3.0)), PublishOutcome::Coalesced);
        assert_eq!(queue.len(), 1);

        let entry = queue.pop().unwrap();
        assert_eq!(entry.topic, "cam0");
        assert_eq!(entry.frame.to_f32_vec(), Some(vec![3.0]));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_topics_keep_first_pending_order() {
        let queue = PublishQueue::new(8);
        queue.push("left".into(), frame(1.0));
        queue.push("right".into(), frame(2.0));
        queue.push("left".into(), frame(3.0));

        let first = queue.pop().unwrap();
        assert_eq!(first.topic, "left");
        assert_eq!(first.frame.to_f32_vec(), Some(vec![3.0]));
        assert_eq!(queue.pop().unwrap().topic, "right");
    }

    #[test]
    fn test_eviction_when_topic_limit_reached() {
        let queue = PublishQueue::new(2);
        queue.push("a".into(), frame(1.0));
        queue.push("b".into(), frame(2.0));
        assert_eq!(queue.push("c".into(), frame(3.0)), PublishOutcome::Evicted);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().topic, "b");
        assert_eq!(queue.pop().unwrap().topic, "c");
    }

    #[test]
    fn test_closed_queue_discards() {
        let queue = PublishQueue::new(2);
        queue.push("a".into(), frame(1.0));
        queue.close();
        assert!(queue.is_empty());
        assert_eq!(queue.push("a".into(), frame(2.0)), PublishOutcome::Closed);
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_push_wakes_waiter() {
        let queue = Arc::new(PublishQueue::new(4));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                loop {
                    if let Some(entry) = queue.pop() {
                        return entry;
                    }
                    queue.notified().await;
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push("cam0".into(), frame(7.0));

        let entry = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.frame.to_f32_vec(), Some(vec![7.0]));
    }
}
