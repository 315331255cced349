//! MemoryBus - in-process fan-out
//!
//! Same contract as the TCP transport without sockets: every subscriber owns
//! an [`Inbox`] and `send` pushes into each live one. Dropping a source
//! unsubscribes it; closing the sink closes every inbox.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use contracts::{ContractError, FrameSink, FrameSource, InboxMode, SendReport, WireMessage};

use crate::inbox::{Inbox, InboxStats};

#[derive(Debug, Default)]
struct BusInner {
    subscribers: Mutex<Vec<Weak<Inbox>>>,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, Vec<Weak<Inbox>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process pub/sub channel
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    name: String,
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::default(),
        }
    }

    /// Publishing end
    pub fn sink(&self) -> MemoryFrameSink {
        MemoryFrameSink {
            name: format!("mem-pub://{}", self.name),
            inner: Arc::clone(&self.inner),
            closed: false,
        }
    }

    /// New subscription; only messages sent after this call are seen
    pub fn subscribe(&self, mode: InboxMode) -> MemoryFrameSource {
        let inbox = Arc::new(Inbox::new(mode));
        self.inner.lock().push(Arc::downgrade(&inbox));
        MemoryFrameSource {
            name: format!("mem-sub://{}", self.name),
            inbox,
        }
    }

    /// Live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

/// Publishing end of a [`MemoryBus`]
#[derive(Debug)]
pub struct MemoryFrameSink {
    name: String,
    inner: Arc<BusInner>,
    closed: bool,
}

impl FrameSink for MemoryFrameSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, message: WireMessage) -> Result<SendReport, ContractError> {
        if self.closed {
            return Err(ContractError::transport_closed(&self.name));
        }
        let mut report = SendReport::default();
        self.inner.lock().retain(|weak| match weak.upgrade() {
            Some(inbox) => {
                inbox.push(message.clone());
                report.delivered += 1;
                true
            }
            None => false,
        });
        Ok(report)
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed = true;
        for inbox in self.inner.lock().drain(..).filter_map(|w| w.upgrade()) {
            inbox.close();
        }
        Ok(())
    }
}

/// Receiving end of a [`MemoryBus`]
#[derive(Debug)]
pub struct MemoryFrameSource {
    name: String,
    inbox: Arc<Inbox>,
}

impl MemoryFrameSource {
    pub fn inbox_stats(&self) -> InboxStats {
        self.inbox.stats()
    }
}

impl FrameSource for MemoryFrameSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<WireMessage>, ContractError> {
        self.inbox
            .pop_timeout(timeout)
            .await
            .map_err(|_| ContractError::transport_closed(&self.name))
    }

    fn try_recv(&mut self) -> Result<Option<WireMessage>, ContractError> {
        self.inbox
            .try_pop()
            .map_err(|_| ContractError::transport_closed(&self.name))
    }

    fn ready_len(&self) -> usize {
        self.inbox.len()
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.inbox.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn msg(topic: &str, payload: &'static [u8]) -> WireMessage {
        WireMessage::new(topic.into(), Bytes::from_static(payload))
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let bus = MemoryBus::new("test");
        let mut sink = bus.sink();
        let mut a = bus.subscribe(InboxMode::PerTopic);
        let mut b = bus.subscribe(InboxMode::PerTopic);

        let report = sink.send(msg("cam0", b"1")).await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(a.try_recv().unwrap().unwrap().topic, "cam0");
        assert_eq!(b.try_recv().unwrap().unwrap().topic, "cam0");
    }

    #[tokio::test]
    async fn test_dropped_source_unsubscribes() {
        let bus = MemoryBus::new("test");
        let mut sink = bus.sink();
        let a = bus.subscribe(InboxMode::PerTopic);
        drop(a);
        let report = sink.send(msg("cam0", b"1")).await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_sink_closes_sources_after_drain() {
        let bus = MemoryBus::new("test");
        let mut sink = bus.sink();
        let mut source = bus.subscribe(InboxMode::PerTopic);
        sink.send(msg("cam0", b"1")).await.unwrap();
        sink.close().await.unwrap();

        assert!(source.try_recv().unwrap().is_some());
        assert!(source.try_recv().unwrap_err().is_closed());
        assert!(sink.send(msg("cam0", b"2")).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_recv_timeout_idle() {
        let bus = MemoryBus::new("test");
        let mut source = bus.subscribe(InboxMode::PerTopic);
        let got = source
            .recv_timeout(Duration::from_millis(1))
            .await
            .unwrap();
        assert!(got.is_none());
        assert_eq!(source.ready_len(), 0);
    }
}
