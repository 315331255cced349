//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置往返测试
//! - 内存总线 e2e 测试（Publisher -> ConflatingReceiver -> StreamAggregator）
//! - 本地回环 TCP e2e 测试

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ElementKind, InboxMode, TopicKey};

    #[test]
    fn test_stereo_camera_config() {
        let toml = r#"
            topics = ["left", "right"]
            element_kind = "f32"

            [transport]
            host = "192.168.1.20"
            port = 5556

            [transport.inbox]
            mode = "per_topic"
        "#;
        let bp = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.transport.endpoint(), "192.168.1.20:5556");
        assert_eq!(bp.transport.inbox, InboxMode::PerTopic);
        assert_eq!(bp.element_kind, ElementKind::F32);
        assert_eq!(bp.topics, vec![TopicKey::from("left"), TopicKey::from("right")]);

        let json = ConfigLoader::to_json(&bp).unwrap();
        let back = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(back.topics, bp.topics);
        assert_eq!(back.transport.endpoint(), bp.transport.endpoint());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::{Duration, Instant};

    use contracts::{ArrayFrame, ElementKind, InboxMode, TopicKey};
    use publisher::{Publisher, PublisherConfig};
    use subscriber::{ConflatingReceiver, ReceiverConfig, StreamAggregator};
    use tokio_util::sync::CancellationToken;
    use transport::{
        MemoryBus, TcpFramePublisher, TcpFrameSubscriber, TcpPublisherConfig, TcpSubscriberConfig,
    };

    fn topics(names: &[&str]) -> Vec<TopicKey> {
        names.iter().map(|t| TopicKey::from(*t)).collect()
    }

    fn scalar(v: f32) -> ArrayFrame {
        ArrayFrame::from_f32(vec![1], &[v]).unwrap()
    }

    /// Drain until `done` holds or the deadline passes
    async fn drain_until<S, F>(aggregator: &mut StreamAggregator<S>, mut done: F) -> bool
    where
        S: contracts::FrameSource,
        F: FnMut(&StreamAggregator<S>) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            aggregator.drain().await;
            if done(&*aggregator) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    async fn tcp_pair(
        names: &[&str],
    ) -> (
        Publisher<TcpFramePublisher>,
        StreamAggregator<TcpFrameSubscriber>,
    ) {
        let sink = TcpFramePublisher::bind("127.0.0.1:0", TcpPublisherConfig::default())
            .await
            .unwrap();
        let endpoint = sink.local_addr().to_string();
        let source = TcpFrameSubscriber::connect(&endpoint, TcpSubscriberConfig::default())
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.client_count() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.client_count(), 1);

        let mut publisher = Publisher::new(sink, PublisherConfig::default());
        publisher.start().unwrap();
        let receiver = ConflatingReceiver::new(source, ReceiverConfig::default());
        (publisher, StreamAggregator::new(receiver, topics(names)))
    }

    /// Publisher -> TCP -> subscriber: the last published value wins
    #[tokio::test]
    async fn test_tcp_freshness() {
        let (mut publisher, mut aggregator) = tcp_pair(&["cam0"]).await;

        for v in [1.0, 2.0, 3.0] {
            publisher
                .publish(Some(TopicKey::from("cam0")), scalar(v))
                .unwrap();
        }

        let seen = drain_until(&mut aggregator, |agg| {
            agg.latest("cam0").and_then(|f| f.to_f32_vec()) == Some(vec![3.0])
        })
        .await;
        assert!(seen);
        assert!(aggregator.missing_topics().is_empty());

        publisher.stop().await.unwrap();
        aggregator.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_multi_topic_and_shape_change() {
        let (mut publisher, mut aggregator) = tcp_pair(&["left", "right"]).await;

        let left = ArrayFrame::from_f32(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        publisher.publish(Some(TopicKey::from("left")), left).unwrap();
        publisher
            .publish(Some(TopicKey::from("right")), scalar(10.0))
            .unwrap();

        assert!(drain_until(&mut aggregator, |agg| agg.missing_topics().is_empty()).await);
        let frame = aggregator.latest("left").unwrap();
        assert_eq!(frame.shape(), vec![2, 3]);
        assert_eq!(frame.to_f32_vec(), Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));

        let left = ArrayFrame::from_f32(vec![1, 1], &[9.0]).unwrap();
        publisher.publish(Some(TopicKey::from("left")), left).unwrap();

        let replaced = drain_until(&mut aggregator, |agg| {
            agg.latest("left").map(|f| f.shape()) == Some(vec![1, 1])
        })
        .await;
        assert!(replaced);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.frame("left").unwrap().to_f32_vec(), Some(vec![9.0]));
        assert_eq!(snapshot.frame("right").unwrap().to_f32_vec(), Some(vec![10.0]));

        publisher.stop().await.unwrap();
        aggregator.close().await.unwrap();
    }

    /// A subscriber that never drains must not slow the producer down
    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_publisher() {
        let bus = MemoryBus::new("stall");
        let source = bus.subscribe(InboxMode::PerTopic);
        let mut publisher = Publisher::new(bus.sink(), PublisherConfig::default());
        publisher.start().unwrap();

        let started = Instant::now();
        for i in 0..10_000 {
            publisher
                .publish(Some(TopicKey::from("cam0")), scalar(i as f32))
                .unwrap();
        }
        assert!(started.elapsed() < Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher.stop().await.unwrap();
        assert_eq!(publisher.metrics().snapshot().published, 10_000);

        let receiver = ConflatingReceiver::new(source, ReceiverConfig::default());
        let mut aggregator = StreamAggregator::new(receiver, topics(&["cam0"]));
        let stats = aggregator.drain().await;
        assert_eq!(stats.updated_count(), 1);
        assert_eq!(
            aggregator.latest("cam0").unwrap().to_f32_vec(),
            Some(vec![9_999.0])
        );
    }

    #[tokio::test]
    async fn test_background_receiver_feeds_shared_cache() {
        let bus = MemoryBus::new("bg");
        let mut receiver = ConflatingReceiver::new(
            bus.subscribe(InboxMode::PerTopic),
            ReceiverConfig::default(),
        );
        let cache = std::sync::Arc::clone(receiver.cache());
        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { receiver.run(cancel).await })
        };

        let mut publisher = Publisher::new(bus.sink(), PublisherConfig::default());
        publisher.start().unwrap();
        publisher
            .publish(Some(TopicKey::from("left")), scalar(1.0))
            .unwrap();
        publisher.publish(None, scalar(2.0)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while cache.len() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.frame("left").unwrap().to_f32_vec(), Some(vec![1.0]));
        assert_eq!(
            snapshot
                .frame(TopicKey::anonymous().as_str())
                .unwrap()
                .to_f32_vec(),
            Some(vec![2.0])
        );

        publisher.stop().await.unwrap();
        cancel.cancel();
        let metrics = task.await.unwrap();
        assert_eq!(metrics.decoded, 2);
    }

    /// Kind mismatch is rejected on the publisher side and never reaches the wire
    #[tokio::test]
    async fn test_kind_mismatch_rejected() {
        let bus = MemoryBus::new("kind");
        let source = bus.subscribe(InboxMode::PerTopic);
        let config = PublisherConfig {
            element_kind: ElementKind::U8,
            ..PublisherConfig::default()
        };
        let mut publisher = Publisher::new(bus.sink(), config);
        publisher.start().unwrap();

        assert!(publisher.publish(None, scalar(1.0)).is_err());
        let frame = ArrayFrame::from_u8(vec![2, 2], vec![1u8, 2, 3, 4]).unwrap();
        publisher.publish(None, frame).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher.stop().await.unwrap();

        let receiver = ConflatingReceiver::new(
            source,
            ReceiverConfig {
                element_kind: ElementKind::U8,
                ..ReceiverConfig::default()
            },
        );
        let mut aggregator = StreamAggregator::new(receiver, Vec::new());
        let stats = aggregator.drain().await;
        assert_eq!(stats.rejected, 0);
        let frame = aggregator.latest(TopicKey::anonymous().as_str()).unwrap();
        assert_eq!(frame.as_u8(), Some(&[1u8, 2, 3, 4][..]));
    }
}
