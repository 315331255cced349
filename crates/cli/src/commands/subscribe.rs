//! `subscribe` command implementation.
//!
//! Connects to a publisher, drains on every loop iteration and reports the
//! latest frame per topic on a fixed render tick.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{StreamBlueprint, TopicKey};
use observability::StreamMetricsAggregator;
use subscriber::{
    CacheSnapshot, ConflatingReceiver, ReceiverConfig, RenderTicker, StreamAggregator,
};
use tracing::{debug, info, warn};
use transport::{TcpFrameSubscriber, TcpSubscriberConfig};

use super::{init_metrics, load_blueprint, shutdown_signal};
use crate::cli::SubscribeArgs;
use crate::stats::SubscribeStats;

/// Stereo pair expected when neither the command line nor the file names topics
const DEFAULT_CAMERAS: [&str; 2] = ["left", "right"];

/// Execute the `subscribe` command
pub async fn run_subscribe(args: &SubscribeArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid configuration")?;

    init_metrics(args.metrics_port);

    let endpoint = blueprint.transport.endpoint();
    let source =
        TcpFrameSubscriber::connect(&endpoint, TcpSubscriberConfig::from(&blueprint.transport))
            .await
            .with_context(|| format!("Failed to connect to publisher at {endpoint}"))?;

    let receiver = ConflatingReceiver::new(
        source,
        ReceiverConfig::from_settings(&blueprint.subscriber, blueprint.element_kind),
    );
    let mut aggregator = StreamAggregator::new(receiver, blueprint.topics.clone());
    let mut ticker = RenderTicker::from_hz(blueprint.subscriber.render_hz);

    info!(
        endpoint = %endpoint,
        topics = ?blueprint.topics,
        render_hz = blueprint.subscriber.render_hz,
        element_kind = %blueprint.element_kind,
        "Subscriber running"
    );

    let started = Instant::now();
    let mut ticks = StreamMetricsAggregator::new();
    let mut updated_since_tick: Vec<TopicKey> = Vec::new();
    let mut rejected_since_tick = 0usize;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let stats = tokio::select! {
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping subscriber...");
                break;
            }
            stats = aggregator.drain() => stats,
        };
        if stats.closed {
            warn!("Transport closed");
            break;
        }
        updated_since_tick.extend(stats.updated);
        rejected_since_tick += stats.rejected;

        let now = Instant::now();
        if ticker.is_due(now) {
            let snapshot = aggregator.snapshot();
            let missing = aggregator.missing_topics();
            render(&snapshot, &missing);

            ticks.record_tick(&updated_since_tick, rejected_since_tick, &missing);
            updated_since_tick.clear();
            rejected_since_tick = 0;
            ticker.mark(now);

            if args.max_ticks > 0 && ticks.ticks >= args.max_ticks {
                info!(ticks = ticks.ticks, "Reached max ticks");
                break;
            }
        } else if aggregator.receiver().ready_len() == 0 {
            // Idle until the next tick or the next poll, whichever comes first
            let wait = ticker.time_until_next(now).min(Duration::from_millis(1));
            tokio::time::sleep(wait).await;
        }
    }

    let inbox = aggregator.receiver().source().inbox_stats();
    let stats = SubscribeStats {
        duration: started.elapsed(),
        ticks,
        receiver: aggregator.receiver().metrics().snapshot(),
        latency: aggregator.receiver().latency().clone(),
        inbox,
    };
    if let Err(e) = aggregator.close().await {
        debug!(error = %e, "Close failed");
    }

    info!(
        ticks = stats.ticks.ticks,
        decoded = stats.receiver.decoded,
        rejected = stats.receiver.rejected,
        "Subscriber finished"
    );
    stats.print_summary();
    Ok(())
}

fn apply_overrides(blueprint: &mut StreamBlueprint, args: &SubscribeArgs) {
    blueprint.transport.host = args.server_ip.clone();
    if let Some(port) = args.port {
        info!(port, "Overriding port from CLI");
        blueprint.transport.port = port;
    }
    if !args.cameras.is_empty() {
        blueprint.topics = args.cameras.iter().map(|t| TopicKey::new(t)).collect();
    } else if blueprint.topics.is_empty() {
        blueprint.topics = DEFAULT_CAMERAS.iter().map(|t| TopicKey::new(t)).collect();
    }
    if let Some(hz) = args.render_hz {
        blueprint.subscriber.render_hz = hz;
    }
    if let Some(kind) = args.element_kind {
        blueprint.element_kind = kind;
    }
}

/// One render tick: the downstream display is out of scope, so log it
fn render(snapshot: &CacheSnapshot, missing: &[TopicKey]) {
    for topic in snapshot.topics() {
        if let Some(entry) = snapshot.get(topic.as_str()) {
            debug!(
                topic = %topic,
                shape = ?entry.frame.shape(),
                element_kind = %entry.frame.kind(),
                sequence = entry.sequence,
                age_ms = entry.age().as_secs_f64() * 1000.0,
                "Frame"
            );
        }
    }
    if !missing.is_empty() {
        debug!(missing = ?missing, "Waiting for topics");
    }
}
