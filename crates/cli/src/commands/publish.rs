//! `publish` command implementation.
//!
//! One OS thread per topic produces synthetic frames at `rate_hz` and hands
//! them to the publisher without ever waiting on the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ArrayFrame, ElementKind, StreamBlueprint, TopicKey};
use frame_codec::MAX_RANK;
use publisher::{Publisher, PublisherConfig, PublisherHandle};
use rand::Rng;
use tracing::{debug, info, warn};
use transport::{TcpFramePublisher, TcpPublisherConfig};

use super::{init_metrics, load_blueprint, shutdown_signal};
use crate::cli::PublishArgs;
use crate::error::CliError;
use crate::stats::PublishStats;

/// Execute the `publish` command
pub async fn run_publish(args: &PublishArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;
    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid configuration")?;
    validate_args(args)?;

    init_metrics(args.metrics_port);

    let endpoint = blueprint.transport.endpoint();
    let sink = TcpFramePublisher::bind(&endpoint, TcpPublisherConfig::from(&blueprint.transport))
        .await
        .with_context(|| format!("Failed to bind publisher on {endpoint}"))?;
    info!(addr = %sink.local_addr(), "Publisher bound");

    let mut publisher = Publisher::new(
        sink,
        PublisherConfig::from_settings(&blueprint.publisher, blueprint.element_kind),
    );
    publisher.start()?;

    let topics: Vec<Option<TopicKey>> = if blueprint.topics.is_empty() {
        vec![None]
    } else {
        blueprint.topics.iter().cloned().map(Some).collect()
    };

    info!(
        topics = ?blueprint.topics,
        shape = ?args.shape,
        element_kind = %blueprint.element_kind,
        rate_hz = args.rate_hz,
        "Starting producers"
    );

    let started = Instant::now();
    let stop = Arc::new(AtomicBool::new(false));
    let producers: Vec<_> = topics
        .iter()
        .map(|topic| {
            spawn_producer(
                publisher.handle(),
                topic.clone(),
                SyntheticFrames {
                    shape: args.shape.clone(),
                    kind: blueprint.element_kind,
                },
                Duration::from_secs_f64(1.0 / args.rate_hz),
                args.frames,
                Arc::clone(&stop),
            )
        })
        .collect::<Result<_>>()?;

    let mut join = tokio::task::spawn_blocking(move || join_producers(producers));

    tokio::select! {
        joined = &mut join => {
            joined.context("Producer join task failed")??;
            info!("All producers finished");
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping producers...");
            stop.store(true, Ordering::Relaxed);
            join.await.context("Producer join task failed")??;
        }
    }

    // Let the sender flush the last frames before stopping
    tokio::time::sleep(Duration::from_millis(50)).await;
    publisher.stop().await?;

    let stats = PublishStats {
        topics: topics.len(),
        duration: started.elapsed(),
        publisher: publisher.metrics().snapshot(),
    };
    info!(
        sent = stats.publisher.sent,
        coalesced = stats.publisher.coalesced,
        rate = format!("{:.2}", stats.send_rate()),
        "Publisher finished"
    );
    stats.print_summary();
    Ok(())
}

fn apply_overrides(blueprint: &mut StreamBlueprint, args: &PublishArgs) {
    if let Some(ref bind) = args.bind {
        info!(host = %bind, "Overriding bind address from CLI");
        blueprint.transport.host = bind.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding port from CLI");
        blueprint.transport.port = port;
    }
    if !args.topics.is_empty() {
        blueprint.topics = args.topics.iter().map(|t| TopicKey::new(t)).collect();
    }
    if let Some(kind) = args.element_kind {
        blueprint.element_kind = kind;
    }
}

fn validate_args(args: &PublishArgs) -> Result<(), CliError> {
    if !(args.rate_hz.is_finite() && args.rate_hz > 0.0) {
        return Err(CliError::invalid_argument(
            "rate-hz",
            format!("must be > 0, got {}", args.rate_hz),
        ));
    }
    if args.shape.is_empty() || args.shape.contains(&0) {
        return Err(CliError::invalid_argument(
            "shape",
            format!("dimensions must be non-zero, got {:?}", args.shape),
        ));
    }
    if args.shape.len() > MAX_RANK {
        return Err(CliError::invalid_argument(
            "shape",
            format!("rank {} exceeds {}", args.shape.len(), MAX_RANK),
        ));
    }
    Ok(())
}

/// Shape and element kind of the synthetic frames
#[derive(Debug, Clone)]
struct SyntheticFrames {
    shape: Vec<u32>,
    kind: ElementKind,
}

impl SyntheticFrames {
    fn element_count(&self) -> usize {
        self.shape.iter().map(|&d| d as usize).product()
    }

    /// Moving gradient plus a little noise, so consecutive frames differ
    fn build(&self, index: u64, rng: &mut impl Rng) -> Result<ArrayFrame, contracts::EncodeError> {
        let n = self.element_count();
        match self.kind {
            ElementKind::U8 => {
                let offset = (index % 256) as usize;
                let values: Vec<u8> = (0..n)
                    .map(|i| ((i + offset) % 256) as u8 ^ (rng.random::<u8>() & 0x03))
                    .collect();
                ArrayFrame::from_u8(self.shape.clone(), values)
            }
            ElementKind::F32 => {
                let phase = index as f32 * 0.1;
                let values: Vec<f32> = (0..n)
                    .map(|i| (phase + i as f32 * 0.01).sin() + rng.random::<f32>() * 0.01)
                    .collect();
                ArrayFrame::from_f32(self.shape.clone(), &values)
            }
        }
    }
}

fn spawn_producer(
    handle: PublisherHandle,
    topic: Option<TopicKey>,
    frames: SyntheticFrames,
    period: Duration,
    max_frames: u64,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<u64, CliError>>> {
    let label = topic
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| TopicKey::anonymous().to_string());

    std::thread::Builder::new()
        .name(format!("producer-{label}"))
        .spawn(move || {
            let mut rng = rand::rng();
            let mut produced = 0u64;
            let mut next = Instant::now();

            while !stop.load(Ordering::Relaxed) && (max_frames == 0 || produced < max_frames) {
                let frame = frames
                    .build(produced, &mut rng)
                    .map_err(|e| CliError::producer(&label, e.to_string()))?;
                handle
                    .publish(topic.clone(), frame)
                    .map_err(|e| CliError::producer(&label, e.to_string()))?;
                produced += 1;

                next += period;
                let now = Instant::now();
                if next > now {
                    std::thread::sleep(next - now);
                } else {
                    // Fell behind; skip ahead instead of bursting
                    next = now;
                }
            }

            debug!(topic = %label, produced, "Producer finished");
            Ok(produced)
        })
        .context("Failed to spawn producer thread")
}

fn join_producers(producers: Vec<JoinHandle<Result<u64, CliError>>>) -> Result<()> {
    let mut total = 0u64;
    for producer in producers {
        let name = producer.thread().name().unwrap_or("producer").to_string();
        match producer.join() {
            Ok(result) => total += result?,
            Err(_) => return Err(CliError::producer(name, "thread panicked").into()),
        }
    }
    info!(total_frames = total, "Producers joined");
    Ok(())
}
