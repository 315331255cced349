//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::StreamBlueprint;
use serde::Serialize;
use tracing::info;

use super::validate::describe_inbox;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    element_kind: String,
    topics: Vec<String>,
    transport: TransportInfo,
    publisher: PublisherInfo,
    subscriber: SubscriberInfo,
}

#[derive(Serialize)]
struct TransportInfo {
    endpoint: String,
    send_hwm: usize,
    inbox: String,
    max_message_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    keepalive: Option<String>,
}

#[derive(Serialize)]
struct PublisherInfo {
    max_pending_topics: usize,
    stop_timeout_ms: u64,
}

#[derive(Serialize)]
struct SubscriberInfo {
    poll_timeout_ms: u64,
    render_hz: f64,
    latency_window: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn describe_keepalive(blueprint: &StreamBlueprint) -> Option<String> {
    let ka = &blueprint.transport.keepalive;
    ka.enabled.then(|| {
        format!(
            "idle={}s interval={}s count={}",
            ka.idle_secs, ka.interval_secs, ka.count
        )
    })
}

fn build_config_info(blueprint: &StreamBlueprint) -> ConfigInfo {
    let transport = &blueprint.transport;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        element_kind: blueprint.element_kind.to_string(),
        topics: blueprint.topics.iter().map(|t| t.to_string()).collect(),
        transport: TransportInfo {
            endpoint: transport.endpoint(),
            send_hwm: transport.send_hwm,
            inbox: describe_inbox(&transport.inbox),
            max_message_bytes: transport.max_message_bytes,
            keepalive: describe_keepalive(blueprint),
        },
        publisher: PublisherInfo {
            max_pending_topics: blueprint.publisher.max_pending_topics,
            stop_timeout_ms: blueprint.publisher.stop_timeout_ms,
        },
        subscriber: SubscriberInfo {
            poll_timeout_ms: blueprint.subscriber.poll_timeout_ms,
            render_hz: blueprint.subscriber.render_hz,
            latency_window: blueprint.subscriber.latency_window,
        },
    }
}

fn print_config_info(blueprint: &StreamBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Array Stream Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let transport = &blueprint.transport;
    println!("Transport");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Endpoint: {}", transport.endpoint());
    println!("   ├─ Send HWM: {}", transport.send_hwm);
    println!("   ├─ Inbox: {}", describe_inbox(&transport.inbox));
    println!("   ├─ Max message: {} bytes", transport.max_message_bytes);
    match describe_keepalive(blueprint) {
        Some(ka) => println!("   └─ Keep-alive: {}", ka),
        None => println!("   └─ Keep-alive: disabled"),
    }

    println!("\nTopics ({}, {})", blueprint.topics.len(), blueprint.element_kind);
    if blueprint.topics.is_empty() {
        println!("   └─ (anonymous)");
    }
    for (i, topic) in blueprint.topics.iter().enumerate() {
        let prefix = if i == blueprint.topics.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!("   {} {}", prefix, topic);
    }

    println!("\nPublisher");
    println!(
        "   ├─ Max pending topics: {}",
        blueprint.publisher.max_pending_topics
    );
    println!("   └─ Stop timeout: {} ms", blueprint.publisher.stop_timeout_ms);

    println!("\nSubscriber");
    println!("   ├─ Poll timeout: {} ms", blueprint.subscriber.poll_timeout_ms);
    println!("   ├─ Render: {} Hz", blueprint.subscriber.render_hz);
    println!(
        "   └─ Latency window: {}",
        blueprint.subscriber.latency_window
    );

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TopicKey;

    #[test]
    fn test_build_config_info() {
        let mut bp = StreamBlueprint::default();
        bp.topics = vec![TopicKey::from("left"), TopicKey::from("right")];

        let info = build_config_info(&bp);
        assert_eq!(info.topics, vec!["left", "right"]);
        assert_eq!(info.transport.endpoint, "0.0.0.0:5556");
        assert_eq!(info.transport.inbox, "per-topic");
        assert_eq!(
            info.transport.keepalive.as_deref(),
            Some("idle=30s interval=5s count=3")
        );
    }
}
