//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::ElementKind;
use std::path::PathBuf;

/// array-stream - freshness-first streaming of multi-dimensional arrays
#[derive(Parser, Debug)]
#[command(
    name = "array-stream",
    author,
    version,
    about = "Freshness-first pub/sub for camera frames and sensor tensors",
    long_about = "Streams multi-dimensional arrays from one producer to many consumers.\n\n\
                  Publishers never block on slow subscribers; subscribers always see the\n\
                  newest frame per topic instead of a backlog."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ARRAY_STREAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ARRAY_STREAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish synthetic frames (one producer thread per topic)
    Publish(PublishArgs),

    /// Connect to a publisher and render the latest frame per topic
    Subscribe(SubscribeArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `publish` command
#[derive(Parser, Debug, Clone)]
pub struct PublishArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "ARRAY_STREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind (overrides transport.host)
    #[arg(long, env = "ARRAY_STREAM_BIND")]
    pub bind: Option<String>,

    /// Port to bind (overrides transport.port)
    #[arg(short, long, env = "ARRAY_STREAM_PORT")]
    pub port: Option<u16>,

    /// Topics to publish (overrides topics; empty = one anonymous stream)
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Frames per second per topic
    #[arg(long, default_value = "30")]
    pub rate_hz: f64,

    /// Array shape, comma separated
    #[arg(long, value_delimiter = ',', default_value = "480,640,3")]
    pub shape: Vec<u32>,

    /// Element kind (overrides element_kind): f32 | u8
    #[arg(long, value_parser = parse_element_kind)]
    pub element_kind: Option<ElementKind>,

    /// Frames per topic before exiting (0 = until interrupted)
    #[arg(long, default_value = "0")]
    pub frames: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ARRAY_STREAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `subscribe` command
#[derive(Parser, Debug, Clone)]
pub struct SubscribeArgs {
    /// Publisher address
    pub server_ip: String,

    /// Publisher port (overrides transport.port)
    #[arg(short, long, env = "ARRAY_STREAM_PORT")]
    pub port: Option<u16>,

    /// Expected camera / topic names (overrides topics; `left right` if neither is set)
    #[arg(long, num_args = 1..)]
    pub cameras: Vec<String>,

    /// Render ticks per second (overrides subscriber.render_hz)
    #[arg(long)]
    pub render_hz: Option<f64>,

    /// Element kind (overrides element_kind): f32 | u8
    #[arg(long, value_parser = parse_element_kind)]
    pub element_kind: Option<ElementKind>,

    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "ARRAY_STREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Render ticks before exiting (0 = until interrupted)
    #[arg(long, default_value = "0")]
    pub max_ticks: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ARRAY_STREAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "stream.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "stream.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

fn parse_element_kind(s: &str) -> Result<ElementKind, String> {
    s.parse().map_err(|e: contracts::EncodeError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_defaults() {
        let cli = Cli::parse_from(["array-stream", "subscribe", "10.0.0.2"]);
        let Commands::Subscribe(args) = cli.command else {
            panic!("expected subscribe");
        };
        assert_eq!(args.server_ip, "10.0.0.2");
        assert!(args.cameras.is_empty());
        assert!(args.port.is_none());
    }

    #[test]
    fn test_subscribe_cameras_list() {
        let cli = Cli::parse_from([
            "array-stream", "subscribe", "host", "-p", "6000", "--cameras", "a", "b", "c",
        ]);
        let Commands::Subscribe(args) = cli.command else {
            panic!("expected subscribe");
        };
        assert_eq!(args.port, Some(6000));
        assert_eq!(args.cameras, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_publish_shape_and_kind() {
        let cli = Cli::parse_from([
            "array-stream",
            "publish",
            "--shape",
            "2,3",
            "--element-kind",
            "uint8",
            "--topics",
            "left,right",
        ]);
        let Commands::Publish(args) = cli.command else {
            panic!("expected publish");
        };
        assert_eq!(args.shape, vec![2, 3]);
        assert_eq!(args.element_kind, Some(ElementKind::U8));
        assert_eq!(args.topics, vec!["left", "right"]);
    }

    #[test]
    fn test_publish_rejects_unknown_kind() {
        let result = Cli::try_parse_from(["array-stream", "publish", "--element-kind", "f64"]);
        assert!(result.is_err());
    }
}
