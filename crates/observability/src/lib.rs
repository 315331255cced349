//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - 发布/订阅流指标收集与统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig};
//!
//! // -v 对应 debug，RUST_LOG 优先
//! let config = ObservabilityConfig::from_verbosity(1, false).with_format(LogFormat::Compact);
//! observability::init_with_config(config)?;
//!
//! // 记录接收指标
//! if let Some(sample) = LatencySample::observe(&message) {
//!     metrics::record_latency(&sample);
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_cache_topics, record_decode_error, record_drain, record_encode_failure,
    record_frame_published, record_frame_received, record_latency, record_queue_depth,
    record_send_failure, record_send_report, LatencyStats, MetricsSummary, RunningStats,
    StatsSummary, StreamMetricsAggregator,
};

/// 可观测性配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// 日志级别（RUST_LOG 未设置时使用）
    pub log_level: String,
    /// 是否允许 RUST_LOG 覆盖 `log_level`
    pub honor_env: bool,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::from_verbosity(0, false)
    }
}

impl ObservabilityConfig {
    /// Map `-v` count / `--quiet` onto a level
    ///
    /// Quiet pins the level to `warn` and ignores RUST_LOG.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format: LogFormat::default(),
            log_level: level.to_string(),
            honor_env: !quiet,
            metrics_port: None,
        }
    }

    pub fn with_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }

    fn filter(&self) -> EnvFilter {
        if self.honor_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return filter;
            }
        }
        EnvFilter::new(&self.log_level)
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 初始化 Tracing，可选启动 Prometheus 导出
///
/// # Errors
/// 全局 subscriber 已安装，或指标端口无法监听。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由其他模块初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.log_level, "info");
        assert!(config.honor_env);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(ObservabilityConfig::from_verbosity(1, false).log_level, "debug");
        assert_eq!(ObservabilityConfig::from_verbosity(3, false).log_level, "trace");

        let quiet = ObservabilityConfig::from_verbosity(0, true);
        assert_eq!(quiet.log_level, "warn");
        assert!(!quiet.honor_env);
    }

    #[test]
    fn test_builders() {
        let config = ObservabilityConfig::default()
            .with_format(LogFormat::Compact)
            .with_metrics_port(9100);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.metrics_port, Some(9100));
    }
}
