//! StreamBlueprint - Config Loader 输出
//!
//! 描述完整的流配置：传输端点、发布端、订阅端、预期 topic 列表。

use serde::{Deserialize, Serialize};

use crate::{ElementKind, TopicKey};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的流配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 传输设置
    #[serde(default)]
    pub transport: TransportConfig,

    /// 发布端设置
    #[serde(default)]
    pub publisher: PublisherSettings,

    /// 订阅端设置
    #[serde(default)]
    pub subscriber: SubscriberSettings,

    /// 预期 topic 列表 (空 = 单流匿名 topic)
    #[serde(default)]
    pub topics: Vec<TopicKey>,

    /// 流元素类型
    #[serde(default)]
    pub element_kind: ElementKind,
}

/// 传输设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 发布端绑定地址 / 订阅端对端地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 每个订阅连接的发送队列深度 (SNDHWM)
    #[serde(default = "default_send_hwm")]
    pub send_hwm: usize,

    /// 订阅端缓冲策略
    #[serde(default)]
    pub inbox: InboxMode,

    /// TCP keep-alive 参数
    #[serde(default)]
    pub keepalive: KeepaliveConfig,

    /// 单条消息最大字节数
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// 连接超时 (毫秒)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// 断线重连间隔 (毫秒)
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            send_hwm: default_send_hwm(),
            inbox: InboxMode::default(),
            keepalive: KeepaliveConfig::default(),
            max_message_bytes: default_max_message_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl TransportConfig {
    /// `host:port` string
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5556
}

fn default_send_hwm() -> usize {
    5
}

fn default_max_message_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_reconnect_interval_ms() -> u64 {
    500
}

/// 订阅端缓冲策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum InboxMode {
    /// 每个 topic 只保留最新一条
    #[default]
    PerTopic,
    /// 整个连接只保留最新一条
    Latest,
    /// 有界 FIFO，满时丢弃最旧
    Queue { depth: usize },
}

/// TCP keep-alive 参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 空闲多久开始探测 (秒)
    #[serde(default = "default_keepalive_idle")]
    pub idle_secs: u64,
    /// 探测间隔 (秒)
    #[serde(default = "default_keepalive_interval")]
    pub interval_secs: u64,
    /// 探测次数
    #[serde(default = "default_keepalive_count")]
    pub count: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_secs: default_keepalive_idle(),
            interval_secs: default_keepalive_interval(),
            count: default_keepalive_count(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_keepalive_idle() -> u64 {
    30
}

fn default_keepalive_interval() -> u64 {
    5
}

fn default_keepalive_count() -> u32 {
    3
}

/// 发布端设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherSettings {
    /// 发送队列中最多同时待发的 topic 数
    #[serde(default = "default_max_pending_topics")]
    pub max_pending_topics: usize,

    /// stop() 等待发送任务退出的上限 (毫秒)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            max_pending_topics: default_max_pending_topics(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

fn default_max_pending_topics() -> usize {
    64
}

fn default_stop_timeout_ms() -> u64 {
    1000
}

/// 订阅端设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberSettings {
    /// 单次轮询超时 (毫秒)
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// 渲染频率 (Hz)
    #[serde(default = "default_render_hz")]
    pub render_hz: f64,

    /// 延迟统计窗口大小
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            render_hz: default_render_hz(),
            latency_window: default_latency_window(),
        }
    }
}

fn default_poll_timeout_ms() -> u64 {
    1
}

fn default_render_hz() -> f64 {
    30.0
}

fn default_latency_window() -> usize {
    512
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let bp = StreamBlueprint::default();
        assert_eq!(bp.transport.port, 5556);
        assert_eq!(bp.transport.inbox, InboxMode::PerTopic);
        assert_eq!(bp.subscriber.poll_timeout_ms, 1);
        assert_eq!(bp.subscriber.render_hz, 30.0);
        assert!(bp.transport.keepalive.enabled);
        assert_eq!(bp.element_kind, ElementKind::F32);
    }

    #[test]
    fn test_inbox_mode_serde() {
        let json = r#"{"mode":"queue","depth":8}"#;
        let mode: InboxMode = serde_json::from_str(json).unwrap();
        assert_eq!(mode, InboxMode::Queue { depth: 8 });

        let mode: InboxMode = serde_json::from_str(r#"{"mode":"latest"}"#).unwrap();
        assert_eq!(mode, InboxMode::Latest);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"topics":["left","right"],"transport":{"port":6000}}"#;
        let bp: StreamBlueprint = serde_json::from_str(json).unwrap();
        assert_eq!(bp.topics.len(), 2);
        assert_eq!(bp.transport.port, 6000);
        assert_eq!(bp.transport.send_hwm, 5);
        assert_eq!(bp.publisher.max_pending_topics, 64);
    }
}
