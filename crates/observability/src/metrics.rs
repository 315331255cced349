//! 流指标收集模块
//!
//! 发布端与订阅端的运行指标：Prometheus 计数器 + 内存聚合统计。

use std::collections::{HashMap, VecDeque};

use contracts::{LatencySample, SendReport, TopicKey};
use metrics::{counter, gauge, histogram};

/// 记录一次 publish 调用
///
/// `outcome` 为 "queued" / "coalesced" / "evicted" / "closed"。
pub fn record_frame_published(topic: &TopicKey, outcome: &'static str) {
    counter!(
        "array_stream_publish_total",
        "topic" => topic.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录一次发送的扇出结果
pub fn record_send_report(report: &SendReport) {
    counter!("array_stream_frames_sent_total").increment(1);
    gauge!("array_stream_subscribers").set((report.delivered + report.dropped) as f64);
    if report.dropped > 0 {
        counter!("array_stream_send_dropped_total").increment(report.dropped as u64);
    }
}

/// 记录发送失败 (传输层错误，已吸收)
pub fn record_send_failure() {
    counter!("array_stream_send_failures_total").increment(1);
}

/// 记录发送端编码失败
pub fn record_encode_failure() {
    counter!("array_stream_encode_failures_total").increment(1);
}

/// 记录发布队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("array_stream_publish_queue_depth").set(depth as f64);
}

/// 记录订阅端接收到的帧
pub fn record_frame_received(topic: &TopicKey, payload_bytes: usize) {
    counter!("array_stream_frames_received_total", "topic" => topic.to_string()).increment(1);
    histogram!("array_stream_frame_bytes").record(payload_bytes as f64);
}

/// 记录解码失败 (帧被丢弃)
pub fn record_decode_error(kind: &'static str) {
    counter!("array_stream_decode_errors_total", "kind" => kind).increment(1);
}

/// 记录端到端延迟
pub fn record_latency(sample: &LatencySample) {
    histogram!("array_stream_latency_ms").record(sample.latency_ms());
}

/// 记录缓存中的 topic 数
pub fn record_cache_topics(count: usize) {
    gauge!("array_stream_cache_topics").set(count as f64);
}

/// 记录一次 drain 的结果
pub fn record_drain(updated: usize, rejected: usize) {
    histogram!("array_stream_drain_updates").record(updated as f64);
    if rejected > 0 {
        counter!("array_stream_drain_rejected_total").increment(rejected as u64);
    }
}

/// 订阅端指标聚合器
///
/// 在内存中聚合每个渲染周期的结果，便于输出运行摘要。
#[derive(Debug, Clone, Default)]
pub struct StreamMetricsAggregator {
    /// 渲染周期数
    pub ticks: u64,

    /// 更新的帧总数
    pub frames_updated: u64,

    /// 丢弃的坏帧总数
    pub frames_rejected: u64,

    /// 每周期更新数统计
    pub updates_per_tick: RunningStats,

    /// 各 topic 更新次数
    pub topic_updates: HashMap<TopicKey, u64>,

    /// 各 topic 缺失周期数 (预期但未收到)
    pub missing_ticks: HashMap<TopicKey, u64>,
}

impl StreamMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个渲染周期
    pub fn record_tick<'a>(
        &mut self,
        updated: impl IntoIterator<Item = &'a TopicKey>,
        rejected: usize,
        missing: impl IntoIterator<Item = &'a TopicKey>,
    ) {
        self.ticks += 1;
        self.frames_rejected += rejected as u64;

        let mut count = 0u64;
        for topic in updated {
            count += 1;
            *self.topic_updates.entry(topic.clone()).or_insert(0) += 1;
        }
        self.frames_updated += count;
        self.updates_per_tick.push(count as f64);

        for topic in missing {
            *self.missing_ticks.entry(topic.clone()).or_insert(0) += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            ticks: self.ticks,
            frames_updated: self.frames_updated,
            frames_rejected: self.frames_rejected,
            reject_rate: if self.frames_updated + self.frames_rejected > 0 {
                self.frames_rejected as f64
                    / (self.frames_updated + self.frames_rejected) as f64
                    * 100.0
            } else {
                0.0
            },
            updates_per_tick: StatsSummary::from(&self.updates_per_tick),
            topic_updates: self.topic_updates.clone(),
            missing_ticks: self.missing_ticks.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub ticks: u64,
    pub frames_updated: u64,
    pub frames_rejected: u64,
    pub reject_rate: f64,
    pub updates_per_tick: StatsSummary,
    pub topic_updates: HashMap<TopicKey, u64>,
    pub missing_ticks: HashMap<TopicKey, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Stream Metrics Summary ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Frames updated: {}", self.frames_updated)?;
        writeln!(
            f,
            "Frames rejected: {} ({:.2}%)",
            self.frames_rejected, self.reject_rate
        )?;
        writeln!(f, "Updates per tick: {}", self.updates_per_tick)?;

        let mut topics: Vec<_> = self.topic_updates.iter().collect();
        topics.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        for (topic, count) in topics {
            writeln!(f, "  {}: {} updates", topic, count)?;
        }

        if !self.missing_ticks.is_empty() {
            writeln!(f, "Missing topic ticks:")?;
            for (topic, count) in &self.missing_ticks {
                writeln!(f, "  {}: {}", topic, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// 延迟统计
///
/// 全量 Welford 统计 + 最近 `window` 个样本 (用于分位数)。纯诊断用途。
#[derive(Debug, Clone)]
pub struct LatencyStats {
    window: usize,
    recent: VecDeque<f64>,
    overall: RunningStats,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new(512)
    }
}

impl LatencyStats {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
            overall: RunningStats::default(),
        }
    }

    /// 添加一个样本
    pub fn push(&mut self, sample: &LatencySample) {
        let ms = sample.latency_ms();
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(ms);
        self.overall.push(ms);
    }

    /// 最近窗口内的分位数 (0.0..=1.0)
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.recent.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[rank])
    }

    pub fn overall(&self) -> StatsSummary {
        StatsSummary::from(&self.overall)
    }

    pub fn is_empty(&self) -> bool {
        self.overall.count() == 0
    }
}

impl std::fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.percentile(0.5), self.percentile(0.99)) {
            (Some(p50), Some(p99)) => write!(
                f,
                "p50={:.3}ms, p99={:.3}ms, overall: {}",
                p50,
                p99,
                self.overall()
            ),
            _ => write!(f, "N/A"),
        }
    }
}
