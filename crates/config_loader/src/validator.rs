//! 配置校验模块
//!
//! 校验规则：
//! - topic 非空且唯一
//! - port / send_hwm / max_message_bytes > 0
//! - inbox queue 深度 > 0
//! - max_pending_topics > 0
//! - render_hz > 0，且单次轮询超时不超过一个渲染周期

use std::collections::HashSet;

use contracts::{ContractError, InboxMode, StreamBlueprint};

/// 校验 StreamBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    validate_topics(blueprint)?;
    validate_transport(blueprint)?;
    validate_publisher(blueprint)?;
    validate_subscriber(blueprint)?;
    Ok(())
}

/// 校验 topic 列表
fn validate_topics(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, topic) in blueprint.topics.iter().enumerate() {
        if topic.is_anonymous() {
            return Err(ContractError::config_validation(
                format!("topics[{idx}]"),
                "topic name cannot be empty",
            ));
        }
        if topic.len() > u16::MAX as usize {
            return Err(ContractError::config_validation(
                format!("topics[{idx}]"),
                format!("topic name longer than {} bytes", u16::MAX),
            ));
        }
        if !seen.insert(topic.as_str()) {
            return Err(ContractError::config_validation(
                format!("topics[{topic}]"),
                "duplicate topic",
            ));
        }
    }
    Ok(())
}

/// 校验传输设置
fn validate_transport(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let transport = &blueprint.transport;

    if transport.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "transport.host",
            "host cannot be empty",
        ));
    }
    if transport.port == 0 {
        return Err(ContractError::config_validation(
            "transport.port",
            "port must be > 0",
        ));
    }
    if transport.send_hwm == 0 {
        return Err(ContractError::config_validation(
            "transport.send_hwm",
            "send_hwm must be > 0",
        ));
    }
    if transport.max_message_bytes == 0 {
        return Err(ContractError::config_validation(
            "transport.max_message_bytes",
            "max_message_bytes must be > 0",
        ));
    }
    if let InboxMode::Queue { depth: 0 } = transport.inbox {
        return Err(ContractError::config_validation(
            "transport.inbox.depth",
            "queue depth must be > 0",
        ));
    }
    if transport.connect_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "transport.connect_timeout_ms",
            "connect_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验发布端设置
fn validate_publisher(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    if blueprint.publisher.max_pending_topics == 0 {
        return Err(ContractError::config_validation(
            "publisher.max_pending_topics",
            "max_pending_topics must be > 0",
        ));
    }
    if blueprint.publisher.max_pending_topics < blueprint.topics.len() {
        return Err(ContractError::config_validation(
            "publisher.max_pending_topics",
            format!(
                "max_pending_topics ({}) is smaller than the topic list ({})",
                blueprint.publisher.max_pending_topics,
                blueprint.topics.len()
            ),
        ));
    }
    Ok(())
}

/// 校验订阅端设置
fn validate_subscriber(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let subscriber = &blueprint.subscriber;

    if !(subscriber.render_hz.is_finite() && subscriber.render_hz > 0.0) {
        return Err(ContractError::config_validation(
            "subscriber.render_hz",
            format!("render_hz must be > 0, got {}", subscriber.render_hz),
        ));
    }

    let render_interval_ms = 1000.0 / subscriber.render_hz;
    if subscriber.poll_timeout_ms as f64 > render_interval_ms {
        return Err(ContractError::config_validation(
            "subscriber.poll_timeout_ms",
            format!(
                "poll_timeout_ms ({}) must not exceed the render interval ({:.1} ms)",
                subscriber.poll_timeout_ms, render_interval_ms
            ),
        ));
    }

    if subscriber.latency_window == 0 {
        return Err(ContractError::config_validation(
            "subscriber.latency_window",
            "latency_window must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TopicKey;

    fn minimal_blueprint() -> StreamBlueprint {
        StreamBlueprint {
            topics: vec!["left".into(), "right".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
        assert!(validate(&StreamBlueprint::default()).is_ok());
    }

    #[test]
    fn test_duplicate_topic() {
        let mut bp = minimal_blueprint();
        bp.topics.push("left".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate topic"), "got: {err}");
    }

    #[test]
    fn test_empty_topic() {
        let mut bp = minimal_blueprint();
        bp.topics.push(TopicKey::anonymous());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_zero_send_hwm() {
        let mut bp = minimal_blueprint();
        bp.transport.send_hwm = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("send_hwm must be > 0"), "got: {err}");
    }

    #[test]
    fn test_zero_queue_depth() {
        let mut bp = minimal_blueprint();
        bp.transport.inbox = InboxMode::Queue { depth: 0 };
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("queue depth"), "got: {err}");
    }

    #[test]
    fn test_pending_topics_below_topic_count() {
        let mut bp = minimal_blueprint();
        bp.publisher.max_pending_topics = 1;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("smaller than the topic list"), "got: {err}");
    }

    #[test]
    fn test_invalid_render_hz() {
        let mut bp = minimal_blueprint();
        bp.subscriber.render_hz = 0.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("render_hz must be > 0"), "got: {err}");
    }

    #[test]
    fn test_poll_timeout_longer_than_tick() {
        let mut bp = minimal_blueprint();
        bp.subscriber.render_hz = 100.0;
        bp.subscriber.poll_timeout_ms = 50;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("render interval"), "got: {err}");
    }
}
