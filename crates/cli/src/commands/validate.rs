//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{InboxMode, StreamBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    endpoint: String,
    topic_count: usize,
    element_kind: String,
    inbox: String,
    render_hz: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    endpoint: blueprint.transport.endpoint(),
                    topic_count: blueprint.topics.len(),
                    element_kind: blueprint.element_kind.to_string(),
                    inbox: describe_inbox(&blueprint.transport.inbox),
                    render_hz: blueprint.subscriber.render_hz,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

pub(crate) fn describe_inbox(mode: &InboxMode) -> String {
    match mode {
        InboxMode::PerTopic => "per-topic".to_string(),
        InboxMode::Latest => "latest".to_string(),
        InboxMode::Queue { depth } => format!("queue(depth={depth})"),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &StreamBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.topics.is_empty() {
        warnings.push("No topics configured - single anonymous stream".to_string());
    }

    // One slot for the whole connection starves all topics but the busiest
    if blueprint.transport.inbox == InboxMode::Latest && blueprint.topics.len() > 1 {
        warnings.push(format!(
            "inbox mode 'latest' keeps one message for {} topics - slower topics may never be seen",
            blueprint.topics.len()
        ));
    }

    if let InboxMode::Queue { depth } = blueprint.transport.inbox {
        if depth > blueprint.transport.send_hwm.max(1) * 4 {
            warnings.push(format!(
                "inbox queue depth {depth} buffers stale frames; consider 'per_topic'"
            ));
        }
    }

    if !blueprint.transport.keepalive.enabled {
        warnings.push("TCP keep-alive disabled - dead peers are detected late".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Endpoint: {}", summary.endpoint);
            println!("  Topics: {}", summary.topic_count);
            println!("  Element kind: {}", summary.element_kind);
            println!("  Inbox: {}", summary.inbox);
            println!("  Render: {} Hz", summary.render_hz);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TopicKey;
    use std::io::Write;

    #[test]
    fn test_warnings() {
        let mut bp = StreamBlueprint::default();
        assert_eq!(collect_warnings(&bp).len(), 1);

        bp.topics = vec![TopicKey::from("left"), TopicKey::from("right")];
        assert!(collect_warnings(&bp).is_empty());

        bp.transport.inbox = InboxMode::Latest;
        assert_eq!(collect_warnings(&bp).len(), 1);
    }

    #[test]
    fn test_validate_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "topics = [\"left\", \"right\"]").unwrap();

        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.summary.unwrap().topic_count, 2);

        let args = ValidateArgs {
            config: "does-not-exist.toml".into(),
            json: false,
        };
        assert!(!validate_config(&args).valid);
    }
}
