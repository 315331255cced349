//! Command implementations.

mod info;
mod publish;
mod subscribe;
mod validate;

pub use info::run_info;
pub use publish::run_publish;
pub use subscribe::run_subscribe;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::StreamBlueprint;
use tracing::{info, warn};

use crate::error::CliError;

/// Load the blueprint from `path`, or defaults when no file is given
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<StreamBlueprint> {
    let Some(path) = path else {
        info!("No configuration file, using defaults");
        return Ok(StreamBlueprint::default());
    };

    info!(config = %path.display(), "Loading configuration");
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Start the Prometheus exporter if a port was given
pub(crate) fn init_metrics(port: u16) {
    if port == 0 {
        return;
    }
    if let Err(e) = observability::init_metrics_only(port) {
        warn!(port, error = %e, "Metrics endpoint unavailable, continuing without it");
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
