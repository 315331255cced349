//! # array-stream CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 合成数据发布端 (`publish`)
//! - 订阅端渲染循环 (`subscribe`)
//! - 配置校验与信息展示

mod cli;
mod commands;
mod error;
mod stats;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_publish, run_subscribe, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "array-stream starting");

    let result = match &cli.command {
        Commands::Publish(args) => run_publish(args).await,
        Commands::Subscribe(args) => run_subscribe(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    observability::init_with_config(logging_config(cli))
}

/// Metrics are started per command, once the port is known
fn logging_config(cli: &Cli) -> observability::ObservabilityConfig {
    observability::ObservabilityConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_format(cli.log_format.clone().into())
}
