use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{builder::RangedU64ValueParser, Parser};
use rmcp::ServiceExt;
use toolscout::{
    config::{load_config, ConfigSources},
    logging::{init_logging, LoggingConfig, DEFAULT_LOG_LEVEL},
    ProxyServer,
};
use toolscout_mcp::ProxyAggregator;
use tracing::{error, info};

/// Meta MCP proxy: discover and execute tools across many MCP servers
#[derive(Parser, Debug)]
#[command(name = "toolscout")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file; repeat to merge several (later files win)
    #[arg(short, long = "config", value_name = "FILE")]
    config: Vec<PathBuf>,

    /// Maximum number of tools returned by discover
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    discover_limit: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Validate the configuration, print backend ids and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        json: args.log_json,
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("toolscout: failed to initialize logging: {e}");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("toolscout: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let sources = ConfigSources::new(args.config)
        .with_discover_limit(args.discover_limit);
    let config = load_config(&sources)
        .await
        .context("failed to load configuration")?;

    if args.check {
        for id in config.mcp_servers.keys() {
            println!("{id}");
        }
        return Ok(());
    }

    let aggregator = Arc::new(
        ProxyAggregator::start(config)
            .await
            .context("failed to start backends")?,
    );

    let service = ProxyServer::new(Arc::clone(&aggregator))
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP server on stdio")?;
    info!(tools = aggregator.catalog().len(), "Serving discover and execute on stdio");

    tokio::select! {
        result = service.waiting() => {
            match result {
                Ok(reason) => info!(reason = ?reason, "MCP session ended"),
                Err(e) => error!(error = %e, "MCP session task failed"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    aggregator.shutdown().await;
    Ok(())
}
