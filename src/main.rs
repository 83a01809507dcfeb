use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use reader::{ClickHouseExecutor, ReadHandlerState, ReadSettings, RemoteReader, create_router};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "promhouse")]
#[command(about = "Prometheus remote_read adapter for ClickHouse")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<PromhouseCommands>,

    #[arg(long, help = "HTTP bind address, overrides http.bind from configuration")]
    bind: Option<String>,
}

#[derive(Subcommand)]
enum PromhouseCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for PromhouseCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    let mut config = utils::load_config(cli.common.config.as_ref())?;
    if let Some(bind) = cli.bind {
        config.http.bind = bind;
    }

    // Handle common commands that don't require starting the service
    let command = cli.command.unwrap_or_default();
    let PromhouseCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(());
    }

    utils::validate_config(&config)?;

    log::info!("Starting promhouse remote_read adapter");

    let http_addr: SocketAddr = config
        .http
        .bind
        .parse()
        .context("Invalid HTTP bind address")?;

    let executor = ClickHouseExecutor::connect(&config.clickhouse)
        .await
        .with_context(|| format!("Failed to connect to ClickHouse at {}", config.clickhouse.url))?;
    log::info!(
        "Connected to ClickHouse at {}, reading from {}",
        config.clickhouse.url,
        config.clickhouse.table
    );

    if let Some(label) = &config.read.ignore_label {
        log::info!("Dropping equality matchers on {label}");
    }
    if config.read.ignore_hints {
        log::info!("Ignoring read hints, returning raw samples");
    }

    let reader = RemoteReader::new(executor, ReadSettings::from(&config));
    let app = create_router(ReadHandlerState::new(reader, config.read.query_timeout));

    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {http_addr}"))?;
    log::info!("Serving remote_read on http://{http_addr}/api/v1/read");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
            log::info!("Shutdown signal received, stopping HTTP server");
        })
        .await
        .context("HTTP server error")?;

    log::info!("promhouse stopped");
    Ok(())
}
