use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments shared by every promhouse binary
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands available for all services
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

pub mod utils {
    use super::*;
    use crate::config::{Configuration, is_table_identifier};
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Initialize logging based on CLI arguments.
    ///
    /// An explicit `RUST_LOG` wins over `--verbose` / `--quiet`.
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(&redacted(config))
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("promhouse configuration:");
            println!("========================");
            println!("ClickHouse URL: {}", config.clickhouse.url);
            println!("ClickHouse database: {}", config.clickhouse.database);
            println!("ClickHouse user: {}", config.clickhouse.username);
            println!("ClickHouse table: {}", config.clickhouse.table);
            println!("ClickHouse compression: {}", config.clickhouse.compression);
            println!(
                "ClickHouse connect timeout: {:?}",
                config.clickhouse.connect_timeout
            );
            match &config.read.ignore_label {
                Some(label) => println!("Ignored read label: {label}"),
                None => println!("Ignored read label: none"),
            }
            println!("Ignore read hints: {}", config.read.ignore_hints);
            match config.read.query_timeout {
                Some(timeout) => println!("Query timeout: {timeout:?}"),
                None => println!("Query timeout: disabled"),
            }
            println!("HTTP bind: {}", config.http.bind);
        }
        Ok(())
    }

    fn redacted(config: &Configuration) -> Configuration {
        let mut config = config.clone();
        if !config.clickhouse.password.is_empty() {
            config.clickhouse.password = String::from("***");
        }
        config
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.clickhouse.url.is_empty() {
            anyhow::bail!("ClickHouse URL cannot be empty");
        }

        if config.clickhouse.connect_timeout.is_zero() {
            anyhow::bail!("ClickHouse connect timeout must be greater than zero");
        }

        if !is_table_identifier(&config.clickhouse.table) {
            anyhow::bail!(
                "Invalid table name '{}': use a non-quoted identifier",
                config.clickhouse.table
            );
        }

        if let Some(label) = &config.read.ignore_label {
            if !label.contains('=') {
                anyhow::bail!("Ignored read label '{label}' must have the form name=value");
            }
        }

        config
            .http
            .bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid HTTP bind address '{}'", config.http.bind))?;

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting services
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
