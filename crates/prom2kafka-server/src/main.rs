use anyhow::{Context, Result};
use clap::Parser;
use prom2kafka_config::RuntimeConfig;
use std::path::PathBuf;

/// Prometheus remote-write receiver publishing samples to Kafka
#[derive(Parser)]
#[command(name = "prom2kafka")]
#[command(version)]
#[command(about = "Prometheus remote-write receiver publishing samples to Kafka", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level filter, e.g. "info" or "prom2kafka=debug"
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build tokio runtime and run async server
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Loading and validation log warnings before the configured subscriber
    // exists, so they go through a stderr subscriber scoped to this step.
    let bootstrap =
        prom2kafka_server::bootstrap_subscriber(cli.log_level.as_deref(), std::io::stderr);
    let config = tracing::subscriber::with_default(bootstrap, || load_config(&cli))?;

    prom2kafka_server::run_with_config(config).await
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    // Step 1: Load base configuration (file + environment)
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }

    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }
}
