// Initialization utilities for server mode
//
// Publisher backend and logging/tracing setup

use anyhow::{Context, Result};
use prom2kafka_config::{LogFormat, PublisherBackend, RuntimeConfig};
use prom2kafka_publisher::{Publisher, PublisherOptions, RestProxyClient};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;

/// Build the configured log client and start the publishing worker.
pub(crate) fn init_publisher(config: &RuntimeConfig) -> Result<(Publisher, JoinHandle<()>)> {
    let options = PublisherOptions {
        queue_capacity: config.publisher.queue_capacity,
        admission_timeout: config.publisher.admission_timeout(),
        max_batch: config.publisher.max_batch,
    };

    info!(
        "Initializing publisher with backend: {}",
        config.publisher.backend
    );

    match config.publisher.backend {
        PublisherBackend::Rest => {
            info!("Using Kafka REST proxy at: {}", config.rest.url);
            let client = RestProxyClient::new(config.rest.url.clone(), config.rest.timeout())
                .context("Failed to create REST proxy client")?;
            Ok(Publisher::start(client, options))
        }
        PublisherBackend::Kafka => init_kafka(config, options),
    }
}

#[cfg(feature = "kafka")]
fn init_kafka(
    config: &RuntimeConfig,
    options: PublisherOptions,
) -> Result<(Publisher, JoinHandle<()>)> {
    use prom2kafka_publisher::KafkaClient;
    use std::time::Duration;

    info!("Using Kafka brokers: {}", config.kafka.brokers);
    let client = KafkaClient::new(
        config.kafka.client_properties(),
        Duration::from_millis(u64::from(config.kafka.message_timeout_ms)),
    )
    .context("Failed to create Kafka producer")?;
    Ok(Publisher::start(client, options))
}

#[cfg(not(feature = "kafka"))]
fn init_kafka(
    _config: &RuntimeConfig,
    _options: PublisherOptions,
) -> Result<(Publisher, JoinHandle<()>)> {
    anyhow::bail!(
        "publisher backend 'kafka' requires a build with the 'kafka' feature; \
         use backend = \"rest\" or rebuild with --features kafka"
    )
}

/// Plain-text subscriber for the config-loading phase, before `init_tracing`
/// has a config to read. Level comes from `log_level`, then `RUST_LOG`,
/// then `info`.
pub fn bootstrap_subscriber<W>(
    log_level: Option<&str>,
    writer: W,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = log_level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
}

/// Initialize tracing/logging from RuntimeConfig
pub(crate) fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Parse log level from config
    let env_filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.server.log_format {
        LogFormat::Json => {
            registry.with(fmt::layer().json()).init();
        }
        LogFormat::Text => {
            registry.with(fmt::layer()).init();
        }
    }
}
