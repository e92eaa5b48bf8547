// prom2kafka-config - Runtime configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority; PROM2KAFKA_* and the legacy
//    adapter names such as KAFKA_BROKER_LIST)
// 2. Config file path from --config or PROM2KAFKA_CONFIG
// 3. Config file contents from PROM2KAFKA_CONFIG_CONTENT
// 4. Default config file locations (./config.toml, ./.prom2kafka.toml)
// 5. Built-in defaults (lowest priority)
//
// The pipeline crates never read any of these sources; they receive the typed
// sections below at construction.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

mod env_overrides;
mod kafka;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use kafka::{
    Acks, Compression, KafkaConfig, KafkaSaslConfig, KafkaSslConfig, SecurityProtocol,
};
pub use prom2kafka_core::{
    NonFinitePolicy, PartitionKeyPolicy, SerializationFormat, TopicStrategy,
};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub serialization: SerializationConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub kafka: KafkaConfig,

    #[serde(default)]
    pub rest: RestProxyConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Request handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Largest compressed body accepted on `/receive`.
    pub max_payload_bytes: usize,
    /// Largest decompressed WriteRequest.
    pub max_decompressed_bytes: usize,
    /// Status returned when some records were rejected as saturated.
    pub partial_failure_status: PartialFailureStatus,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 8 * 1024 * 1024,
            max_decompressed_bytes: prom2kafka_core::decode::DEFAULT_MAX_DECOMPRESSED_BYTES,
            partial_failure_status: PartialFailureStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailureStatus {
    /// 503: Prometheus retries the whole batch.
    #[default]
    ServiceUnavailable,
    /// 206: the batch is not retried; rejected samples are lost.
    PartialContent,
}

impl std::str::FromStr for PartialFailureStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "service_unavailable" | "503" => Ok(PartialFailureStatus::ServiceUnavailable),
            "partial_content" | "206" => Ok(PartialFailureStatus::PartialContent),
            _ => anyhow::bail!(
                "Unsupported partial failure status: {}. Supported: service_unavailable, partial_content",
                s
            ),
        }
    }
}

/// Transformer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub non_finite: NonFinitePolicy,
}

/// Record encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationConfig {
    pub format: SerializationFormat,
    /// Schema registry id. When set, Avro payloads use Confluent framing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<u32>,
    pub max_message_bytes: usize,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            format: SerializationFormat::Json,
            schema_id: None,
            max_message_bytes: prom2kafka_core::DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Destination routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Static destination topic.
    pub topic: String,
    /// Per-metric topic template containing `{metric}`. Takes precedence
    /// over `topic` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_template: Option<String>,
    /// Metric name -> topic, consulted before the strategy.
    pub overrides: HashMap<String, String>,
    pub partition_key: PartitionKeyPolicy,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            topic: prom2kafka_core::route::DEFAULT_TOPIC.to_string(),
            topic_template: None,
            overrides: HashMap::new(),
            partition_key: PartitionKeyPolicy::MetricName,
        }
    }
}

impl RoutingConfig {
    pub fn strategy(&self) -> TopicStrategy {
        match &self.topic_template {
            Some(template) => TopicStrategy::PerMetric {
                template: template.clone(),
            },
            None => TopicStrategy::Static {
                topic: self.topic.clone(),
            },
        }
    }
}

/// Publisher adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub backend: PublisherBackend,
    /// Records admitted but not yet handed to the log client.
    pub queue_capacity: usize,
    /// Longest a request waits for queue space before the record is rejected.
    pub admission_timeout_ms: u64,
    /// Records the worker hands to the client per send call.
    pub max_batch: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            backend: PublisherBackend::Rest,
            queue_capacity: 10_000,
            admission_timeout_ms: 100,
            max_batch: 500,
        }
    }
}

impl PublisherConfig {
    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherBackend {
    /// Kafka REST Proxy (v2 API).
    Rest,
    /// Native librdkafka producer. Requires the `kafka` feature.
    Kafka,
}

impl std::fmt::Display for PublisherBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublisherBackend::Rest => write!(f, "rest"),
            PublisherBackend::Kafka => write!(f, "kafka"),
        }
    }
}

impl std::str::FromStr for PublisherBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rest" | "rest-proxy" => Ok(PublisherBackend::Rest),
            "kafka" | "rdkafka" => Ok(PublisherBackend::Kafka),
            _ => anyhow::bail!("Unsupported publisher backend: {}. Supported: rest, kafka", s),
        }
    }
}

/// Kafka REST Proxy client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestProxyConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for RestProxyConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8082".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl RestProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Load configuration with graceful fallback to defaults.
    /// Does not fail if config file is missing - uses defaults instead.
    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default()
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from inline TOML plus overrides supplied by an
    /// `EnvSource`. Does not touch the host environment or filesystem.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        // Sections and keys missing from the TOML keep their defaults.
        let mut config = match inline_config {
            Some(inline) => {
                toml::from_str(inline).context("Failed to parse inline config content")?
            }
            None => RuntimeConfig::default(),
        };

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
