use crate::{
    Acks, Compression, LogFormat, NonFinitePolicy, PartialFailureStatus, PartitionKeyPolicy,
    PublisherBackend, RuntimeConfig, SecurityProtocol, SerializationFormat,
};
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "PROM2KAFKA_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the PROM2KAFKA_ prefix.
    /// Used for the unprefixed variable names of prometheus-kafka-adapter.
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Unprefixed legacy names first so PROM2KAFKA_* wins when both are set.
    apply_legacy_overrides(config, env)?;

    // Server configuration (listen addr, log level/format)
    if let Some(addr) = get_env_string(env, "LISTEN_ADDR") {
        config.server.listen_addr = addr;
    }
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.server.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Request configuration
    if let Some(val) = get_env_parsed::<_, usize>(env, "MAX_PAYLOAD_BYTES")? {
        config.request.max_payload_bytes = val;
    }
    if let Some(val) = get_env_parsed::<_, usize>(env, "MAX_DECOMPRESSED_BYTES")? {
        config.request.max_decompressed_bytes = val;
    }
    if let Some(val) = get_env_string(env, "PARTIAL_FAILURE_STATUS") {
        config.request.partial_failure_status = val
            .parse::<PartialFailureStatus>()
            .context("Invalid PROM2KAFKA_PARTIAL_FAILURE_STATUS value")?;
    }

    // Pipeline
    if let Some(val) = get_env_string(env, "NON_FINITE") {
        config.pipeline.non_finite = val
            .parse::<NonFinitePolicy>()
            .map_err(|e| anyhow!("Invalid PROM2KAFKA_NON_FINITE value: {}", e))?;
    }

    // Serialization
    if let Some(val) = get_env_string(env, "SERIALIZATION_FORMAT") {
        config.serialization.format = val
            .parse::<SerializationFormat>()
            .map_err(|e| anyhow!("Invalid PROM2KAFKA_SERIALIZATION_FORMAT value: {}", e))?;
    }
    if let Some(val) = get_env_parsed::<_, u32>(env, "SCHEMA_ID")? {
        config.serialization.schema_id = Some(val);
    }
    if let Some(val) = get_env_parsed::<_, usize>(env, "MAX_MESSAGE_BYTES")? {
        config.serialization.max_message_bytes = val;
    }

    // Routing
    if let Some(topic) = get_env_string(env, "TOPIC") {
        config.routing.topic = topic;
    }
    if let Some(template) = get_env_string(env, "TOPIC_TEMPLATE") {
        config.routing.topic_template = Some(template);
    }
    if let Some(val) = get_env_string(env, "PARTITION_KEY") {
        config.routing.partition_key = parse_partition_key(&val)?;
    }

    // Publisher
    if let Some(val) = get_env_string(env, "PUBLISHER_BACKEND") {
        config.publisher.backend = val
            .parse::<PublisherBackend>()
            .context("Invalid PROM2KAFKA_PUBLISHER_BACKEND value")?;
    }
    if let Some(val) = get_env_parsed::<_, usize>(env, "QUEUE_CAPACITY")? {
        config.publisher.queue_capacity = val;
    }
    if let Some(val) = get_env_parsed::<_, u64>(env, "ADMISSION_TIMEOUT_MS")? {
        config.publisher.admission_timeout_ms = val;
    }
    if let Some(val) = get_env_parsed::<_, usize>(env, "MAX_BATCH")? {
        config.publisher.max_batch = val;
    }

    // Kafka producer
    if let Some(brokers) = get_env_string(env, "KAFKA_BROKERS") {
        config.kafka.brokers = brokers;
    }
    if let Some(val) = get_env_string(env, "KAFKA_COMPRESSION") {
        config.kafka.compression = val
            .parse::<Compression>()
            .context("Invalid PROM2KAFKA_KAFKA_COMPRESSION value")?;
    }
    if let Some(val) = get_env_parsed::<_, u32>(env, "KAFKA_BATCH_NUM_MESSAGES")? {
        config.kafka.batch_num_messages = val;
    }
    if let Some(val) = get_env_parsed::<_, u32>(env, "KAFKA_QUEUE_BUFFERING_MAX_MESSAGES")? {
        config.kafka.queue_buffering_max_messages = val;
    }
    if let Some(val) = get_env_string(env, "KAFKA_ACKS") {
        config.kafka.acks = val
            .parse::<Acks>()
            .context("Invalid PROM2KAFKA_KAFKA_ACKS value")?;
    }
    if let Some(val) = get_env_parsed::<_, u32>(env, "KAFKA_LINGER_MS")? {
        config.kafka.linger_ms = val;
    }
    if let Some(val) = get_env_parsed::<_, u32>(env, "KAFKA_MESSAGE_TIMEOUT_MS")? {
        config.kafka.message_timeout_ms = val;
    }
    if let Some(val) = get_env_string(env, "KAFKA_CLIENT_ID") {
        config.kafka.client_id = val;
    }
    if let Some(val) = get_env_string(env, "KAFKA_SECURITY_PROTOCOL") {
        config.kafka.security_protocol = Some(
            val.parse::<SecurityProtocol>()
                .context("Invalid PROM2KAFKA_KAFKA_SECURITY_PROTOCOL value")?,
        );
    }
    let ssl = &mut config.kafka.ssl;
    set_if_present(&mut ssl.ca_location, get_env_string(env, "KAFKA_SSL_CA_LOCATION"));
    set_if_present(
        &mut ssl.certificate_location,
        get_env_string(env, "KAFKA_SSL_CERTIFICATE_LOCATION"),
    );
    set_if_present(&mut ssl.key_location, get_env_string(env, "KAFKA_SSL_KEY_LOCATION"));
    set_if_present(&mut ssl.key_password, get_env_string(env, "KAFKA_SSL_KEY_PASSWORD"));
    let sasl = &mut config.kafka.sasl;
    set_if_present(&mut sasl.mechanism, get_env_string(env, "KAFKA_SASL_MECHANISM"));
    set_if_present(&mut sasl.username, get_env_string(env, "KAFKA_SASL_USERNAME"));
    set_if_present(&mut sasl.password, get_env_string(env, "KAFKA_SASL_PASSWORD"));

    // REST proxy
    if let Some(url) = get_env_string(env, "REST_URL") {
        config.rest.url = url;
    }
    if let Some(val) = get_env_parsed::<_, u64>(env, "REST_TIMEOUT_MS")? {
        config.rest.timeout_ms = val;
    }

    Ok(())
}

/// Variables understood by prometheus-kafka-adapter deployments.
fn apply_legacy_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    if let Some(brokers) = env.get_raw("KAFKA_BROKER_LIST") {
        config.kafka.brokers = brokers;
    }
    if let Some(topic) = env.get_raw("KAFKA_TOPIC") {
        config.routing.topic = topic;
    }
    if let Some(val) = env.get_raw("KAFKA_COMPRESSION") {
        config.kafka.compression = val
            .parse::<Compression>()
            .context("Invalid KAFKA_COMPRESSION value")?;
    }
    if let Some(val) = env.get_raw("KAFKA_BATCH_NUM_MESSAGES") {
        config.kafka.batch_num_messages = val
            .parse::<u32>()
            .map_err(|e| anyhow!("Failed to parse KAFKA_BATCH_NUM_MESSAGES: {}", e))?;
    }
    if let Some(val) = env.get_raw("KAFKA_ACKS") {
        config.kafka.acks = val.parse::<Acks>().context("Invalid KAFKA_ACKS value")?;
    }
    if let Some(val) = env.get_raw("KAFKA_SECURITY_PROTOCOL") {
        config.kafka.security_protocol = Some(
            val.parse::<SecurityProtocol>()
                .context("Invalid KAFKA_SECURITY_PROTOCOL value")?,
        );
    }
    let ssl = &mut config.kafka.ssl;
    set_if_present(&mut ssl.ca_location, env.get_raw("KAFKA_SSL_CA_CERT_FILE"));
    set_if_present(
        &mut ssl.certificate_location,
        env.get_raw("KAFKA_SSL_CLIENT_CERT_FILE"),
    );
    set_if_present(&mut ssl.key_location, env.get_raw("KAFKA_SSL_CLIENT_KEY_FILE"));
    set_if_present(&mut ssl.key_password, env.get_raw("KAFKA_SSL_CLIENT_KEY_PASS"));
    let sasl = &mut config.kafka.sasl;
    set_if_present(&mut sasl.mechanism, env.get_raw("KAFKA_SASL_MECHANISM"));
    set_if_present(&mut sasl.username, env.get_raw("KAFKA_SASL_USERNAME"));
    set_if_present(&mut sasl.password, env.get_raw("KAFKA_SASL_PASSWORD"));
    if let Some(val) = env.get_raw("SERIALIZATION_FORMAT") {
        config.serialization.format = match val.to_lowercase().as_str() {
            // The adapter's Avro-JSON text encoding has no equivalent here.
            "avro-json" => {
                tracing::warn!("SERIALIZATION_FORMAT=avro-json is served as binary avro");
                SerializationFormat::Avro
            }
            other => other
                .parse::<SerializationFormat>()
                .map_err(|e| anyhow!("Invalid SERIALIZATION_FORMAT value: {}", e))?,
        };
    }
    if let Some(level) = env.get_raw("LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(port) = env.get_raw("PORT") {
        let port = port
            .parse::<u16>()
            .map_err(|e| anyhow!("Failed to parse PORT: {}", e))?;
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }
    Ok(())
}

/// `metric_name`, `none`, or `label:<name>`.
fn parse_partition_key(val: &str) -> Result<PartitionKeyPolicy> {
    match val {
        "metric_name" => Ok(PartitionKeyPolicy::MetricName),
        "none" => Ok(PartitionKeyPolicy::None),
        other => match other.strip_prefix("label:") {
            Some(label) if !label.is_empty() => Ok(PartitionKeyPolicy::Label(label.to_string())),
            _ => Err(anyhow!(
                "Invalid {}PARTITION_KEY value '{}': expected metric_name, none or label:<name>",
                ENV_PREFIX,
                val
            )),
        },
    }
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

/// Empty values leave the setting untouched.
fn set_if_present(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *target = Some(value);
    }
}

fn get_env_parsed<E: EnvSource, T>(env: &E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
