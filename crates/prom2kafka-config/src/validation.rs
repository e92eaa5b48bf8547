// Configuration validation
//
// Rejects values the pipeline cannot run with and warns about risky ones

use crate::*;
use anyhow::{bail, Result};
use prom2kafka_core::route::METRIC_PLACEHOLDER;
use prom2kafka_core::validate_topic;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_request_config(&config.request)?;
    validate_serialization_config(&config.serialization)?;
    validate_routing_config(&config.routing)?;
    validate_publisher_config(&config.publisher)?;

    match config.publisher.backend {
        PublisherBackend::Kafka => validate_kafka_config(&config.kafka)?,
        PublisherBackend::Rest => validate_rest_config(&config.rest)?,
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.max_payload_bytes == 0 {
        bail!("request.max_payload_bytes must be greater than 0");
    }

    if config.max_decompressed_bytes == 0 {
        bail!("request.max_decompressed_bytes must be greater than 0");
    }

    if config.max_decompressed_bytes < config.max_payload_bytes {
        warn!(
            max_payload_bytes = config.max_payload_bytes,
            max_decompressed_bytes = config.max_decompressed_bytes,
            "request.max_decompressed_bytes is below max_payload_bytes; large batches will be rejected"
        );
    }

    if config.max_payload_bytes > 100 * 1024 * 1024 {
        // 100 MB
        warn!(
            max_payload_bytes = config.max_payload_bytes,
            "request.max_payload_bytes is very large; may cause issues"
        );
    }

    Ok(())
}

fn validate_serialization_config(config: &SerializationConfig) -> Result<()> {
    if config.max_message_bytes == 0 {
        bail!("serialization.max_message_bytes must be greater than 0");
    }

    if config.schema_id.is_some() && config.format != SerializationFormat::Avro {
        warn!(
            format = config.format.as_str(),
            "serialization.schema_id is only used by the avro format"
        );
    }

    Ok(())
}

fn validate_routing_config(config: &RoutingConfig) -> Result<()> {
    match &config.topic_template {
        Some(template) => {
            if !template.contains(METRIC_PLACEHOLDER) {
                bail!(
                    "routing.topic_template must contain {} (got '{}')",
                    METRIC_PLACEHOLDER,
                    template
                );
            }
            // Check the static parts with a placeholder metric substituted.
            let sample = template.replace(METRIC_PLACEHOLDER, "m");
            if let Err(e) = validate_topic(&sample) {
                bail!("routing.topic_template is invalid: {}", e);
            }
        }
        None => {
            if let Err(e) = validate_topic(&config.topic) {
                bail!("routing.topic is invalid: {}", e);
            }
        }
    }

    for (metric, topic) in &config.overrides {
        if let Err(e) = validate_topic(topic) {
            bail!("routing.overrides.{} is invalid: {}", metric, e);
        }
    }

    if let PartitionKeyPolicy::Label(label) = &config.partition_key {
        if label.trim().is_empty() {
            bail!("routing.partition_key label must not be empty");
        }
    }

    Ok(())
}

fn validate_publisher_config(config: &PublisherConfig) -> Result<()> {
    if config.queue_capacity == 0 {
        bail!("publisher.queue_capacity must be greater than 0");
    }

    if config.admission_timeout_ms == 0 {
        bail!("publisher.admission_timeout_ms must be greater than 0");
    }

    if config.max_batch == 0 {
        bail!("publisher.max_batch must be greater than 0");
    }

    if config.admission_timeout_ms > 5_000 {
        warn!(
            admission_timeout_ms = config.admission_timeout_ms,
            "publisher.admission_timeout_ms is long; saturated requests will hold workers"
        );
    }

    if config.queue_capacity > 10_000_000 {
        warn!(
            queue_capacity = config.queue_capacity,
            "publisher.queue_capacity is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_kafka_config(config: &KafkaConfig) -> Result<()> {
    if config.brokers.trim().is_empty() {
        bail!("kafka.brokers is required for the kafka backend");
    }

    if config.batch_num_messages == 0 {
        bail!("kafka.batch_num_messages must be greater than 0");
    }

    if config.message_timeout_ms == 0 {
        bail!("kafka.message_timeout_ms must be greater than 0");
    }

    validate_kafka_security(config)
}

fn validate_kafka_security(config: &KafkaConfig) -> Result<()> {
    let protocol = config.effective_security_protocol();

    if config.ssl.is_configured() {
        if !protocol.is_some_and(|p| p.uses_tls()) {
            bail!(
                "kafka.security_protocol must be ssl or sasl_ssl when kafka.ssl files are set (got '{}')",
                protocol.map_or("unset", |p| p.as_str())
            );
        }
        if config.ssl.certificate_location.is_some() != config.ssl.key_location.is_some() {
            bail!("kafka.ssl.certificate_location and kafka.ssl.key_location must be set together");
        }
    }

    if config.sasl.is_configured() {
        if !protocol.is_some_and(|p| p.uses_sasl()) {
            bail!(
                "kafka.security_protocol must be sasl_ssl or sasl_plaintext when kafka.sasl is set (got '{}')",
                protocol.map_or("unset", |p| p.as_str())
            );
        }
        if config.sasl.mechanism.is_none()
            || config.sasl.username.is_none()
            || config.sasl.password.is_none()
        {
            bail!("kafka.sasl requires mechanism, username and password");
        }
    } else if protocol.is_some_and(|p| p.uses_sasl()) {
        warn!(
            "kafka.security_protocol is {} but no kafka.sasl credentials are set",
            protocol.map_or("unset", |p| p.as_str())
        );
    }

    Ok(())
}

fn validate_rest_config(config: &RestProxyConfig) -> Result<()> {
    if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
        bail!("rest.url must start with http:// or https:// (got '{}')", config.url);
    }

    if config.timeout_ms == 0 {
        bail!("rest.timeout_ms must be greater than 0");
    }

    Ok(())
}
