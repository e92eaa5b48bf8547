// Kafka producer configuration
//
// Typed fields with a single translation to librdkafka's string properties.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma separated `host:port` list.
    pub brokers: String,
    pub compression: Compression,
    pub batch_num_messages: u32,
    pub queue_buffering_max_messages: u32,
    pub acks: Acks,
    pub linger_ms: u32,
    pub message_timeout_ms: u32,
    pub client_id: String,
    /// Defaults to `ssl` when TLS files are set, otherwise left to librdkafka.
    pub security_protocol: Option<SecurityProtocol>,
    pub ssl: KafkaSslConfig,
    pub sasl: KafkaSaslConfig,
}

/// Broker TLS material. Paths are handed to librdkafka unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaSslConfig {
    pub ca_location: Option<String>,
    pub certificate_location: Option<String>,
    pub key_location: Option<String>,
    pub key_password: Option<String>,
}

impl KafkaSslConfig {
    pub fn is_configured(&self) -> bool {
        self.ca_location.is_some()
            || self.certificate_location.is_some()
            || self.key_location.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaSaslConfig {
    /// e.g. `PLAIN`, `SCRAM-SHA-256`, `SCRAM-SHA-512`
    pub mechanism: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl KafkaSaslConfig {
    pub fn is_configured(&self) -> bool {
        self.mechanism.is_some() || self.username.is_some() || self.password.is_some()
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "kafka:9092".to_string(),
            compression: Compression::None,
            batch_num_messages: 10_000,
            queue_buffering_max_messages: 100_000,
            acks: Acks::All,
            linger_ms: 5,
            message_timeout_ms: 30_000,
            client_id: "prom2kafka".to_string(),
            security_protocol: None,
            ssl: KafkaSslConfig::default(),
            sasl: KafkaSaslConfig::default(),
        }
    }
}

impl KafkaConfig {
    /// Protocol sent to the brokers, after applying the TLS default.
    pub fn effective_security_protocol(&self) -> Option<SecurityProtocol> {
        match self.security_protocol {
            Some(protocol) => Some(protocol),
            None if self.ssl.is_configured() => Some(SecurityProtocol::Ssl),
            None => None,
        }
    }

    /// librdkafka producer properties for this configuration.
    ///
    /// Security keys are only present when the corresponding settings are.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("bootstrap.servers", self.brokers.clone()),
            ("compression.codec", self.compression.as_str().to_string()),
            ("batch.num.messages", self.batch_num_messages.to_string()),
            (
                "queue.buffering.max.messages",
                self.queue_buffering_max_messages.to_string(),
            ),
            ("acks", self.acks.as_str().to_string()),
            ("linger.ms", self.linger_ms.to_string()),
            ("message.timeout.ms", self.message_timeout_ms.to_string()),
            ("client.id", self.client_id.clone()),
        ];

        if let Some(protocol) = self.effective_security_protocol() {
            props.push(("security.protocol", protocol.as_str().to_string()));
        }

        let optional = [
            ("ssl.ca.location", &self.ssl.ca_location),
            ("ssl.certificate.location", &self.ssl.certificate_location),
            ("ssl.key.location", &self.ssl.key_location),
            ("ssl.key.password", &self.ssl.key_password),
            ("sasl.mechanism", &self.sasl.mechanism),
            ("sasl.username", &self.sasl.username),
            ("sasl.password", &self.sasl.password),
        ];
        props.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone()))),
        );

        props
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }

    pub fn uses_tls(&self) -> bool {
        matches!(self, SecurityProtocol::Ssl | SecurityProtocol::SaslSsl)
    }

    pub fn uses_sasl(&self) -> bool {
        matches!(
            self,
            SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl
        )
    }
}

impl std::fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityProtocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(SecurityProtocol::Plaintext),
            "ssl" => Ok(SecurityProtocol::Ssl),
            "sasl_plaintext" => Ok(SecurityProtocol::SaslPlaintext),
            "sasl_ssl" => Ok(SecurityProtocol::SaslSsl),
            _ => anyhow::bail!(
                "Unsupported kafka security protocol: {}. Supported: plaintext, ssl, sasl_plaintext, sasl_ssl",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "snappy" => Ok(Compression::Snappy),
            "lz4" => Ok(Compression::Lz4),
            "zstd" => Ok(Compression::Zstd),
            _ => anyhow::bail!(
                "Unsupported kafka compression: {}. Supported: none, gzip, snappy, lz4, zstd",
                s
            ),
        }
    }
}

/// Broker acknowledgement level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acks {
    /// Wait for all in-sync replicas.
    #[default]
    All,
    /// Wait for the partition leader only.
    Leader,
    /// Do not wait.
    None,
}

impl Acks {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acks::All => "all",
            Acks::Leader => "1",
            Acks::None => "0",
        }
    }
}

impl std::str::FromStr for Acks {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" | "-1" => Ok(Acks::All),
            "leader" | "1" => Ok(Acks::Leader),
            "none" | "0" => Ok(Acks::None),
            _ => anyhow::bail!("Unsupported kafka acks: {}. Supported: all, 1, 0", s),
        }
    }
}
