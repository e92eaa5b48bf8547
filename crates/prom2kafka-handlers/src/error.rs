use prom2kafka_core::DecodeError;

/// Request-fatal failures of the ingest pipeline
#[derive(Debug, Clone)]
pub enum IngestError {
    // 400-level: Client errors
    InvalidRequest {
        message: String,
        hint: Option<String>,
    },
    PayloadTooLarge {
        /// Unknown when the body was cut off at the limit without a
        /// Content-Length header.
        size: Option<usize>,
        limit: usize,
    },

    // 500-level: Server errors
    PublishFailed {
        message: String,
        /// Records admitted before the failure. They are not rolled back.
        accepted: usize,
    },
    InternalError {
        message: String,
    },
}

impl IngestError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::PublishFailed { .. } => 500,
            Self::InternalError { .. } => 500,
        }
    }

    /// Error type string for responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::PublishFailed { .. } => "PublishFailed",
            Self::InternalError { .. } => "InternalError",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        match self {
            Self::InvalidRequest { message, .. } => message.clone(),
            Self::PayloadTooLarge {
                size: Some(size),
                limit,
            } => format!(
                "Payload size {} bytes exceeds limit of {} bytes",
                size, limit
            ),
            Self::PayloadTooLarge { size: None, limit } => {
                format!("Payload exceeds limit of {} bytes", limit)
            }
            Self::PublishFailed { message, accepted } => format!(
                "Publishing failed after {} accepted records: {}",
                accepted, message
            ),
            Self::InternalError { message } => message.clone(),
        }
    }

    /// Optional hint for fixing the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidRequest { hint, .. } => hint.clone(),
            Self::PayloadTooLarge { .. } => Some(
                "Lower queue_config.max_samples_per_send or increase PROM2KAFKA_MAX_PAYLOAD_BYTES"
                    .into(),
            ),
            _ => None,
        }
    }
}

impl From<DecodeError> for IngestError {
    fn from(err: DecodeError) -> Self {
        let hint = match &err {
            DecodeError::Decompression(_) => {
                Some("Body must be a snappy block-compressed remote-write WriteRequest".into())
            }
            DecodeError::MalformedEnvelope(_) => None,
        };
        IngestError::InvalidRequest {
            message: err.to_string(),
            hint,
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for IngestError {}
