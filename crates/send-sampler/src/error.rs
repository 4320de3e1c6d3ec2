//! Error types for the send sampler.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while validating sampler settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Name server port must be non-zero")]
    InvalidPort,

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} '{value}' contains illegal characters, allowed: [%|a-zA-Z0-9_-]")]
    IllegalCharacters { field: &'static str, value: String },

    #[error("Topic '{0}' is reserved by the broker")]
    ReservedTopic(String),

    #[error("Unknown send method: {0}")]
    UnknownSendMethod(String),
}

/// Failures reported by a [`Producer`](crate::Producer) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientError {
    #[error("producer failed to start: {message}")]
    Start { message: String },

    #[error("send timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("broker rejected the request (code {code}): {remark}")]
    Broker { code: i32, remark: String },

    #[error("invalid message: {message}")]
    InvalidMessage { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },
}

/// Errors recorded on a failed [`SampleResult`](crate::SampleResult).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SamplerError {
    #[error("message body cannot be encoded: {0}")]
    Encoding(String),

    #[error("connection failed: {0}")]
    Connection(ClientError),

    #[error("send failed: {0}")]
    Send(ClientError),

    #[error("async send failed: {0}")]
    Callback(String),
}

impl SamplerError {
    /// Response code reported for samples that failed with this error.
    pub fn response_code(&self) -> &'static str {
        match self {
            SamplerError::Encoding(_) => "ENCODING_ERROR",
            SamplerError::Connection(_) => "CONNECTION_ERROR",
            SamplerError::Send(_) => "SEND_ERROR",
            SamplerError::Callback(_) => "CALLBACK_ERROR",
        }
    }
}
