//! Sampler configuration.
//!
//! [`SamplerSettings`] holds the raw editable fields as a user or a config
//! file provides them. [`SamplerSettings::validate`] checks them once and
//! produces the immutable [`SamplerConfig`] the sampler runs with.

use crate::error::{ConfigError, SamplerError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default name server port.
pub const DEFAULT_NAME_SERVER_PORT: u16 = 9876;

/// Send timeout used when the configured timeout is zero.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(3000);

/// Topic the broker uses as a template for auto-created topics.
pub const AUTO_CREATE_TOPIC_KEY: &str = "TBW102";

const MAX_TOPIC_LEN: usize = 127;
const MAX_GROUP_LEN: usize = 255;

/// How a message is handed to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Wait for the broker acknowledgement.
    #[default]
    Sync,
    /// Submit and receive the acknowledgement through a callback.
    Async,
    /// Fire and forget, no acknowledgement.
    #[serde(rename = "oneway")]
    OneWay,
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendMode::Sync => "sync",
            SendMode::Async => "async",
            SendMode::OneWay => "oneway",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = ConfigError;

    /// Accepts `sync`, `async`, `oneway` and the `method.*` resource keys,
    /// ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let tag = lower.strip_prefix("method.").unwrap_or(&lower);
        match tag {
            "sync" => Ok(SendMode::Sync),
            "async" => Ok(SendMode::Async),
            "oneway" | "one-way" => Ok(SendMode::OneWay),
            _ => Err(ConfigError::UnknownSendMethod(s.to_string())),
        }
    }
}

/// Text encoding used to turn the configured body into message bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// The body is sent as its UTF-8 bytes.
    #[default]
    Utf8,
    /// The body is standard base64 and is decoded before sending.
    Base64,
}

impl fmt::Display for BodyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyEncoding::Utf8 => write!(f, "utf8"),
            BodyEncoding::Base64 => write!(f, "base64"),
        }
    }
}

/// Editable sampler fields, as loaded from a config file or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerSettings {
    /// Label reported on every sample (defaults to the topic)
    pub label: Option<String>,
    /// Name server host
    pub name_server_host: String,
    /// Name server port
    pub name_server_port: u16,
    /// Producer group the client registers under
    pub producer_group: String,
    /// Destination topic
    pub topic: String,
    /// Message tag (may be empty)
    pub tag: String,
    /// Message body
    pub body: String,
    /// Encoding of `body`
    pub body_encoding: BodyEncoding,
    /// Send timeout in milliseconds (0 = client default)
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    /// Send method tag: `sync`, `async` or `oneway`
    #[serde(alias = "send_mode")]
    pub send_method: Option<String>,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            label: None,
            name_server_host: String::new(),
            name_server_port: DEFAULT_NAME_SERVER_PORT,
            producer_group: String::new(),
            topic: String::new(),
            tag: String::new(),
            body: String::new(),
            body_encoding: BodyEncoding::Utf8,
            timeout_ms: 0,
            send_method: None,
        }
    }
}

impl SamplerSettings {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check every field and build the immutable config.
    pub fn validate(&self) -> Result<SamplerConfig, ConfigError> {
        let host = self.name_server_host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingField("name_server_host"));
        }
        if self.name_server_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        check_name("producer_group", &self.producer_group, MAX_GROUP_LEN)?;
        check_name("topic", &self.topic, MAX_TOPIC_LEN)?;
        if self.topic == AUTO_CREATE_TOPIC_KEY {
            return Err(ConfigError::ReservedTopic(self.topic.clone()));
        }

        let send_mode = match self.send_method.as_deref() {
            None => SendMode::Sync,
            Some(method) => method.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown send method '{method}', falling back to sync");
                SendMode::Sync
            }),
        };

        let timeout = if self.timeout_ms == 0 {
            DEFAULT_SEND_TIMEOUT
        } else {
            Duration::from_millis(self.timeout_ms)
        };

        Ok(SamplerConfig {
            label: self.label.clone().unwrap_or_else(|| self.topic.clone()),
            name_server_host: host.to_string(),
            name_server_port: self.name_server_port,
            producer_group: self.producer_group.clone(),
            topic: self.topic.clone(),
            tag: self.tag.clone(),
            body: self.body.clone(),
            body_encoding: self.body_encoding,
            timeout,
            send_mode,
        })
    }
}

fn check_name(field: &'static str, value: &str, max: usize) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if value.len() > max {
        return Err(ConfigError::TooLong { field, max });
    }
    let legal = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '%' | '|' | '_' | '-'));
    if !legal {
        return Err(ConfigError::IllegalCharacters {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Validated, immutable sampler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    label: String,
    name_server_host: String,
    name_server_port: u16,
    producer_group: String,
    topic: String,
    tag: String,
    body: String,
    body_encoding: BodyEncoding,
    timeout: Duration,
    send_mode: SendMode,
}

impl SamplerConfig {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn name_server_host(&self) -> &str {
        &self.name_server_host
    }

    pub fn name_server_port(&self) -> u16 {
        self.name_server_port
    }

    /// `host:port` of the name server.
    pub fn name_server_addr(&self) -> String {
        format!("{}:{}", self.name_server_host, self.name_server_port)
    }

    pub fn producer_group(&self) -> &str {
        &self.producer_group
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn body_encoding(&self) -> BodyEncoding {
        self.body_encoding
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn send_mode(&self) -> SendMode {
        self.send_mode
    }

    /// Message body bytes under the configured encoding.
    pub fn body_bytes(&self) -> Result<Vec<u8>, SamplerError> {
        match self.body_encoding {
            BodyEncoding::Utf8 => Ok(self.body.as_bytes().to_vec()),
            BodyEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(self.body.trim())
                .map_err(|e| SamplerError::Encoding(format!("invalid base64 body: {e}"))),
        }
    }
}
