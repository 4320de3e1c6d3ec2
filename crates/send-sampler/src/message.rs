//! Message handed to a producer.

use crate::config::SamplerConfig;
use crate::error::SamplerError;
use std::collections::BTreeMap;

pub const PROPERTY_TAGS: &str = "TAGS";
pub const PROPERTY_WAIT_STORE_MSG_OK: &str = "WAIT";

/// A message: topic, body and string properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    body: Vec<u8>,
    properties: BTreeMap<String, String>,
}

impl Message {
    /// Create a message. An empty tag is not recorded.
    pub fn new(topic: impl Into<String>, tag: &str, body: Vec<u8>) -> Self {
        let mut properties = BTreeMap::new();
        if !tag.is_empty() {
            properties.insert(PROPERTY_TAGS.to_string(), tag.to_string());
        }
        properties.insert(PROPERTY_WAIT_STORE_MSG_OK.to_string(), "true".to_string());
        Self {
            topic: topic.into(),
            body,
            properties,
        }
    }

    /// Build the message a sampler config describes.
    pub fn from_config(config: &SamplerConfig) -> Result<Self, SamplerError> {
        Ok(Self::new(config.topic(), config.tag(), config.body_bytes()?))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tag(&self) -> Option<&str> {
        self.property(PROPERTY_TAGS)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}
