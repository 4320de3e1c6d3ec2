//! Host-facing outcome of one sampler execution.

use crate::config::SendMode;
use crate::error::SamplerError;
use crate::producer::SendResult;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

/// Response code of a successful sample.
pub const RESPONSE_CODE_OK: &str = "200";
pub const RESPONSE_MESSAGE_OK: &str = "OK";

/// Kind of response data a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    None,
    Text,
}

/// Outcome and timing of one sample.
#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    pub label: String,
    pub send_mode: SendMode,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub success: bool,
    pub response_code: String,
    pub response_message: String,
    pub data_type: DataType,
    pub sent_bytes: u64,
    pub headers_size: u64,
    pub body_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_result: Option<SendResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SamplerError>,
    #[serde(skip)]
    started: Option<Instant>,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl SampleResult {
    pub fn new(label: impl Into<String>, send_mode: SendMode) -> Self {
        Self {
            label: label.into(),
            send_mode,
            start_time: None,
            end_time: None,
            elapsed: Duration::ZERO,
            success: false,
            response_code: String::new(),
            response_message: String::new(),
            data_type: DataType::None,
            sent_bytes: 0,
            headers_size: 0,
            body_size: 0,
            send_result: None,
            error: None,
            started: None,
        }
    }

    /// Record the start of the timed section.
    pub fn sample_start(&mut self) {
        self.start_time = Some(Utc::now());
        self.started = Some(Instant::now());
    }

    /// Record the end of the timed section. Elapsed stays zero if the sample
    /// never started.
    pub fn sample_end(&mut self) {
        self.end_time = Some(Utc::now());
        if let Some(started) = self.started {
            self.elapsed = started.elapsed();
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Mark as acknowledged: response code `200`, success.
    pub fn set_response_code_ok(&mut self, send_result: SendResult) {
        self.data_type = DataType::Text;
        self.response_code = RESPONSE_CODE_OK.to_string();
        self.response_message = send_result.status.to_string();
        self.send_result = Some(send_result);
        self.success = true;
    }

    /// Mark as successful without an acknowledgement: `200 OK`.
    pub fn set_response_ok(&mut self) {
        self.data_type = DataType::Text;
        self.response_code = RESPONSE_CODE_OK.to_string();
        self.response_message = RESPONSE_MESSAGE_OK.to_string();
        self.success = true;
    }

    /// Mark as failed with `error`.
    pub fn set_failure(&mut self, error: SamplerError) {
        self.data_type = DataType::Text;
        self.response_code = error.response_code().to_string();
        self.response_message = error.to_string();
        self.success = false;
        self.error = Some(error);
    }
}
