//! Remoting command: the header and body carried by every frame.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Request codes.
pub mod request_code {
    pub const SEND_MESSAGE: i32 = 10;
    pub const GET_ROUTEINFO_BY_TOPIC: i32 = 105;
}

/// Response codes.
pub mod response_code {
    pub const SUCCESS: i32 = 0;
    pub const SYSTEM_ERROR: i32 = 1;
    pub const SYSTEM_BUSY: i32 = 2;
    pub const REQUEST_CODE_NOT_SUPPORTED: i32 = 3;
    pub const FLUSH_DISK_TIMEOUT: i32 = 10;
    pub const SLAVE_NOT_AVAILABLE: i32 = 11;
    pub const FLUSH_SLAVE_TIMEOUT: i32 = 12;
    pub const TOPIC_NOT_EXIST: i32 = 17;
}

const FLAG_RESPONSE: i32 = 1;
const FLAG_ONEWAY: i32 = 1 << 1;

const LANGUAGE: &str = "OTHER";
const VERSION: i32 = 400;
const SERIALIZE_TYPE_JSON: &str = "JSON";

/// A request or response exchanged with a name server or broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotingCommand {
    pub code: i32,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub opaque: i32,
    #[serde(default)]
    pub flag: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ext_fields: BTreeMap<String, String>,
    #[serde(rename = "serializeTypeCurrentRPC", default)]
    pub serialize_type: String,
    #[serde(skip)]
    pub body: Vec<u8>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RemotingCommand {
    /// Create a request with the given code and header fields.
    pub fn request(code: i32, ext_fields: BTreeMap<String, String>) -> Self {
        Self {
            code,
            language: LANGUAGE.to_string(),
            version: VERSION,
            opaque: 0,
            flag: 0,
            remark: None,
            ext_fields,
            serialize_type: SERIALIZE_TYPE_JSON.to_string(),
            body: Vec::new(),
        }
    }

    /// Create a response to the request with id `opaque`.
    pub fn response(code: i32, opaque: i32, remark: Option<String>) -> Self {
        let mut cmd = Self::request(code, BTreeMap::new());
        cmd.opaque = opaque;
        cmd.flag = FLAG_RESPONSE;
        cmd.remark = remark;
        cmd
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_ext_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ext_fields.insert(key.into(), value.into());
        self
    }

    pub fn mark_oneway(&mut self) {
        self.flag |= FLAG_ONEWAY;
    }

    pub fn is_response(&self) -> bool {
        self.flag & FLAG_RESPONSE == FLAG_RESPONSE
    }

    pub fn is_oneway(&self) -> bool {
        self.flag & FLAG_ONEWAY == FLAG_ONEWAY
    }

    pub fn ext_field(&self, key: &str) -> Option<&str> {
        self.ext_fields.get(key).map(String::as_str)
    }

    pub fn remark_or_empty(&self) -> String {
        self.remark.clone().unwrap_or_default()
    }
}
