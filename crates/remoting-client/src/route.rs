//! Topic route data returned by the name server.

use crate::error::RemotingError;
use serde::Deserialize;
use std::collections::HashMap;

/// Queue permission bit allowing writes.
pub const PERM_WRITE: i32 = 1 << 1;

/// Broker id of a master in `brokerAddrs`.
pub const MASTER_ID: u64 = 0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRouteData {
    #[serde(default)]
    pub queue_datas: Vec<QueueData>,
    #[serde(default)]
    pub broker_datas: Vec<BrokerData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueData {
    pub broker_name: String,
    #[serde(default)]
    pub read_queue_nums: i32,
    #[serde(default)]
    pub write_queue_nums: i32,
    #[serde(default)]
    pub perm: i32,
    #[serde(default)]
    pub topic_sys_flag: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerData {
    #[serde(default)]
    pub cluster: String,
    pub broker_name: String,
    #[serde(default)]
    pub broker_addrs: HashMap<u64, String>,
}

/// One writable queue of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQueue {
    pub broker_name: String,
    pub queue_id: i32,
}

/// Writable queues of a topic together with their master addresses.
#[derive(Debug, Clone, Default)]
pub struct PublishInfo {
    pub queues: Vec<MessageQueue>,
    pub master_addrs: HashMap<String, String>,
}

impl PublishInfo {
    /// Master address of the broker owning `queue`.
    pub fn addr_of(&self, queue: &MessageQueue) -> Option<&str> {
        self.master_addrs.get(&queue.broker_name).map(String::as_str)
    }
}

impl TopicRouteData {
    /// Parse a route body as sent by the name server.
    pub fn parse(body: &[u8]) -> Result<Self, RemotingError> {
        let text = std::str::from_utf8(body)
            .map_err(|e| RemotingError::Route(format!("route body is not UTF-8: {e}")))?;
        Ok(serde_json::from_str(&quote_numeric_keys(text))?)
    }

    /// Master address of `broker_name`, if the route knows one.
    pub fn master_addr(&self, broker_name: &str) -> Option<&str> {
        self.broker_datas
            .iter()
            .find(|b| b.broker_name == broker_name)
            .and_then(|b| b.broker_addrs.get(&MASTER_ID))
            .map(String::as_str)
    }

    /// Writable queues on brokers that have a master, ordered by broker name.
    ///
    /// `queue_limit` caps the queue count per broker; it applies when the
    /// route belongs to the auto-create template topic.
    pub fn publish_info(&self, queue_limit: Option<i32>) -> PublishInfo {
        let mut queue_datas: Vec<&QueueData> = self
            .queue_datas
            .iter()
            .filter(|q| q.perm & PERM_WRITE == PERM_WRITE)
            .collect();
        queue_datas.sort_by(|a, b| a.broker_name.cmp(&b.broker_name));

        let mut info = PublishInfo::default();
        for queue_data in queue_datas {
            let Some(addr) = self.master_addr(&queue_data.broker_name) else {
                continue;
            };
            info.master_addrs
                .insert(queue_data.broker_name.clone(), addr.to_string());

            let count = match queue_limit {
                Some(limit) => queue_data.write_queue_nums.min(limit),
                None => queue_data.write_queue_nums,
            };
            info.queues.extend((0..count).map(|queue_id| MessageQueue {
                broker_name: queue_data.broker_name.clone(),
                queue_id,
            }));
        }
        info
    }
}

/// Quote bare integer object keys (`{0:"a"}` becomes `{"0":"a"}`).
///
/// The name server serializes broker id maps with unquoted numeric keys,
/// which strict JSON parsers reject.
pub(crate) fn quote_numeric_keys(json: &str) -> String {
    let bytes = json.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            out.push(b);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                out.push(b);
                i += 1;
            }
            b'{' | b',' => {
                out.push(b);
                i += 1;

                let ws_start = i;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                out.extend_from_slice(&bytes[ws_start..i]);

                let key_start = i;
                let mut j = i;
                if j < bytes.len() && bytes[j] == b'-' {
                    j += 1;
                }
                let digits_start = j;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if j > digits_start {
                    let mut k = j;
                    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    if k < bytes.len() && bytes[k] == b':' {
                        out.push(b'"');
                        out.extend_from_slice(&bytes[key_start..j]);
                        out.push(b'"');
                        i = j;
                    }
                }
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Only ASCII quotes were inserted, so the bytes stay valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
