//! Producer interface the sampler drives.
//!
//! The sampler never talks to a broker itself. It creates a [`Producer`]
//! through a [`ProducerFactory`] for every sample, starts it, sends once and
//! shuts it down. Implementations own connection handling, the wire protocol
//! and timeouts.

use crate::error::ClientError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Delivery status of an acknowledged send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    SendOk,
    FlushDiskTimeout,
    FlushSlaveTimeout,
    SlaveNotAvailable,
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendStatus::SendOk => write!(f, "SEND_OK"),
            SendStatus::FlushDiskTimeout => write!(f, "FLUSH_DISK_TIMEOUT"),
            SendStatus::FlushSlaveTimeout => write!(f, "FLUSH_SLAVE_TIMEOUT"),
            SendStatus::SlaveNotAvailable => write!(f, "SLAVE_NOT_AVAILABLE"),
        }
    }
}

/// Broker acknowledgement of one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub status: SendStatus,
    /// Client-generated unique message id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Broker-assigned id derived from the commit log offset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_msg_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_offset: Option<i64>,
}

impl SendResult {
    /// Acknowledgement with the given status and no ids.
    pub fn with_status(status: SendStatus) -> Self {
        Self {
            status,
            msg_id: None,
            offset_msg_id: None,
            queue_id: None,
            queue_offset: None,
        }
    }
}

/// Continuation invoked exactly once with the outcome of an async send.
pub type SendCallback = Box<dyn FnOnce(Result<SendResult, ClientError>) + Send + 'static>;

/// A message producer bound to one producer group and name server.
#[async_trait]
pub trait Producer: Send {
    /// Connect and register; must be called before any send.
    async fn start(&mut self) -> Result<(), ClientError>;

    /// Release every resource. Safe to call after a failed `start`.
    async fn shutdown(&mut self);

    /// Send and wait for the acknowledgement, bounded by `timeout`.
    async fn send(&mut self, message: &Message, timeout: Duration)
        -> Result<SendResult, ClientError>;

    /// Submit a send; `callback` receives the outcome later.
    ///
    /// An `Err` return means the send was never submitted and the callback
    /// will not be called.
    async fn send_with_callback(
        &mut self,
        message: Message,
        callback: SendCallback,
        timeout: Duration,
    ) -> Result<(), ClientError>;

    /// Send without waiting for any acknowledgement.
    async fn send_oneway(&mut self, message: &Message) -> Result<(), ClientError>;
}

/// Creates a fresh producer for every sample.
pub trait ProducerFactory: Send + Sync {
    type Producer: Producer + 'static;

    fn create(&self, producer_group: &str, name_server_addr: &str) -> Self::Producer;
}
