//! In-memory producer for tests and dry runs.
//!
//! [`MockProducerFactory`] hands out [`MockProducer`]s that follow a scripted
//! [`MockBehavior`] and record every call into a shared [`CallLog`].

use crate::error::ClientError;
use crate::message::Message;
use crate::producer::{Producer, ProducerFactory, SendCallback, SendResult, SendStatus};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Long dry runs keep only this many messages in the call log.
const MAX_KEPT_MESSAGES: usize = 1024;

/// What a mock producer does when asked to start or send.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Start normally and acknowledge every send with the given status.
    Acknowledge(SendStatus),
    /// Acknowledge after a delay; async callbacks fire from a spawned task.
    AcknowledgeAfter(Duration),
    /// Fail `start`.
    FailStart(ClientError),
    /// Fail every send call (async submission included).
    FailSend(ClientError),
    /// Accept async sends, then report the error through the callback.
    FailCallback(ClientError),
    /// Accept async sends and drop the callback without calling it.
    DropCallback,
}

/// Calls observed across every producer a factory created.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub creates: usize,
    pub starts: usize,
    pub shutdowns: usize,
    pub sync_sends: usize,
    pub async_sends: usize,
    pub oneway_sends: usize,
    pub last_group: Option<String>,
    pub last_name_server_addr: Option<String>,
    /// Messages accepted for sending, kept or not.
    pub recorded: u64,
    /// The first accepted messages, up to a fixed cap.
    pub messages: Vec<Message>,
}

/// Factory of scripted producers sharing one call log.
#[derive(Debug, Clone)]
pub struct MockProducerFactory {
    behavior: MockBehavior,
    calls: Arc<Mutex<CallLog>>,
}

impl MockProducerFactory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Producers that acknowledge every send with `SEND_OK`.
    pub fn acknowledging() -> Self {
        Self::new(MockBehavior::Acknowledge(SendStatus::SendOk))
    }

    pub fn failing_start(error: ClientError) -> Self {
        Self::new(MockBehavior::FailStart(error))
    }

    pub fn failing_send(error: ClientError) -> Self {
        Self::new(MockBehavior::FailSend(error))
    }

    /// Snapshot of the calls recorded so far.
    pub fn calls(&self) -> CallLog {
        lock(&self.calls).clone()
    }
}

impl ProducerFactory for MockProducerFactory {
    type Producer = MockProducer;

    fn create(&self, producer_group: &str, name_server_addr: &str) -> MockProducer {
        let mut calls = lock(&self.calls);
        calls.creates += 1;
        calls.last_group = Some(producer_group.to_string());
        calls.last_name_server_addr = Some(name_server_addr.to_string());
        MockProducer {
            behavior: self.behavior.clone(),
            calls: Arc::clone(&self.calls),
        }
    }
}

/// Scripted producer created by [`MockProducerFactory`].
#[derive(Debug)]
pub struct MockProducer {
    behavior: MockBehavior,
    calls: Arc<Mutex<CallLog>>,
}

impl MockProducer {
    fn record(&self, message: &Message) -> SendResult {
        let mut calls = lock(&self.calls);
        calls.recorded += 1;
        let n = calls.recorded;
        if calls.messages.len() < MAX_KEPT_MESSAGES {
            calls.messages.push(message.clone());
        }
        SendResult {
            status: match &self.behavior {
                MockBehavior::Acknowledge(status) => *status,
                _ => SendStatus::SendOk,
            },
            msg_id: Some(format!("MOCK{n:028X}")),
            offset_msg_id: None,
            queue_id: Some(0),
            queue_offset: Some(n as i64 - 1),
        }
    }
}

#[async_trait]
impl Producer for MockProducer {
    async fn start(&mut self) -> Result<(), ClientError> {
        lock(&self.calls).starts += 1;
        match &self.behavior {
            MockBehavior::FailStart(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    async fn shutdown(&mut self) {
        lock(&self.calls).shutdowns += 1;
    }

    async fn send(
        &mut self,
        message: &Message,
        _timeout: Duration,
    ) -> Result<SendResult, ClientError> {
        lock(&self.calls).sync_sends += 1;
        match self.behavior.clone() {
            MockBehavior::FailSend(e) | MockBehavior::FailCallback(e) => Err(e),
            MockBehavior::AcknowledgeAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.record(message))
            }
            _ => Ok(self.record(message)),
        }
    }

    async fn send_with_callback(
        &mut self,
        message: Message,
        callback: SendCallback,
        _timeout: Duration,
    ) -> Result<(), ClientError> {
        lock(&self.calls).async_sends += 1;
        match self.behavior.clone() {
            MockBehavior::FailSend(e) => Err(e),
            MockBehavior::FailCallback(e) => {
                tokio::spawn(async move { callback(Err(e)) });
                Ok(())
            }
            MockBehavior::DropCallback => {
                drop(callback);
                Ok(())
            }
            MockBehavior::AcknowledgeAfter(delay) => {
                let ack = self.record(&message);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback(Ok(ack));
                });
                Ok(())
            }
            _ => {
                let ack = self.record(&message);
                tokio::spawn(async move { callback(Ok(ack)) });
                Ok(())
            }
        }
    }

    async fn send_oneway(&mut self, message: &Message) -> Result<(), ClientError> {
        lock(&self.calls).oneway_sends += 1;
        match self.behavior.clone() {
            MockBehavior::FailSend(e) => Err(e),
            _ => {
                self.record(message);
                Ok(())
            }
        }
    }
}

fn lock(calls: &Mutex<CallLog>) -> MutexGuard<'_, CallLog> {
    // A panicking test thread must not hide the calls it recorded.
    calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
