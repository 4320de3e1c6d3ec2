//! Remoting producer implementing the sampler's [`Producer`] interface.

use crate::command::{request_code, response_code, RemotingCommand};
use crate::connection::Connection;
use crate::error::RemotingError;
use crate::route::{MessageQueue, PublishInfo, TopicRouteData};
use async_trait::async_trait;
use rocketmq_send_sampler::config::AUTO_CREATE_TOPIC_KEY;
use rocketmq_send_sampler::{
    ClientError, Message, Producer, ProducerFactory, SendCallback, SendResult, SendStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Default connect timeout for name server and broker connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest message body the producer accepts.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Queues used per broker when publishing through the auto-create template.
const DEFAULT_TOPIC_QUEUE_NUMS: i32 = 4;

const PROPERTY_UNIQ_KEY: &str = "UNIQ_KEY";
const NAME_VALUE_SEPARATOR: char = '\u{1}';
const PROPERTY_SEPARATOR: char = '\u{2}';

/// Creates a [`RemotingProducer`] per sample.
#[derive(Debug, Clone)]
pub struct RemotingProducerFactory {
    connect_timeout: Duration,
}

impl Default for RemotingProducerFactory {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl RemotingProducerFactory {
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl ProducerFactory for RemotingProducerFactory {
    type Producer = RemotingProducer;

    fn create(&self, producer_group: &str, name_server_addr: &str) -> RemotingProducer {
        RemotingProducer::new(producer_group, name_server_addr, self.connect_timeout)
    }
}

/// Producer speaking the remoting protocol to a name server and its brokers.
pub struct RemotingProducer {
    producer_group: String,
    name_server_addr: String,
    connect_timeout: Duration,
    session: Option<Session>,
}

struct Session {
    name_server: Connection,
    brokers: HashMap<String, Arc<Connection>>,
    routes: HashMap<String, PublishInfo>,
    send_index: usize,
}

/// Everything needed to put one message on the wire.
struct Target {
    connection: Arc<Connection>,
    request: RemotingCommand,
    uniq_key: String,
}

impl RemotingProducer {
    pub fn new(producer_group: &str, name_server_addr: &str, connect_timeout: Duration) -> Self {
        Self {
            producer_group: producer_group.to_string(),
            name_server_addr: name_server_addr.to_string(),
            connect_timeout,
            session: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Resolve the route, pick a queue, connect to its broker and build the
    /// request.
    async fn prepare(
        &mut self,
        message: &Message,
        timeout: Duration,
    ) -> Result<Target, RemotingError> {
        check_message(message)?;

        let connect_timeout = self.connect_timeout;
        let producer_group = self.producer_group.clone();
        let session = self.session.as_mut().ok_or(RemotingError::NotStarted)?;

        let (queue, addr) = session.select_queue(message.topic(), timeout).await?;
        let connection = session.broker(&addr, connect_timeout).await?;

        let uniq_key = Uuid::new_v4().simple().to_string().to_uppercase();
        let request = send_message_request(&producer_group, message, &queue, &uniq_key);
        Ok(Target {
            connection,
            request,
            uniq_key,
        })
    }

    async fn send_inner(
        &mut self,
        message: &Message,
        timeout: Duration,
    ) -> Result<SendResult, RemotingError> {
        let target = self.prepare(message, timeout).await?;
        let response = target.connection.invoke(target.request, timeout).await?;
        parse_send_response(response, target.uniq_key)
    }
}

impl Session {
    async fn fetch_route(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> Result<TopicRouteData, RemotingError> {
        let mut fields = BTreeMap::new();
        fields.insert("topic".to_string(), topic.to_string());
        let request = RemotingCommand::request(request_code::GET_ROUTEINFO_BY_TOPIC, fields);

        let response = self.name_server.invoke(request, timeout).await?;
        if response.code != response_code::SUCCESS {
            return Err(RemotingError::Broker {
                code: response.code,
                remark: response.remark_or_empty(),
            });
        }
        TopicRouteData::parse(&response.body)
    }

    /// Pick the next queue for `topic` round-robin, resolving its route on
    /// first use.
    async fn select_queue(
        &mut self,
        topic: &str,
        timeout: Duration,
    ) -> Result<(MessageQueue, String), RemotingError> {
        if !self.routes.contains_key(topic) {
            let info = match self.fetch_route(topic, timeout).await {
                Ok(route) => route.publish_info(None),
                Err(RemotingError::Broker { code, .. }) if code == response_code::TOPIC_NOT_EXIST => {
                    debug!("Topic {topic} not found, publishing through {AUTO_CREATE_TOPIC_KEY}");
                    self.fetch_route(AUTO_CREATE_TOPIC_KEY, timeout)
                        .await?
                        .publish_info(Some(DEFAULT_TOPIC_QUEUE_NUMS))
                }
                Err(e) => return Err(e),
            };
            if info.queues.is_empty() {
                return Err(RemotingError::Route(format!(
                    "no writable queue for topic {topic}"
                )));
            }
            self.routes.insert(topic.to_string(), info);
        }

        let info = self
            .routes
            .get(topic)
            .ok_or_else(|| RemotingError::Route(format!("no route for topic {topic}")))?;
        let queue = info.queues[self.send_index % info.queues.len()].clone();
        self.send_index = self.send_index.wrapping_add(1);
        let addr = info
            .addr_of(&queue)
            .ok_or_else(|| RemotingError::Route(format!("no master for {}", queue.broker_name)))?
            .to_string();
        Ok((queue, addr))
    }

    async fn broker(
        &mut self,
        addr: &str,
        connect_timeout: Duration,
    ) -> Result<Arc<Connection>, RemotingError> {
        if let Some(connection) = self.brokers.get(addr) {
            return Ok(Arc::clone(connection));
        }
        let connection = Arc::new(Connection::connect(addr, connect_timeout).await?);
        self.brokers.insert(addr.to_string(), Arc::clone(&connection));
        Ok(connection)
    }

    async fn close(self) {
        self.name_server.close().await;
        for connection in self.brokers.values() {
            connection.close().await;
        }
    }
}

#[async_trait]
impl Producer for RemotingProducer {
    async fn start(&mut self) -> Result<(), ClientError> {
        if self.session.is_some() {
            return Ok(());
        }
        let name_server = Connection::connect(&self.name_server_addr, self.connect_timeout)
            .await
            .map_err(|e| ClientError::Start {
                message: format!("name server {}: {e}", self.name_server_addr),
            })?;
        debug!(
            "Producer {} started against {}",
            self.producer_group, self.name_server_addr
        );
        self.session = Some(Session {
            name_server,
            brokers: HashMap::new(),
            routes: HashMap::new(),
            // Random start so that single-send producers spread over queues.
            send_index: rand::random::<u32>() as usize,
        });
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
            debug!("Producer {} shut down", self.producer_group);
        }
    }

    async fn send(
        &mut self,
        message: &Message,
        timeout: Duration,
    ) -> Result<SendResult, ClientError> {
        match tokio::time::timeout(timeout, self.send_inner(message, timeout)).await {
            Ok(outcome) => outcome.map_err(ClientError::from),
            Err(_) => Err(ClientError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        }
    }

    async fn send_with_callback(
        &mut self,
        message: Message,
        callback: SendCallback,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        check_message(&message)?;
        if !self.is_started() {
            return Err(RemotingError::NotStarted.into());
        }

        let deadline = Instant::now() + timeout;
        let target = match tokio::time::timeout_at(deadline, self.prepare(&message, timeout)).await {
            Ok(Ok(target)) => target,
            Ok(Err(e)) => {
                callback(Err(e.into()));
                return Ok(());
            }
            Err(_) => {
                callback(Err(ClientError::Timeout {
                    millis: timeout.as_millis() as u64,
                }));
                return Ok(());
            }
        };

        tokio::spawn(async move {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = match target.connection.invoke(target.request, remaining).await {
                Ok(response) => parse_send_response(response, target.uniq_key),
                // Report the configured timeout, not what was left of it.
                Err(RemotingError::Timeout { .. }) => Err(RemotingError::Timeout {
                    millis: timeout.as_millis() as u64,
                }),
                Err(e) => Err(e),
            };
            callback(outcome.map_err(ClientError::from));
        });
        Ok(())
    }

    async fn send_oneway(&mut self, message: &Message) -> Result<(), ClientError> {
        let connect_timeout = self.connect_timeout;
        let target = self.prepare(message, connect_timeout).await?;
        target.connection.invoke_oneway(target.request).await?;
        Ok(())
    }
}

fn check_message(message: &Message) -> Result<(), RemotingError> {
    if message.body().is_empty() {
        return Err(RemotingError::InvalidMessage(
            "the message body length is zero".to_string(),
        ));
    }
    if message.body().len() > MAX_MESSAGE_SIZE {
        return Err(RemotingError::InvalidMessage(format!(
            "the message body size {} exceeds the limit of {MAX_MESSAGE_SIZE}",
            message.body().len()
        )));
    }
    Ok(())
}

/// `key\u{1}value\u{2}` for every property.
fn encode_properties(message: &Message, uniq_key: &str) -> String {
    let mut encoded = String::new();
    let uniq = std::iter::once((PROPERTY_UNIQ_KEY, uniq_key));
    let props = message
        .properties()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .filter(|(k, _)| *k != PROPERTY_UNIQ_KEY);
    for (key, value) in props.chain(uniq) {
        encoded.push_str(key);
        encoded.push(NAME_VALUE_SEPARATOR);
        encoded.push_str(value);
        encoded.push(PROPERTY_SEPARATOR);
    }
    encoded
}

fn send_message_request(
    producer_group: &str,
    message: &Message,
    queue: &MessageQueue,
    uniq_key: &str,
) -> RemotingCommand {
    let fields: BTreeMap<String, String> = [
        ("producerGroup", producer_group.to_string()),
        ("topic", message.topic().to_string()),
        ("defaultTopic", AUTO_CREATE_TOPIC_KEY.to_string()),
        ("defaultTopicQueueNums", DEFAULT_TOPIC_QUEUE_NUMS.to_string()),
        ("queueId", queue.queue_id.to_string()),
        ("sysFlag", "0".to_string()),
        (
            "bornTimestamp",
            chrono::Utc::now().timestamp_millis().to_string(),
        ),
        ("flag", "0".to_string()),
        ("properties", encode_properties(message, uniq_key)),
        ("reconsumeTimes", "0".to_string()),
        ("unitMode", "false".to_string()),
        ("batch", "false".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    RemotingCommand::request(request_code::SEND_MESSAGE, fields).with_body(message.body().to_vec())
}

fn parse_send_response(
    response: RemotingCommand,
    uniq_key: String,
) -> Result<SendResult, RemotingError> {
    let status = match response.code {
        response_code::SUCCESS => SendStatus::SendOk,
        response_code::FLUSH_DISK_TIMEOUT => SendStatus::FlushDiskTimeout,
        response_code::FLUSH_SLAVE_TIMEOUT => SendStatus::FlushSlaveTimeout,
        response_code::SLAVE_NOT_AVAILABLE => SendStatus::SlaveNotAvailable,
        code => {
            return Err(RemotingError::Broker {
                code,
                remark: response.remark_or_empty(),
            })
        }
    };

    Ok(SendResult {
        status,
        msg_id: Some(uniq_key),
        offset_msg_id: response.ext_field("msgId").map(str::to_string),
        queue_id: response.ext_field("queueId").and_then(|v| v.parse().ok()),
        queue_offset: response.ext_field("queueOffset").and_then(|v| v.parse().ok()),
    })
}
