//! Remoting producer against an in-process fake name server and broker.
//!
//! One listener plays both roles: it answers route lookups with a route that
//! points back at itself and acknowledges SEND_MESSAGE requests.

use rocketmq_remoting_client::codec::{encode_frame, read_frame};
use rocketmq_remoting_client::command::{request_code, response_code};
use rocketmq_remoting_client::{RemotingCommand, RemotingProducerFactory};
use rocketmq_send_sampler::{
    ClientError, Sampler, SamplerConfig, SamplerError, SamplerSettings, SendMode,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

type RequestLog = Arc<Mutex<Vec<RemotingCommand>>>;

struct FakeBroker {
    port: u16,
    requests: RequestLog,
}

impl FakeBroker {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, addr.to_string(), Arc::clone(&log)));
            }
        });

        Self {
            port: addr.port(),
            requests,
        }
    }

    fn requests(&self) -> Vec<RemotingCommand> {
        self.requests.lock().unwrap().clone()
    }

    fn sends(&self) -> Vec<RemotingCommand> {
        self.requests()
            .into_iter()
            .filter(|r| r.code == request_code::SEND_MESSAGE)
            .collect()
    }

    fn route_lookups(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.code == request_code::GET_ROUTEINFO_BY_TOPIC)
            .filter_map(|r| r.ext_field("topic").map(str::to_string))
            .collect()
    }

    fn config(&self, topic: &str, mode: SendMode, timeout_ms: u64) -> SamplerConfig {
        SamplerSettings {
            name_server_host: "127.0.0.1".to_string(),
            name_server_port: self.port,
            producer_group: "bench_group".to_string(),
            topic: topic.to_string(),
            tag: "TagA".to_string(),
            body: "hello".to_string(),
            timeout_ms,
            send_method: Some(mode.as_str().to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }
}

async fn serve(stream: TcpStream, addr: String, log: RequestLog) {
    let (mut reader, mut writer) = stream.into_split();
    while let Ok(Some(request)) = read_frame(&mut reader).await {
        log.lock().unwrap().push(request.clone());
        if request.is_oneway() {
            continue;
        }
        let response = respond(&request, &addr).await;
        let frame = encode_frame(&response).unwrap();
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
}

fn route_body(addr: &str) -> Vec<u8> {
    format!(
        r#"{{"brokerDatas":[{{"brokerAddrs":{{0:"{addr}"}},"brokerName":"broker-a","cluster":"DefaultCluster"}}],"queueDatas":[{{"brokerName":"broker-a","perm":6,"readQueueNums":8,"topicSysFlag":0,"writeQueueNums":8}}]}}"#
    )
    .into_bytes()
}

async fn respond(request: &RemotingCommand, addr: &str) -> RemotingCommand {
    let topic = request.ext_field("topic").unwrap_or_default();
    match request.code {
        request_code::GET_ROUTEINFO_BY_TOPIC => match topic {
            "slow-route" => {
                tokio::time::sleep(Duration::from_millis(150)).await;
                RemotingCommand::response(response_code::SUCCESS, request.opaque, None)
                    .with_body(route_body(addr))
            }
            "missing" => RemotingCommand::response(
                response_code::TOPIC_NOT_EXIST,
                request.opaque,
                Some(format!("No topic route info in name server for the topic: {topic}")),
            ),
            _ => RemotingCommand::response(response_code::SUCCESS, request.opaque, None)
                .with_body(route_body(addr)),
        },
        request_code::SEND_MESSAGE => match topic {
            "rejected" => RemotingCommand::response(
                response_code::SYSTEM_ERROR,
                request.opaque,
                Some("store error".to_string()),
            ),
            "slow" | "slow-route" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                RemotingCommand::response(response_code::SUCCESS, request.opaque, None)
            }
            _ => RemotingCommand::response(response_code::SUCCESS, request.opaque, None)
                .with_ext_field("msgId", "7F00000100002A9F0000000000000000")
                .with_ext_field("queueId", request.ext_field("queueId").unwrap_or("0"))
                .with_ext_field("queueOffset", "0"),
        },
        _ => RemotingCommand::response(
            response_code::REQUEST_CODE_NOT_SUPPORTED,
            request.opaque,
            None,
        ),
    }
}

#[tokio::test]
async fn test_sync_send() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("T1", SendMode::Sync, 3000))
        .await;

    assert!(result.success, "{}", result.response_message);
    assert_eq!(result.response_code, "200");
    let ack = result.send_result.unwrap();
    assert_eq!(
        ack.offset_msg_id.as_deref(),
        Some("7F00000100002A9F0000000000000000")
    );
    assert_eq!(ack.msg_id.as_ref().map(String::len), Some(32));

    assert_eq!(broker.route_lookups(), vec!["T1".to_string()]);
    let sends = broker.sends();
    assert_eq!(sends.len(), 1);
    let send = &sends[0];
    assert_eq!(send.ext_field("producerGroup"), Some("bench_group"));
    assert_eq!(send.ext_field("topic"), Some("T1"));
    assert_eq!(send.body, b"hello");
    let properties = send.ext_field("properties").unwrap();
    assert!(properties.contains("TAGS\u{1}TagA\u{2}"));
    assert!(properties.contains(&format!("UNIQ_KEY\u{1}{}\u{2}", ack.msg_id.unwrap())));
    let queue_id: i32 = send.ext_field("queueId").unwrap().parse().unwrap();
    assert!((0..8).contains(&queue_id));
}

#[tokio::test]
async fn test_async_send() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("T1", SendMode::Async, 3000))
        .await;

    assert!(result.success, "{}", result.response_message);
    assert!(result.send_result.is_some());
    assert_eq!(broker.sends().len(), 1);
}

#[tokio::test]
async fn test_oneway_send() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("T1", SendMode::OneWay, 3000))
        .await;
    assert!(result.success);
    assert_eq!(result.response_message, "OK");

    // Oneway frames are not acknowledged; give the broker a moment.
    for _ in 0..50 {
        if !broker.sends().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let sends = broker.sends();
    assert_eq!(sends.len(), 1);
    assert!(sends[0].is_oneway());
}

#[tokio::test]
async fn test_missing_topic_uses_auto_create_route() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("missing", SendMode::Sync, 3000))
        .await;

    assert!(result.success, "{}", result.response_message);
    assert_eq!(
        broker.route_lookups(),
        vec!["missing".to_string(), "TBW102".to_string()]
    );
    let sends = broker.sends();
    assert_eq!(sends[0].ext_field("topic"), Some("missing"));
    let queue_id: i32 = sends[0].ext_field("queueId").unwrap().parse().unwrap();
    assert!(queue_id < 4);
}

#[tokio::test]
async fn test_broker_rejection() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("rejected", SendMode::Sync, 3000))
        .await;

    assert!(!result.success);
    assert_eq!(result.response_code, "SEND_ERROR");
    assert_eq!(
        result.error,
        Some(SamplerError::Send(ClientError::Broker {
            code: response_code::SYSTEM_ERROR,
            remark: "store error".to_string(),
        }))
    );
}

#[tokio::test]
async fn test_sync_timeout() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("slow", SendMode::Sync, 100))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error,
        Some(SamplerError::Send(ClientError::Timeout { millis: 100 }))
    );
}

#[tokio::test]
async fn test_async_timeout_reported_through_callback() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let result = sampler
        .execute(&broker.config("slow", SendMode::Async, 100))
        .await;

    assert!(!result.success);
    assert_eq!(result.response_code, "CALLBACK_ERROR");
}

#[tokio::test]
async fn test_async_timeout_covers_route_lookup() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());

    let started = std::time::Instant::now();
    let result = sampler
        .execute(&broker.config("slow-route", SendMode::Async, 250))
        .await;

    // Route lookup takes 150ms and the broker 500ms; one 250ms budget covers both.
    assert!(started.elapsed() < Duration::from_millis(380));
    assert!(!result.success);
    assert_eq!(result.response_code, "CALLBACK_ERROR");
    assert_eq!(result.response_message, "async send failed: send timed out after 250ms");
}

#[tokio::test]
async fn test_samples_spread_over_queues() {
    let broker = FakeBroker::start().await;
    let sampler = Sampler::new(RemotingProducerFactory::default());
    let config = broker.config("T1", SendMode::Sync, 3000);

    for _ in 0..20 {
        let result = sampler.execute(&config).await;
        assert!(result.success, "{}", result.response_message);
    }

    let queue_ids: std::collections::HashSet<String> = broker
        .sends()
        .iter()
        .filter_map(|send| send.ext_field("queueId").map(str::to_string))
        .collect();
    assert!(queue_ids.len() > 1, "every send went to queue {queue_ids:?}");
}

#[tokio::test]
async fn test_unreachable_name_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = SamplerSettings {
        name_server_host: "127.0.0.1".to_string(),
        name_server_port: port,
        producer_group: "bench_group".to_string(),
        topic: "T1".to_string(),
        body: "hello".to_string(),
        ..Default::default()
    }
    .validate()
    .unwrap();

    let sampler = Sampler::new(
        RemotingProducerFactory::default().with_connect_timeout(Duration::from_millis(500)),
    );
    let result = sampler.execute(&config).await;

    assert!(!result.success);
    assert_eq!(result.response_code, "CONNECTION_ERROR");
    assert!(matches!(
        result.error,
        Some(SamplerError::Connection(ClientError::Start { .. }))
    ));
}
