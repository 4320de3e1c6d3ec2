//! The send sampler.
//!
//! One call to [`Sampler::execute`] is one test iteration:
//!
//! ```text
//! create producer ──► start ──► dispatch by mode ──► shutdown ──► SampleResult
//!                       │                               ▲
//!                       └──── start failed ─────────────┘
//! ```
//!
//! Shutdown happens exactly once on every path. Errors never escape; they
//! are recorded on the returned result.

use crate::config::{SamplerConfig, SendMode};
use crate::error::SamplerError;
use crate::message::Message;
use crate::producer::{Producer, ProducerFactory, SendCallback};
use crate::result::SampleResult;
use tokio::sync::oneshot;
use tracing::debug;

/// Executes one send per invocation with a freshly created producer.
pub struct Sampler<F> {
    factory: F,
}

impl<F: ProducerFactory> Sampler<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// A running sample cannot be interrupted.
    pub fn interrupt(&self) -> bool {
        false
    }

    /// Run one sample and return its result.
    pub async fn execute(&self, config: &SamplerConfig) -> SampleResult {
        debug!(
            "rocketmq sample start: label={} mode={}",
            config.label(),
            config.send_mode()
        );

        let mut result = SampleResult::new(config.label(), config.send_mode());
        let mut producer = self
            .factory
            .create(config.producer_group(), &config.name_server_addr());

        let sent_bytes = match producer.start().await {
            Ok(()) => {
                result.sample_start();
                dispatch(&mut producer, config, &mut result).await
            }
            Err(e) => {
                result.sample_start();
                result.set_failure(SamplerError::Connection(e));
                0
            }
        };

        producer.shutdown().await;

        result.sent_bytes = sent_bytes;
        result.headers_size = 0;
        result.body_size = 0;
        result.sample_end();

        debug!(
            "rocketmq sample end: label={} success={} code={}",
            result.label, result.success, result.response_code
        );
        result
    }
}

/// Send according to the configured mode. Returns the number of body bytes
/// handed to the producer.
async fn dispatch<P: Producer>(
    producer: &mut P,
    config: &SamplerConfig,
    result: &mut SampleResult,
) -> u64 {
    let message = match Message::from_config(config) {
        Ok(message) => message,
        Err(e) => {
            result.set_failure(e);
            return 0;
        }
    };
    let sent_bytes = message.body().len() as u64;

    match config.send_mode() {
        SendMode::Sync => match producer.send(&message, config.timeout()).await {
            Ok(ack) => result.set_response_code_ok(ack),
            Err(e) => result.set_failure(SamplerError::Send(e)),
        },
        SendMode::Async => {
            let (tx, rx) = oneshot::channel();
            let callback: SendCallback = Box::new(move |outcome| {
                // The receiver only goes away if the sample itself was dropped.
                let _ = tx.send(outcome);
            });

            match producer
                .send_with_callback(message, callback, config.timeout())
                .await
            {
                Err(e) => result.set_failure(SamplerError::Send(e)),
                Ok(()) => match rx.await {
                    Ok(Ok(ack)) => result.set_response_code_ok(ack),
                    Ok(Err(e)) => result.set_failure(SamplerError::Callback(e.to_string())),
                    Err(_) => result.set_failure(SamplerError::Callback(
                        "callback dropped without an outcome".to_string(),
                    )),
                },
            }
        }
        SendMode::OneWay => match producer.send_oneway(&message).await {
            Ok(()) => result.set_response_ok(),
            Err(e) => result.set_failure(SamplerError::Send(e)),
        },
    }

    sent_bytes
}
