//! Send sampler for load testing RocketMQ-compatible brokers
//!
//! A sampler is the unit of work a load-testing host runs once per test
//! iteration. This crate provides the sampler that performs one message
//! "send" against a broker and reports its outcome as a [`SampleResult`].
//!
//! ## Features
//!
//! - **Three send modes**: synchronous, asynchronous (callback based) and one-way
//! - **Validated configuration**: [`SamplerSettings`] are checked once and turned
//!   into an immutable [`SamplerConfig`]
//! - **Injected producer**: the broker client sits behind the [`Producer`] and
//!   [`ProducerFactory`] traits so it can be swapped for a test double
//! - **Never fails the run**: every error ends up on the returned result
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rocketmq_send_sampler::testing::MockProducerFactory;
//! use rocketmq_send_sampler::{Sampler, SamplerSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = SamplerSettings {
//!         name_server_host: "localhost".to_string(),
//!         producer_group: "bench_group".to_string(),
//!         topic: "T1".to_string(),
//!         body: "hello".to_string(),
//!         ..Default::default()
//!     };
//!     let config = settings.validate()?;
//!
//!     let sampler = Sampler::new(MockProducerFactory::acknowledging());
//!     let result = sampler.execute(&config).await;
//!     println!("{} in {:?}", result.response_code, result.elapsed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod producer;
pub mod result;
pub mod sampler;
pub mod testing;

pub use config::{BodyEncoding, SamplerConfig, SamplerSettings, SendMode};
pub use error::{ClientError, ConfigError, SamplerError};
pub use message::Message;
pub use producer::{Producer, ProducerFactory, SendCallback, SendResult, SendStatus};
pub use result::{DataType, SampleResult};
pub use sampler::Sampler;
