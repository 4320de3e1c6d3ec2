//! RocketMQ remoting-protocol producer
//!
//! This crate implements the client side of the RocketMQ remoting protocol
//! needed to publish messages, and plugs it into the send sampler through
//! [`RemotingProducerFactory`].
//!
//! ## Architecture
//!
//! ```text
//! RemotingProducer
//!    │ start()                      send*()
//!    ▼                                │
//! ┌──────────────┐  route lookup  ┌───┴──────────┐
//! │ name server  │◄───────────────│ route cache  │
//! │ Connection   │                └───┬──────────┘
//! └──────────────┘                    │ queue selection (round-robin)
//!                                     ▼
//!                              ┌──────────────┐
//!                              │ broker       │  SEND_MESSAGE
//!                              │ Connection   │──────────────► broker
//!                              └──────────────┘
//! ```
//!
//! Each [`connection::Connection`] owns one TCP stream and a reader task that
//! matches responses to requests by their `opaque` id.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rocketmq_remoting_client::RemotingProducerFactory;
//! use rocketmq_send_sampler::{Sampler, SamplerSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SamplerSettings {
//!         name_server_host: "localhost".to_string(),
//!         producer_group: "bench_group".to_string(),
//!         topic: "T1".to_string(),
//!         body: "hello".to_string(),
//!         ..Default::default()
//!     }
//!     .validate()?;
//!
//!     let sampler = Sampler::new(RemotingProducerFactory::default());
//!     let result = sampler.execute(&config).await;
//!     println!("success={} elapsed={:?}", result.success, result.elapsed);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod command;
pub mod connection;
pub mod error;
pub mod producer;
pub mod route;

pub use command::RemotingCommand;
pub use connection::Connection;
pub use error::RemotingError;
pub use producer::{RemotingProducer, RemotingProducerFactory};
pub use route::{MessageQueue, TopicRouteData};
