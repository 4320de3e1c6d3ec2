//! rocketmq-bench library
//!
//! A load-testing tool that drives the send sampler against
//! RocketMQ-compatible brokers.
//!
//! # Features
//!
//! - Single samples: run one send and inspect the full result
//! - Load runs: many samples across concurrent workers, bounded by an
//!   iteration count and/or a duration
//! - Reports: latency percentiles, throughput and failures by response code
//!   as a table, markdown or JSON
//! - Results files: every sample as one JSON line
//!
//! # CLI Usage
//!
//! ```bash
//! # One synchronous send
//! rocketmq-bench sample --namesrv-host localhost --producer-group bench \
//!   --topic T1 --body hello
//!
//! # 10,000 async sends over 32 workers
//! rocketmq-bench run --config sampler.yaml --mode async \
//!   --iterations 10000 --concurrency 32 --results-file results.jsonl
//! ```

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub mod config;
pub mod report;
pub mod runner;

use config::parse_duration;
use rocketmq_send_sampler::BodyEncoding;

/// Sampler options shared by every command
#[derive(Args, Clone, Debug, Default)]
pub struct SamplerOpts {
    /// Sampler settings YAML file (flags override its values)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Label reported on every sample (default: the topic)
    #[arg(long)]
    pub label: Option<String>,

    /// Name server host
    #[arg(long, env = "ROCKETMQ_NAMESRV_HOST")]
    pub namesrv_host: Option<String>,

    /// Name server port (default: 9876)
    #[arg(long, env = "ROCKETMQ_NAMESRV_PORT")]
    pub namesrv_port: Option<u16>,

    /// Producer group
    #[arg(long, env = "ROCKETMQ_PRODUCER_GROUP")]
    pub producer_group: Option<String>,

    /// Destination topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Message tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Message body
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the message body from a file
    #[arg(long, value_name = "PATH")]
    pub body_file: Option<PathBuf>,

    /// Encoding of the message body
    #[arg(long, value_enum)]
    pub body_encoding: Option<BodyEncodingArg>,

    /// Send timeout (e.g. "3000ms", "3s"; bare numbers are milliseconds)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Send method: sync, async or oneway
    #[arg(long = "mode")]
    pub send_method: Option<String>,

    /// Connect timeout for name server and broker connections
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    pub connect_timeout: Duration,

    /// Dry run mode - use an in-memory producer that acknowledges every send
    #[arg(long)]
    pub dry_run: bool,
}

/// Body encoding for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BodyEncodingArg {
    Utf8,
    Base64,
}

impl From<BodyEncodingArg> for BodyEncoding {
    fn from(arg: BodyEncodingArg) -> Self {
        match arg {
            BodyEncodingArg::Utf8 => BodyEncoding::Utf8,
            BodyEncodingArg::Base64 => BodyEncoding::Base64,
        }
    }
}
