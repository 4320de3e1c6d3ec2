//! Command-line interface for rocketmq-bench
//!
//! # Usage Examples
//!
//! ## Single Sample
//! ```bash
//! # One synchronous send, result printed as JSON
//! rocketmq-bench sample \
//!   --namesrv-host localhost --producer-group bench \
//!   --topic T1 --tag TagA --body "hello"
//!
//! # Binary body from base64
//! rocketmq-bench sample --config sampler.yaml \
//!   --body-encoding base64 --body "AAECAw=="
//! ```
//!
//! ## Load Run
//! ```bash
//! # 10,000 async sends over 32 workers
//! rocketmq-bench run --config sampler.yaml --mode async \
//!   --iterations 10000 --concurrency 32
//!
//! # One minute of oneway sends, every sample kept as JSON lines
//! rocketmq-bench run --config sampler.yaml --mode oneway \
//!   --duration 1m --concurrency 8 --results-file results.jsonl --format markdown
//! ```
//!
//! Logging is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rocketmq_bench::config::{parse_duration, resolve_config};
use rocketmq_bench::report::{format_json, format_markdown, format_table};
use rocketmq_bench::runner::{self, RunPlan};
use rocketmq_bench::SamplerOpts;
use rocketmq_remoting_client::RemotingProducerFactory;
use rocketmq_send_sampler::testing::MockProducerFactory;
use rocketmq_send_sampler::{ProducerFactory, Sampler, SamplerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "rocketmq-bench")]
#[command(about = "A load-testing tool for sending messages to RocketMQ-compatible brokers")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sample and print its result as JSON
    Sample {
        #[command(flatten)]
        sampler: SamplerOpts,
    },

    /// Run many samples concurrently and print a report
    Run {
        #[command(flatten)]
        sampler: SamplerOpts,

        /// Number of samples to run
        #[arg(long)]
        iterations: Option<u64>,

        /// Number of concurrent workers
        #[arg(long, default_value = "1")]
        concurrency: usize,

        /// Stop starting new samples after this long (e.g. "30s", "5m")
        #[arg(long, value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Write every sample result as one JSON line to this file
        #[arg(long, value_name = "PATH")]
        results_file: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Output format for the run report.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; stdout carries the results
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sample { sampler } => {
            let config = resolve_config(&sampler)?;
            if sampler.dry_run {
                info!("Dry run: using in-memory producer");
                run_sample(MockProducerFactory::acknowledging(), &config).await
            } else {
                let factory = RemotingProducerFactory::default()
                    .with_connect_timeout(sampler.connect_timeout);
                run_sample(factory, &config).await
            }
        }
        Commands::Run {
            sampler,
            iterations,
            concurrency,
            duration,
            results_file,
            format,
        } => {
            let config = resolve_config(&sampler)?;
            let plan = RunPlan {
                iterations,
                concurrency,
                duration,
            };
            let results_file = results_file.as_deref();
            if sampler.dry_run {
                info!("Dry run: using in-memory producer");
                run_load(
                    MockProducerFactory::acknowledging(),
                    config,
                    &plan,
                    results_file,
                    format,
                )
                .await
            } else {
                let factory = RemotingProducerFactory::default()
                    .with_connect_timeout(sampler.connect_timeout);
                run_load(factory, config, &plan, results_file, format).await
            }
        }
    }
}

/// Run one sample. The process succeeds even when the sample failed; the
/// failure is in the printed result.
async fn run_sample<F: ProducerFactory>(factory: F, config: &SamplerConfig) -> anyhow::Result<()> {
    let result = Sampler::new(factory).execute(config).await;
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize sample result")?;
    println!("{json}");
    Ok(())
}

async fn run_load<F: ProducerFactory + 'static>(
    factory: F,
    config: SamplerConfig,
    plan: &RunPlan,
    results_file: Option<&std::path::Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = runner::run(
        Arc::new(Sampler::new(factory)),
        Arc::new(config),
        plan,
        results_file,
    )
    .await?;

    let output = match format {
        OutputFormat::Table => format_table(&report),
        OutputFormat::Markdown => format_markdown(&report),
        OutputFormat::Json => format_json(&report).context("Failed to serialize report")?,
    };
    println!("{output}");
    Ok(())
}
