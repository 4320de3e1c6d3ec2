//! Load runner: many samples across concurrent workers.
//!
//! Workers claim iteration indexes from a shared counter and stream their
//! results to a single collector, which aggregates the report and writes the
//! optional results file.

use crate::report::{ReportBuilder, RunReport};
use anyhow::{Context, Result};
use rocketmq_send_sampler::{ProducerFactory, SampleResult, Sampler, SamplerConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

const PROGRESS_INTERVAL: u64 = 1000;

/// How many samples to run and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Stop after this many samples.
    pub iterations: Option<u64>,
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Stop claiming new samples once this much time has passed.
    pub duration: Option<Duration>,
}

impl RunPlan {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.iterations == Some(0) {
            anyhow::bail!("iterations must be at least 1");
        }
        if self.iterations.is_none() && self.duration.is_none() {
            anyhow::bail!("either iterations or duration must be set");
        }
        Ok(())
    }
}

/// Run `plan` and return the aggregated report.
///
/// Samples already in flight when the duration elapses run to completion.
pub async fn run<F>(
    sampler: Arc<Sampler<F>>,
    config: Arc<SamplerConfig>,
    plan: &RunPlan,
    results_file: Option<&Path>,
) -> Result<RunReport>
where
    F: ProducerFactory + 'static,
{
    plan.validate()?;

    let mut writer = match results_file {
        Some(path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create results file {path:?}")
        })?)),
        None => None,
    };

    info!(
        "Starting run: label={} mode={} concurrency={} iterations={:?} duration={:?}",
        config.label(),
        config.send_mode(),
        plan.concurrency,
        plan.iterations,
        plan.duration
    );

    let started = Instant::now();
    let deadline = plan.duration.map(|d| started + d);
    let next_index = Arc::new(AtomicU64::new(0));
    let (tx, mut rx) = mpsc::channel::<SampleResult>(plan.concurrency * 2);

    let mut workers = JoinSet::new();
    for worker_id in 0..plan.concurrency {
        let sampler = Arc::clone(&sampler);
        let config = Arc::clone(&config);
        let next_index = Arc::clone(&next_index);
        let tx = tx.clone();
        let iterations = plan.iterations;

        workers.spawn(async move {
            let mut completed = 0u64;
            loop {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                if iterations.is_some_and(|max| index >= max) {
                    break;
                }
                let result = sampler.execute(&config).await;
                completed += 1;
                if tx.send(result).await.is_err() {
                    break;
                }
            }
            debug!("Worker {worker_id} finished after {completed} samples");
        });
    }
    drop(tx);

    let mut builder = ReportBuilder::new(config.label(), config.send_mode().as_str());
    while let Some(result) = rx.recv().await {
        builder.record(&result);
        if let Some(writer) = writer.as_mut() {
            serde_json::to_writer(&mut *writer, &result)
                .context("Failed to serialize sample result")?;
            writer
                .write_all(b"\n")
                .context("Failed to write results file")?;
        }

        let total = builder.total();
        if total % PROGRESS_INTERVAL == 0 {
            info!("Completed {total} samples");
        }
    }

    while let Some(joined) = workers.join_next().await {
        joined.context("Worker task failed")?;
    }

    if let Some(mut writer) = writer {
        writer.flush().context("Failed to flush results file")?;
    }

    let report = builder.finish(started.elapsed());
    info!(
        "Run complete: {} samples, {} failures, {:.1} samples/sec",
        report.total, report.failures, report.throughput
    );
    Ok(report)
}
