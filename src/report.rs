//! Aggregation and formatting of load run results.

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use rocketmq_send_sampler::SampleResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency distribution in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

impl LatencySummary {
    /// Summarize `samples`, which must be sorted ascending.
    fn from_sorted(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let sum: f64 = samples.iter().sum();
        Self {
            min_ms: samples[0],
            mean_ms: sum / samples.len() as f64,
            max_ms: samples[samples.len() - 1],
            p50_ms: percentile(samples, 50.0),
            p90_ms: percentile(samples, 90.0),
            p99_ms: percentile(samples, 99.0),
        }
    }
}

/// Nearest-rank percentile of a sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Summary of a load run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub label: String,
    pub send_mode: String,
    pub started_at: DateTime<Utc>,
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub error_rate: f64,
    pub sent_bytes: u64,
    pub wall_clock_secs: f64,
    pub throughput: f64,
    pub latency: LatencySummary,
    pub failures_by_code: BTreeMap<String, u64>,
}

/// Collects sample results as they arrive.
#[derive(Debug)]
pub struct ReportBuilder {
    label: String,
    send_mode: String,
    started_at: DateTime<Utc>,
    successes: u64,
    failures: u64,
    sent_bytes: u64,
    latencies_ms: Vec<f64>,
    failures_by_code: BTreeMap<String, u64>,
}

impl ReportBuilder {
    pub fn new(label: impl Into<String>, send_mode: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            send_mode: send_mode.into(),
            started_at: Utc::now(),
            successes: 0,
            failures: 0,
            sent_bytes: 0,
            latencies_ms: Vec::new(),
            failures_by_code: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, result: &SampleResult) {
        if result.success {
            self.successes += 1;
        } else {
            self.failures += 1;
            *self
                .failures_by_code
                .entry(result.response_code.clone())
                .or_insert(0) += 1;
        }
        self.sent_bytes += result.sent_bytes;
        self.latencies_ms.push(result.elapsed.as_secs_f64() * 1000.0);
    }

    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn finish(mut self, wall_clock: Duration) -> RunReport {
        self.latencies_ms.sort_by(f64::total_cmp);
        let total = self.total();
        let wall_clock_secs = wall_clock.as_secs_f64();

        let error_rate = if total > 0 {
            self.failures as f64 / total as f64
        } else {
            0.0
        };
        let throughput = if wall_clock_secs > 0.0 {
            total as f64 / wall_clock_secs
        } else {
            0.0
        };

        RunReport {
            label: self.label,
            send_mode: self.send_mode,
            started_at: self.started_at,
            total,
            successes: self.successes,
            failures: self.failures,
            error_rate,
            sent_bytes: self.sent_bytes,
            wall_clock_secs,
            throughput,
            latency: LatencySummary::from_sorted(&self.latencies_ms),
            failures_by_code: self.failures_by_code,
        }
    }
}

/// Format a run report as a table.
pub fn format_table(report: &RunReport) -> String {
    let mut output = String::new();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Label",
        "Mode",
        "Samples",
        "Errors",
        "Duration",
        "Samples/sec",
        "Status",
    ]);

    let status_cell = if report.failures == 0 {
        Cell::new("OK").fg(Color::Green)
    } else {
        Cell::new(format!("{:.2}% errors", report.error_rate * 100.0)).fg(Color::Red)
    };

    table.add_row(vec![
        Cell::new(&report.label),
        Cell::new(&report.send_mode),
        Cell::new(format_number(report.total)),
        Cell::new(format_number(report.failures)),
        Cell::new(format_duration(report.wall_clock_secs)),
        Cell::new(format!("{:.1}", report.throughput)),
        status_cell,
    ]);
    output.push_str(&table.to_string());
    output.push('\n');

    let mut latency = Table::new();
    latency.load_preset(UTF8_FULL);
    latency.set_header(vec!["Min", "Mean", "p50", "p90", "p99", "Max"]);
    let l = &report.latency;
    latency.add_row(
        [l.min_ms, l.mean_ms, l.p50_ms, l.p90_ms, l.p99_ms, l.max_ms]
            .iter()
            .map(|ms| Cell::new(format!("{ms:.2}ms")))
            .collect::<Vec<_>>(),
    );
    output.push_str("\nLatency:\n");
    output.push_str(&latency.to_string());
    output.push('\n');

    if !report.failures_by_code.is_empty() {
        output.push_str("\nFailures:\n");
        for (code, count) in &report.failures_by_code {
            output.push_str(&format!("  {}: {}\n", code, format_number(*count)));
        }
    }

    output
}

/// Format a run report as markdown.
pub fn format_markdown(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# RocketMQ Send Results\n\n");
    output.push_str(&format!(
        "**Started at:** {}\n\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str("## Summary\n\n");
    output.push_str(&format!("- **Label:** {}\n", report.label));
    output.push_str(&format!("- **Mode:** {}\n", report.send_mode));
    output.push_str(&format!(
        "- **Samples:** {}\n",
        format_number(report.total)
    ));
    output.push_str(&format!(
        "- **Successes:** {}\n",
        format_number(report.successes)
    ));
    output.push_str(&format!(
        "- **Failures:** {}\n",
        format_number(report.failures)
    ));
    output.push_str(&format!(
        "- **Error Rate:** {:.2}%\n",
        report.error_rate * 100.0
    ));
    output.push_str(&format!(
        "- **Wall Clock Duration:** {}\n",
        format_duration(report.wall_clock_secs)
    ));
    output.push_str(&format!(
        "- **Throughput:** {:.1} samples/sec\n\n",
        report.throughput
    ));

    let l = &report.latency;
    output.push_str("## Latency\n\n");
    output.push_str("| Min | Mean | p50 | p90 | p99 | Max |\n");
    output.push_str("|-----|------|-----|-----|-----|-----|\n");
    output.push_str(&format!(
        "| {:.2}ms | {:.2}ms | {:.2}ms | {:.2}ms | {:.2}ms | {:.2}ms |\n",
        l.min_ms, l.mean_ms, l.p50_ms, l.p90_ms, l.p99_ms, l.max_ms
    ));

    if !report.failures_by_code.is_empty() {
        output.push_str("\n## Failures\n\n");
        output.push_str("| Response Code | Count |\n");
        output.push_str("|---------------|-------|\n");
        for (code, count) in &report.failures_by_code {
            output.push_str(&format!("| {} | {} |\n", code, format_number(*count)));
        }
    }

    output
}

/// Format a run report as pretty JSON.
pub fn format_json(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Format duration in human-readable format.
fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs - (mins * 60.0);
        format!("{}m {:02.0}s", mins as u64, remaining_secs)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs - hours * 3600.0) / 60.0).floor();
        format!("{}h {:02}m", hours as u64, mins as u64)
    }
}

/// Format number with thousands separators.
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocketmq_send_sampler::{ClientError, SamplerError, SendMode, SendResult, SendStatus};

    fn sample(ms: u64, outcome: Option<SamplerError>) -> SampleResult {
        let mut result = SampleResult::new("T1", SendMode::Sync);
        match outcome {
            None => result.set_response_code_ok(SendResult::with_status(SendStatus::SendOk)),
            Some(e) => result.set_failure(e),
        }
        result.elapsed = Duration::from_millis(ms);
        result.sent_bytes = 5;
        result
    }

    #[test]
    fn test_aggregation() {
        let mut builder = ReportBuilder::new("T1", "sync");
        for ms in 1..=100 {
            builder.record(&sample(ms, None));
        }
        builder.record(&sample(
            7,
            Some(SamplerError::Send(ClientError::Timeout { millis: 3000 })),
        ));
        builder.record(&sample(
            3,
            Some(SamplerError::Encoding("bad base64".to_string())),
        ));

        let report = builder.finish(Duration::from_secs(2));
        assert_eq!(report.total, 102);
        assert_eq!(report.successes, 100);
        assert_eq!(report.failures, 2);
        assert_eq!(report.sent_bytes, 510);
        assert!((report.throughput - 51.0).abs() < 1e-9);
        assert!((report.error_rate - 2.0 / 102.0).abs() < 1e-9);
        assert_eq!(report.failures_by_code.get("SEND_ERROR"), Some(&1));
        assert_eq!(report.failures_by_code.get("ENCODING_ERROR"), Some(&1));
        assert_eq!(report.latency.min_ms, 1.0);
        assert_eq!(report.latency.max_ms, 100.0);
    }

    #[test]
    fn test_percentiles_nearest_rank() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 50.0), 50.0);
        assert_eq!(percentile(&sorted, 90.0), 90.0);
        assert_eq!(percentile(&sorted, 99.0), 99.0);
        assert_eq!(percentile(&[4.0], 99.0), 4.0);

        let summary = LatencySummary::from_sorted(&sorted);
        assert!((summary.mean_ms - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report() {
        let report = ReportBuilder::new("T1", "sync").finish(Duration::ZERO);
        assert_eq!(report.total, 0);
        assert_eq!(report.error_rate, 0.0);
        assert_eq!(report.throughput, 0.0);
        assert_eq!(report.latency, LatencySummary::default());
    }

    #[test]
    fn test_formats() {
        let mut builder = ReportBuilder::new("orders", "async");
        builder.record(&sample(10, None));
        builder.record(&sample(
            20,
            Some(SamplerError::Callback("boom".to_string())),
        ));
        let report = builder.finish(Duration::from_secs(1));

        let table = format_table(&report);
        assert!(table.contains("orders"));
        assert!(table.contains("CALLBACK_ERROR: 1"));

        let markdown = format_markdown(&report);
        assert!(markdown.contains("- **Samples:** 2"));
        assert!(markdown.contains("| CALLBACK_ERROR | 1 |"));

        let json: serde_json::Value = serde_json::from_str(&format_json(&report).unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["failures_by_code"]["CALLBACK_ERROR"], 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5.5), "5.5s");
        assert_eq!(format_duration(65.0), "1m 05s");
        assert_eq!(format_duration(3661.0), "1h 01m");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
