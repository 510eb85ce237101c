//! Run metrics collection for observability
//!
//! Lightweight atomic counters updated by the benchmark actor and exported
//! in Prometheus text format at `GET /metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chronikbench::{CombinedResult, ProbeFailure};

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Run lifecycle
    pub runs_started: AtomicU64,
    pub runs_completed: AtomicU64,
    pub runs_aborted: AtomicU64,

    /// Per-node outcomes
    pub nodes_tested: AtomicU64,
    pub history_failures: AtomicU64,
    pub offers_supported: AtomicU64,
    pub offers_unsupported: AtomicU64,
    pub offers_timed_out: AtomicU64,

    /// Connect latency buckets
    pub latency_under_100ms: AtomicU64,
    pub latency_under_250ms: AtomicU64,
    pub latency_under_500ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,

    /// Histogram support
    pub latency_sum_millis: AtomicU64,
    pub latency_count: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_aborted: AtomicU64::new(0),
            nodes_tested: AtomicU64::new(0),
            history_failures: AtomicU64::new(0),
            offers_supported: AtomicU64::new(0),
            offers_unsupported: AtomicU64::new(0),
            offers_timed_out: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_250ms: AtomicU64::new(0),
            latency_under_500ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_millis: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_aborted(&self) {
        self.runs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one node
    pub fn record_result(&self, result: &CombinedResult) {
        self.nodes_tested.fetch_add(1, Ordering::Relaxed);

        if !result.is_success() {
            self.history_failures.fetch_add(1, Ordering::Relaxed);
        }

        match (&result.offer_failure, result.offers_supported) {
            (_, true) => self.offers_supported.fetch_add(1, Ordering::Relaxed),
            (Some(ProbeFailure::Timeout), false) => {
                self.offers_timed_out.fetch_add(1, Ordering::Relaxed)
            }
            _ => self.offers_unsupported.fetch_add(1, Ordering::Relaxed),
        };

        // Unreachable nodes have no latency to bucket
        if let Some(latency_ms) = result.connect_latency.millis() {
            match latency_ms {
                0..=99 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
                100..=249 => self.latency_under_250ms.fetch_add(1, Ordering::Relaxed),
                250..=499 => self.latency_under_500ms.fetch_add(1, Ordering::Relaxed),
                500..=999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
                _ => self.latency_over_1s.fetch_add(1, Ordering::Relaxed),
            };
            self.latency_sum_millis
                .fetch_add(latency_ms, Ordering::Relaxed);
            self.latency_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        counter(
            &mut output,
            "chronikbench_uptime_seconds",
            "Time since server start in seconds",
            "gauge",
            self.uptime_seconds(),
        );
        counter(
            &mut output,
            "chronikbench_runs_started_total",
            "Benchmark runs started",
            "counter",
            self.runs_started.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "chronikbench_runs_completed_total",
            "Benchmark runs that tested every node",
            "counter",
            self.runs_completed.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "chronikbench_runs_aborted_total",
            "Benchmark runs aborted by the operator",
            "counter",
            self.runs_aborted.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "chronikbench_nodes_tested_total",
            "Combined node results emitted",
            "counter",
            self.nodes_tested.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "chronikbench_history_failures_total",
            "Nodes whose address history test failed",
            "counter",
            self.history_failures.load(Ordering::Relaxed),
        );

        output.push_str("# HELP chronikbench_offer_tests_total Offer test outcomes\n");
        output.push_str("# TYPE chronikbench_offer_tests_total counter\n");
        for (outcome, value) in [
            ("supported", &self.offers_supported),
            ("unsupported", &self.offers_unsupported),
            ("timeout", &self.offers_timed_out),
        ] {
            let _ = writeln!(
                output,
                "chronikbench_offer_tests_total{{outcome=\"{outcome}\"}} {}",
                value.load(Ordering::Relaxed)
            );
        }
        output.push('\n');

        // Latency distribution
        let buckets = [
            ("0.1", self.latency_under_100ms.load(Ordering::Relaxed)),
            ("0.25", self.latency_under_250ms.load(Ordering::Relaxed)),
            ("0.5", self.latency_under_500ms.load(Ordering::Relaxed)),
            ("1", self.latency_under_1s.load(Ordering::Relaxed)),
        ];
        output.push_str(
            "# HELP chronikbench_connect_latency_seconds Mean connect latency per node\n",
        );
        output.push_str("# TYPE chronikbench_connect_latency_seconds histogram\n");
        let mut cumulative = 0;
        for (le, count) in buckets {
            cumulative += count;
            let _ = writeln!(
                output,
                "chronikbench_connect_latency_seconds_bucket{{le=\"{le}\"}} {cumulative}"
            );
        }
        let _ = writeln!(
            output,
            "chronikbench_connect_latency_seconds_bucket{{le=\"+Inf\"}} {}",
            self.latency_count.load(Ordering::Relaxed)
        );

        let latency_sum_seconds = self.latency_sum_millis.load(Ordering::Relaxed) as f64 / 1_000.0;
        let _ = writeln!(
            output,
            "chronikbench_connect_latency_seconds_sum {latency_sum_seconds:.3}"
        );
        let _ = writeln!(
            output,
            "chronikbench_connect_latency_seconds_count {}",
            self.latency_count.load(Ordering::Relaxed)
        );

        output
    }
}

fn counter(output: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {kind}");
    let _ = writeln!(output, "{name} {value}\n");
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
