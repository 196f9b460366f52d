//! Prometheus metrics collection and formatting.
//!
//! Counters are plain atomics bumped by the orchestrator; quota usage gauges
//! are read from the rate limiter at scrape time.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use briefrun_core::{FoldOutcome, UsageSnapshot};

use crate::state::AppState;

/// Orchestration counters.
#[derive(Debug, Default)]
pub struct Metrics {
    briefings_accepted: AtomicU64,
    briefings_quota_rejected: AtomicU64,
    tasks_published: AtomicU64,
    publish_failures: AtomicU64,
    results_recorded: AtomicU64,
    results_duplicate: AtomicU64,
    results_conflicting: AtomicU64,
    results_rejected: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub briefings_accepted: u64,
    pub briefings_quota_rejected: u64,
    pub tasks_published: u64,
    pub publish_failures: u64,
    pub results_recorded: u64,
    pub results_duplicate: u64,
    pub results_conflicting: u64,
    pub results_rejected: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_briefing_accepted(&self) {
        self.briefings_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_rejection(&self) {
        self.briefings_quota_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, published: usize, failed: usize) {
        self.tasks_published.fetch_add(published as u64, Ordering::Relaxed);
        self.publish_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_result(&self, fold: FoldOutcome) {
        let counter = match fold {
            FoldOutcome::Recorded => &self.results_recorded,
            FoldOutcome::Duplicate => &self.results_duplicate,
            FoldOutcome::Conflicting { .. } => &self.results_conflicting,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result_rejected(&self) {
        self.results_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            briefings_accepted: self.briefings_accepted.load(Ordering::Relaxed),
            briefings_quota_rejected: self.briefings_quota_rejected.load(Ordering::Relaxed),
            tasks_published: self.tasks_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            results_recorded: self.results_recorded.load(Ordering::Relaxed),
            results_duplicate: self.results_duplicate.load(Ordering::Relaxed),
            results_conflicting: self.results_conflicting.load(Ordering::Relaxed),
            results_rejected: self.results_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Collect all metrics from AppState and format as Prometheus text.
pub fn collect_metrics(state: &AppState) -> String {
    let now = state.clock.now();
    render(
        &state.orchestrator.metrics().snapshot(),
        &state.orchestrator.usage(now),
    )
}

/// Format counters and quota gauges as Prometheus text.
pub fn render(metrics: &MetricsSnapshot, usage: &UsageSnapshot) -> String {
    let mut output = String::new();

    write_briefing_metrics(metrics, &mut output);
    write_task_metrics(metrics, &mut output);
    write_result_metrics(metrics, &mut output);
    write_quota_metrics(usage, &mut output);

    output
}

fn write_briefing_metrics(metrics: &MetricsSnapshot, output: &mut String) {
    writeln!(
        output,
        "# HELP briefrun_briefings_total Briefings received by admission outcome"
    )
    .ok();
    writeln!(output, "# TYPE briefrun_briefings_total counter").ok();
    writeln!(
        output,
        "briefrun_briefings_total{{outcome=\"accepted\"}} {}",
        metrics.briefings_accepted
    )
    .ok();
    writeln!(
        output,
        "briefrun_briefings_total{{outcome=\"quota_rejected\"}} {}",
        metrics.briefings_quota_rejected
    )
    .ok();
}

fn write_task_metrics(metrics: &MetricsSnapshot, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP briefrun_tasks_dispatched_total Task publish attempts by outcome"
    )
    .ok();
    writeln!(output, "# TYPE briefrun_tasks_dispatched_total counter").ok();
    writeln!(
        output,
        "briefrun_tasks_dispatched_total{{outcome=\"published\"}} {}",
        metrics.tasks_published
    )
    .ok();
    writeln!(
        output,
        "briefrun_tasks_dispatched_total{{outcome=\"failed\"}} {}",
        metrics.publish_failures
    )
    .ok();
}

fn write_result_metrics(metrics: &MetricsSnapshot, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP briefrun_results_total Task results received by ingestion outcome"
    )
    .ok();
    writeln!(output, "# TYPE briefrun_results_total counter").ok();
    for (outcome, count) in [
        ("recorded", metrics.results_recorded),
        ("duplicate", metrics.results_duplicate),
        ("conflicting", metrics.results_conflicting),
        ("rejected", metrics.results_rejected),
    ] {
        writeln!(output, "briefrun_results_total{{outcome=\"{outcome}\"}} {count}").ok();
    }
}

fn write_quota_metrics(usage: &UsageSnapshot, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP briefrun_quota_used Requests counted in the current quota period"
    )
    .ok();
    writeln!(output, "# TYPE briefrun_quota_used gauge").ok();
    writeln!(
        output,
        "briefrun_quota_used{{quota=\"monthly\",period=\"{}\"}} {}",
        usage.monthly.period, usage.monthly.used
    )
    .ok();
    writeln!(
        output,
        "briefrun_quota_used{{quota=\"daily\",period=\"{}\"}} {}",
        usage.daily.period, usage.daily.used
    )
    .ok();

    writeln!(output).ok();
    writeln!(output, "# HELP briefrun_quota_limit Configured quota size").ok();
    writeln!(output, "# TYPE briefrun_quota_limit gauge").ok();
    writeln!(
        output,
        "briefrun_quota_limit{{quota=\"monthly\"}} {}",
        usage.monthly.limit
    )
    .ok();
    writeln!(output, "briefrun_quota_limit{{quota=\"daily\"}} {}", usage.daily.limit).ok();
}
