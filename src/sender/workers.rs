//! The worker pool.
//!
//! Workers are specialized by signal and allocated proportionally to each
//! signal's template event volume. Every worker loops over the replay
//! pipeline (clone, rewrite identity, rate-limit, export) until the shared
//! cancellation token fires or its iteration budget is exhausted. One
//! iteration is one full template replay; a trace split across several
//! outbound batches still counts as a single iteration.

use crate::core::{BlastError, Result};
use crate::sender::batch::{TraceBatch, TraceBatcher};
use crate::sender::clone::{clone_logs_request, clone_metrics_request, clone_trace_batch};
use crate::sender::export::{LogsExporter, MetricsExporter, TraceExporter};
use crate::sender::ids::TraceIdentity;
use crate::sender::loader::{metric_data_points, Templates};
use crate::sender::ratelimit::RateGovernor;
use crate::sender::stats::Reporter;
use crate::sender::timestamps::TimestampStamper;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Iteration counter wrap point in infinite mode
const ITERATION_WRAP: u64 = 1_000_000;

/// The three OTLP signals a worker can be specialized to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Traces => write!(f, "traces"),
            Signal::Metrics => write!(f, "metrics"),
            Signal::Logs => write!(f, "logs"),
        }
    }
}

/// Worker counts per signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerDistribution {
    pub traces: usize,
    pub metrics: usize,
    pub logs: usize,
}

impl WorkerDistribution {
    pub fn total(&self) -> usize {
        self.traces + self.metrics + self.logs
    }
}

/// Split the worker budget across signals proportionally to template event
/// counts. Every active signal gets at least one worker while the budget
/// allows; with fewer workers than active signals, the highest-volume
/// signals win and the rest go unserved. The returned counts always sum to
/// the budget (or zero when nothing is active).
pub fn distribute_workers(
    budget: usize,
    trace_events: u64,
    metric_events: u64,
    log_events: u64,
) -> WorkerDistribution {
    let total_events = trace_events + metric_events + log_events;
    if total_events == 0 {
        // No data anywhere: park the whole budget on traces
        return WorkerDistribution {
            traces: budget,
            metrics: 0,
            logs: 0,
        };
    }

    // (events, slot) pairs; slot order doubles as the tie-break
    let mut signals = [
        (trace_events, 0usize),
        (metric_events, 1),
        (log_events, 2),
    ];
    let active = signals.iter().filter(|(events, _)| *events > 0).count();

    let mut counts = [0usize; 3];

    if budget < active {
        // Too few workers to cover every active signal: serve the largest
        signals.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, slot) in signals.iter().take(budget) {
            counts[*slot] = 1;
        }
        return WorkerDistribution {
            traces: counts[0],
            metrics: counts[1],
            logs: counts[2],
        };
    }

    for (events, slot) in &signals {
        counts[*slot] = (budget as u64 * events / total_events) as usize;
    }

    // Rounding may have starved a low-volume signal; every active signal is
    // owed at least one worker
    for (events, slot) in &signals {
        if *events > 0 && counts[*slot] == 0 {
            counts[*slot] = 1;
        }
    }

    // The bump can overdraw the budget; reclaim from the largest allocations
    while counts.iter().sum::<usize>() > budget {
        let largest = (0..3)
            .filter(|&i| counts[i] > 1)
            .max_by_key(|&i| counts[i])
            .unwrap_or(0);
        counts[largest] -= 1;
    }

    // Leftover workers go to the signal with the most events
    let leftover = budget - counts.iter().sum::<usize>();
    if leftover > 0 {
        let busiest = signals
            .iter()
            .max_by_key(|(events, slot)| (*events, std::cmp::Reverse(*slot)))
            .map(|(_, slot)| *slot)
            .unwrap_or(0);
        counts[busiest] += leftover;
    }

    WorkerDistribution {
        traces: counts[0],
        metrics: counts[1],
        logs: counts[2],
    }
}

/// Runs signal-specialized replay workers until cancellation or the
/// iteration budget is exhausted
pub struct WorkerPool {
    templates: Arc<Templates>,
    trace_exporter: Option<TraceExporter>,
    metrics_exporter: Option<MetricsExporter>,
    logs_exporter: Option<LogsExporter>,
    stamper: TimestampStamper,
    governor: Arc<RateGovernor>,
    reporter: Arc<Reporter>,
    batcher: TraceBatcher,
    multiplier: u64,
    distribution: WorkerDistribution,
}

impl WorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        concurrency: usize,
        templates: Arc<Templates>,
        trace_exporter: Option<TraceExporter>,
        metrics_exporter: Option<MetricsExporter>,
        logs_exporter: Option<LogsExporter>,
        stamper: TimestampStamper,
        governor: Arc<RateGovernor>,
        reporter: Arc<Reporter>,
        batcher: TraceBatcher,
        multiplier: u64,
    ) -> Self {
        let distribution = distribute_workers(
            concurrency,
            templates.span_count(),
            templates.data_point_count(),
            templates.log_record_count(),
        );

        WorkerPool {
            templates,
            trace_exporter,
            metrics_exporter,
            logs_exporter,
            stamper,
            governor,
            reporter,
            batcher,
            multiplier,
            distribution,
        }
    }

    pub fn distribution(&self) -> WorkerDistribution {
        self.distribution
    }

    /// Run all workers to completion. Cancellation is a clean exit; the
    /// first genuinely fatal worker error becomes the pool's result.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut handles = Vec::with_capacity(self.distribution.total());

        if self.templates.traces.is_some() && self.trace_exporter.is_some() {
            for worker_id in 0..self.distribution.traces {
                let pool = Arc::clone(&self);
                let cancel = cancel.clone();
                handles.push(tokio::spawn(async move {
                    pool.worker(Signal::Traces, worker_id, cancel).await
                }));
            }
        }

        if self.templates.metrics.is_some() && self.metrics_exporter.is_some() {
            for worker_id in 0..self.distribution.metrics {
                let pool = Arc::clone(&self);
                let cancel = cancel.clone();
                handles.push(tokio::spawn(async move {
                    pool.worker(Signal::Metrics, worker_id, cancel).await
                }));
            }
        }

        if self.templates.logs.is_some() && self.logs_exporter.is_some() {
            for worker_id in 0..self.distribution.logs {
                let pool = Arc::clone(&self);
                let cancel = cancel.clone();
                handles.push(tokio::spawn(async move {
                    pool.worker(Signal::Logs, worker_id, cancel).await
                }));
            }
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_cancellation() => {}
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    first_error.get_or_insert(join_err.into());
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn worker(
        &self,
        signal: Signal,
        worker_id: usize,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut iteration: u64 = 0;

        loop {
            if self.multiplier > 0 && iteration >= self.multiplier {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Ok(());
            }

            let result = match signal {
                Signal::Traces => self.replay_traces(&cancel).await,
                Signal::Metrics => self.replay_metrics(&cancel).await,
                Signal::Logs => self.replay_logs(&cancel).await,
            };

            if let Err(err) = result {
                if cancel.is_cancelled() || err.is_cancellation() {
                    return Ok(());
                }
                tracing::warn!(
                    worker = worker_id,
                    signal = %signal,
                    iteration,
                    error = %err,
                    "replay failed"
                );
                self.reporter.record_error();
                continue;
            }

            iteration += 1;
            if self.multiplier == 0 && iteration > ITERATION_WRAP {
                iteration = 0;
            }
        }
    }

    /// One full trace template replay: plan batches, then clone, rewrite,
    /// rate-limit, and export each. Chunks split from the same template
    /// trace share one rewritten identity so the receiver can reassemble
    /// the trace.
    async fn replay_traces(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(template) = &self.templates.traces else {
            return Ok(());
        };
        if template.resource_spans.is_empty() {
            return Ok(());
        }

        let batches = self.batcher.batches(&template.resource_spans);
        let mut chunk_identity: Option<(usize, TraceIdentity)> = None;

        for batch in batches {
            if cancel.is_cancelled() {
                return Err(BlastError::Cancelled);
            }

            let mut request = clone_trace_batch(&batch);
            match &batch {
                TraceBatch::Groups(_) => {
                    for group in &mut request.resource_spans {
                        let identity = TraceIdentity::generate_for(group);
                        identity.apply(group);
                        self.stamper.stamp_trace(group);
                    }
                }
                TraceBatch::Chunk {
                    group_index, group, ..
                } => {
                    // The identity must cover the whole source trace, not
                    // just this chunk, so cross-chunk parent links and the
                    // shared trace id stay coherent
                    let refresh = chunk_identity
                        .as_ref()
                        .map_or(true, |(cached, _)| cached != group_index);
                    if refresh {
                        chunk_identity =
                            Some((*group_index, TraceIdentity::generate_for(group)));
                    }
                    let (_, identity) = chunk_identity
                        .as_ref()
                        .expect("identity cached for current chunk group");

                    let chunk_group = &mut request.resource_spans[0];
                    identity.apply(chunk_group);
                    self.stamper.stamp_trace(chunk_group);
                }
            }

            let span_count = batch.span_count();
            self.governor.wait(cancel, span_count).await?;
            self.export_traces(cancel, request).await?;
            self.reporter.record_spans(span_count);
        }

        Ok(())
    }

    /// One full metric template replay in a single request
    async fn replay_metrics(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(template) = &self.templates.metrics else {
            return Ok(());
        };

        let mut request = clone_metrics_request(template);
        let mut data_point_count = 0;
        for rm in &mut request.resource_metrics {
            for sm in &mut rm.scope_metrics {
                for metric in &mut sm.metrics {
                    self.stamper.stamp_metric(metric);
                    data_point_count += metric_data_points(metric);
                }
            }
        }

        self.governor.wait(cancel, data_point_count).await?;
        self.export_metrics(cancel, request).await?;
        self.reporter.record_data_points(data_point_count);
        Ok(())
    }

    /// One full log template replay in a single request
    async fn replay_logs(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(template) = &self.templates.logs else {
            return Ok(());
        };

        let mut request = clone_logs_request(template);
        let mut record_count = 0;
        for rl in &mut request.resource_logs {
            for sl in &mut rl.scope_logs {
                self.stamper.stamp_logs(&mut sl.log_records);
                record_count += sl.log_records.len();
            }
        }

        self.governor.wait(cancel, record_count).await?;
        self.export_logs(cancel, request).await?;
        self.reporter.record_log_records(record_count);
        Ok(())
    }

    async fn export_traces(
        &self,
        cancel: &CancellationToken,
        request: opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest,
    ) -> Result<()> {
        let exporter = self
            .trace_exporter
            .as_ref()
            .ok_or_else(|| BlastError::export("trace exporter not configured"))?;
        tokio::select! {
            result = exporter.export(request) => result,
            _ = cancel.cancelled() => Err(BlastError::Cancelled),
        }
    }

    async fn export_metrics(
        &self,
        cancel: &CancellationToken,
        request: opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest,
    ) -> Result<()> {
        let exporter = self
            .metrics_exporter
            .as_ref()
            .ok_or_else(|| BlastError::export("metrics exporter not configured"))?;
        tokio::select! {
            result = exporter.export(request) => result,
            _ = cancel.cancelled() => Err(BlastError::Cancelled),
        }
    }

    async fn export_logs(
        &self,
        cancel: &CancellationToken,
        request: opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest,
    ) -> Result<()> {
        let exporter = self
            .logs_exporter
            .as_ref()
            .ok_or_else(|| BlastError::export("logs exporter not configured"))?;
        tokio::select! {
            result = exporter.export(request) => result,
            _ = cancel.cancelled() => Err(BlastError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_split() {
        // S5: E_T=800, E_M=200, E_L=0, N=10 -> 8/2/0
        let dist = distribute_workers(10, 800, 200, 0);
        assert_eq!(
            dist,
            WorkerDistribution {
                traces: 8,
                metrics: 2,
                logs: 0
            }
        );
        assert_eq!(dist.total(), 10);
    }

    #[test]
    fn test_every_active_signal_gets_a_worker() {
        let dist = distribute_workers(10, 10_000, 5, 5);
        assert!(dist.traces >= 1);
        assert!(dist.metrics >= 1);
        assert!(dist.logs >= 1);
        assert_eq!(dist.total(), 10);
    }

    #[test]
    fn test_bump_reclaims_from_largest() {
        // Floors would be 2/0/0; the two bumps overdraw a budget of 3
        let dist = distribute_workers(3, 9_000, 50, 50);
        assert_eq!(dist.total(), 3);
        assert!(dist.traces >= 1);
        assert!(dist.metrics >= 1);
        assert!(dist.logs >= 1);
    }

    #[test]
    fn test_leftover_goes_to_busiest() {
        let dist = distribute_workers(7, 100, 100, 100);
        assert_eq!(dist.total(), 7);
        // Tie on events: traces wins the leftover by signal order
        assert!(dist.traces >= dist.metrics);
        assert!(dist.traces >= dist.logs);
    }

    #[test]
    fn test_budget_smaller_than_active_serves_largest() {
        let dist = distribute_workers(1, 500, 1_000, 100);
        assert_eq!(
            dist,
            WorkerDistribution {
                traces: 0,
                metrics: 1,
                logs: 0
            }
        );

        let dist = distribute_workers(2, 500, 1_000, 100);
        assert_eq!(
            dist,
            WorkerDistribution {
                traces: 1,
                metrics: 1,
                logs: 0
            }
        );
    }

    #[test]
    fn test_no_data_parks_budget_on_traces() {
        let dist = distribute_workers(4, 0, 0, 0);
        assert_eq!(
            dist,
            WorkerDistribution {
                traces: 4,
                metrics: 0,
                logs: 0
            }
        );
    }

    #[test]
    fn test_single_signal_takes_everything() {
        let dist = distribute_workers(6, 0, 0, 1_000);
        assert_eq!(
            dist,
            WorkerDistribution {
                traces: 0,
                metrics: 0,
                logs: 6
            }
        );
    }
}
