//! The replay sender.
//!
//! Loads timestamp-free OTLP templates, then replays them against the
//! configured collector from a pool of signal-specialized workers. Each
//! replay gets a fresh identity (trace/span ids, timestamps) so the receiver
//! sees an endless stream of new telemetry built from a fixed dataset.

pub mod batch;
pub mod clone;
pub mod export;
pub mod ids;
pub mod loader;
pub mod ratelimit;
pub mod stats;
pub mod timestamps;
pub mod workers;

use crate::core::{Result, SenderConfig};
use crate::sender::batch::TraceBatcher;
use crate::sender::export::{ExporterSettings, LogsExporter, MetricsExporter, TraceExporter};
use crate::sender::loader::Templates;
use crate::sender::ratelimit::RateGovernor;
use crate::sender::stats::{Reporter, REPORT_INTERVAL};
use crate::sender::timestamps::TimestampStamper;
use crate::sender::workers::WorkerPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the sender to completion: deadline reached, multiplier exhausted, or
/// interrupt. Interrupts are an orderly shutdown, not an error.
pub async fn run(config: SenderConfig) -> Result<()> {
    tracing::info!(
        endpoint = %config.otlp.endpoint,
        rate_limit = config.sending.rate_limit.events_per_second,
        concurrency = config.sending.concurrency,
        multiplier = config.sending.multiplier,
        "starting sender"
    );

    let templates = Arc::new(Templates::load(
        config.input.traces.as_deref(),
        config.input.metrics.as_deref(),
        config.input.logs.as_deref(),
    )?);

    let settings = ExporterSettings {
        endpoint: config.otlp.endpoint.clone(),
        headers: config.otlp.headers.clone(),
        insecure: config.otlp.insecure,
    };

    let trace_exporter = templates
        .traces
        .as_ref()
        .map(|_| TraceExporter::new(&settings))
        .transpose()?;
    let metrics_exporter = templates
        .metrics
        .as_ref()
        .map(|_| MetricsExporter::new(&settings))
        .transpose()?;
    let logs_exporter = templates
        .logs
        .as_ref()
        .map(|_| LogsExporter::new(&settings))
        .transpose()?;

    let stamper = TimestampStamper::new(config.timestamps.jitter_ms, config.timestamps.backdate_ms);
    let governor = Arc::new(RateGovernor::new(config.sending.rate_limit.events_per_second));
    let reporter = Arc::new(Reporter::new());
    let batcher = TraceBatcher::new(config.sending.batch_size.traces);

    let pool = Arc::new(WorkerPool::new(
        config.sending.concurrency,
        Arc::clone(&templates),
        trace_exporter,
        metrics_exporter,
        logs_exporter,
        stamper,
        governor,
        Arc::clone(&reporter),
        batcher,
        config.sending.multiplier,
    ));

    let distribution = pool.distribution();
    tracing::info!(
        trace_workers = distribution.traces,
        metric_workers = distribution.metrics,
        log_workers = distribution.logs,
        "worker distribution"
    );

    let cancel = CancellationToken::new();
    let ticker = Arc::clone(&reporter).spawn_periodic(REPORT_INTERVAL, cancel.clone());

    if let Some(deadline) = config.deadline() {
        tracing::info!(duration = ?deadline, "sending until deadline");
        let deadline_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::info!("deadline reached, shutting down");
            deadline_cancel.cancel();
        });
    } else if config.sending.multiplier == 0 {
        tracing::info!("sending indefinitely (Ctrl+C to stop)");
    }

    let interrupt_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            interrupt_cancel.cancel();
        }
    });

    let result = pool.run(cancel.clone()).await;

    cancel.cancel();
    let _ = ticker.await;
    reporter.print_final();

    result
}
