//! Sending statistics.
//!
//! Counter updates happen on the replay hot path and are lock-free atomics;
//! only the print path takes a mutex, so ticker output and the final flush
//! never interleave.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Interval between periodic summaries
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Thread-safe counters with periodic and final summaries
#[derive(Debug)]
pub struct Reporter {
    spans_sent: AtomicU64,
    data_points_sent: AtomicU64,
    log_records_sent: AtomicU64,
    errors: AtomicU64,
    started: Instant,
    print_state: Mutex<PrintState>,
}

#[derive(Debug)]
struct PrintState {
    last_report: Instant,
    last_total: u64,
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub spans: u64,
    pub data_points: u64,
    pub log_records: u64,
    pub errors: u64,
}

impl StatsSnapshot {
    pub fn total_events(&self) -> u64 {
        self.spans + self.data_points + self.log_records
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        let now = Instant::now();
        Reporter {
            spans_sent: AtomicU64::new(0),
            data_points_sent: AtomicU64::new(0),
            log_records_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: now,
            print_state: Mutex::new(PrintState {
                last_report: now,
                last_total: 0,
            }),
        }
    }

    pub fn record_spans(&self, count: usize) {
        self.spans_sent.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_data_points(&self, count: usize) {
        self.data_points_sent.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_log_records(&self, count: usize) {
        self.log_records_sent.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            spans: self.spans_sent.load(Ordering::Relaxed),
            data_points: self.data_points_sent.load(Ordering::Relaxed),
            log_records: self.log_records_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Print cumulative counts, the overall rate, and the rate since the
    /// previous summary
    pub fn print_summary(&self) {
        let mut state = self.print_state.lock();
        let snapshot = self.snapshot();
        let now = Instant::now();

        let total = snapshot.total_events();
        let overall_rate = rate(total, self.started.elapsed());
        let recent_rate = rate(
            total.saturating_sub(state.last_total),
            now.saturating_duration_since(state.last_report),
        );

        tracing::info!(
            spans = snapshot.spans,
            data_points = snapshot.data_points,
            log_records = snapshot.log_records,
            total_events = total,
            errors = snapshot.errors,
            elapsed_secs = self.started.elapsed().as_secs(),
            overall_rate = format_args!("{:.0}/s", overall_rate),
            recent_rate = format_args!("{:.0}/s", recent_rate),
            "sending stats"
        );

        state.last_report = now;
        state.last_total = total;
    }

    /// Print final totals on shutdown
    pub fn print_final(&self) {
        let _guard = self.print_state.lock();
        let snapshot = self.snapshot();
        let elapsed = self.started.elapsed();

        tracing::info!(
            spans = snapshot.spans,
            data_points = snapshot.data_points,
            log_records = snapshot.log_records,
            total_events = snapshot.total_events(),
            errors = snapshot.errors,
            elapsed = format_args!("{:.2?}", elapsed),
            average_rate = format_args!("{:.0}/s", rate(snapshot.total_events(), elapsed)),
            "final stats"
        );
    }

    /// Spawn the periodic summary ticker; it stops when the token fires
    pub fn spawn_periodic(
        self: std::sync::Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let reporter = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => reporter.print_summary(),
                    _ = cancel.cancelled() => return,
                }
            }
        })
    }
}

fn rate(events: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        0.0
    } else {
        events as f64 / secs
    }
}
