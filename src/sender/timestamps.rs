//! Timestamp stamping.
//!
//! Templates carry no meaningful timestamps; each span instead encodes its
//! relative timing in two attributes written by the generator. Stamping
//! anchors the trace at `now - max_duration`, rebuilds every span's absolute
//! start/end from its offset and duration, and strips the template
//! attributes before export. Metrics get one jittered "now" per metric, logs
//! one jittered "now" per record.

use opentelemetry_proto::tonic::common::v1::{any_value::Value, KeyValue};
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use opentelemetry_proto::tonic::metrics::v1::{metric::Data, Metric};
use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Template attribute: span offset from the earliest span in its trace
pub const START_OFFSET_ATTR: &str = "_template.start_offset_nanos";
/// Template attribute: span duration
pub const DURATION_ATTR: &str = "_template.duration_nanos";

/// Fallback duration for spans whose template carries none
const DEFAULT_SPAN_DURATION_NANOS: i64 = 10_000_000;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Stamps current wall-clock timestamps onto cloned payloads
#[derive(Debug, Clone, Copy)]
pub struct TimestampStamper {
    jitter_ms: u64,
    backdate_ms: u64,
}

impl TimestampStamper {
    pub fn new(jitter_ms: u64, backdate_ms: u64) -> Self {
        TimestampStamper {
            jitter_ms,
            backdate_ms,
        }
    }

    /// Current wall time in nanos, shifted back by the configured backdate
    fn reference_nanos(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64;
        now - self.backdate_ms as i64 * NANOS_PER_MILLI
    }

    /// One uniform draw in [0, jitter_ms) milliseconds, in nanos
    fn jitter_nanos(&self) -> i64 {
        if self.jitter_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..self.jitter_ms) as i64 * NANOS_PER_MILLI
    }

    /// Stamp every span of one trace payload and strip the template
    /// attributes. Relative span timings encoded by the generator are
    /// preserved; jitter is drawn independently per span.
    pub fn stamp_trace(&self, group: &mut ResourceSpans) {
        let max_duration = group
            .scope_spans
            .iter()
            .flat_map(|ss| ss.spans.iter())
            .map(|span| span_timing(&span.attributes).1)
            .max()
            .unwrap_or(0);

        let trace_start = self.reference_nanos() - max_duration;

        for scope in &mut group.scope_spans {
            for span in &mut scope.spans {
                let (offset, duration) = span_timing(&span.attributes);
                let start = trace_start + offset + self.jitter_nanos();
                span.start_time_unix_nano = start.max(0) as u64;
                span.end_time_unix_nano = (start + duration).max(0) as u64;
                strip_template_attributes(&mut span.attributes);
            }
        }
    }

    /// Stamp one metric: a single jittered "now" shared by all of its data
    /// points. Cumulative-capable types (sum, histogram) also get their
    /// start time set to the same value.
    pub fn stamp_metric(&self, metric: &mut Metric) {
        let now = (self.reference_nanos() + self.jitter_nanos()).max(0) as u64;

        match &mut metric.data {
            Some(Data::Gauge(gauge)) => {
                for point in &mut gauge.data_points {
                    point.time_unix_nano = now;
                }
            }
            Some(Data::Sum(sum)) => {
                for point in &mut sum.data_points {
                    point.time_unix_nano = now;
                    point.start_time_unix_nano = now;
                }
            }
            Some(Data::Histogram(histogram)) => {
                for point in &mut histogram.data_points {
                    point.time_unix_nano = now;
                    point.start_time_unix_nano = now;
                }
            }
            _ => {}
        }
    }

    /// Stamp a batch of log records from one base "now", each record with
    /// its own jitter, into both the time and observed-time fields.
    pub fn stamp_logs(&self, records: &mut [LogRecord]) {
        let base = self.reference_nanos();
        for record in records {
            let stamped = (base + self.jitter_nanos()).max(0) as u64;
            record.time_unix_nano = stamped;
            record.observed_time_unix_nano = stamped;
        }
    }
}

/// Extract (start offset, duration) from a span's template attributes.
/// A missing or zero duration falls back to a nominal 10ms.
fn span_timing(attributes: &[KeyValue]) -> (i64, i64) {
    let mut offset = 0;
    let mut duration = 0;
    for attr in attributes {
        let Some(value) = int_value(attr) else { continue };
        match attr.key.as_str() {
            START_OFFSET_ATTR => offset = value,
            DURATION_ATTR => duration = value,
            _ => {}
        }
    }
    if duration == 0 {
        duration = DEFAULT_SPAN_DURATION_NANOS;
    }
    (offset, duration)
}

fn int_value(attr: &KeyValue) -> Option<i64> {
    match attr.value.as_ref()?.value.as_ref()? {
        Value::IntValue(v) => Some(*v),
        _ => None,
    }
}

fn strip_template_attributes(attributes: &mut Vec<KeyValue>) {
    attributes.retain(|attr| attr.key != START_OFFSET_ATTR && attr.key != DURATION_ATTR);
}
