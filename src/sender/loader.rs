//! Template loading.
//!
//! Templates are the raw marshalled form of the OTLP export-service request
//! for their signal, produced by the generator. They are decoded once at
//! startup and never mutated afterwards; every replay works on clones.

use crate::core::{BlastError, Result};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{metric::Data, Metric};
use prost::Message;
use std::path::Path;

/// Read-only holder of the decoded template request graphs
#[derive(Debug, Default)]
pub struct Templates {
    pub traces: Option<ExportTraceServiceRequest>,
    pub metrics: Option<ExportMetricsServiceRequest>,
    pub logs: Option<ExportLogsServiceRequest>,
}

impl Templates {
    /// Load all configured templates. A decode failure on any provided path
    /// is fatal.
    pub fn load(
        traces_path: Option<&Path>,
        metrics_path: Option<&Path>,
        logs_path: Option<&Path>,
    ) -> Result<Self> {
        let mut templates = Templates::default();

        if let Some(path) = traces_path {
            let request: ExportTraceServiceRequest = decode_template(path)?;
            tracing::info!(
                path = %path.display(),
                resource_spans = request.resource_spans.len(),
                spans = count_spans(&request),
                "loaded trace template"
            );
            templates.traces = Some(request);
        }

        if let Some(path) = metrics_path {
            let request: ExportMetricsServiceRequest = decode_template(path)?;
            tracing::info!(
                path = %path.display(),
                metrics = count_metrics(&request),
                data_points = count_data_points(&request),
                "loaded metric template"
            );
            templates.metrics = Some(request);
        }

        if let Some(path) = logs_path {
            let request: ExportLogsServiceRequest = decode_template(path)?;
            tracing::info!(
                path = %path.display(),
                log_records = count_log_records(&request),
                "loaded log template"
            );
            templates.logs = Some(request);
        }

        Ok(templates)
    }

    /// Total spans across the trace template
    pub fn span_count(&self) -> u64 {
        self.traces.as_ref().map_or(0, count_spans)
    }

    /// Total data points across the metric template
    pub fn data_point_count(&self) -> u64 {
        self.metrics.as_ref().map_or(0, count_data_points)
    }

    /// Total records across the log template
    pub fn log_record_count(&self) -> u64 {
        self.logs.as_ref().map_or(0, count_log_records)
    }
}

fn decode_template<T: Message + Default>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        BlastError::template(format!("failed to read {}: {}", path.display(), e))
    })?;
    T::decode(bytes.as_slice()).map_err(|e| {
        BlastError::template(format!("failed to decode {}: {}", path.display(), e))
    })
}

fn count_spans(request: &ExportTraceServiceRequest) -> u64 {
    request
        .resource_spans
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .map(|ss| ss.spans.len() as u64)
        .sum()
}

fn count_metrics(request: &ExportMetricsServiceRequest) -> u64 {
    request
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .map(|sm| sm.metrics.len() as u64)
        .sum()
}

fn count_data_points(request: &ExportMetricsServiceRequest) -> u64 {
    request
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .flat_map(|sm| &sm.metrics)
        .map(|m| metric_data_points(m) as u64)
        .sum()
}

fn count_log_records(request: &ExportLogsServiceRequest) -> u64 {
    request
        .resource_logs
        .iter()
        .flat_map(|rl| &rl.scope_logs)
        .map(|sl| sl.log_records.len() as u64)
        .sum()
}

/// Number of data points carried by one metric
pub fn metric_data_points(metric: &Metric) -> usize {
    match &metric.data {
        Some(Data::Gauge(gauge)) => gauge.data_points.len(),
        Some(Data::Sum(sum)) => sum.data_points.len(),
        Some(Data::Histogram(histogram)) => histogram.data_points.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
    use std::io::Write;

    fn request_with_spans(count: usize) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans: (0..count)
                        .map(|i| Span {
                            name: format!("span-{}", i),
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_load_roundtrip() {
        let request = request_with_spans(7);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&request.encode_to_vec()).unwrap();

        let templates = Templates::load(Some(file.path()), None, None).unwrap();
        assert_eq!(templates.span_count(), 7);
        assert_eq!(templates.data_point_count(), 0);
        assert_eq!(templates.log_record_count(), 0);
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let result = Templates::load(Some(Path::new("/nonexistent/traces.pb")), None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_garbage_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // A field header promising more bytes than the file holds
        file.write_all(&[0x0a, 0xff, 0xff, 0xff, 0x0f]).unwrap();
        let result = Templates::load(Some(file.path()), None, None);
        assert!(result.is_err());
    }
}
