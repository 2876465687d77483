//! Shared test fixtures: an in-process OTLP collector and template builders.

#![allow(dead_code)]

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, KeyValue};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, Gauge, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics,
};
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
use otelblast_lib::sender::loader::Templates;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// Everything the mock collector observed
#[derive(Default)]
pub struct CollectorState {
    pub trace_requests: Mutex<Vec<ExportTraceServiceRequest>>,
    pub metric_requests: Mutex<Vec<ExportMetricsServiceRequest>>,
    pub log_requests: Mutex<Vec<ExportLogsServiceRequest>>,
    pub last_metadata: Mutex<HashMap<String, String>>,
    /// Fail this many export calls with UNAVAILABLE before accepting
    pub fail_remaining: AtomicUsize,
}

impl CollectorState {
    pub fn spans_received(&self) -> usize {
        self.trace_requests
            .lock()
            .iter()
            .flat_map(|r| &r.resource_spans)
            .flat_map(|rs| &rs.scope_spans)
            .map(|ss| ss.spans.len())
            .sum()
    }

    pub fn log_records_received(&self) -> usize {
        self.log_requests
            .lock()
            .iter()
            .flat_map(|r| &r.resource_logs)
            .flat_map(|rl| &rl.scope_logs)
            .map(|sl| sl.log_records.len())
            .sum()
    }

    pub fn data_points_received(&self) -> usize {
        self.metric_requests
            .lock()
            .iter()
            .flat_map(|r| &r.resource_metrics)
            .flat_map(|rm| &rm.scope_metrics)
            .flat_map(|sm| &sm.metrics)
            .map(otelblast_lib::sender::loader::metric_data_points)
            .sum()
    }

    fn record_metadata(&self, metadata: &tonic::metadata::MetadataMap) {
        let mut captured = self.last_metadata.lock();
        captured.clear();
        for entry in metadata.iter() {
            if let tonic::metadata::KeyAndValueRef::Ascii(key, value) = entry {
                if let Ok(value) = value.to_str() {
                    captured.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    fn maybe_fail(&self) -> Result<(), Status> {
        let mut remaining = self.fail_remaining.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.fail_remaining.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Err(Status::unavailable("collector overloaded")),
                Err(actual) => remaining = actual,
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MockCollector {
    state: Arc<CollectorState>,
}

#[tonic::async_trait]
impl TraceService for MockCollector {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        self.state.record_metadata(request.metadata());
        self.state.maybe_fail()?;
        self.state.trace_requests.lock().push(request.into_inner());
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for MockCollector {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        self.state.record_metadata(request.metadata());
        self.state.maybe_fail()?;
        self.state.metric_requests.lock().push(request.into_inner());
        Ok(Response::new(ExportMetricsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl LogsService for MockCollector {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        self.state.record_metadata(request.metadata());
        self.state.maybe_fail()?;
        self.state.log_requests.lock().push(request.into_inner());
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

/// Start an in-process collector on a random port; returns its
/// `host:port` endpoint and the shared observation state
pub async fn spawn_collector() -> (String, Arc<CollectorState>) {
    let state = Arc::new(CollectorState::default());
    let collector = MockCollector {
        state: Arc::clone(&state),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(
        Server::builder()
            .add_service(TraceServiceServer::new(collector.clone()))
            .add_service(MetricsServiceServer::new(collector.clone()))
            .add_service(LogsServiceServer::new(collector))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    (format!("127.0.0.1:{}", addr.port()), state)
}

pub fn int_attr(key: &str, value: i64) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::IntValue(value)),
        }),
    }
}

/// A linear-chain trace template: span i+1 is the child of span i, each
/// span 10ms long, offsets sequential, template timing attributes included
pub fn chain_trace_template(span_count: usize) -> ExportTraceServiceRequest {
    const SPAN_DURATION: i64 = 10_000_000;
    let spans = (0..span_count)
        .map(|i| Span {
            trace_id: vec![0xab; 16],
            span_id: id_bytes(i as u64 + 1, 8),
            parent_span_id: if i == 0 {
                vec![]
            } else {
                id_bytes(i as u64, 8)
            },
            name: format!("op-{}", i),
            attributes: vec![
                int_attr("_template.start_offset_nanos", i as i64 * SPAN_DURATION),
                int_attr("_template.duration_nanos", SPAN_DURATION),
            ],
            ..Default::default()
        })
        .collect();

    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            scope_spans: vec![ScopeSpans {
                spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

fn id_bytes(seed: u64, len: usize) -> Vec<u8> {
    (0..len).map(|i| (seed >> (8 * (i % 8))) as u8 ^ i as u8).collect()
}

/// A metric template with `groups` gauge metrics of `points` data points
/// each, in one resource group
pub fn gauge_metric_template(groups: usize, points: usize) -> ExportMetricsServiceRequest {
    let metrics = (0..groups)
        .map(|g| Metric {
            name: format!("test.metric.{}", g),
            data: Some(Data::Gauge(Gauge {
                data_points: (0..points).map(|_| NumberDataPoint::default()).collect(),
            })),
            ..Default::default()
        })
        .collect();

    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            scope_metrics: vec![ScopeMetrics {
                metrics,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// A log template with `count` records in one resource group
pub fn log_template(count: usize) -> ExportLogsServiceRequest {
    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            scope_logs: vec![ScopeLogs {
                log_records: (0..count)
                    .map(|_| LogRecord {
                        severity_text: "INFO".to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Templates value holding only a trace template
pub fn trace_templates(request: ExportTraceServiceRequest) -> Templates {
    Templates {
        traces: Some(request),
        metrics: None,
        logs: None,
    }
}
