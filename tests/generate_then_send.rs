//! Generator output is valid sender input: generate templates to disk,
//! load them back, and replay them against the in-process collector.

mod common;

use common::spawn_collector;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use otelblast_lib::core::config::{GeneratorConfig, TimeSeriesConfig};
use otelblast_lib::generator;
use otelblast_lib::sender::batch::TraceBatcher;
use otelblast_lib::sender::export::{
    ExporterSettings, LogsExporter, MetricsExporter, TraceExporter,
};
use otelblast_lib::sender::loader::Templates;
use otelblast_lib::sender::ratelimit::RateGovernor;
use otelblast_lib::sender::stats::Reporter;
use otelblast_lib::sender::timestamps::TimestampStamper;
use otelblast_lib::sender::workers::WorkerPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn small_config(dir: &std::path::Path) -> GeneratorConfig {
    let mut config = GeneratorConfig::default();
    config.output.directory = dir.to_path_buf();
    config.output.prefix = "bench".to_string();

    config.traces.count = 20;
    config.traces.spans.avg_per_trace = 8;
    config.traces.spans.std_dev = 2;
    config.traces.services.count = 4;
    config.traces.services.names = (1..=4).map(|i| format!("service-{}", i)).collect();
    config.traces.custom_attributes.count = 4;

    config.metrics.metric_count = 5;
    config.metrics.timeseries_per_metric = TimeSeriesConfig {
        min: 10,
        max: 20,
        default: 15,
    };

    config.logs.count = 100;
    config
}

#[tokio::test]
async fn test_generate_load_replay_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    config.validate().unwrap();

    generator::run(&config, true).unwrap();

    // All artifacts on disk, including JSON twins and metadata
    for name in [
        "bench-traces.pb",
        "bench-traces.json",
        "bench-metrics.pb",
        "bench-metrics.json",
        "bench-logs.pb",
        "bench-logs.json",
        "bench-metadata.yaml",
    ] {
        assert!(dir.path().join(name).exists(), "missing {}", name);
    }

    let traces_path = dir.path().join("bench-traces.pb");
    let metrics_path = dir.path().join("bench-metrics.pb");
    let logs_path = dir.path().join("bench-logs.pb");
    let templates = Templates::load(
        Some(traces_path.as_path()),
        Some(metrics_path.as_path()),
        Some(logs_path.as_path()),
    )
    .unwrap();

    // One resource-span group per trace; every span timestamp-free with
    // template timing attributes
    let traces = templates.traces.as_ref().unwrap();
    assert_eq!(traces.resource_spans.len(), 20);
    for group in &traces.resource_spans {
        for span in group.scope_spans.iter().flat_map(|ss| &ss.spans) {
            assert_eq!(span.start_time_unix_nano, 0);
            assert_eq!(span.end_time_unix_nano, 0);
            assert!(span
                .attributes
                .iter()
                .any(|a| a.key == "_template.start_offset_nanos"));
            assert!(span
                .attributes
                .iter()
                .any(|a| a.key == "_template.duration_nanos"));
        }
    }

    let data_points = templates.data_point_count();
    assert!((50..=100).contains(&data_points), "data points {}", data_points);
    assert_eq!(templates.log_record_count(), 100);

    // Replay everything once against the in-process collector
    let (endpoint, state) = spawn_collector().await;
    let settings = ExporterSettings {
        endpoint,
        headers: Default::default(),
        insecure: true,
    };

    let span_count = templates.span_count();
    let templates = Arc::new(templates);
    let reporter = Arc::new(Reporter::new());
    let pool = Arc::new(WorkerPool::new(
        3,
        Arc::clone(&templates),
        Some(TraceExporter::new(&settings).unwrap()),
        Some(MetricsExporter::new(&settings).unwrap()),
        Some(LogsExporter::new(&settings).unwrap()),
        TimestampStamper::new(50, 0),
        Arc::new(RateGovernor::new(0)),
        Arc::clone(&reporter),
        TraceBatcher::new(100),
        1,
    ));

    pool.run(CancellationToken::new()).await.unwrap();

    let snapshot = reporter.snapshot();
    assert_eq!(snapshot.spans, span_count);
    assert_eq!(snapshot.data_points, data_points);
    assert_eq!(snapshot.log_records, 100);
    assert_eq!(snapshot.errors, 0);

    // On the wire: stamped timestamps, no template attributes, fresh ids
    let requests = state.trace_requests.lock();
    for span in requests
        .iter()
        .flat_map(|r| &r.resource_spans)
        .flat_map(|rs| &rs.scope_spans)
        .flat_map(|ss| &ss.spans)
    {
        assert!(span.start_time_unix_nano > 0);
        assert!(span.attributes.iter().all(|a| !a.key.starts_with("_template.")));
    }
}

#[tokio::test]
async fn test_metadata_summarizes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.metrics.metric_count = 0;
    config.logs.count = 0;

    generator::run(&config, false).unwrap();

    let metadata: serde_yaml::Value = serde_yaml::from_str(
        &std::fs::read_to_string(dir.path().join("bench-metadata.yaml")).unwrap(),
    )
    .unwrap();

    assert_eq!(
        metadata["configuration"]["traces"]["count"].as_u64(),
        Some(20)
    );
    assert_eq!(
        metadata["files"]["traces_pb"].as_str(),
        Some("bench-traces.pb")
    );
    assert!(metadata["files"].get("metrics_pb").is_none());
    // No JSON twins when not requested
    assert!(!dir.path().join("bench-traces.json").exists());
}

#[test]
fn test_generated_trace_ids_are_unique_across_traces() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.metrics.metric_count = 0;
    config.logs.count = 0;

    generator::run(&config, false).unwrap();

    let traces_path = dir.path().join("bench-traces.pb");
    let templates = Templates::load(Some(traces_path.as_path()), None, None).unwrap();
    let traces = templates.traces.unwrap();

    let mut ids = std::collections::HashSet::new();
    for group in &traces.resource_spans {
        let first = &group.scope_spans[0].spans[0].trace_id;
        // All spans in a group share the group's trace id
        for span in group.scope_spans.iter().flat_map(|ss| &ss.spans) {
            assert_eq!(&span.trace_id, first);
        }
        ids.insert(first.clone());
    }
    assert_eq!(ids.len(), traces.resource_spans.len());
}

#[test]
fn test_generated_offsets_are_sane() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.metrics.metric_count = 0;
    config.logs.count = 0;
    config.traces.spans.high_span_traces.enabled = true;
    config.traces.spans.high_span_traces.count = 1;
    config.traces.spans.high_span_traces.span_count = 500;

    generator::run(&config, false).unwrap();

    let traces_path = dir.path().join("bench-traces.pb");
    let templates = Templates::load(Some(traces_path.as_path()), None, None).unwrap();
    let traces = templates.traces.unwrap();
    assert_eq!(traces.resource_spans.len(), 21);

    for group in &traces.resource_spans {
        for span in group.scope_spans.iter().flat_map(|ss| &ss.spans) {
            let mut offset = None;
            let mut duration = None;
            for attr in &span.attributes {
                if let Some(Value::IntValue(v)) = attr.value.as_ref().and_then(|v| v.value.as_ref())
                {
                    match attr.key.as_str() {
                        "_template.start_offset_nanos" => offset = Some(*v),
                        "_template.duration_nanos" => duration = Some(*v),
                        _ => {}
                    }
                }
            }
            assert!(offset.unwrap() >= 0);
            assert!(duration.unwrap() > 0);
        }
    }
}
