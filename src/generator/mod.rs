//! The template generator.
//!
//! Materializes timestamp-free OTLP payloads to disk for the sender to
//! replay: one protobuf file per signal (the raw marshalled export request,
//! no framing), an optional JSON twin for debugging, and a metadata summary.

pub mod common;
pub mod logs;
pub mod metrics;
pub mod spans;
pub mod topology;

use crate::core::{BlastError, GeneratorConfig, Result};
use crate::generator::spans::TraceSynthesizer;
use crate::generator::topology::ServiceTopology;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

/// Generate all configured templates
pub fn run(config: &GeneratorConfig, write_json: bool) -> Result<()> {
    std::fs::create_dir_all(&config.output.directory)?;

    let estimated_gb =
        config.estimated_template_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
    tracing::info!(
        directory = %config.output.directory.display(),
        prefix = %config.output.prefix,
        estimated_sender_memory_gb = format_args!("{:.2}", estimated_gb),
        "starting generation"
    );

    let started = Instant::now();
    let mut rng = rand::thread_rng();
    let mut files = BTreeMap::new();

    if config.traces.count > 0 {
        let name = generate_traces(config, write_json, &mut rng)?;
        files.insert("traces_pb".to_string(), name);
    }

    if config.metrics.metric_count > 0 {
        let name = generate_metrics(config, write_json, &mut rng)?;
        files.insert("metrics_pb".to_string(), name);
    }

    if config.logs.count > 0 {
        let name = generate_logs(config, write_json, &mut rng)?;
        files.insert("logs_pb".to_string(), name);
    }

    if files.is_empty() {
        return Err(BlastError::generator(
            "nothing to generate: all signal counts are zero",
        ));
    }

    write_metadata(config, files, started)?;
    tracing::info!(elapsed = ?started.elapsed(), "generation complete");
    Ok(())
}

fn generate_traces(
    config: &GeneratorConfig,
    write_json: bool,
    rng: &mut impl Rng,
) -> Result<String> {
    let traces_config = &config.traces;
    let topology = ServiceTopology::build(
        &traces_config.services.names,
        traces_config.services.ingress.single,
        &traces_config.services.ingress.service,
        rng,
    );
    let synthesizer = TraceSynthesizer::new(
        &topology,
        traces_config.custom_attributes.count,
        traces_config.spans.avg_per_trace,
        traces_config.spans.std_dev,
    );

    let high = &traces_config.spans.high_span_traces;
    let mut resource_spans = Vec::with_capacity(
        traces_config.count + if high.enabled { high.count } else { 0 },
    );
    let mut total_spans = 0usize;
    let mut min_spans = usize::MAX;
    let mut max_spans = 0usize;

    for _ in 0..traces_config.count {
        let trace = synthesizer.generate_trace(rng);
        total_spans += trace.span_count;
        min_spans = min_spans.min(trace.span_count);
        max_spans = max_spans.max(trace.span_count);
        resource_spans.push(trace.into_resource_spans());
    }

    if high.enabled {
        for _ in 0..high.count {
            let trace = synthesizer.generate_high_span_trace(high.span_count, rng);
            total_spans += trace.span_count;
            max_spans = max_spans.max(trace.span_count);
            resource_spans.push(trace.into_resource_spans());
        }
    }

    tracing::info!(
        traces = resource_spans.len(),
        total_spans,
        min_spans,
        max_spans,
        avg_spans = format_args!("{:.1}", total_spans as f64 / resource_spans.len() as f64),
        "generated traces"
    );

    let request = ExportTraceServiceRequest { resource_spans };
    write_request(&request, config, "traces", write_json)
}

fn generate_metrics(
    config: &GeneratorConfig,
    write_json: bool,
    rng: &mut impl Rng,
) -> Result<String> {
    let metrics_config = &config.metrics;
    let selected = metrics::select_metrics(metrics_config.metric_count, rng);
    let mut synthesizer = metrics::MetricSynthesizer::new();

    let mut total_series = 0usize;
    let built: Vec<_> = selected
        .iter()
        .map(|def| {
            let series = series_count(metrics_config, rng);
            total_series += series;
            synthesizer.build_metric(def, series, rng)
        })
        .collect();

    tracing::info!(
        metrics = built.len(),
        time_series = total_series,
        "generated metrics"
    );

    let request = ExportMetricsServiceRequest {
        resource_metrics: vec![metrics::build_resource_metrics(built)],
    };
    write_request(&request, config, "metrics", write_json)
}

/// Time series per metric: the configured default with some variance,
/// clamped to [min, max]; a random draw in the range otherwise
fn series_count(config: &crate::core::config::MetricsConfig, rng: &mut impl Rng) -> usize {
    let ts = &config.timeseries_per_metric;
    if ts.default >= ts.min && ts.default <= ts.max {
        let variance = rng.gen_range(-50i64..=50);
        (ts.default as i64 + variance).clamp(ts.min as i64, ts.max as i64) as usize
    } else {
        rng.gen_range(ts.min..=ts.max)
    }
}

fn generate_logs(
    config: &GeneratorConfig,
    write_json: bool,
    rng: &mut impl Rng,
) -> Result<String> {
    let logs_config = &config.logs;
    let http_count = logs_config.count * logs_config.types.http_access.percentage / 100;
    let app_count = logs_config.count * logs_config.types.application.percentage / 100;
    let sys_count = logs_config.count - http_count - app_count;

    let service_names: Vec<String> = (1..=logs_config.types.application.services.max(1))
        .map(|i| format!("app-service-{}", i))
        .collect();

    let mut records = Vec::with_capacity(logs_config.count);
    for _ in 0..http_count {
        records.push(logs::http_access_log(rng));
    }
    for _ in 0..app_count {
        let service = &service_names[rng.gen_range(0..service_names.len())];
        records.push(logs::application_log(service, rng));
    }
    for _ in 0..sys_count {
        records.push(logs::system_log(rng));
    }

    tracing::info!(
        log_records = records.len(),
        http_access = http_count,
        application = app_count,
        system = sys_count,
        "generated logs"
    );

    let request = ExportLogsServiceRequest {
        resource_logs: vec![logs::build_resource_logs(records)],
    };
    write_request(&request, config, "logs", write_json)
}

/// Write the protobuf file (and its JSON twin when requested), returning
/// the protobuf file name
fn write_request<T: Message + Serialize>(
    request: &T,
    config: &GeneratorConfig,
    signal: &str,
    write_json: bool,
) -> Result<String> {
    let file_name = format!("{}-{}.pb", config.output.prefix, signal);
    let path = config.output.directory.join(&file_name);
    std::fs::write(&path, request.encode_to_vec())?;
    tracing::info!(path = %path.display(), "wrote template");

    if write_json {
        let json_path = path.with_extension("json");
        std::fs::write(&json_path, serde_json::to_vec_pretty(request)?)?;
        tracing::info!(path = %json_path.display(), "wrote debug JSON");
    }

    Ok(file_name)
}

#[derive(Serialize)]
struct Metadata {
    generated_at: String,
    duration: String,
    configuration: MetadataConfiguration,
    files: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct MetadataConfiguration {
    traces: BTreeMap<String, usize>,
    metrics: BTreeMap<String, usize>,
    logs: BTreeMap<String, usize>,
}

fn write_metadata(
    config: &GeneratorConfig,
    files: BTreeMap<String, String>,
    started: Instant,
) -> Result<()> {
    let metadata = Metadata {
        generated_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
        duration: format!("{:?}", started.elapsed()),
        configuration: MetadataConfiguration {
            traces: BTreeMap::from([
                ("count".to_string(), config.traces.count),
                ("avg_spans".to_string(), config.traces.spans.avg_per_trace),
                ("services".to_string(), config.traces.services.count),
            ]),
            metrics: BTreeMap::from([
                ("count".to_string(), config.metrics.metric_count),
                ("timeseries_min".to_string(), config.metrics.timeseries_per_metric.min),
                ("timeseries_max".to_string(), config.metrics.timeseries_per_metric.max),
            ]),
            logs: BTreeMap::from([("count".to_string(), config.logs.count)]),
        },
        files,
    };

    let path = metadata_path(&config.output.directory, &config.output.prefix);
    let yaml = serde_yaml::to_string(&metadata)
        .map_err(|e| BlastError::generator(format!("failed to serialize metadata: {}", e)))?;
    std::fs::write(&path, yaml)?;
    tracing::info!(path = %path.display(), "wrote metadata");
    Ok(())
}

fn metadata_path(directory: &Path, prefix: &str) -> PathBuf {
    directory.join(format!("{}-metadata.yaml", prefix))
}
