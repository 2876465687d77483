//! Metric template synthesis.
//!
//! Metrics come from a fixed catalog of host, Kubernetes, and application
//! definitions. Each selected metric gets a configurable number of time
//! series, one data point per unique dimension set, with values shaped to
//! the metric's unit. Timestamps stay zero in the template.

use crate::generator::common::{self, NameFactory};
use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::metrics::v1::number_data_point;
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, AggregationTemporality, Gauge, Histogram, HistogramDataPoint, Metric,
    NumberDataPoint, Sum,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// The shape of a catalog metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Sum,
    Histogram,
}

/// One catalog entry
#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub kind: MetricKind,
    pub dimensions: &'static [&'static str],
}

/// The metric catalog: host system, Kubernetes, and application metrics
pub fn catalog() -> &'static [MetricDef] {
    use MetricKind::*;
    &[
        MetricDef { name: "system.cpu.utilization", description: "CPU utilization percentage", unit: "%", kind: Gauge, dimensions: &["host.name", "os.type", "cpu"] },
        MetricDef { name: "system.cpu.time", description: "CPU time in seconds", unit: "s", kind: Sum, dimensions: &["host.name", "os.type", "cpu", "state"] },
        MetricDef { name: "system.memory.usage", description: "Memory usage in bytes", unit: "By", kind: Gauge, dimensions: &["host.name", "os.type", "state"] },
        MetricDef { name: "system.memory.utilization", description: "Memory utilization percentage", unit: "%", kind: Gauge, dimensions: &["host.name", "os.type"] },
        MetricDef { name: "system.disk.io", description: "Disk I/O bytes", unit: "By", kind: Sum, dimensions: &["host.name", "device", "direction"] },
        MetricDef { name: "system.disk.operations", description: "Disk operations", unit: "{operations}", kind: Sum, dimensions: &["host.name", "device", "direction"] },
        MetricDef { name: "system.disk.utilization", description: "Disk utilization percentage", unit: "%", kind: Gauge, dimensions: &["host.name", "device"] },
        MetricDef { name: "system.network.io", description: "Network I/O bytes", unit: "By", kind: Sum, dimensions: &["host.name", "device", "direction"] },
        MetricDef { name: "system.network.packets", description: "Network packets", unit: "{packets}", kind: Sum, dimensions: &["host.name", "device", "direction"] },
        MetricDef { name: "system.network.errors", description: "Network errors", unit: "{errors}", kind: Sum, dimensions: &["host.name", "device", "direction"] },
        MetricDef { name: "system.filesystem.usage", description: "Filesystem usage in bytes", unit: "By", kind: Gauge, dimensions: &["host.name", "device", "state"] },
        MetricDef { name: "system.load.average.1m", description: "1-minute load average", unit: "1", kind: Gauge, dimensions: &["host.name"] },
        MetricDef { name: "k8s.cluster.node.count", description: "Nodes in the cluster", unit: "{nodes}", kind: Gauge, dimensions: &["k8s.cluster.name"] },
        MetricDef { name: "k8s.cluster.pod.count", description: "Pods in the cluster", unit: "{pods}", kind: Gauge, dimensions: &["k8s.cluster.name", "k8s.namespace.name"] },
        MetricDef { name: "k8s.node.cpu.utilization", description: "Node CPU utilization", unit: "%", kind: Gauge, dimensions: &["k8s.cluster.name", "k8s.node.name"] },
        MetricDef { name: "k8s.node.memory.usage", description: "Node memory usage", unit: "By", kind: Gauge, dimensions: &["k8s.cluster.name", "k8s.node.name"] },
        MetricDef { name: "k8s.node.network.io", description: "Node network I/O", unit: "By", kind: Sum, dimensions: &["k8s.cluster.name", "k8s.node.name", "direction"] },
        MetricDef { name: "k8s.pod.cpu.utilization", description: "Pod CPU utilization", unit: "%", kind: Gauge, dimensions: &["k8s.namespace.name", "k8s.pod.name"] },
        MetricDef { name: "k8s.pod.memory.usage", description: "Pod memory usage", unit: "By", kind: Gauge, dimensions: &["k8s.namespace.name", "k8s.pod.name"] },
        MetricDef { name: "k8s.pod.network.io", description: "Pod network I/O", unit: "By", kind: Sum, dimensions: &["k8s.namespace.name", "k8s.pod.name", "direction"] },
        MetricDef { name: "container.cpu.time", description: "Container CPU time", unit: "s", kind: Sum, dimensions: &["container.name", "k8s.pod.name"] },
        MetricDef { name: "container.memory.usage", description: "Container memory usage", unit: "By", kind: Gauge, dimensions: &["container.name", "k8s.pod.name"] },
        MetricDef { name: "container.restarts", description: "Container restart count", unit: "{restarts}", kind: Sum, dimensions: &["container.name", "k8s.pod.name"] },
        MetricDef { name: "http.server.request.duration", description: "HTTP server request duration", unit: "ms", kind: Histogram, dimensions: &["host.name", "http.route"] },
        MetricDef { name: "http.server.active_requests", description: "In-flight HTTP requests", unit: "{requests}", kind: Gauge, dimensions: &["host.name"] },
        MetricDef { name: "http.client.request.duration", description: "HTTP client request duration", unit: "ms", kind: Histogram, dimensions: &["host.name", "cloud.region"] },
        MetricDef { name: "db.client.connections.usage", description: "Open database connections", unit: "{connections}", kind: Gauge, dimensions: &["host.name", "state"] },
        MetricDef { name: "db.client.operation.duration", description: "Database operation duration", unit: "ms", kind: Histogram, dimensions: &["host.name", "cloud.region"] },
        MetricDef { name: "process.runtime.heap.usage", description: "Runtime heap usage", unit: "By", kind: Gauge, dimensions: &["host.name", "cloud.provider"] },
        MetricDef { name: "messaging.queue.depth", description: "Messages waiting in queue", unit: "{messages}", kind: Gauge, dimensions: &["host.name", "cloud.availability_zone"] },
    ]
}

/// Pick `count` distinct metrics from the catalog
pub fn select_metrics(count: usize, rng: &mut impl Rng) -> Vec<MetricDef> {
    let mut all: Vec<MetricDef> = catalog().to_vec();
    if count < all.len() {
        all.shuffle(rng);
        all.truncate(count);
    } else if count > all.len() {
        tracing::warn!(
            requested = count,
            available = all.len(),
            "metric catalog smaller than requested count"
        );
    }
    all
}

/// Builds metrics with synthesized dimension sets
#[derive(Default)]
pub struct MetricSynthesizer {
    names: NameFactory,
}

impl MetricSynthesizer {
    pub fn new() -> Self {
        MetricSynthesizer::default()
    }

    /// Build one metric with `series` data points, one per dimension set
    pub fn build_metric(&mut self, def: &MetricDef, series: usize, rng: &mut impl Rng) -> Metric {
        let dimension_sets: Vec<Vec<KeyValue>> = (0..series)
            .map(|_| self.dimension_set(def, rng))
            .collect();

        let data = match def.kind {
            MetricKind::Gauge => Data::Gauge(Gauge {
                data_points: dimension_sets
                    .into_iter()
                    .map(|attributes| NumberDataPoint {
                        attributes,
                        value: Some(number_data_point::Value::AsDouble(
                            gauge_value(def.unit, rng),
                        )),
                        ..Default::default()
                    })
                    .collect(),
            }),
            MetricKind::Sum => Data::Sum(Sum {
                data_points: dimension_sets
                    .into_iter()
                    .map(|attributes| NumberDataPoint {
                        attributes,
                        value: Some(number_data_point::Value::AsInt(
                            rng.gen_range(0..10_000_000),
                        )),
                        ..Default::default()
                    })
                    .collect(),
                aggregation_temporality: AggregationTemporality::Cumulative as i32,
                is_monotonic: true,
            }),
            MetricKind::Histogram => Data::Histogram(Histogram {
                data_points: dimension_sets
                    .into_iter()
                    .map(|attributes| histogram_point(attributes, rng))
                    .collect(),
                aggregation_temporality: AggregationTemporality::Cumulative as i32,
            }),
        };

        Metric {
            name: def.name.to_string(),
            description: def.description.to_string(),
            unit: def.unit.to_string(),
            data: Some(data),
            ..Default::default()
        }
    }

    fn dimension_set(&mut self, def: &MetricDef, rng: &mut impl Rng) -> Vec<KeyValue> {
        def.dimensions
            .iter()
            .map(|key| common::string_attr(key, self.dimension_value(key, rng)))
            .collect()
    }

    fn dimension_value(&mut self, key: &str, rng: &mut impl Rng) -> String {
        match key {
            "host.name" => self.names.hostname(rng),
            "os.type" => ["linux", "windows", "darwin"]
                .choose(rng)
                .unwrap_or(&"linux")
                .to_string(),
            "cpu" => format!("cpu{}", rng.gen_range(0..8)),
            "state" => ["used", "free", "cached", "idle", "system", "user", "iowait"]
                .choose(rng)
                .unwrap_or(&"used")
                .to_string(),
            "device" => ["sda", "sda1", "nvme0n1", "eth0", "eth1", "lo"]
                .choose(rng)
                .unwrap_or(&"sda")
                .to_string(),
            "direction" => ["read", "write", "transmit", "receive"]
                .choose(rng)
                .unwrap_or(&"read")
                .to_string(),
            "k8s.cluster.name" => self.names.cluster(rng),
            "k8s.namespace.name" => self.names.namespace(rng),
            "k8s.pod.name" => self.names.pod(rng),
            "k8s.node.name" => self.names.node(rng),
            "container.name" => self.names.container(rng),
            "cloud.provider" => ["aws", "gcp", "azure"]
                .choose(rng)
                .unwrap_or(&"aws")
                .to_string(),
            "cloud.region" => self.names.region(rng),
            "cloud.availability_zone" => self.names.availability_zone(rng),
            "http.route" => common::random_http_path(rng).to_string(),
            _ => format!("value-{}", rng.gen_range(1..=100)),
        }
    }
}

fn gauge_value(unit: &str, rng: &mut impl Rng) -> f64 {
    match unit {
        "%" => rng.gen_range(0.0..100.0),
        "By" => rng.gen_range(1_000_000.0..8_000_000_000.0),
        _ => rng.gen_range(0.0..1_000.0),
    }
}

fn histogram_point(attributes: Vec<KeyValue>, rng: &mut impl Rng) -> HistogramDataPoint {
    const BOUNDS: [f64; 9] = [1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0];
    let bucket_counts: Vec<u64> = (0..BOUNDS.len() + 1)
        .map(|_| rng.gen_range(0..1_000))
        .collect();
    let count: u64 = bucket_counts.iter().sum();
    // A plausible sum: most observations land mid-distribution
    let sum = count as f64 * rng.gen_range(5.0..50.0);

    HistogramDataPoint {
        attributes,
        count,
        sum: Some(sum),
        bucket_counts,
        explicit_bounds: BOUNDS.to_vec(),
        ..Default::default()
    }
}

/// Assemble selected metrics into a single-resource single-scope request
pub fn build_resource_metrics(
    metrics: Vec<Metric>,
) -> opentelemetry_proto::tonic::metrics::v1::ResourceMetrics {
    opentelemetry_proto::tonic::metrics::v1::ResourceMetrics {
        resource: Some(opentelemetry_proto::tonic::resource::v1::Resource {
            attributes: vec![common::string_attr("service.name", "otelblast-generator")],
            ..Default::default()
        }),
        scope_metrics: vec![opentelemetry_proto::tonic::metrics::v1::ScopeMetrics {
            scope: Some(InstrumentationScope {
                name: "otelblast-generator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            }),
            metrics,
            schema_url: String::new(),
        }],
        schema_url: String::new(),
    }
}
