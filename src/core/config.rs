//! Configuration for the generator and sender tools.
//!
//! Both tools are driven by YAML files with:
//! - Environment variable interpolation (`$VAR` / `${VAR}`)
//! - Validation with actionable error messages
//! - Sensible defaults for optional fields

use crate::core::{BlastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the sender tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SenderConfig {
    /// Template input files
    pub input: InputConfig,
    /// OTLP endpoint configuration
    pub otlp: OtlpConfig,
    /// Sending behavior
    pub sending: SendingConfig,
    /// Timestamp stamping behavior
    pub timestamps: TimestampsConfig,
}

/// Template input files; a missing entry means no workers for that signal
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InputConfig {
    /// Trace template file (raw OTLP export request protobuf)
    pub traces: Option<PathBuf>,
    /// Metric template file
    pub metrics: Option<PathBuf>,
    /// Log template file
    pub logs: Option<PathBuf>,
}

/// OTLP endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OtlpConfig {
    /// Target collector, host:port
    pub endpoint: String,
    /// Metadata headers attached verbatim to every export call
    pub headers: HashMap<String, String>,
    /// Use plaintext transport instead of TLS
    pub insecure: bool,
}

/// Sending behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendingConfig {
    /// Rate limiting over total events per second
    pub rate_limit: RateLimitConfig,
    /// Outbound batch sizing
    pub batch_size: BatchSizeConfig,
    /// Worker budget, split across active signals by template volume
    pub concurrency: usize,
    /// Stop after this long; absent means no deadline
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Iterations per worker; 0 means unbounded
    pub multiplier: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Total events per second across all workers; <= 0 disables admission
    pub events_per_second: i64,
}

/// Outbound batch sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSizeConfig {
    /// Maximum trace count (resource-span groups) per outbound request
    pub traces: usize,
}

/// Timestamp stamping behavior
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimestampsConfig {
    /// Uniform random offset in [0, jitter_ms) added to stamped timestamps
    pub jitter_ms: u64,
    /// Fixed shift of the stamping reference time into the past
    pub backdate_ms: u64,
}

impl Default for SendingConfig {
    fn default() -> Self {
        SendingConfig {
            rate_limit: RateLimitConfig::default(),
            batch_size: BatchSizeConfig::default(),
            concurrency: 1,
            duration: None,
            multiplier: 0,
        }
    }
}

impl Default for BatchSizeConfig {
    fn default() -> Self {
        BatchSizeConfig { traces: 100 }
    }
}

impl SenderConfig {
    /// Load a sender configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BlastError::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config: SenderConfig = serde_yaml::from_str(&content)
            .map_err(|e| BlastError::config(format!("failed to parse config file: {}", e)))?;
        config.expand_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Interpolate environment variables into string fields
    fn expand_env_vars(&mut self) {
        self.otlp.endpoint = expand_env(&self.otlp.endpoint);
        for value in self.otlp.headers.values_mut() {
            *value = expand_env(value);
        }
        for path in [
            &mut self.input.traces,
            &mut self.input.metrics,
            &mut self.input.logs,
        ]
        .into_iter()
        .flatten()
        {
            *path = PathBuf::from(expand_env(&path.to_string_lossy()));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.input.traces.is_none() && self.input.metrics.is_none() && self.input.logs.is_none()
        {
            return Err(BlastError::config(
                "at least one input file (traces, metrics, or logs) must be specified",
            ));
        }

        if self.otlp.endpoint.is_empty() {
            return Err(BlastError::config("otlp.endpoint is required"));
        }

        if self.sending.concurrency == 0 {
            return Err(BlastError::config("sending.concurrency must be at least 1"));
        }

        Ok(())
    }

    /// The configured deadline; `None` or zero means send indefinitely
    pub fn deadline(&self) -> Option<Duration> {
        self.sending.duration.filter(|d| !d.is_zero())
    }
}

/// Configuration for the generator tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Output location for template files
    pub output: OutputConfig,
    /// Trace template generation
    pub traces: TracesConfig,
    /// Metric template generation
    pub metrics: MetricsConfig,
    /// Log template generation
    pub logs: LogsConfig,
}

/// Output location for template files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory template files are written into
    pub directory: PathBuf,
    /// File name prefix, `<prefix>-traces.pb` etc.
    pub prefix: String,
}

/// Trace template generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracesConfig {
    /// Number of traces to generate; 0 skips the trace file
    pub count: usize,
    /// Span shaping within traces
    pub spans: SpansConfig,
    /// Service topology
    pub services: ServicesConfig,
    /// Custom attribute schemas sprinkled onto spans
    pub custom_attributes: CustomAttributesConfig,
}

/// Span shaping within traces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpansConfig {
    /// Mean span count per trace (normal distribution)
    pub avg_per_trace: usize,
    /// Standard deviation of the span count
    pub std_dev: usize,
    /// Extra traces with very high span counts
    pub high_span_traces: HighSpanTracesConfig,
}

/// Extra traces with very high span counts, for exercising batch splitting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HighSpanTracesConfig {
    pub enabled: bool,
    pub count: usize,
    pub span_count: usize,
}

/// Service topology configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Number of services in the topology
    pub count: usize,
    /// Explicit service names; generated as `service-N` when empty
    pub names: Vec<String>,
    /// Ingress selection
    pub ingress: IngressConfig,
}

/// Ingress service selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IngressConfig {
    /// Route every trace through a single ingress service
    pub single: bool,
    /// The ingress service name; defaults to the first service
    pub service: String,
}

/// Custom attribute schemas sprinkled onto spans
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CustomAttributesConfig {
    pub count: usize,
}

/// Metric template generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of metrics selected from the catalog; 0 skips the metric file
    pub metric_count: usize,
    /// Time series (dimension sets) per metric
    pub timeseries_per_metric: TimeSeriesConfig,
}

/// Time series per metric
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

/// Log template generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogsConfig {
    /// Number of log records to generate; 0 skips the log file
    pub count: usize,
    /// Log type mix; percentages must sum to 100
    pub types: LogTypesConfig,
}

/// Log type mix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogTypesConfig {
    pub http_access: LogShareConfig,
    pub application: ApplicationLogsConfig,
    pub system: LogShareConfig,
}

/// Percentage share of one log type
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogShareConfig {
    pub percentage: usize,
}

/// Application log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationLogsConfig {
    pub percentage: usize,
    /// Number of distinct service names to attribute application logs to
    pub services: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: PathBuf::from("./templates"),
            prefix: "telemetry".to_string(),
        }
    }
}

impl Default for TracesConfig {
    fn default() -> Self {
        TracesConfig {
            count: 0,
            spans: SpansConfig::default(),
            services: ServicesConfig::default(),
            custom_attributes: CustomAttributesConfig::default(),
        }
    }
}

impl Default for SpansConfig {
    fn default() -> Self {
        SpansConfig {
            avg_per_trace: 10,
            std_dev: 3,
            high_span_traces: HighSpanTracesConfig::default(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        ServicesConfig {
            count: 5,
            names: Vec::new(),
            ingress: IngressConfig::default(),
        }
    }
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        TimeSeriesConfig {
            min: 1,
            max: 1000,
            default: 300,
        }
    }
}

impl Default for LogTypesConfig {
    fn default() -> Self {
        LogTypesConfig {
            http_access: LogShareConfig { percentage: 40 },
            application: ApplicationLogsConfig::default(),
            system: LogShareConfig { percentage: 20 },
        }
    }
}

impl Default for ApplicationLogsConfig {
    fn default() -> Self {
        ApplicationLogsConfig {
            percentage: 40,
            services: 5,
        }
    }
}

// Approximate in-memory cost per decoded template object, used to warn
// before generating a dataset the sender cannot hold.
const BYTES_PER_SPAN: u64 = 2048;
const BYTES_PER_DATA_POINT: u64 = 400;
const BYTES_PER_LOG_RECORD: u64 = 800;
const MAX_TEMPLATE_MEMORY_BYTES: u64 = 10 * 1024 * 1024 * 1024;

impl GeneratorConfig {
    /// Load a generator configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BlastError::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config: GeneratorConfig = serde_yaml::from_str(&content)
            .map_err(|e| BlastError::config(format!("failed to parse config file: {}", e)))?;
        config.validate()?;
        config.apply_defaults();
        Ok(config)
    }

    /// Estimated sender-side memory for the generated templates, in bytes
    pub fn estimated_template_memory(&self) -> u64 {
        let mut spans = self.traces.count as u64 * self.traces.spans.avg_per_trace as u64;
        if self.traces.spans.high_span_traces.enabled {
            spans += self.traces.spans.high_span_traces.count as u64
                * self.traces.spans.high_span_traces.span_count as u64;
        }

        let ts = &self.metrics.timeseries_per_metric;
        let avg_series = if ts.default > 0 {
            ts.default
        } else {
            (ts.min + ts.max) / 2
        };
        let data_points = self.metrics.metric_count as u64 * avg_series as u64;

        spans * BYTES_PER_SPAN
            + data_points * BYTES_PER_DATA_POINT
            + self.logs.count as u64 * BYTES_PER_LOG_RECORD
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.traces.spans.avg_per_trace == 0 {
            return Err(BlastError::config("traces.spans.avg_per_trace must be at least 1"));
        }

        if self.traces.services.count == 0 {
            return Err(BlastError::config("traces.services.count must be at least 1"));
        }

        if !self.traces.services.names.is_empty()
            && self.traces.services.names.len() != self.traces.services.count
        {
            return Err(BlastError::config(
                "traces.services.names length must match traces.services.count",
            ));
        }

        if self.metrics.metric_count > 200 {
            return Err(BlastError::config(format!(
                "metrics.metric_count must not exceed 200 (requested: {})",
                self.metrics.metric_count
            )));
        }

        if self.metrics.timeseries_per_metric.min == 0 {
            return Err(BlastError::config("metrics.timeseries_per_metric.min must be at least 1"));
        }

        if self.metrics.timeseries_per_metric.max < self.metrics.timeseries_per_metric.min {
            return Err(BlastError::config("metrics.timeseries_per_metric.max must be >= min"));
        }

        if self.logs.count > 0 {
            let total = self.logs.types.http_access.percentage
                + self.logs.types.application.percentage
                + self.logs.types.system.percentage;
            if total != 100 {
                return Err(BlastError::config(format!(
                    "log type percentages must sum to 100, got {}",
                    total
                )));
            }
        }

        let estimated = self.estimated_template_memory();
        if estimated > MAX_TEMPLATE_MEMORY_BYTES {
            let gb = estimated as f64 / (1024.0 * 1024.0 * 1024.0);
            return Err(BlastError::config(format!(
                "estimated sender memory ({:.2} GB) exceeds the 10 GB ceiling; \
                 reduce trace count, spans per trace, metrics, or logs",
                gb
            )));
        }

        Ok(())
    }

    /// Fill in derived defaults after validation
    fn apply_defaults(&mut self) {
        if self.output.prefix.is_empty() {
            self.output.prefix = "telemetry".to_string();
        }

        if self.traces.services.names.is_empty() {
            self.traces.services.names = (1..=self.traces.services.count)
                .map(|i| format!("service-{}", i))
                .collect();
        }

        if self.traces.services.ingress.single && self.traces.services.ingress.service.is_empty() {
            self.traces.services.ingress.service = self.traces.services.names[0].clone();
        }
    }
}

/// Expand `$VAR` and `${VAR}` references against the process environment.
/// Unset variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let braced = matches!(chars.peek(), Some((_, '{')));
        if braced {
            chars.next();
        }

        let mut name = String::new();
        while let Some(&(_, nc)) = chars.peek() {
            let valid = if name.is_empty() {
                nc.is_ascii_alphabetic() || nc == '_'
            } else {
                nc.is_ascii_alphanumeric() || nc == '_'
            };
            if !valid {
                break;
            }
            name.push(nc);
            chars.next();
        }

        if braced {
            if matches!(chars.peek(), Some((_, '}'))) {
                chars.next();
            } else {
                // Unterminated ${: emit literally
                out.push('$');
                out.push('{');
                out.push_str(&name);
                continue;
            }
        }

        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&name).unwrap_or_default());
        }
    }

    out
}
