//! Log template synthesis.
//!
//! Three record families mixed by configured percentage: HTTP access lines,
//! application logs with a weighted severity distribution, and system
//! daemon noise. Records carry body, severity, and attributes but no
//! timestamps.

use crate::generator::common;
use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, InstrumentationScope};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs, SeverityNumber};
use rand::seq::SliceRandom;
use rand::Rng;

const SEVERITIES: &[(SeverityNumber, &str)] = &[
    (SeverityNumber::Debug, "DEBUG"),
    (SeverityNumber::Info, "INFO"),
    (SeverityNumber::Warn, "WARN"),
    (SeverityNumber::Error, "ERROR"),
];
const SEVERITY_WEIGHTS: &[u32] = &[20, 60, 15, 5];

const DEBUG_MESSAGES: &[&str] = &[
    "cache lookup key resolved",
    "entering request handler",
    "connection pool checkout took 2ms",
    "feature flag evaluated",
    "retry backoff computed",
];

const INFO_MESSAGES: &[&str] = &[
    "request completed successfully",
    "user session created",
    "payment authorized",
    "scheduled job finished",
    "configuration reloaded",
    "connection established",
];

const WARN_MESSAGES: &[&str] = &[
    "response time above threshold",
    "retrying failed request",
    "connection pool nearly exhausted",
    "deprecated API endpoint called",
    "cache miss rate elevated",
];

const ERROR_MESSAGES: &[&str] = &[
    "database connection refused",
    "request timed out after 30s",
    "failed to deserialize payload",
    "upstream service returned 503",
    "transaction rolled back",
];

const SYSTEM_MESSAGES: &[&str] = &[
    "systemd[1]: Started Daily apt upgrade and clean activities",
    "kernel: TCP: request_sock_TCP: Possible SYN flooding on port 8080",
    "sshd[4412]: Accepted publickey for deploy from 10.0.4.17",
    "cron[812]: (root) CMD (run-parts /etc/cron.hourly)",
    "kubelet: volume mount succeeded for pod",
    "containerd: cleaning up dead shim",
];

fn string_body(text: impl Into<String>) -> Option<AnyValue> {
    Some(AnyValue {
        value: Some(Value::StringValue(text.into())),
    })
}

/// An HTTP access log record; always INFO
pub fn http_access_log(rng: &mut impl Rng) -> LogRecord {
    let method = common::random_http_method(rng);
    let path = common::random_http_path(rng);
    let status = common::random_http_status(rng);
    let size = rng.gen_range(100..50_000);
    let duration_ms = rng.gen_range(1.0..500.0);

    LogRecord {
        severity_number: SeverityNumber::Info as i32,
        severity_text: "INFO".to_string(),
        body: string_body(format!(
            "{} {} {} {} {:.2}ms",
            method, path, status, size, duration_ms
        )),
        attributes: vec![
            common::string_attr("http.method", method),
            common::string_attr("http.target", path),
            common::int_attr("http.status_code", status),
            common::int_attr("http.response_content_length", size),
            common::double_attr("http.response_time_ms", duration_ms),
            common::string_attr("http.user_agent", "Mozilla/5.0 (compatible)"),
        ],
        ..Default::default()
    }
}

/// An application log record with a weighted random severity
pub fn application_log(service: &str, rng: &mut impl Rng) -> LogRecord {
    let index = *common::weighted_choice(rng, &[0usize, 1, 2, 3], SEVERITY_WEIGHTS);
    let (severity, severity_text) = SEVERITIES[index];

    let pool = match severity {
        SeverityNumber::Debug => DEBUG_MESSAGES,
        SeverityNumber::Warn => WARN_MESSAGES,
        SeverityNumber::Error => ERROR_MESSAGES,
        _ => INFO_MESSAGES,
    };
    let message = pool.choose(rng).copied().unwrap_or("event logged");

    let mut attributes = vec![common::string_attr("service.name", service)];
    match severity {
        SeverityNumber::Warn => {
            let kinds = ["DeprecationWarning", "PerformanceWarning", "ConfigurationWarning"];
            attributes.push(common::string_attr(
                "warning.type",
                *kinds.choose(rng).unwrap_or(&kinds[0]),
            ));
        }
        SeverityNumber::Error => {
            attributes.push(common::string_attr("error.kind", "internal"));
            attributes.push(common::bool_attr("error.retryable", rng.gen()));
        }
        _ => {}
    }

    LogRecord {
        severity_number: severity as i32,
        severity_text: severity_text.to_string(),
        body: string_body(message),
        attributes,
        ..Default::default()
    }
}

/// A system daemon log record
pub fn system_log(rng: &mut impl Rng) -> LogRecord {
    let message = SYSTEM_MESSAGES.choose(rng).copied().unwrap_or(SYSTEM_MESSAGES[0]);
    LogRecord {
        severity_number: SeverityNumber::Info as i32,
        severity_text: "INFO".to_string(),
        body: string_body(message),
        attributes: vec![common::string_attr("log.source", "system")],
        ..Default::default()
    }
}

/// Assemble records into a single-resource single-scope group
pub fn build_resource_logs(records: Vec<LogRecord>) -> ResourceLogs {
    ResourceLogs {
        resource: Some(opentelemetry_proto::tonic::resource::v1::Resource {
            attributes: vec![common::string_attr("service.name", "otelblast-generator")],
            ..Default::default()
        }),
        scope_logs: vec![ScopeLogs {
            scope: Some(InstrumentationScope {
                name: "otelblast-generator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            }),
            log_records: records,
            schema_url: String::new(),
        }],
        schema_url: String::new(),
    }
}
