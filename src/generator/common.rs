//! Shared synthesis helpers: random draws, OTLP attribute constructors,
//! and realistic infrastructure names.

use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, KeyValue};
use rand::seq::SliceRandom;
use rand::Rng;

pub fn string_attr(key: &str, value: impl Into<String>) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.into())),
        }),
    }
}

pub fn int_attr(key: &str, value: i64) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::IntValue(value)),
        }),
    }
}

pub fn double_attr(key: &str, value: f64) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::DoubleValue(value)),
        }),
    }
}

pub fn bool_attr(key: &str, value: bool) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::BoolValue(value)),
        }),
    }
}

/// A draw from a normal distribution, clamped to at least 1.
/// Box-Muller over two uniform draws; plenty for shaping span counts.
pub fn normal_usize(rng: &mut impl Rng, mean: usize, std_dev: usize) -> usize {
    if std_dev == 0 {
        return mean.max(1);
    }
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let gaussian = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    let value = mean as f64 + gaussian * std_dev as f64;
    value.max(1.0) as usize
}

/// Choose from `choices` with the matching integer weights
pub fn weighted_choice<'a, T>(rng: &mut impl Rng, choices: &'a [T], weights: &[u32]) -> &'a T {
    debug_assert_eq!(choices.len(), weights.len());
    let total: u32 = weights.iter().sum();
    let mut draw = rng.gen_range(0..total);
    for (choice, &weight) in choices.iter().zip(weights) {
        if draw < weight {
            return choice;
        }
        draw -= weight;
    }
    &choices[choices.len() - 1]
}

pub fn random_suffix(rng: &mut impl Rng, length: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];
const HTTP_METHOD_WEIGHTS: &[u32] = &[50, 20, 10, 5, 5, 5, 5];

const HTTP_PATHS: &[&str] = &[
    "/api/users",
    "/api/users/{id}",
    "/api/orders",
    "/api/orders/{id}",
    "/api/products",
    "/api/cart",
    "/api/checkout",
    "/api/search",
    "/api/auth/login",
    "/api/auth/refresh",
    "/healthz",
    "/metrics",
];

const HTTP_STATUSES: &[i64] = &[200, 201, 204, 301, 302, 400, 401, 403, 404, 500, 502, 503];
const HTTP_STATUS_WEIGHTS: &[u32] = &[55, 8, 5, 2, 2, 6, 4, 3, 8, 4, 2, 1];

pub fn random_http_method(rng: &mut impl Rng) -> &'static str {
    *weighted_choice(rng, HTTP_METHODS, HTTP_METHOD_WEIGHTS)
}

pub fn random_http_path(rng: &mut impl Rng) -> &'static str {
    HTTP_PATHS.choose(rng).copied().unwrap_or("/")
}

pub fn random_http_status(rng: &mut impl Rng) -> i64 {
    *weighted_choice(rng, HTTP_STATUSES, HTTP_STATUS_WEIGHTS)
}

const DB_SYSTEMS: &[&str] = &["postgresql", "mysql", "redis", "mongodb", "cassandra"];

pub fn random_db_system(rng: &mut impl Rng) -> &'static str {
    DB_SYSTEMS.choose(rng).copied().unwrap_or("postgresql")
}

pub fn random_db_statement(rng: &mut impl Rng, system: &str) -> String {
    let tables = ["users", "orders", "products", "sessions", "events"];
    let table = tables.choose(rng).copied().unwrap_or("users");
    match system {
        "redis" => format!("GET {}:{}", table, rng.gen_range(1..10_000)),
        "mongodb" => format!("db.{}.find()", table),
        _ => format!("SELECT * FROM {} WHERE id = ?", table),
    }
}

/// Schema for a custom span attribute with a synthesized value
#[derive(Debug, Clone, Copy)]
pub enum AttributeSchema {
    Text(usize),
    Integer(usize),
    Float(usize),
    Flag(usize),
}

impl AttributeSchema {
    /// Evenly distributed schemas `custom.attr.1..=count`
    pub fn generate(count: usize) -> Vec<AttributeSchema> {
        (1..=count)
            .map(|i| match i % 4 {
                0 => AttributeSchema::Flag(i),
                1 => AttributeSchema::Text(i),
                2 => AttributeSchema::Integer(i),
                _ => AttributeSchema::Float(i),
            })
            .collect()
    }

    pub fn materialize(&self, rng: &mut impl Rng) -> KeyValue {
        const TEXT_VALUES: &[&str] = &["low", "medium", "high", "critical", "alpha", "beta"];
        match self {
            AttributeSchema::Text(i) => string_attr(
                &format!("custom.attr.{}", i),
                *TEXT_VALUES.choose(rng).unwrap_or(&"low"),
            ),
            AttributeSchema::Integer(i) => {
                int_attr(&format!("custom.attr.{}", i), rng.gen_range(1..=1000))
            }
            AttributeSchema::Float(i) => {
                double_attr(&format!("custom.attr.{}", i), rng.gen_range(0.0..100.0))
            }
            AttributeSchema::Flag(i) => bool_attr(&format!("custom.attr.{}", i), rng.gen()),
        }
    }
}

const REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-2",
    "eu-west-1",
    "eu-central-1",
    "ap-southeast-2",
];

const NAMESPACES: &[&str] = &["default", "production", "staging", "monitoring", "ingress"];

const CONTAINERS: &[&str] = &["app", "sidecar", "init", "proxy", "metrics", "logs"];

/// Stateful factory for infrastructure names; counters keep generated names
/// distinct within one run
#[derive(Debug, Default)]
pub struct NameFactory {
    hosts: usize,
    nodes: usize,
    pods: usize,
    cluster: Option<String>,
}

impl NameFactory {
    pub fn new() -> Self {
        NameFactory::default()
    }

    pub fn cluster(&mut self, rng: &mut impl Rng) -> String {
        if self.cluster.is_none() {
            let envs = ["prod", "staging", "dev"];
            let env = envs.choose(rng).copied().unwrap_or("prod");
            self.cluster = Some(format!("{}-cluster-{}", env, random_suffix(rng, 4)));
        }
        self.cluster.clone().unwrap_or_default()
    }

    pub fn hostname(&mut self, rng: &mut impl Rng) -> String {
        self.hosts += 1;
        let prefixes = ["web", "api", "db", "cache", "worker", "app"];
        let prefix = prefixes.choose(rng).copied().unwrap_or("app");
        format!("{}-server-{:03}", prefix, self.hosts)
    }

    pub fn node(&mut self, rng: &mut impl Rng) -> String {
        self.nodes += 1;
        format!("{}-node-{:03}", self.cluster(rng), self.nodes)
    }

    pub fn pod(&mut self, rng: &mut impl Rng) -> String {
        self.pods += 1;
        format!("app-{}-{}", self.pods % 16, random_suffix(rng, 10))
    }

    pub fn namespace(&self, rng: &mut impl Rng) -> String {
        NAMESPACES.choose(rng).copied().unwrap_or("default").to_string()
    }

    pub fn container(&self, rng: &mut impl Rng) -> String {
        CONTAINERS.choose(rng).copied().unwrap_or("app").to_string()
    }

    pub fn region(&self, rng: &mut impl Rng) -> String {
        REGIONS.choose(rng).copied().unwrap_or("us-east-1").to_string()
    }

    pub fn availability_zone(&self, rng: &mut impl Rng) -> String {
        let zone = ["a", "b", "c"].choose(rng).copied().unwrap_or("a");
        format!("{}{}", self.region(rng), zone)
    }
}
