//! Service topology for trace synthesis.
//!
//! Services form a layered call graph: each service can call 1-3 services
//! later in the list, traces enter through one or two ingress services, and
//! every service owns a pool of HTTP, database, and internal operations.

use crate::generator::common;
use rand::seq::SliceRandom;
use rand::Rng;

/// An operation a service can perform, with its protocol-specific detail
#[derive(Debug, Clone)]
pub enum Operation {
    Http { method: String, path: String },
    Db { system: String, statement: String },
    Internal,
}

impl Operation {
    /// The span name this operation produces
    pub fn span_name(&self) -> String {
        match self {
            Operation::Http { method, path } => format!("{} {}", method, path),
            Operation::Db { .. } => "db.query".to_string(),
            Operation::Internal => "internal.process".to_string(),
        }
    }
}

/// A service in the topology; downstream edges are indices into the
/// topology's service list
#[derive(Debug)]
pub struct ServiceNode {
    pub name: String,
    pub is_ingress: bool,
    pub operations: Vec<Operation>,
    pub downstream: Vec<usize>,
}

impl ServiceNode {
    pub fn random_operation(&self, rng: &mut impl Rng) -> Operation {
        self.operations
            .choose(rng)
            .cloned()
            .unwrap_or(Operation::Internal)
    }
}

/// The overall service graph
#[derive(Debug)]
pub struct ServiceTopology {
    pub services: Vec<ServiceNode>,
    ingress: Vec<usize>,
}

impl ServiceTopology {
    /// Build a topology from service names. With `single_ingress`, only the
    /// named service accepts traffic; otherwise the first one or two
    /// services do.
    pub fn build(
        names: &[String],
        single_ingress: bool,
        ingress_service: &str,
        rng: &mut impl Rng,
    ) -> Self {
        let mut services: Vec<ServiceNode> = names
            .iter()
            .map(|name| ServiceNode {
                name: name.clone(),
                is_ingress: false,
                operations: generate_operations(rng),
                downstream: Vec::new(),
            })
            .collect();

        let ingress: Vec<usize> = if single_ingress {
            services
                .iter()
                .position(|s| s.name == ingress_service)
                .into_iter()
                .collect()
        } else {
            (0..services.len().min(2)).collect()
        };
        for &index in &ingress {
            services[index].is_ingress = true;
        }

        // Each service can call 1-3 services after it in the list
        let count = services.len();
        for (index, service) in services.iter_mut().enumerate() {
            if index + 1 >= count {
                continue;
            }
            let fanout = rng.gen_range(1..=3).min(count - index - 1);
            service.downstream = (index + 1..index + 1 + fanout).collect();
        }

        ServiceTopology { services, ingress }
    }

    /// A random ingress service; falls back to the first service when no
    /// ingress is configured
    pub fn random_ingress(&self, rng: &mut impl Rng) -> usize {
        self.ingress.choose(rng).copied().unwrap_or(0)
    }
}

fn generate_operations(rng: &mut impl Rng) -> Vec<Operation> {
    let mut operations = Vec::new();

    for _ in 0..rng.gen_range(2..=5) {
        operations.push(Operation::Http {
            method: common::random_http_method(rng).to_string(),
            path: common::random_http_path(rng).to_string(),
        });
    }

    if rng.gen() {
        let system = common::random_db_system(rng);
        for _ in 0..rng.gen_range(1..=3) {
            operations.push(Operation::Db {
                system: system.to_string(),
                statement: common::random_db_statement(rng, system),
            });
        }
    }

    for _ in 0..rng.gen_range(1..=2) {
        operations.push(Operation::Internal);
    }

    operations
}
