//! Trace template synthesis.
//!
//! Traces are built as span trees over the service topology, then flattened
//! into one resource-span group per trace so a trace never straddles groups.
//! Templates carry no absolute timestamps; relative timing lives in the
//! `_template.start_offset_nanos` and `_template.duration_nanos` attributes
//! the sender consumes when stamping.

use crate::generator::common::{self, AttributeSchema};
use crate::generator::topology::{Operation, ServiceTopology};
use crate::sender::timestamps::{DURATION_ATTR, START_OFFSET_ATTR};
use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::span::SpanKind;
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span, Status};
use rand::seq::SliceRandom;
use rand::Rng;

const MAX_TREE_DEPTH: usize = 10;
const MAX_WIDE_TREE_DEPTH: usize = 20;

/// One span in a synthesized trace tree
#[derive(Debug)]
struct SpanNode {
    span_id: [u8; 8],
    parent_id: Option<[u8; 8]>,
    service: usize,
    operation: Operation,
    attributes: Vec<KeyValue>,
    duration: i64,
    start_offset: i64,
    children: Vec<SpanNode>,
}

/// A complete trace without timestamps
#[derive(Debug)]
pub struct TraceTemplate {
    trace_id: [u8; 16],
    root: SpanNode,
    pub span_count: usize,
}

/// Builds trace templates over a topology
pub struct TraceSynthesizer<'a> {
    topology: &'a ServiceTopology,
    custom_attrs: Vec<AttributeSchema>,
    avg_spans: usize,
    std_dev: usize,
}

impl<'a> TraceSynthesizer<'a> {
    pub fn new(
        topology: &'a ServiceTopology,
        custom_attr_count: usize,
        avg_spans: usize,
        std_dev: usize,
    ) -> Self {
        TraceSynthesizer {
            topology,
            custom_attrs: AttributeSchema::generate(custom_attr_count),
            avg_spans,
            std_dev,
        }
    }

    /// Generate one trace with a normally distributed span count
    pub fn generate_trace(&self, rng: &mut impl Rng) -> TraceTemplate {
        let span_count = common::normal_usize(rng, self.avg_spans, self.std_dev);
        self.generate_with_count(span_count, 1..=4, MAX_TREE_DEPTH, rng)
    }

    /// Generate a trace with an exact, very high span count; the tree is
    /// wider so deep templates do not degenerate into call chains
    pub fn generate_high_span_trace(
        &self,
        span_count: usize,
        rng: &mut impl Rng,
    ) -> TraceTemplate {
        self.generate_with_count(span_count.max(1), 5..=15, MAX_WIDE_TREE_DEPTH, rng)
    }

    fn generate_with_count(
        &self,
        span_count: usize,
        branching: std::ops::RangeInclusive<usize>,
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> TraceTemplate {
        let ingress = self.topology.random_ingress(rng);
        let mut root = self.make_span(ingress, None, true, rng);

        self.build_children(&mut root, span_count - 1, &branching, 1, max_depth, rng);

        assign_durations(&mut root, rng);
        assign_offsets(&mut root, 0);

        let mut trace_id = [0u8; 16];
        rng.fill_bytes(&mut trace_id);

        TraceTemplate {
            trace_id,
            span_count,
            root,
        }
    }

    /// Grow exactly `budget` descendants under `parent`
    fn build_children(
        &self,
        parent: &mut SpanNode,
        budget: usize,
        branching: &std::ops::RangeInclusive<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
    ) {
        let mut remaining = budget;
        while remaining > 0 {
            let service = self.child_service(parent.service, rng);
            let mut child = self.make_span(service, Some(parent.span_id), false, rng);
            remaining -= 1;

            // Hand a slice of the remaining budget to this subtree, keeping
            // enough back to honor the branching width at this level
            let width = (*branching.start()).max(1);
            let subtree = if depth >= max_depth || remaining == 0 {
                0
            } else {
                let share = remaining / width;
                rng.gen_range(0..=share.min(remaining))
            };
            if subtree > 0 {
                self.build_children(&mut child, subtree, branching, depth + 1, max_depth, rng);
                remaining -= subtree;
            }

            parent.children.push(child);

            let max_children = *branching.end();
            if parent.children.len() >= max_children && remaining > 0 && depth < max_depth {
                // This level is full; push the rest under the last child
                let last = parent
                    .children
                    .last_mut()
                    .expect("children just pushed above");
                self.build_children(last, remaining, branching, depth + 1, max_depth, rng);
                remaining = 0;
            }
        }
    }

    /// 70% of calls hop to a downstream service, the rest stay in-process
    fn child_service(&self, parent: usize, rng: &mut impl Rng) -> usize {
        let downstream = &self.topology.services[parent].downstream;
        if !downstream.is_empty() && rng.gen_range(0..100) < 70 {
            downstream.choose(rng).copied().unwrap_or(parent)
        } else {
            parent
        }
    }

    fn make_span(
        &self,
        service: usize,
        parent_id: Option<[u8; 8]>,
        is_root: bool,
        rng: &mut impl Rng,
    ) -> SpanNode {
        let node = &self.topology.services[service];
        let operation = node.random_operation(rng);
        let attributes = self.span_attributes(service, &operation, is_root, rng);

        let mut span_id = [0u8; 8];
        rng.fill_bytes(&mut span_id);

        SpanNode {
            span_id,
            parent_id,
            service,
            operation,
            attributes,
            duration: 0,
            start_offset: 0,
            children: Vec::new(),
        }
    }

    fn span_attributes(
        &self,
        service: usize,
        operation: &Operation,
        is_root: bool,
        rng: &mut impl Rng,
    ) -> Vec<KeyValue> {
        let mut attrs = vec![common::string_attr(
            "service.name",
            self.topology.services[service].name.clone(),
        )];

        match operation {
            Operation::Http { method, path } => {
                attrs.push(common::string_attr("http.method", method.clone()));
                attrs.push(common::string_attr("http.target", path.clone()));
                attrs.push(common::int_attr(
                    "http.status_code",
                    common::random_http_status(rng),
                ));
                if is_root {
                    attrs.push(common::string_attr("http.scheme", "https"));
                }
            }
            Operation::Db { system, statement } => {
                attrs.push(common::string_attr("db.system", system.clone()));
                attrs.push(common::string_attr("db.statement", statement.clone()));
            }
            Operation::Internal => {}
        }

        if !self.custom_attrs.is_empty() && rng.gen_range(0..100) < 30 {
            for _ in 0..rng.gen_range(1..=3usize.min(self.custom_attrs.len())) {
                if let Some(schema) = self.custom_attrs.choose(rng) {
                    attrs.push(schema.materialize(rng));
                }
            }
        }

        attrs
    }
}

/// Leaf durations are drawn directly; a parent lasts as long as its
/// children combined plus a little overhead
fn assign_durations(span: &mut SpanNode, rng: &mut impl Rng) -> i64 {
    if span.children.is_empty() {
        span.duration = rng.gen_range(1_000_000..=100_000_000);
        return span.duration;
    }

    let mut total = 0;
    for child in &mut span.children {
        total += assign_durations(child, rng);
    }
    span.duration = total + rng.gen_range(500_000..=5_000_000);
    span.duration
}

/// Children execute sequentially inside their parent
fn assign_offsets(span: &mut SpanNode, offset: i64) {
    span.start_offset = offset;
    let mut cursor = offset;
    for child in &mut span.children {
        assign_offsets(child, cursor);
        cursor += child.duration;
    }
}

impl TraceTemplate {
    /// Flatten into one resource-span group with a single scope, spans in
    /// depth-first order
    pub fn into_resource_spans(self) -> ResourceSpans {
        let mut spans = Vec::with_capacity(self.span_count);
        flatten(self.root, &self.trace_id, &mut spans);

        ResourceSpans {
            resource: Some(Resource {
                attributes: vec![
                    common::string_attr("telemetry.sdk.name", "otelblast"),
                    common::string_attr("telemetry.sdk.version", env!("CARGO_PKG_VERSION")),
                ],
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                scope: Some(InstrumentationScope {
                    name: "otelblast-generator".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    ..Default::default()
                }),
                spans,
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }
    }
}

fn flatten(node: SpanNode, trace_id: &[u8; 16], out: &mut Vec<Span>) {
    let is_root = node.parent_id.is_none();
    let kind = match node.operation {
        Operation::Http { .. } if is_root => SpanKind::Server,
        Operation::Http { .. } | Operation::Db { .. } => SpanKind::Client,
        Operation::Internal => SpanKind::Internal,
    };

    let mut attributes = node.attributes;
    attributes.push(common::int_attr(START_OFFSET_ATTR, node.start_offset));
    attributes.push(common::int_attr(DURATION_ATTR, node.duration));

    out.push(Span {
        trace_id: trace_id.to_vec(),
        span_id: node.span_id.to_vec(),
        parent_span_id: node.parent_id.map(|id| id.to_vec()).unwrap_or_default(),
        name: node.operation.span_name(),
        kind: kind as i32,
        start_time_unix_nano: 0,
        end_time_unix_nano: 0,
        attributes,
        status: Some(Status {
            code: StatusCode::Ok as i32,
            message: String::new(),
        }),
        ..Default::default()
    });

    for child in node.children {
        flatten(child, trace_id, out);
    }
}
