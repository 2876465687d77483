//! Trace and span id regeneration.
//!
//! Every replay of a template trace must look like a brand-new trace to the
//! receiver: a fresh 16-byte trace id and fresh 8-byte span ids, with the
//! parent-child links intact. The span tree is treated as a flat list with
//! id-keyed links, matching the wire model; a map from old span id to new
//! span id makes the rewrite a single pass.

use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, Span};
use rand::RngCore;
use rustc_hash::FxHashMap;

/// A freshly drawn identity for one template trace
pub struct TraceIdentity {
    trace_id: Vec<u8>,
    span_ids: FxHashMap<Vec<u8>, Vec<u8>>,
}

impl TraceIdentity {
    /// Draw a new trace id and one new span id per old span id. The RNG is
    /// cryptographically seeded, so replayed trace ids collide with the
    /// template's (or each other) only with negligible probability.
    pub fn generate<'a, I>(spans: I) -> Self
    where
        I: IntoIterator<Item = &'a Span>,
    {
        let mut rng = rand::thread_rng();
        let mut trace_id = vec![0u8; 16];
        rng.fill_bytes(&mut trace_id);

        let mut span_ids = FxHashMap::default();
        for span in spans {
            let mut new_id = vec![0u8; 8];
            rng.fill_bytes(&mut new_id);
            span_ids.insert(span.span_id.clone(), new_id);
        }

        TraceIdentity { trace_id, span_ids }
    }

    /// Draw an identity covering every span of one resource-span group
    pub fn generate_for(group: &ResourceSpans) -> Self {
        Self::generate(group.scope_spans.iter().flat_map(|ss| ss.spans.iter()))
    }

    /// Rewrite every span in place: new trace id, mapped span id, mapped
    /// parent span id. An empty parent stays empty (root spans); a parent id
    /// with no mapping is left untouched.
    pub fn apply(&self, group: &mut ResourceSpans) {
        for scope in &mut group.scope_spans {
            for span in &mut scope.spans {
                span.trace_id.clone_from(&self.trace_id);
                if !span.parent_span_id.is_empty() {
                    if let Some(new_parent) = self.span_ids.get(&span.parent_span_id) {
                        span.parent_span_id.clone_from(new_parent);
                    }
                }
                if let Some(new_id) = self.span_ids.get(&span.span_id) {
                    span.span_id.clone_from(new_id);
                }
            }
        }
    }

    /// The trace id every rewritten span will carry
    pub fn trace_id(&self) -> &[u8] {
        &self.trace_id
    }
}
