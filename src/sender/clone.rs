//! Per-iteration template cloning.
//!
//! Templates stay read-only for the process lifetime; every replay works on
//! a structurally independent copy whose id buffers, timestamps, and
//! attribute lists can be overwritten freely. The generated OTLP types are
//! owned values, so a clone here is a deep copy; the cost lever is cloning
//! only the groups (or the span sub-slice) selected for the outgoing batch,
//! never the whole template.

use crate::sender::batch::TraceBatch;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans};

/// Materialize one planned trace batch as an independent outbound request
pub fn clone_trace_batch(batch: &TraceBatch<'_>) -> ExportTraceServiceRequest {
    match batch {
        TraceBatch::Groups(groups) => ExportTraceServiceRequest {
            resource_spans: groups.iter().map(|g| (*g).clone()).collect(),
        },
        TraceBatch::Chunk {
            group,
            scope,
            spans,
            ..
        } => ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: group.resource.clone(),
                schema_url: group.schema_url.clone(),
                scope_spans: vec![ScopeSpans {
                    scope: scope.scope.clone(),
                    schema_url: scope.schema_url.clone(),
                    spans: spans.to_vec(),
                }],
            }],
        },
    }
}

/// Clone the metric template for one replay
pub fn clone_metrics_request(template: &ExportMetricsServiceRequest) -> ExportMetricsServiceRequest {
    template.clone()
}

/// Clone the log template for one replay
pub fn clone_logs_request(template: &ExportLogsServiceRequest) -> ExportLogsServiceRequest {
    template.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::batch::{TraceBatcher, MAX_SPANS_PER_BATCH};
    use opentelemetry_proto::tonic::trace::v1::Span;

    fn template_group(span_count: usize) -> ResourceSpans {
        ResourceSpans {
            scope_spans: vec![ScopeSpans {
                spans: (0..span_count)
                    .map(|i| Span {
                        trace_id: vec![1; 16],
                        span_id: vec![i as u8; 8],
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let groups = vec![template_group(3)];
        let batches = TraceBatcher::new(100).batches(&groups);
        let mut request = clone_trace_batch(&batches[0]);

        request.resource_spans[0].scope_spans[0].spans[0].trace_id = vec![9; 16];
        request.resource_spans[0].scope_spans[0].spans[0].start_time_unix_nano = 42;

        assert_eq!(groups[0].scope_spans[0].spans[0].trace_id, vec![1; 16]);
        assert_eq!(groups[0].scope_spans[0].spans[0].start_time_unix_nano, 0);
    }

    #[test]
    fn test_two_clones_do_not_share_buffers() {
        let groups = vec![template_group(2)];
        let batches = TraceBatcher::new(100).batches(&groups);
        let mut first = clone_trace_batch(&batches[0]);
        let second = clone_trace_batch(&batches[0]);

        first.resource_spans[0].scope_spans[0].spans[1].span_id = vec![0xff; 8];
        assert_eq!(second.resource_spans[0].scope_spans[0].spans[1].span_id, vec![1; 8]);
    }

    #[test]
    fn test_chunk_clone_carries_the_selected_slice() {
        let groups = vec![template_group(MAX_SPANS_PER_BATCH + 5)];
        let batches = TraceBatcher::new(100).batches(&groups);
        assert_eq!(batches.len(), 2);

        let tail = clone_trace_batch(&batches[1]);
        assert_eq!(tail.resource_spans.len(), 1);
        assert_eq!(tail.resource_spans[0].scope_spans.len(), 1);
        assert_eq!(tail.resource_spans[0].scope_spans[0].spans.len(), 5);
        assert_eq!(
            tail.resource_spans[0].scope_spans[0].spans[0].span_id,
            groups[0].scope_spans[0].spans[MAX_SPANS_PER_BATCH].span_id
        );
    }
}
