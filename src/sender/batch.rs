//! Trace batching.
//!
//! Outbound trace requests honor two ceilings: a configured trace count per
//! batch and a hard span count per request that keeps marshalled payloads
//! safely under typical gRPC message limits. A single trace whose span count
//! exceeds the hard ceiling is split into contiguous chunks that all carry
//! the same trace id after rewriting, so the receiver can reassemble it.
//!
//! Batching only applies to traces; metric and log templates are shaped into
//! a single resource group by the generator and go out in one request.

use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

/// Hard span ceiling per outbound request
pub const MAX_SPANS_PER_BATCH: usize = 10_000;

/// One planned outbound trace request, borrowing from the template
#[derive(Debug)]
pub enum TraceBatch<'a> {
    /// Whole resource-span groups that fit together under both ceilings
    Groups(Vec<&'a ResourceSpans>),
    /// A contiguous run of one oversized group's spans, emitted as a
    /// standalone single-resource single-scope request
    Chunk {
        /// Index of the source group in the template, used to share one
        /// rewritten identity across all chunks of the same trace
        group_index: usize,
        group: &'a ResourceSpans,
        scope: &'a ScopeSpans,
        spans: &'a [Span],
    },
}

impl TraceBatch<'_> {
    /// Total spans this batch will carry
    pub fn span_count(&self) -> usize {
        match self {
            TraceBatch::Groups(groups) => groups.iter().map(|g| group_span_count(g)).sum(),
            TraceBatch::Chunk { spans, .. } => spans.len(),
        }
    }
}

/// Total spans across all scopes of one resource-span group
pub fn group_span_count(group: &ResourceSpans) -> usize {
    group.scope_spans.iter().map(|ss| ss.spans.len()).sum()
}

/// Plans outbound batches over a trace template
#[derive(Debug, Clone, Copy)]
pub struct TraceBatcher {
    max_traces: usize,
}

impl TraceBatcher {
    pub fn new(max_traces: usize) -> Self {
        TraceBatcher { max_traces }
    }

    /// Stream the template's resource-span groups into batch plans.
    /// The template is only read; clones happen per emitted batch.
    pub fn batches<'a>(&self, groups: &'a [ResourceSpans]) -> Vec<TraceBatch<'a>> {
        let mut batches = Vec::new();
        let mut current: Vec<&'a ResourceSpans> = Vec::new();
        let mut current_spans = 0usize;

        for (group_index, group) in groups.iter().enumerate() {
            let group_spans = group_span_count(group);

            if group_spans <= MAX_SPANS_PER_BATCH {
                let exceeds_spans = current_spans + group_spans > MAX_SPANS_PER_BATCH;
                let exceeds_traces = current.len() >= self.max_traces;
                if !current.is_empty() && (exceeds_spans || exceeds_traces) {
                    batches.push(TraceBatch::Groups(std::mem::take(&mut current)));
                    current_spans = 0;
                }
                current.push(group);
                current_spans += group_spans;
                continue;
            }

            // Oversized trace: flush, then chunk each scope's span vector
            if !current.is_empty() {
                batches.push(TraceBatch::Groups(std::mem::take(&mut current)));
                current_spans = 0;
            }
            for scope in &group.scope_spans {
                for spans in scope.spans.chunks(MAX_SPANS_PER_BATCH) {
                    batches.push(TraceBatch::Chunk {
                        group_index,
                        group,
                        scope,
                        spans,
                    });
                }
            }
        }

        if !current.is_empty() {
            batches.push(TraceBatch::Groups(current));
        }

        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with_spans(count: usize) -> ResourceSpans {
        ResourceSpans {
            scope_spans: vec![ScopeSpans {
                spans: (0..count).map(|_| Span::default()).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn total_spans(batches: &[TraceBatch<'_>]) -> usize {
        batches.iter().map(TraceBatch::span_count).sum()
    }

    #[test]
    fn test_exact_ceiling_is_one_batch() {
        let groups = vec![group_with_spans(MAX_SPANS_PER_BATCH)];
        let batches = TraceBatcher::new(100).batches(&groups);
        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], TraceBatch::Groups(_)));
        assert_eq!(batches[0].span_count(), MAX_SPANS_PER_BATCH);
    }

    #[test]
    fn test_one_over_ceiling_splits() {
        let groups = vec![group_with_spans(MAX_SPANS_PER_BATCH + 1)];
        let batches = TraceBatcher::new(100).batches(&groups);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].span_count(), MAX_SPANS_PER_BATCH);
        assert_eq!(batches[1].span_count(), 1);
        for batch in &batches {
            match batch {
                TraceBatch::Chunk { group_index, .. } => assert_eq!(*group_index, 0),
                TraceBatch::Groups(_) => panic!("expected chunk batches"),
            }
        }
    }

    #[test]
    fn test_trace_count_ceiling() {
        let groups: Vec<_> = (0..7).map(|_| group_with_spans(3)).collect();
        let batches = TraceBatcher::new(2).batches(&groups);
        assert_eq!(batches.len(), 4);
        assert_eq!(total_spans(&batches), 21);
    }

    #[test]
    fn test_span_ceiling_flushes_buffer() {
        let groups = vec![
            group_with_spans(6_000),
            group_with_spans(6_000),
            group_with_spans(1_000),
        ];
        let batches = TraceBatcher::new(100).batches(&groups);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].span_count(), 6_000);
        assert_eq!(batches[1].span_count(), 7_000);
        assert_eq!(total_spans(&batches), 13_000);
    }

    #[test]
    fn test_oversized_flushes_then_chunks() {
        let groups = vec![
            group_with_spans(10),
            group_with_spans(25_000),
            group_with_spans(10),
        ];
        let batches = TraceBatcher::new(100).batches(&groups);
        // leading buffer, 10k + 10k + 5k chunks, trailing buffer
        assert_eq!(batches.len(), 5);
        assert_eq!(batches[1].span_count(), MAX_SPANS_PER_BATCH);
        assert_eq!(batches[2].span_count(), MAX_SPANS_PER_BATCH);
        assert_eq!(batches[3].span_count(), 5_000);
        assert_eq!(total_spans(&batches), 25_020);
    }

    #[test]
    fn test_no_batch_exceeds_span_ceiling() {
        let groups: Vec<_> = [9_000, 2_000, 30_000, 500, 9_999, 1]
            .iter()
            .map(|&n| group_with_spans(n))
            .collect();
        let batches = TraceBatcher::new(100).batches(&groups);
        for batch in &batches {
            assert!(batch.span_count() <= MAX_SPANS_PER_BATCH);
        }
        assert_eq!(total_spans(&batches), 50_500);
    }

    #[test]
    fn test_empty_template() {
        let batches = TraceBatcher::new(100).batches(&[]);
        assert!(batches.is_empty());
    }
}
