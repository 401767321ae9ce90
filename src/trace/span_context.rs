use crate::trace::{SpanId, TraceFlags, TraceId};

/// Immutable portion of a [`Span`] which can be serialized and propagated.
///
/// This is the minimal identity needed to link a child span to its parent
/// across a process boundary: trace id, span id, and the sampled flag. It is
/// the payload of the `traceparent` header.
///
/// [`Span`]: crate::trace::Span
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    trace_flags: TraceFlags,
    is_remote: bool,
}

impl SpanContext {
    /// An invalid span context.
    ///
    /// Invalid contexts never propagate; a receiver holding one starts a new
    /// trace instead.
    pub const NONE: SpanContext = SpanContext {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        trace_flags: TraceFlags::NOT_SAMPLED,
        is_remote: false,
    };

    /// Construct a new `SpanContext`.
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        trace_flags: TraceFlags,
        is_remote: bool,
    ) -> Self {
        SpanContext {
            trace_id,
            span_id,
            trace_flags,
            is_remote,
        }
    }

    /// The [`TraceId`] for this span context.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The [`SpanId`] for this span context.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Flags carried alongside the trace identity.
    pub fn trace_flags(&self) -> TraceFlags {
        self.trace_flags
    }

    /// Returns `true` if the span context has a valid (non-zero) `trace_id`
    /// and a valid (non-zero) `span_id`.
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }

    /// Returns `true` if the span context was propagated from a remote parent.
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// Returns `true` if the `sampled` trace flag is set.
    pub fn is_sampled(&self) -> bool {
        self.trace_flags.is_sampled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_requires_both_ids() {
        assert!(!SpanContext::NONE.is_valid());
        assert!(!SpanContext::new(
            TraceId::from(1),
            SpanId::INVALID,
            TraceFlags::SAMPLED,
            false
        )
        .is_valid());
        assert!(!SpanContext::new(
            TraceId::INVALID,
            SpanId::from(1),
            TraceFlags::SAMPLED,
            false
        )
        .is_valid());
        assert!(
            SpanContext::new(TraceId::from(1), SpanId::from(1), TraceFlags::SAMPLED, false)
                .is_valid()
        );
    }
}
