//! Execution-scoped trace context.
//!
//! A [`Context`] carries the active span identity down a call chain. It is an
//! explicit value threaded through function signatures rather than a
//! thread-local: concurrent requests each hold their own `Context`, so nested
//! spans auto-parent correctly without any global mutable state.
//!
//! Inbound, a context is produced by
//! [`TraceContextPropagator::extract`]; outbound, the context wrapping the
//! current span is handed to [`TraceContextPropagator::inject_context`] so
//! the next hop parents under this service's span.
//!
//! [`TraceContextPropagator::extract`]: crate::propagation::TraceContextPropagator::extract
//! [`TraceContextPropagator::inject_context`]: crate::propagation::TraceContextPropagator::inject_context

use crate::trace::{Span, SpanContext};

/// An immutable, cheaply clonable value carrying the active span identity.
#[derive(Clone, Debug, Default)]
pub struct Context {
    span_context: Option<SpanContext>,
}

impl Context {
    /// Create an empty `Context` with no active span.
    ///
    /// A tracer given an empty context starts a new trace.
    pub fn new() -> Self {
        Context::default()
    }

    /// Create a `Context` with the given span active.
    ///
    /// Spans started from the returned context become children of `span`,
    /// and injecting it writes `span`'s identity to the wire.
    pub fn with_span(span: &Span) -> Self {
        Context {
            span_context: Some(span.span_context().clone()),
        }
    }

    /// Create a `Context` from a span context received from a remote caller.
    pub fn with_remote_span_context(span_context: SpanContext) -> Self {
        Context {
            span_context: Some(span_context),
        }
    }

    /// The active span context, if any.
    pub fn span_context(&self) -> Option<&SpanContext> {
        self.span_context.as_ref()
    }

    /// Returns `true` if this context carries a valid active span.
    pub fn has_active_span(&self) -> bool {
        self.span_context
            .as_ref()
            .map(SpanContext::is_valid)
            .unwrap_or(false)
    }
}
