//! # Tracer
//!
//! The `Tracer` is the factory for [`Span`]s. Parenting is resolved from an
//! explicit [`Context`] threaded through the call chain: if the context
//! carries a valid span context the new span joins that trace as a child,
//! otherwise a fresh trace id is minted and the span becomes a trace root.

use crate::context::Context;
use crate::export::SpanData;
use crate::trace::span::SpanRecording;
use crate::trace::{Span, SpanContext, SpanId, Status, TraceFlags, TracerProvider};
use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

/// `Tracer` implementation to create and manage spans.
///
/// Tracers are lightweight handles sharing their provider's processor list;
/// they hold no exporter state of their own.
#[derive(Clone)]
pub struct Tracer {
    name: Cow<'static, str>,
    provider: TracerProvider,
}

impl fmt::Debug for Tracer {
    /// Omitting `provider` here is necessary to avoid cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").field("name", &self.name).finish()
    }
}

impl Tracer {
    /// Create a new tracer (used internally by [`TracerProvider`]).
    pub(crate) fn new(name: Cow<'static, str>, provider: TracerProvider) -> Self {
        Tracer { name, provider }
    }

    /// Name of the instrumentation this tracer was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a new trace-root span.
    ///
    /// Equivalent to [`start_with_context`](Tracer::start_with_context) with
    /// an empty context.
    pub fn start(&self, name: impl Into<Cow<'static, str>>) -> Span {
        self.start_with_context(name, &Context::new())
    }

    /// Start a new span as a child of the span active in `cx`.
    ///
    /// If `cx` holds a valid span context, the new span inherits its trace
    /// id and sampled flag and records its span id as the parent. Otherwise
    /// a fresh trace id is minted and the span is a trace root.
    ///
    /// After provider shutdown this returns a non-recording span whose end
    /// is dropped.
    pub fn start_with_context(
        &self,
        name: impl Into<Cow<'static, str>>,
        cx: &Context,
    ) -> Span {
        if self.provider.is_shutdown() {
            return Span::new(SpanContext::NONE, None, self.clone());
        }

        let id_generator = self.provider.id_generator();
        let parent = cx.span_context().filter(|sc| sc.is_valid());
        let (trace_id, parent_span_id, trace_flags) = match parent {
            Some(parent) => (parent.trace_id(), parent.span_id(), parent.trace_flags()),
            None => (
                id_generator.new_trace_id(),
                SpanId::INVALID,
                TraceFlags::SAMPLED,
            ),
        };

        let span_context = SpanContext::new(
            trace_id,
            id_generator.new_span_id(),
            trace_flags,
            false,
        );

        Span::new(
            span_context,
            Some(SpanRecording {
                parent_span_id,
                name: name.into(),
                start_time: SystemTime::now(),
                attributes: Vec::new(),
                events: Vec::new(),
                status: Status::Unset,
            }),
            self.clone(),
        )
    }

    /// Submit an ended span to every registered processor, exactly once.
    pub(crate) fn submit(&self, span: SpanData) {
        if let Some((last, rest)) = self.provider.span_processors().split_last() {
            for processor in rest {
                processor.on_end(span.clone());
            }
            last.on_end(span);
        }
    }
}
