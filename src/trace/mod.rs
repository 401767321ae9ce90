//! # Distributed tracing
//!
//! This module holds the span data model and the pipeline that moves
//! finished spans to their exporters:
//!
//! * [`TracerProvider`] owns the pipeline configuration and creates
//!   [`Tracer`]s.
//! * [`Tracer`]s start [`Span`]s, resolving parenting from an explicit
//!   [`Context`].
//! * [`SpanProcessor`]s receive ended spans and batch them toward the
//!   [`SpanExporter`]s.
//!
//! [`Context`]: crate::Context
//! [`SpanExporter`]: crate::export::SpanExporter

mod id;
mod id_generator;
mod provider;
mod span;
mod span_context;
mod span_processor;
mod tracer;

pub use id::{SpanId, TraceFlags, TraceId};
pub use id_generator::{IdGenerator, RandomIdGenerator};
pub use provider::{Builder, TracerProvider};
pub use span::{Event, Span, Status};
pub use span_context::SpanContext;
pub use span_processor::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, BatchSpanProcessorBuilder,
    SimpleSpanProcessor, SpanProcessor,
};
pub use tracer::Tracer;
