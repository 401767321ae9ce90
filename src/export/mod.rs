//! Span exporters.
//!
//! A [`SpanExporter`] is the protocol-specific sink at the end of the
//! pipeline: it receives a batch of finished spans from a span processor and
//! best-effort delivers them. Exporters are expected to be simple encoders
//! and transmitters; batching, buffering and failure isolation live in the
//! processors.

use crate::common::KeyValue;
use crate::error::TraceError;
use crate::resource::Resource;
use crate::trace::{Event, SpanContext, SpanId, Status};
use futures_util::future::BoxFuture;
use std::borrow::Cow;
use std::fmt::Debug;
use std::time::SystemTime;

pub mod in_memory;
pub mod otlp;
pub mod stdout;

pub use in_memory::InMemorySpanExporter;
pub use otlp::OtlpHttpSpanExporter;
pub use stdout::StdoutSpanExporter;

/// Describes the result of an export.
pub type ExportResult = Result<(), TraceError>;

/// `SpanExporter` defines the interface that protocol-specific exporters
/// must implement so they can be plugged into the span processors.
///
/// Implementations must be safe to call repeatedly and must not retain
/// references to spans after `export` returns. Any delivery failure is
/// reported through the returned result; the batch is dropped either way
/// (at-most-once delivery, no retries).
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of finished spans.
    ///
    /// This function is never called concurrently for the same exporter
    /// instance, and must not block indefinitely: there must be a reasonable
    /// upper limit after which the call times out with an error result.
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult>;

    /// Shuts down the exporter. Subsequent `export` calls return an error.
    fn shutdown(&mut self) {}

    /// Set the resource describing the emitting process.
    ///
    /// Called once at provider construction; exporters stamp the resource
    /// onto every batch they serialize.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// All information collected by an ended [`Span`], in exportable form.
///
/// Ownership transfers to the exporter for the duration of the export call
/// only; the processor keeps no reference regardless of the export outcome.
///
/// [`Span`]: crate::trace::Span
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// Exportable `SpanContext`.
    pub span_context: SpanContext,
    /// Span parent id, `SpanId::INVALID` for trace roots.
    pub parent_span_id: SpanId,
    /// Span name.
    pub name: Cow<'static, str>,
    /// Span start time.
    pub start_time: SystemTime,
    /// Span end time.
    pub end_time: SystemTime,
    /// Span attributes.
    pub attributes: Vec<KeyValue>,
    /// Events recorded while the span was active.
    pub events: Vec<Event>,
    /// Span status.
    pub status: Status,
}
