//! # Span
//!
//! `Span`s represent a single operation within a trace. `Span`s can be nested
//! to form a trace tree. Each trace contains a root span, which typically
//! describes the end-to-end latency.
//!
//! A span is owned by the caller that started it and is mutable until
//! [`Span::end`] stamps the end timestamp and hands the finished record to
//! every registered span processor, exactly once. Ending is idempotent; a
//! span that is never ended never flushes.

use crate::common::KeyValue;
use crate::error::{TraceError, TraceResult};
use crate::export::SpanData;
use crate::trace::{SpanContext, SpanId, Tracer};
use std::borrow::Cow;
use std::time::SystemTime;

/// The status of a [`Span`] once it has ended.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Status {
    /// The default status.
    #[default]
    Unset,

    /// The operation completed successfully.
    Ok,

    /// The operation contains an error.
    Error {
        /// The description of the error
        description: Cow<'static, str>,
    },
}

impl Status {
    /// Create an error status with the given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// A timestamped message recorded on a span.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The name of this event.
    pub name: Cow<'static, str>,
    /// The exact time the event occurred.
    pub timestamp: SystemTime,
    /// Attributes describing the event.
    pub attributes: Vec<KeyValue>,
}

impl Event {
    /// Create a new `Event`.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Event {
            name: name.into(),
            timestamp,
            attributes,
        }
    }
}

/// The mutable portion of a span, taken by `end()`.
#[derive(Debug)]
pub(crate) struct SpanRecording {
    pub(crate) parent_span_id: SpanId,
    pub(crate) name: Cow<'static, str>,
    pub(crate) start_time: SystemTime,
    pub(crate) attributes: Vec<KeyValue>,
    pub(crate) events: Vec<Event>,
    pub(crate) status: Status,
}

/// Single operation within a trace.
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    recording: Option<SpanRecording>,
    tracer: Tracer,
}

impl Span {
    pub(crate) fn new(
        span_context: SpanContext,
        recording: Option<SpanRecording>,
        tracer: Tracer,
    ) -> Self {
        Span {
            span_context,
            recording,
            tracer,
        }
    }

    /// Returns the `SpanContext` for this span.
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns `true` if this span is still recording information.
    ///
    /// Spans stop recording once ended; spans started after provider
    /// shutdown never record.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn with_recording<T>(
        &mut self,
        f: impl FnOnce(&mut SpanRecording) -> T,
    ) -> TraceResult<T> {
        match self.recording.as_mut() {
            Some(recording) => Ok(f(recording)),
            None => Err(TraceError::SpanAlreadyEnded),
        }
    }

    /// Set a single attribute on this span.
    ///
    /// Writes after [`end`](Span::end) are caller misuse and are reported,
    /// not silently dropped.
    pub fn set_attribute(&mut self, attribute: KeyValue) -> TraceResult<()> {
        self.with_recording(|recording| recording.attributes.push(attribute))
    }

    /// Set the status of this span.
    pub fn set_status(&mut self, status: Status) -> TraceResult<()> {
        self.with_recording(|recording| recording.status = status)
    }

    /// Record an event at the current time.
    pub fn add_event(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        attributes: Vec<KeyValue>,
    ) -> TraceResult<()> {
        let event = Event::new(name, SystemTime::now(), attributes);
        self.with_recording(|recording| recording.events.push(event))
    }

    /// Record an error as an event and mark the span status as `Error`.
    pub fn record_error(&mut self, err: &dyn std::error::Error) -> TraceResult<()> {
        let message = err.to_string();
        let event = Event::new(
            "exception",
            SystemTime::now(),
            vec![KeyValue::new("exception.message", message.clone())],
        );
        self.with_recording(|recording| {
            recording.events.push(event);
            recording.status = Status::error(message);
        })
    }

    /// Finish the span with the current time.
    ///
    /// The first call stamps the end timestamp and submits the finished span
    /// to every registered processor; subsequent calls are no-ops.
    pub fn end(&mut self) {
        self.end_with_timestamp(SystemTime::now());
    }

    /// Finish the span with the given timestamp.
    pub fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        let recording = match self.recording.take() {
            Some(recording) => recording,
            None => return, // already ended
        };

        self.tracer.submit(SpanData {
            span_context: self.span_context.clone(),
            parent_span_id: recording.parent_span_id,
            name: recording.name,
            start_time: recording.start_time,
            end_time: timestamp,
            attributes: recording.attributes,
            events: recording.events,
            status: recording.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::in_memory::InMemorySpanExporter;
    use crate::trace::TracerProvider;
    use crate::KeyValue;

    fn test_provider() -> (TracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider, exporter)
    }

    #[test]
    fn end_is_idempotent() {
        let (provider, exporter) = test_provider();
        let tracer = provider.tracer("test");

        let mut span = tracer.start("work");
        span.end();
        span.end();

        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn writes_after_end_are_reported() {
        let (provider, _exporter) = test_provider();
        let tracer = provider.tracer("test");

        let mut span = tracer.start("work");
        assert!(span.set_attribute(KeyValue::new("ok", true)).is_ok());
        span.end();

        assert!(matches!(
            span.set_attribute(KeyValue::new("late", true)),
            Err(TraceError::SpanAlreadyEnded)
        ));
        assert!(matches!(
            span.set_status(Status::Ok),
            Err(TraceError::SpanAlreadyEnded)
        ));
        assert!(matches!(
            span.add_event("late", vec![]),
            Err(TraceError::SpanAlreadyEnded)
        ));
    }

    #[test]
    fn unended_span_never_flushes() {
        let (provider, exporter) = test_provider();
        let tracer = provider.tracer("test");

        let span = tracer.start("leaked");
        drop(span);

        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn record_error_sets_status_and_event() {
        let (provider, exporter) = test_provider();
        let tracer = provider.tracer("test");

        let mut span = tracer.start("failing");
        let err = std::io::Error::new(std::io::ErrorKind::Other, "connection refused");
        span.record_error(&err).unwrap();
        span.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].events.len(), 1);
        assert_eq!(spans[0].events[0].name, "exception");
        assert_eq!(spans[0].status, Status::error("connection refused"));
    }

    #[test]
    fn end_timestamps_are_ordered() {
        let (provider, exporter) = test_provider();
        let tracer = provider.tracer("test");

        let mut span = tracer.start("timed");
        span.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert!(spans[0].end_time >= spans[0].start_time);
    }
}
