//! An exporter that collects spans in memory, for tests and debugging.

use crate::error::{TraceError, TraceResult};
use crate::export::{ExportResult, SpanData, SpanExporter};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// An in-memory span exporter that stores finished spans in a shared
/// `Vec<SpanData>`.
///
/// Clones share the same storage, so a test can keep one handle while the
/// pipeline owns another:
///
/// ```
/// use tracewire::export::InMemorySpanExporter;
/// use tracewire::trace::TracerProvider;
///
/// let exporter = InMemorySpanExporter::default();
/// let provider = TracerProvider::builder()
///     .with_simple_exporter(exporter.clone())
///     .build();
///
/// let tracer = provider.tracer("example");
/// let mut span = tracer.start("say hello");
/// span.end();
///
/// assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    is_shutdown: Arc<AtomicBool>,
}

impl InMemorySpanExporter {
    /// Returns the finished spans collected so far.
    ///
    /// # Errors
    ///
    /// Returns a `TraceError` if the internal lock cannot be acquired.
    pub fn get_finished_spans(&self) -> TraceResult<Vec<SpanData>> {
        self.spans
            .lock()
            .map(|spans_guard| spans_guard.clone())
            .map_err(|_| TraceError::Other("InMemorySpanExporter mutex poison".into()))
    }

    /// Clears the internal storage of finished spans.
    pub fn reset(&self) {
        let _ = self.spans.lock().map(|mut spans_guard| spans_guard.clear());
    }

    /// Whether `shutdown` has been called on this exporter.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, mut batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown() {
            return Box::pin(std::future::ready(Err(TraceError::Other(
                "exporter is shut down".into(),
            ))));
        }
        let result = self
            .spans
            .lock()
            .map(|mut spans_guard| spans_guard.append(&mut batch))
            .map_err(|_| TraceError::Other("InMemorySpanExporter mutex poison".into()));
        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.is_shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanContext, SpanId, Status, TraceFlags, TraceId};
    use futures_executor::block_on;
    use std::time::SystemTime;

    fn sample_span(name: &'static str) -> SpanData {
        SpanData {
            span_context: SpanContext::new(
                TraceId::from(1),
                SpanId::from(1),
                TraceFlags::SAMPLED,
                false,
            ),
            parent_span_id: SpanId::INVALID,
            name: name.into(),
            start_time: SystemTime::now(),
            end_time: SystemTime::now(),
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
        }
    }

    #[test]
    fn collects_and_resets() {
        let mut exporter = InMemorySpanExporter::default();
        block_on(exporter.export(vec![sample_span("a"), sample_span("b")])).unwrap();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 2);

        exporter.reset();
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let mut exporter = InMemorySpanExporter::default();
        let observer = exporter.clone();
        block_on(exporter.export(vec![sample_span("shared")])).unwrap();
        assert_eq!(observer.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn export_after_shutdown_fails() {
        let mut exporter = InMemorySpanExporter::default();
        exporter.shutdown();
        assert!(block_on(exporter.export(vec![sample_span("late")])).is_err());
        assert!(exporter.is_shutdown());
    }
}
