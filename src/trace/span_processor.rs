//! # Span processors
//!
//! A span processor sits between span end and the exporters: it is invoked
//! synchronously from [`Span::end`] and decides when finished spans are
//! handed to its exporters.
//!
//! Built-in processors:
//!
//! * [`SimpleSpanProcessor`] exports every span inline as it ends. Useful for
//!   debugging and tests.
//! * [`BatchSpanProcessor`] buffers spans in a bounded queue and exports them
//!   from a dedicated background thread, so span-producing threads never
//!   block on I/O.
//!
//! Processors are registered on the [`TracerProvider`] and invoked in
//! registration order.
//!
//! [`Span::end`]: crate::trace::Span::end
//! [`TracerProvider`]: crate::trace::TracerProvider

use crate::error::{TraceError, TraceResult};
use crate::export::{SpanData, SpanExporter};
use crate::resource::Resource;
use futures_executor::block_on;
use std::cmp::min;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use std::{env, str::FromStr, time::Duration};

/// Delay interval between two consecutive scheduled exports.
pub(crate) const OTEL_BSP_SCHEDULE_DELAY: &str = "OTEL_BSP_SCHEDULE_DELAY";
/// Default delay interval between two consecutive scheduled exports.
pub(crate) const OTEL_BSP_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum queue size.
pub(crate) const OTEL_BSP_MAX_QUEUE_SIZE: &str = "OTEL_BSP_MAX_QUEUE_SIZE";
/// Default maximum queue size.
pub(crate) const OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to OTEL_BSP_MAX_QUEUE_SIZE.
pub(crate) const OTEL_BSP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BSP_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size.
pub(crate) const OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;
/// Maximum time to wait for a flush or shutdown drain to complete.
pub(crate) const OTEL_BSP_EXPORT_TIMEOUT: &str = "OTEL_BSP_EXPORT_TIMEOUT";
/// Default maximum time to wait for a flush or shutdown drain to complete.
pub(crate) const OTEL_BSP_EXPORT_TIMEOUT_DEFAULT: u64 = 30_000;

/// `SpanProcessor` receives finished spans and decides when they reach the
/// exporters.
///
/// `on_end` is called synchronously within `Span::end`, therefore it must not
/// block or panic. Unsampled spans are dropped here and never reach an
/// exporter.
pub trait SpanProcessor: Send + Sync + std::fmt::Debug {
    /// Called after a span has ended (its end timestamp is already set).
    fn on_end(&self, span: SpanData);
    /// Force buffered spans to be exported. Blocks until the drain completes
    /// or times out.
    fn force_flush(&self) -> TraceResult<()>;
    /// Drain buffered spans and release processor resources.
    ///
    /// Must be safe to call multiple times; calls after the first are no-ops.
    fn shutdown(&self) -> TraceResult<()>;
    /// Set the resource describing the emitting process.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// A [SpanProcessor] that passes finished spans to the configured exporter as
/// soon as they end, without batching. Every span end pays the full export
/// cost inline; prefer [BatchSpanProcessor] outside of tests.
#[derive(Debug)]
pub struct SimpleSpanProcessor {
    exporter: Mutex<Box<dyn SpanExporter>>,
}

impl SimpleSpanProcessor {
    /// Create a new [SimpleSpanProcessor] using the provided exporter.
    pub fn new(exporter: Box<dyn SpanExporter>) -> Self {
        Self {
            exporter: Mutex::new(exporter),
        }
    }
}

impl SpanProcessor for SimpleSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }

        let result = self
            .exporter
            .lock()
            .map_err(|_| TraceError::Other("SimpleSpanProcessor mutex poison".into()))
            .and_then(|mut exporter| block_on(exporter.export(vec![span])));

        if let Err(err) = result {
            tracing::debug!(error = ?err, "simple processor export failed");
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        // Nothing buffered.
        Ok(())
    }

    fn shutdown(&self) -> TraceResult<()> {
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.shutdown();
            Ok(())
        } else {
            Err(TraceError::Other(
                "SimpleSpanProcessor mutex poison at shutdown".into(),
            ))
        }
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.set_resource(resource);
        }
    }
}

/// Messages exchanged between producer threads and the export thread.
///
/// Spans never travel through this channel; they live in the shared buffer.
/// The channel only wakes the export thread. At most one `FlushHint` is in
/// flight at a time (tracked by `flush_hint_pending`), so producer bursts can
/// never fill the channel and starve `ForceFlush`/`Shutdown` delivery.
#[derive(Debug)]
enum ControlMessage {
    /// The buffer reached one batch worth of spans.
    FlushHint,
    /// Drain everything and acknowledge through the enclosed channel.
    ForceFlush(SyncSender<TraceResult<()>>),
    /// Drain everything, shut exporters down, acknowledge, exit.
    Shutdown(SyncSender<TraceResult<()>>),
}

/// A batch span processor with a dedicated background export thread.
///
/// Finished spans accumulate in a bounded queue; the export thread drains the
/// queue in batches every scheduled-delay tick, or earlier when a batch worth
/// of spans is buffered. When the queue is full the oldest span is evicted to
/// make room for the newest, so a bursty process loses its stalest data
/// first.
///
/// Multiple exporters may be attached; each batch is delivered to every
/// exporter, and one exporter failing does not prevent delivery to the
/// others.
#[derive(Debug)]
pub struct BatchSpanProcessor {
    buffer: Arc<Mutex<VecDeque<SpanData>>>,
    exporters: Arc<Mutex<Vec<Box<dyn SpanExporter>>>>,
    message_sender: SyncSender<ControlMessage>,
    flush_hint_pending: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    export_timeout: Duration,
    max_queue_size: usize,
    max_export_batch_size: usize,
    is_shutdown: AtomicBool,
    dropped_span_count: Arc<AtomicUsize>,
}

impl BatchSpanProcessor {
    /// Create a builder to configure a `BatchSpanProcessor`.
    pub fn builder() -> BatchSpanProcessorBuilder {
        BatchSpanProcessorBuilder::default()
    }

    fn new(exporters: Vec<Box<dyn SpanExporter>>, config: BatchConfig) -> Self {
        let buffer = Arc::new(Mutex::new(VecDeque::with_capacity(config.max_queue_size)));
        let exporters = Arc::new(Mutex::new(exporters));
        let (message_sender, message_receiver) = sync_channel(config.max_queue_size.max(1));
        let flush_hint_pending = Arc::new(AtomicBool::new(false));

        let worker_buffer = Arc::clone(&buffer);
        let worker_exporters = Arc::clone(&exporters);
        let worker_hint_pending = Arc::clone(&flush_hint_pending);
        let scheduled_delay = config.scheduled_delay;
        let batch_size = config.max_export_batch_size;

        let handle = thread::Builder::new()
            .name("tracewire-batch-export".to_string())
            .spawn(move || {
                let mut last_export_time = Instant::now();

                loop {
                    let timeout = scheduled_delay.saturating_sub(last_export_time.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(ControlMessage::FlushHint) => {
                            worker_hint_pending.store(false, Ordering::Relaxed);
                            if buffered_len(&worker_buffer) >= batch_size {
                                if let Err(err) =
                                    drain_and_export(&worker_buffer, &worker_exporters, batch_size)
                                {
                                    tracing::debug!(error = %err, "batch export failed");
                                }
                                last_export_time = Instant::now();
                            }
                        }
                        Ok(ControlMessage::ForceFlush(sender)) => {
                            let result =
                                drain_and_export(&worker_buffer, &worker_exporters, batch_size);
                            let _ = sender.send(result);
                            last_export_time = Instant::now();
                        }
                        Ok(ControlMessage::Shutdown(sender)) => {
                            let result =
                                drain_and_export(&worker_buffer, &worker_exporters, batch_size);
                            if let Ok(mut exporters) = worker_exporters.lock() {
                                for exporter in exporters.iter_mut() {
                                    exporter.shutdown();
                                }
                            }
                            let _ = sender.send(result);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(err) =
                                drain_and_export(&worker_buffer, &worker_exporters, batch_size)
                            {
                                tracing::debug!(error = %err, "scheduled export failed");
                            }
                            last_export_time = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            // All handles dropped without shutdown; drain what is left.
                            let _ = drain_and_export(&worker_buffer, &worker_exporters, batch_size);
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn batch export thread");

        Self {
            buffer,
            exporters,
            message_sender,
            flush_hint_pending,
            handle: Mutex::new(Some(handle)),
            export_timeout: config.export_timeout,
            max_queue_size: config.max_queue_size,
            max_export_batch_size: config.max_export_batch_size,
            is_shutdown: AtomicBool::new(false),
            dropped_span_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn buffered_len(buffer: &Mutex<VecDeque<SpanData>>) -> usize {
    buffer.lock().map(|buffer| buffer.len()).unwrap_or(0)
}

/// Drain the buffer in batch-sized chunks and deliver each chunk to every
/// exporter.
///
/// The buffer lock is never held across an export call, so producers keep
/// making progress while an exporter is slow. Failed batches are dropped
/// (at-most-once delivery); the first error is reported after the drain
/// completes.
fn drain_and_export(
    buffer: &Mutex<VecDeque<SpanData>>,
    exporters: &Mutex<Vec<Box<dyn SpanExporter>>>,
    batch_size: usize,
) -> TraceResult<()> {
    let mut result = Ok(());
    loop {
        let batch: Vec<SpanData> = {
            let mut buffer = buffer
                .lock()
                .map_err(|_| TraceError::Other("span buffer mutex poison".into()))?;
            if buffer.is_empty() {
                break;
            }
            let take = min(batch_size, buffer.len());
            buffer.drain(..take).collect()
        };

        let mut exporters = exporters
            .lock()
            .map_err(|_| TraceError::Other("exporter mutex poison".into()))?;
        if let Some((last, rest)) = exporters.split_last_mut() {
            for exporter in rest.iter_mut() {
                if let Err(err) = block_on(exporter.export(batch.clone())) {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
            if let Err(err) = block_on(last.export(batch)) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
    }
    result
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }
        if self.is_shutdown.load(Ordering::Relaxed) {
            self.dropped_span_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("batch processor is shut down, dropping span");
            return;
        }

        let at_watermark = {
            let mut buffer = match self.buffer.lock() {
                Ok(buffer) => buffer,
                Err(_) => return,
            };
            if buffer.len() >= self.max_queue_size {
                // Queue full: evict the oldest span so the newest survives.
                buffer.pop_front();
                if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
                    tracing::warn!(
                        "span queue is full, evicting oldest spans; \
                         total evictions will be reported at shutdown"
                    );
                }
            }
            buffer.push_back(span);
            buffer.len() >= self.max_export_batch_size
        };

        if at_watermark && !self.flush_hint_pending.swap(true, Ordering::Relaxed) {
            // Wake the export thread early. The pending flag keeps at most
            // one hint in flight; the export thread clears it on wakeup.
            if self
                .message_sender
                .try_send(ControlMessage::FlushHint)
                .is_err()
            {
                self.flush_hint_pending.store(false, Ordering::Relaxed);
            }
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }
        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .send(ControlMessage::ForceFlush(sender))
            .map_err(|_| TraceError::Other("export thread is not running".into()))?;

        receiver
            .recv_timeout(self.export_timeout)
            .map_err(|_| TraceError::ExportTimedOut(self.export_timeout))?
    }

    fn shutdown(&self) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::Relaxed) {
            return Ok(());
        }

        let dropped = self.dropped_span_count.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(count = dropped, "spans evicted due to full queue");
        }

        let (sender, receiver) = sync_channel(1);
        if self
            .message_sender
            .send(ControlMessage::Shutdown(sender))
            .is_err()
        {
            // The export thread is gone; nothing was drained, so leave the
            // processor reusable for a retry instead of claiming shutdown.
            self.is_shutdown.store(false, Ordering::Relaxed);
            return Err(TraceError::Other("export thread is not running".into()));
        }

        let result = receiver
            .recv_timeout(self.export_timeout)
            .map_err(|_| TraceError::ExportTimedOut(self.export_timeout))?;

        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                if handle.join().is_err() {
                    tracing::error!("batch export thread panicked");
                }
            }
        }
        result
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut exporters) = self.exporters.lock() {
            for exporter in exporters.iter_mut() {
                exporter.set_resource(resource);
            }
        }
    }
}

impl Drop for BatchSpanProcessor {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::Relaxed) {
            if let Err(err) = self.shutdown() {
                tracing::warn!(error = %err, "batch processor shutdown failed in drop");
            }
        }
    }
}

/// Builder for [`BatchSpanProcessor`].
#[derive(Debug, Default)]
pub struct BatchSpanProcessorBuilder {
    exporters: Vec<Box<dyn SpanExporter>>,
    config: BatchConfig,
}

impl BatchSpanProcessorBuilder {
    /// Attach an exporter. May be called multiple times; every batch is
    /// delivered to each attached exporter.
    pub fn with_exporter<E: SpanExporter + 'static>(mut self, exporter: E) -> Self {
        self.exporters.push(Box::new(exporter));
        self
    }

    /// Set the [`BatchConfig`].
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchSpanProcessorBuilder { config, ..self }
    }

    /// Build the processor, spawning its export thread.
    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::new(self.exporters, self.config)
    }
}

/// Batch span processor configuration.
/// Use [`BatchConfigBuilder`] to configure your own instance of [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfig {
    /// The maximum queue size to buffer spans for delayed processing. If the
    /// queue gets full the oldest buffered span is evicted. The default value
    /// is 2048.
    pub(crate) max_queue_size: usize,

    /// The delay interval between two consecutive scheduled exports. The
    /// default value is 5 seconds.
    pub(crate) scheduled_delay: Duration,

    /// The maximum number of spans to export in a single batch. If more than
    /// one batch worth of spans is buffered, batches are exported one after
    /// the other without delay. The default value is 512.
    pub(crate) max_export_batch_size: usize,

    /// The maximum time a flush or shutdown drain may take before the caller
    /// gets a timeout error. The default value is 30 seconds.
    pub(crate) export_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

/// A builder for creating [`BatchConfig`] instances.
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
    export_timeout: Duration,
}

impl Default for BatchConfigBuilder {
    /// Create a new [`BatchConfigBuilder`] initialized with the default batch
    /// config values, overridden by environment variables if set:
    /// * `OTEL_BSP_MAX_QUEUE_SIZE`
    /// * `OTEL_BSP_SCHEDULE_DELAY`
    /// * `OTEL_BSP_MAX_EXPORT_BATCH_SIZE`
    /// * `OTEL_BSP_EXPORT_TIMEOUT`
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT,
            scheduled_delay: Duration::from_millis(OTEL_BSP_SCHEDULE_DELAY_DEFAULT),
            max_export_batch_size: OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            export_timeout: Duration::from_millis(OTEL_BSP_EXPORT_TIMEOUT_DEFAULT),
        }
        .init_from_env_vars()
    }
}

impl BatchConfigBuilder {
    /// Set max_queue_size for [`BatchConfigBuilder`].
    /// It's the maximum queue size to buffer spans for delayed processing.
    /// If the queue gets full the oldest buffered span is evicted.
    /// The default value is 2048.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set max_export_batch_size for [`BatchConfigBuilder`].
    /// It's the maximum number of spans to export in a single batch. The
    /// default value is 512.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Set scheduled_delay for [`BatchConfigBuilder`].
    /// It's the delay interval between two consecutive scheduled exports.
    /// The default value is 5000 milliseconds.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// Set export_timeout for [`BatchConfigBuilder`].
    /// It bounds how long a flush or shutdown drain may block its caller.
    /// The default value is 30000 milliseconds.
    pub fn with_export_timeout(mut self, export_timeout: Duration) -> Self {
        self.export_timeout = export_timeout;
        self
    }

    /// Builds a `BatchConfig` enforcing the following invariants:
    /// * `max_export_batch_size` must be less than or equal to `max_queue_size`.
    pub fn build(self) -> BatchConfig {
        // A batch larger than the queue could never fill; clamp it down.
        let max_export_batch_size = min(self.max_export_batch_size, self.max_queue_size);

        BatchConfig {
            max_queue_size: self.max_queue_size,
            scheduled_delay: self.scheduled_delay,
            export_timeout: self.export_timeout,
            max_export_batch_size,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(max_queue_size) = env::var(OTEL_BSP_MAX_QUEUE_SIZE)
            .ok()
            .and_then(|queue_size| usize::from_str(&queue_size).ok())
        {
            self.max_queue_size = max_queue_size;
        }

        if let Some(scheduled_delay) = env::var(OTEL_BSP_SCHEDULE_DELAY)
            .ok()
            .and_then(|delay| u64::from_str(&delay).ok())
        {
            self.scheduled_delay = Duration::from_millis(scheduled_delay);
        }

        if let Some(max_export_batch_size) = env::var(OTEL_BSP_MAX_EXPORT_BATCH_SIZE)
            .ok()
            .and_then(|batch_size| usize::from_str(&batch_size).ok())
        {
            self.max_export_batch_size = max_export_batch_size;
        }

        if let Some(export_timeout) = env::var(OTEL_BSP_EXPORT_TIMEOUT)
            .ok()
            .and_then(|timeout| u64::from_str(&timeout).ok())
        {
            self.export_timeout = Duration::from_millis(export_timeout);
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::in_memory::InMemorySpanExporter;
    use crate::export::ExportResult;
    use crate::trace::{IdGenerator, RandomIdGenerator, SpanContext, Status, TraceFlags};
    use futures_util::future::BoxFuture;
    use std::sync::mpsc::Receiver;
    use std::time::SystemTime;

    fn new_test_span_data(name: &'static str) -> SpanData {
        let generator = RandomIdGenerator::default();
        SpanData {
            span_context: SpanContext::new(
                generator.new_trace_id(),
                generator.new_span_id(),
                TraceFlags::SAMPLED,
                false,
            ),
            parent_span_id: crate::trace::SpanId::INVALID,
            name: name.into(),
            start_time: SystemTime::now(),
            end_time: SystemTime::now(),
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
        }
    }

    fn unsampled_span_data() -> SpanData {
        let mut span = new_test_span_data("unsampled");
        span.span_context = SpanContext::new(
            span.span_context.trace_id(),
            span.span_context.span_id(),
            TraceFlags::NOT_SAMPLED,
            false,
        );
        span
    }

    /// Blocks inside `export` until the test releases it, then forwards the
    /// batch to an in-memory exporter.
    #[derive(Debug)]
    struct GateExporter {
        inner: InMemorySpanExporter,
        entered: SyncSender<()>,
        release: Mutex<Receiver<()>>,
    }

    impl SpanExporter for GateExporter {
        fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            let _ = self.entered.send(());
            if let Ok(release) = self.release.lock() {
                let _ = release.recv_timeout(Duration::from_secs(5));
            }
            self.inner.export(batch)
        }

        fn shutdown(&mut self) {
            self.inner.shutdown();
        }
    }

    /// Sleeps long enough inside `export` to outlast any test timeout.
    #[derive(Debug)]
    struct HungExporter {
        sleep: Duration,
    }

    impl SpanExporter for HungExporter {
        fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            thread::sleep(self.sleep);
            Box::pin(std::future::ready(Ok(())))
        }
    }

    #[derive(Debug)]
    struct FailingExporter;

    impl SpanExporter for FailingExporter {
        fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            Box::pin(std::future::ready(Err(TraceError::ExportFailed(
                "collector unreachable".into(),
            ))))
        }
    }

    fn slow_tick_config(queue: usize, batch: usize) -> BatchConfig {
        BatchConfigBuilder::default()
            .with_max_queue_size(queue)
            .with_max_export_batch_size(batch)
            .with_scheduled_delay(Duration::from_secs(3600))
            .build()
    }

    #[test]
    fn simple_processor_on_end_calls_export() {
        let exporter = InMemorySpanExporter::default();
        let processor = SimpleSpanProcessor::new(Box::new(exporter.clone()));

        let span = new_test_span_data("inline");
        processor.on_end(span.clone());

        assert_eq!(exporter.get_finished_spans().unwrap()[0], span);
        let _ = processor.shutdown();
    }

    #[test]
    fn simple_processor_skips_unsampled_spans() {
        let exporter = InMemorySpanExporter::default();
        let processor = SimpleSpanProcessor::new(Box::new(exporter.clone()));

        processor.on_end(unsampled_span_data());

        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn batch_processor_flushes_on_force_flush() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::builder()
            .with_exporter(exporter.clone())
            .with_batch_config(slow_tick_config(16, 16))
            .build();

        for _ in 0..5 {
            processor.on_end(new_test_span_data("buffered"));
        }
        assert!(exporter.get_finished_spans().unwrap().is_empty());

        processor.force_flush().unwrap();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 5);
    }

    #[test]
    fn batch_processor_exports_on_scheduled_delay() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::builder()
            .with_exporter(exporter.clone())
            .with_batch_config(
                BatchConfigBuilder::default()
                    .with_max_queue_size(16)
                    .with_max_export_batch_size(16)
                    .with_scheduled_delay(Duration::from_millis(50))
                    .build(),
            )
            .build();

        processor.on_end(new_test_span_data("ticked"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while exporter.get_finished_spans().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn batch_processor_exports_when_batch_size_reached() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::builder()
            .with_exporter(exporter.clone())
            .with_batch_config(slow_tick_config(16, 3))
            .build();

        for _ in 0..3 {
            processor.on_end(new_test_span_data("watermark"));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while exporter.get_finished_spans().unwrap().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 3);
    }

    #[test]
    fn batch_processor_skips_unsampled_spans() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::builder()
            .with_exporter(exporter.clone())
            .with_batch_config(slow_tick_config(16, 16))
            .build();

        processor.on_end(unsampled_span_data());
        processor.force_flush().unwrap();

        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn batch_processor_evicts_oldest_when_queue_full() {
        let inner = InMemorySpanExporter::default();
        let (entered_tx, entered_rx) = sync_channel(16);
        let (release_tx, release_rx) = sync_channel(16);
        let gate = GateExporter {
            inner: inner.clone(),
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };

        let processor = BatchSpanProcessor::builder()
            .with_exporter(gate)
            .with_batch_config(slow_tick_config(4, 2))
            .build();

        // Reach the batch watermark; the export thread picks up s1/s2 and
        // parks inside the gated export.
        processor.on_end(new_test_span_data("s1"));
        processor.on_end(new_test_span_data("s2"));
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("export thread never entered export");

        // Overfill the queue while the export thread is parked. Capacity is
        // 4, so the fifth span evicts the oldest buffered one (s3).
        for name in ["s3", "s4", "s5", "s6", "s7"] {
            processor.on_end(new_test_span_data(name));
        }

        for _ in 0..8 {
            let _ = release_tx.send(());
        }
        processor.force_flush().unwrap();

        let names: Vec<_> = inner
            .get_finished_spans()
            .unwrap()
            .into_iter()
            .map(|span| span.name)
            .collect();
        assert_eq!(names.len(), 6);
        assert!(!names.contains(&"s3".into()));
        assert!(names.contains(&"s7".into()));
    }

    #[test]
    fn batch_processor_shutdown_succeeds_while_export_thread_is_busy() {
        let inner = InMemorySpanExporter::default();
        let (entered_tx, entered_rx) = sync_channel(16);
        let (release_tx, release_rx) = sync_channel(16);
        let gate = GateExporter {
            inner: inner.clone(),
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };

        let processor = BatchSpanProcessor::builder()
            .with_exporter(gate)
            .with_batch_config(slow_tick_config(2, 2))
            .build();

        // Park the export thread inside the gated export.
        processor.on_end(new_test_span_data("first"));
        processor.on_end(new_test_span_data("second"));
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("export thread never entered export");

        // Each span past the watermark wants to wake the export thread
        // again. None of these wakeups may crowd the shutdown request out
        // of the control channel.
        for _ in 0..32 {
            processor.on_end(new_test_span_data("burst"));
        }

        for _ in 0..8 {
            let _ = release_tx.send(());
        }
        processor.shutdown().unwrap();

        assert!(inner.is_shutdown());
        // The parked batch, plus the two burst spans surviving eviction.
        assert_eq!(inner.get_finished_spans().unwrap().len(), 4);
    }

    #[test]
    fn batch_processor_shutdown_drains_buffer() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::builder()
            .with_exporter(exporter.clone())
            .with_batch_config(slow_tick_config(16, 16))
            .build();

        for _ in 0..4 {
            processor.on_end(new_test_span_data("draining"));
        }
        processor.shutdown().unwrap();

        assert_eq!(exporter.get_finished_spans().unwrap().len(), 4);
        assert!(exporter.is_shutdown());
    }

    #[test]
    fn batch_processor_repeat_shutdown_and_flush_are_noops() {
        let processor = BatchSpanProcessor::builder()
            .with_exporter(InMemorySpanExporter::default())
            .with_batch_config(slow_tick_config(16, 16))
            .build();

        processor.shutdown().unwrap();
        assert!(processor.shutdown().is_ok());
        assert!(processor.force_flush().is_ok());
    }

    #[test]
    fn batch_processor_force_flush_times_out_on_hung_exporter() {
        let processor = BatchSpanProcessor::builder()
            .with_exporter(HungExporter {
                sleep: Duration::from_secs(2),
            })
            .with_batch_config(
                BatchConfigBuilder::default()
                    .with_max_queue_size(16)
                    .with_max_export_batch_size(16)
                    .with_scheduled_delay(Duration::from_secs(3600))
                    .with_export_timeout(Duration::from_millis(200))
                    .build(),
            )
            .build();

        processor.on_end(new_test_span_data("stuck"));

        let start = Instant::now();
        let result = processor.force_flush();
        assert!(matches!(result, Err(TraceError::ExportTimedOut(_))));
        // The caller is released by the timeout, not by the exporter.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn batch_processor_fans_out_to_all_exporters() {
        let first = InMemorySpanExporter::default();
        let second = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::builder()
            .with_exporter(first.clone())
            .with_exporter(FailingExporter)
            .with_exporter(second.clone())
            .with_batch_config(slow_tick_config(16, 16))
            .build();

        processor.on_end(new_test_span_data("fanned"));
        let result = processor.force_flush();

        // The failing exporter surfaces in the flush result but does not
        // block delivery to the healthy ones.
        assert!(matches!(result, Err(TraceError::ExportFailed(_))));
        assert_eq!(first.get_finished_spans().unwrap().len(), 1);
        assert_eq!(second.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn batch_config_defaults() {
        temp_env::with_vars_unset(
            [
                OTEL_BSP_SCHEDULE_DELAY,
                OTEL_BSP_MAX_QUEUE_SIZE,
                OTEL_BSP_MAX_EXPORT_BATCH_SIZE,
                OTEL_BSP_EXPORT_TIMEOUT,
            ],
            || {
                let config = BatchConfig::default();
                assert_eq!(config.max_queue_size, OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT);
                assert_eq!(
                    config.scheduled_delay,
                    Duration::from_millis(OTEL_BSP_SCHEDULE_DELAY_DEFAULT)
                );
                assert_eq!(
                    config.max_export_batch_size,
                    OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT
                );
                assert_eq!(
                    config.export_timeout,
                    Duration::from_millis(OTEL_BSP_EXPORT_TIMEOUT_DEFAULT)
                );
            },
        );
    }

    #[test]
    fn batch_config_from_env() {
        temp_env::with_vars(
            [
                (OTEL_BSP_SCHEDULE_DELAY, Some("2000")),
                (OTEL_BSP_MAX_QUEUE_SIZE, Some("4096")),
                (OTEL_BSP_MAX_EXPORT_BATCH_SIZE, Some("1024")),
                (OTEL_BSP_EXPORT_TIMEOUT, Some("60000")),
            ],
            || {
                let config = BatchConfig::default();
                assert_eq!(config.scheduled_delay, Duration::from_millis(2000));
                assert_eq!(config.max_queue_size, 4096);
                assert_eq!(config.max_export_batch_size, 1024);
                assert_eq!(config.export_timeout, Duration::from_millis(60000));
            },
        );
    }

    #[test]
    fn batch_config_ignores_invalid_env_values() {
        temp_env::with_vars(
            [
                (OTEL_BSP_SCHEDULE_DELAY, Some("not-a-number")),
                (OTEL_BSP_MAX_QUEUE_SIZE, Some("-1")),
            ],
            || {
                let config = BatchConfig::default();
                assert_eq!(
                    config.scheduled_delay,
                    Duration::from_millis(OTEL_BSP_SCHEDULE_DELAY_DEFAULT)
                );
                assert_eq!(config.max_queue_size, OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT);
            },
        );
    }

    #[test]
    fn batch_size_is_clamped_to_queue_size() {
        temp_env::with_vars_unset(
            [OTEL_BSP_MAX_QUEUE_SIZE, OTEL_BSP_MAX_EXPORT_BATCH_SIZE],
            || {
                let config = BatchConfigBuilder::default()
                    .with_max_queue_size(10)
                    .with_max_export_batch_size(100)
                    .build();
                assert_eq!(config.max_export_batch_size, 10);
            },
        );
    }
}
