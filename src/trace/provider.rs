//! # Tracer provider
//!
//! The [`TracerProvider`] owns the pipeline configuration: the [`Resource`]
//! describing the emitting process, the registered span processors, and the
//! id generator. [`Tracer`]s are cheap handles into this shared state.
//!
//! Dropping the last handle shuts the pipeline down if the caller has not
//! already done so, so buffered spans are drained on process exit.

use crate::error::{TraceError, TraceResult};
use crate::resource::Resource;
use crate::trace::span_processor::SpanProcessor;
use crate::trace::{IdGenerator, RandomIdGenerator, Tracer};
use crate::export::SpanExporter;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Creator and registry of named [`Tracer`] instances.
///
/// Cloning is cheap; all clones share the same pipeline. Spans created from
/// any clone flow through the same processors.
#[derive(Clone, Debug)]
pub struct TracerProvider {
    inner: Arc<TracerProviderInner>,
}

#[derive(Debug)]
struct TracerProviderInner {
    resource: Resource,
    processors: Vec<Box<dyn SpanProcessor>>,
    id_generator: Box<dyn IdGenerator>,
    is_shutdown: AtomicBool,
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        // Last-resort drain for providers the caller never shut down.
        if !self.is_shutdown.load(Ordering::Relaxed) {
            for processor in &self.processors {
                if let Err(err) = processor.shutdown() {
                    tracing::warn!(
                        error = %err,
                        "span processor shutdown failed during provider drop"
                    );
                }
            }
        }
    }
}

impl TracerProvider {
    /// Create a builder for a new `TracerProvider`.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Create a [`Tracer`] with the given instrumentation name.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> Tracer {
        Tracer::new(name.into(), self.clone())
    }

    /// The resource describing the emitting process.
    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Relaxed)
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.inner.id_generator.as_ref()
    }

    pub(crate) fn span_processors(&self) -> &[Box<dyn SpanProcessor>] {
        &self.inner.processors
    }

    /// Flush all buffered spans through every registered processor.
    ///
    /// Blocks until each processor has confirmed the flush or reported a
    /// failure; the first error encountered is returned.
    pub fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown() {
            return Err(TraceError::AlreadyShutdown);
        }

        let mut result = Ok(());
        for processor in &self.inner.processors {
            if let Err(err) = processor.force_flush() {
                tracing::warn!(error = %err, "span processor flush failed");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Shut down the pipeline, draining buffered spans first.
    ///
    /// The first call drains and releases processor resources; spans started
    /// afterwards do not record. A second call returns
    /// [`TraceError::AlreadyShutdown`].
    pub fn shutdown(&self) -> TraceResult<()> {
        if self
            .inner
            .is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TraceError::AlreadyShutdown);
        }

        let mut result = Ok(());
        for processor in &self.inner.processors {
            if let Err(err) = processor.shutdown() {
                tracing::warn!(error = %err, "span processor shutdown failed");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

/// Builder for [`TracerProvider`].
#[derive(Debug, Default)]
pub struct Builder {
    resource: Option<Resource>,
    processors: Vec<Box<dyn SpanProcessor>>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl Builder {
    /// Set the resource describing the emitting process.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Register a pre-built span processor.
    pub fn with_span_processor<T: SpanProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Register the given exporter behind a [`SimpleSpanProcessor`].
    ///
    /// [`SimpleSpanProcessor`]: crate::trace::SimpleSpanProcessor
    pub fn with_simple_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(crate::trace::SimpleSpanProcessor::new(Box::new(exporter)))
    }

    /// Register the given exporter behind a [`BatchSpanProcessor`] with
    /// default configuration.
    ///
    /// [`BatchSpanProcessor`]: crate::trace::BatchSpanProcessor
    pub fn with_batch_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(
            crate::trace::BatchSpanProcessor::builder()
                .with_exporter(exporter)
                .build(),
        )
    }

    /// Replace the default [`RandomIdGenerator`].
    pub fn with_id_generator<T: IdGenerator + 'static>(mut self, id_generator: T) -> Self {
        self.id_generator = Some(Box::new(id_generator));
        self
    }

    /// Build the configured [`TracerProvider`].
    pub fn build(self) -> TracerProvider {
        let resource = self.resource.unwrap_or_default();
        let mut processors = self.processors;
        for processor in &mut processors {
            processor.set_resource(&resource);
        }

        TracerProvider {
            inner: Arc::new(TracerProviderInner {
                resource,
                processors,
                id_generator: self
                    .id_generator
                    .unwrap_or_else(|| Box::new(RandomIdGenerator::default())),
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}
