//! Tracewire implements a minimal distributed-tracing substrate: a span data
//! model, W3C `traceparent` context propagation, and an asynchronous batch
//! export pipeline.
//!
//! ## Getting started
//!
//! Build a [`TracerProvider`] with a [`Resource`] describing your service and
//! one or more exporters, create a [`Tracer`], and wrap units of work in
//! spans:
//!
//! ```no_run
//! use tracewire::export::OtlpHttpSpanExporter;
//! use tracewire::trace::TracerProvider;
//! use tracewire::{KeyValue, Resource};
//!
//! # fn main() -> Result<(), tracewire::TraceError> {
//! let provider = TracerProvider::builder()
//!     .with_resource(
//!         Resource::builder()
//!             .with_service_name("dice-roller-service")
//!             .with_attribute(KeyValue::new("service.version", "1.0.0"))
//!             .build(),
//!     )
//!     .with_batch_exporter(OtlpHttpSpanExporter::builder().build()?)
//!     .build();
//!
//! let tracer = provider.tracer("dice-roller");
//! let mut span = tracer.start("roll");
//! span.set_attribute(KeyValue::new("roll.value", 6))?;
//! span.end();
//!
//! provider.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crossing process boundaries
//!
//! Parenting is explicit: a [`Context`] carries the active span context and
//! is threaded by value through call chains and, via the
//! [`propagation`] module, across the wire:
//!
//! ```
//! use std::collections::HashMap;
//! use tracewire::propagation::TraceContextPropagator;
//! use tracewire::trace::TracerProvider;
//! use tracewire::Context;
//!
//! let provider = TracerProvider::builder().build();
//! let tracer = provider.tracer("client");
//! let span = tracer.start("outbound-request");
//!
//! // Client side: serialize the span context into carrier headers.
//! let propagator = TraceContextPropagator::new();
//! let mut headers = HashMap::new();
//! propagator.inject_context(&Context::with_span(&span), &mut headers);
//!
//! // Server side: restore it and parent the local span under the caller.
//! let cx = propagator.extract(&headers);
//! let server_span = tracer.start_with_context("handle-request", &cx);
//! assert_eq!(
//!     server_span.span_context().trace_id(),
//!     span.span_context().trace_id()
//! );
//! ```

#![warn(missing_docs, unreachable_pub, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod common;
mod context;
mod error;
mod resource;

pub mod export;
pub mod propagation;
pub mod trace;

pub use common::{Key, KeyValue, Value};
pub use context::Context;
pub use error::{TraceError, TraceResult};
pub use resource::{Resource, ResourceBuilder, SERVICE_NAME, SERVICE_PORT, SERVICE_VERSION};
