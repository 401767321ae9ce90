//! Errors returned by the tracing substrate.
//!
//! Tracing is strictly best-effort: nothing in this module is ever raised
//! into application request handling. Export failures are consumed by the
//! span processors and surfaced only through internal diagnostics; the
//! variants below are reported to callers of the lifecycle and span APIs.

use std::time::Duration;
use thiserror::Error;

/// Result type returned by fallible tracing operations.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by the trace API and pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Mutation of a span that has already been ended (or was never
    /// recording). Caller misuse, reported rather than silently dropped.
    #[error("span has already ended or is not recording")]
    SpanAlreadyEnded,

    /// The provider or processor was already shut down.
    #[error("already shut down")]
    AlreadyShutdown,

    /// A batch could not be delivered to the collector.
    #[error("export failed: {0}")]
    ExportFailed(String),

    /// Export did not complete within the allotted time.
    #[error("export timed out after {0:?}")]
    ExportTimedOut(Duration),

    /// Other types of failures not covered by the variants above.
    #[error("{0}")]
    Other(String),
}

impl From<String> for TraceError {
    fn from(msg: String) -> Self {
        TraceError::Other(msg)
    }
}

impl From<&'static str> for TraceError {
    fn from(msg: &'static str) -> Self {
        TraceError::Other(msg.into())
    }
}
