//! # W3C Trace Context Propagator
//!

use crate::context::Context;
use crate::propagation::{Extractor, Injector};
use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId};

const SUPPORTED_VERSION: u8 = 0;
const MAX_VERSION: u8 = 254;
const TRACEPARENT_HEADER: &str = "traceparent";

/// Propagates `SpanContext`s in [W3C TraceContext] format under the
/// `traceparent` header.
///
/// The `traceparent` header represents the incoming request in a tracing
/// system in a common format, understood by all vendors. Here's an example:
///
/// `traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`
///
/// It has four fields:
///
///    - version
///    - trace-id
///    - parent-id
///    - trace-flags
///
/// Extraction is deliberately forgiving: an absent or malformed header
/// yields an empty [`Context`], never an error, so a single misbehaving
/// upstream cannot break request handling downstream.
///
/// [W3C TraceContext]: https://www.w3.org/TR/trace-context/
#[derive(Clone, Debug, Default)]
pub struct TraceContextPropagator {
    _private: (),
}

/// Hex fields must already be lowercase and exactly as wide as the binary
/// form requires.
fn is_lowercase_hex(part: &str, width: usize) -> bool {
    part.len() == width
        && part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

impl TraceContextPropagator {
    /// Create a new `TraceContextPropagator`.
    pub fn new() -> Self {
        TraceContextPropagator { _private: () }
    }

    /// Header names this propagator reads and writes.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(TRACEPARENT_HEADER)
    }

    /// Extract a span context from a w3c trace-context header.
    fn extract_span_context(&self, extractor: &dyn Extractor) -> Result<SpanContext, ()> {
        let header_value = extractor.get(TRACEPARENT_HEADER).unwrap_or("").trim();
        let parts = header_value.split_terminator('-').collect::<Vec<&str>>();
        // Ensure parts are not out of range.
        if parts.len() < 4 {
            return Err(());
        }

        // Ensure version is within range, for version 0 there must be 4 parts.
        if !is_lowercase_hex(parts[0], 2) {
            return Err(());
        }
        let version = u8::from_str_radix(parts[0], 16).map_err(|_| ())?;
        if version > MAX_VERSION || version == 0 && parts.len() != 4 {
            return Err(());
        }

        // Parse trace id section
        if !is_lowercase_hex(parts[1], 32) {
            return Err(());
        }
        let trace_id = TraceId::from_hex(parts[1]).map_err(|_| ())?;

        // Parse span id section
        if !is_lowercase_hex(parts[2], 16) {
            return Err(());
        }
        let span_id = SpanId::from_hex(parts[2]).map_err(|_| ())?;

        // Parse trace flags section
        if !is_lowercase_hex(parts[3], 2) {
            return Err(());
        }
        let opts = u8::from_str_radix(parts[3], 16).map_err(|_| ())?;

        // Build trace flags clearing all flags other than the trace-context
        // supported sampling bit.
        let trace_flags = TraceFlags::new(opts) & TraceFlags::SAMPLED;

        let span_context = SpanContext::new(trace_id, span_id, trace_flags, true);

        // Ensure span is valid
        if !span_context.is_valid() {
            return Err(());
        }

        Ok(span_context)
    }

    /// Encode the span context active in `cx` into the `Injector`.
    ///
    /// A context without a valid span context injects nothing.
    pub fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        if let Some(span_context) = cx.span_context().filter(|sc| sc.is_valid()) {
            let header_value = format!(
                "{:02x}-{}-{}-{:02x}",
                SUPPORTED_VERSION,
                span_context.trace_id(),
                span_context.span_id(),
                span_context.trace_flags() & TraceFlags::SAMPLED
            );
            injector.set(TRACEPARENT_HEADER, header_value);
        }
    }

    /// Retrieve an encoded `SpanContext` from the `Extractor` and return it
    /// in a new [`Context`]. If no `SpanContext` was retrieved OR if the
    /// retrieved one is invalid then an empty `Context` is returned.
    pub fn extract(&self, extractor: &dyn Extractor) -> Context {
        self.extract_with_context(&Context::new(), extractor)
    }

    /// Like [`extract`](TraceContextPropagator::extract), but layered over an
    /// existing context, which is returned unchanged when the carrier holds
    /// nothing usable.
    pub fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.extract_span_context(extractor)
            .map(Context::with_remote_span_context)
            .unwrap_or_else(|_| cx.clone())
    }
}
