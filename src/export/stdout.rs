//! An exporter that writes spans to stdout in a human-readable layout.

use crate::error::TraceError;
use crate::export::{ExportResult, SpanData, SpanExporter};
use crate::resource::Resource;
use chrono::{DateTime, Utc};
use core::fmt;
use futures_util::future::BoxFuture;
use std::sync::atomic;

/// A span exporter that writes spans to stdout on export.
///
/// Intended for local development and demos; the output format is not stable
/// and not meant to be parsed. The resource block is printed once, before the
/// first batch.
pub struct StdoutSpanExporter {
    resource: Resource,
    is_shutdown: atomic::AtomicBool,
    resource_emitted: bool,
}

impl fmt::Debug for StdoutSpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StdoutSpanExporter")
    }
}

impl Default for StdoutSpanExporter {
    fn default() -> Self {
        StdoutSpanExporter {
            resource: Resource::default(),
            is_shutdown: atomic::AtomicBool::new(false),
            resource_emitted: false,
        }
    }
}

impl StdoutSpanExporter {
    /// Create a new stdout exporter.
    pub fn new() -> Self {
        StdoutSpanExporter::default()
    }
}

impl SpanExporter for StdoutSpanExporter {
    /// Write spans to stdout.
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown.load(atomic::Ordering::SeqCst) {
            return Box::pin(std::future::ready(Err(TraceError::from(
                "exporter is shut down",
            ))));
        }

        if !self.resource_emitted {
            self.resource_emitted = true;
            println!("Resource");
            self.resource.iter().for_each(|kv| {
                println!("\t {}={:?}", kv.key, kv.value);
            });
        }
        print_spans(batch);

        Box::pin(std::future::ready(Ok(())))
    }

    fn shutdown(&mut self) {
        self.is_shutdown.store(true, atomic::Ordering::SeqCst);
    }

    fn set_resource(&mut self, res: &Resource) {
        self.resource = res.clone();
    }
}

fn print_spans(batch: Vec<SpanData>) {
    for (i, span) in batch.into_iter().enumerate() {
        println!("Span #{}", i);
        println!("\t Name: {:?}", &span.name);
        println!("\t TraceId: {}", &span.span_context.trace_id());
        println!("\t SpanId: {}", &span.span_context.span_id());
        println!("\t ParentSpanId: {}", &span.parent_span_id);

        let datetime: DateTime<Utc> = span.start_time.into();
        println!(
            "\t Start time: {}",
            datetime.format("%Y-%m-%d %H:%M:%S%.6f")
        );
        let datetime: DateTime<Utc> = span.end_time.into();
        println!("\t End time: {}", datetime.format("%Y-%m-%d %H:%M:%S%.6f"));
        println!("\t Status: {:?}", &span.status);

        let mut print_header = true;
        for kv in span.attributes.iter() {
            if print_header {
                println!("\t Attributes:");
                print_header = false;
            }
            println!("\t\t {}: {:?}", kv.key, kv.value);
        }

        print_header = true;
        for event in span.events.iter() {
            if print_header {
                println!("\t Events:");
                print_header = false;
            }
            println!("\t\t Name: {:?}", event.name);
            let datetime: DateTime<Utc> = event.timestamp.into();
            println!(
                "\t\t Timestamp: {}",
                datetime.format("%Y-%m-%d %H:%M:%S%.6f")
            );
            let mut print_header_event_attributes = true;
            for kv in event.attributes.iter() {
                if print_header_event_attributes {
                    println!("\t\t Attributes:");
                    print_header_event_attributes = false;
                }
                println!("\t\t\t {}: {:?}", kv.key, kv.value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_executor::block_on;

    #[test]
    fn export_after_shutdown_fails() {
        let mut exporter = StdoutSpanExporter::new();
        exporter.shutdown();
        assert!(block_on(exporter.export(Vec::new())).is_err());
    }
}
