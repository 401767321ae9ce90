//! An exporter that ships spans to an OTLP collector over HTTP/JSON.

use crate::error::{TraceError, TraceResult};
use crate::export::{ExportResult, SpanData, SpanExporter};
use crate::resource::Resource;
use crate::trace::{SpanId, Status};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Target to which the exporter sends spans, e.g. `http://localhost:4318/v1/traces`.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Base collector endpoint; `/v1/traces` is appended for span export.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Default traces endpoint of a local collector.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT: &str = "http://localhost:4318/v1/traces";
/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A span exporter that encodes batches as OTLP/JSON and posts them to a
/// collector endpoint.
///
/// Delivery is at-most-once: a failed request is reported to the caller and
/// the batch is dropped. The per-request time bound is enforced by the HTTP
/// client's timeout, so a stalled collector cannot hang the export thread
/// longer than that.
#[derive(Debug)]
pub struct OtlpHttpSpanExporter {
    client: reqwest::blocking::Client,
    endpoint: String,
    resource: Resource,
    is_shutdown: AtomicBool,
}

impl OtlpHttpSpanExporter {
    /// Create a builder with the default endpoint and timeout.
    pub fn builder() -> OtlpHttpSpanExporterBuilder {
        OtlpHttpSpanExporterBuilder::default()
    }
}

/// Builder for [`OtlpHttpSpanExporter`].
///
/// Unset values fall back to the `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT` or
/// `OTEL_EXPORTER_OTLP_ENDPOINT` environment variables, then to the local
/// collector default.
#[derive(Debug, Default)]
pub struct OtlpHttpSpanExporterBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl OtlpHttpSpanExporterBuilder {
    /// Set the full traces endpoint, e.g. `http://collector:4318/v1/traces`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the per-request timeout. Defaults to 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the exporter, constructing the underlying HTTP client.
    pub fn build(self) -> TraceResult<OtlpHttpSpanExporter> {
        let endpoint = self.endpoint.unwrap_or_else(resolve_endpoint);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|err| TraceError::Other(format!("failed to build http client: {err}")))?;

        Ok(OtlpHttpSpanExporter {
            client,
            endpoint,
            resource: Resource::default(),
            is_shutdown: AtomicBool::new(false),
        })
    }
}

fn resolve_endpoint() -> String {
    if let Ok(endpoint) = env::var(OTEL_EXPORTER_OTLP_TRACES_ENDPOINT) {
        return endpoint;
    }
    if let Ok(base) = env::var(OTEL_EXPORTER_OTLP_ENDPOINT) {
        return format!("{}/v1/traces", base.trim_end_matches('/'));
    }
    OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT.to_string()
}

impl SpanExporter for OtlpHttpSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Box::pin(std::future::ready(Err(TraceError::Other(
                "exporter is shut down".into(),
            ))));
        }

        let request = ExportTraceServiceRequest::new(&self.resource, batch);
        let result = serde_json::to_vec(&request)
            .map_err(|err| TraceError::Other(format!("failed to encode spans: {err}")))
            .and_then(|body| {
                self.client
                    .post(&self.endpoint)
                    .header("Content-Type", "application/json")
                    .body(body)
                    .send()
                    .map_err(|err| TraceError::ExportFailed(err.to_string()))
            })
            .and_then(|response| {
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(TraceError::ExportFailed(format!(
                        "collector returned {}",
                        response.status()
                    )))
                }
            });

        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.is_shutdown.store(true, Ordering::SeqCst);
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}

// OTLP/JSON wire representation. Ids are lowercase hex strings and 64-bit
// integers travel as decimal strings, per the protobuf JSON mapping.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportTraceServiceRequest {
    resource_spans: Vec<ResourceSpans>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSpans {
    resource: OtlpResource,
    scope_spans: Vec<ScopeSpans>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpResource {
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopeSpans {
    scope: OtlpScope,
    spans: Vec<OtlpSpan>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpScope {
    name: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpSpan {
    trace_id: String,
    span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_span_id: Option<String>,
    name: String,
    start_time_unix_nano: String,
    end_time_unix_nano: String,
    attributes: Vec<OtlpKeyValue>,
    events: Vec<OtlpEvent>,
    status: OtlpStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpEvent {
    time_unix_nano: String,
    name: String,
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    code: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpKeyValue {
    key: String,
    value: OtlpAnyValue,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum OtlpAnyValue {
    BoolValue(bool),
    IntValue(String),
    DoubleValue(f64),
    StringValue(String),
}

impl From<&crate::common::KeyValue> for OtlpKeyValue {
    fn from(kv: &crate::common::KeyValue) -> Self {
        use crate::common::Value;
        let value = match &kv.value {
            Value::Bool(v) => OtlpAnyValue::BoolValue(*v),
            Value::I64(v) => OtlpAnyValue::IntValue(v.to_string()),
            Value::F64(v) => OtlpAnyValue::DoubleValue(*v),
            Value::String(v) => OtlpAnyValue::StringValue(v.to_string()),
        };
        OtlpKeyValue {
            key: kv.key.as_str().to_string(),
            value,
        }
    }
}

fn unix_nanos(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .to_string()
}

impl ExportTraceServiceRequest {
    fn new(resource: &Resource, batch: Vec<SpanData>) -> Self {
        let spans = batch
            .into_iter()
            .map(|span| OtlpSpan {
                trace_id: format!("{:032x}", span.span_context.trace_id()),
                span_id: format!("{:016x}", span.span_context.span_id()),
                parent_span_id: (span.parent_span_id != SpanId::INVALID)
                    .then(|| format!("{:016x}", span.parent_span_id)),
                name: span.name.into_owned(),
                start_time_unix_nano: unix_nanos(span.start_time),
                end_time_unix_nano: unix_nanos(span.end_time),
                attributes: span.attributes.iter().map(OtlpKeyValue::from).collect(),
                events: span
                    .events
                    .iter()
                    .map(|event| OtlpEvent {
                        time_unix_nano: unix_nanos(event.timestamp),
                        name: event.name.to_string(),
                        attributes: event.attributes.iter().map(OtlpKeyValue::from).collect(),
                    })
                    .collect(),
                status: match &span.status {
                    Status::Unset => OtlpStatus {
                        message: None,
                        code: 0,
                    },
                    Status::Ok => OtlpStatus {
                        message: None,
                        code: 1,
                    },
                    Status::Error { description } => OtlpStatus {
                        message: Some(description.to_string()),
                        code: 2,
                    },
                },
            })
            .collect();

        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: OtlpResource {
                    attributes: resource.iter().map(OtlpKeyValue::from).collect(),
                },
                scope_spans: vec![ScopeSpans {
                    scope: OtlpScope {
                        name: env!("CARGO_PKG_NAME"),
                    },
                    spans,
                }],
            }],
        }
    }
}
