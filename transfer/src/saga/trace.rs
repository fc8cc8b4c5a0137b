//! W3C trace context propagation across the saga's asynchronous hops.
//!
//! The HTTP request span's context travels to workers as a
//! `traceparent` process variable, not as a header, because the
//! workflow engine is the transport in between. [`current_traceparent`] folds
//! the active span into that variable when a process starts;
//! [`job_span`] unfolds it on the worker side so every job span is a
//! child of the request that started the saga. An absent, blank, or
//! malformed token simply means no parent: the job span starts a fresh
//! trace instead of failing the job.

use crate::saga::engine::Job;
use opentelemetry::Context;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde_json::Value;
use std::collections::HashMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Process variable carrying the W3C `traceparent` token.
pub const TRACEPARENT_VARIABLE: &str = "traceparent";

/// Single-entry carrier over one `traceparent` token.
struct TraceparentCarrier<'a>(&'a str);

impl Extractor for TraceparentCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        (key == TRACEPARENT_VARIABLE).then_some(self.0)
    }

    fn keys(&self) -> Vec<&str> {
        vec![TRACEPARENT_VARIABLE]
    }
}

/// Parse a `traceparent` token into a parent context.
///
/// Returns `None` for an absent, blank, or malformed token, or one
/// whose span context is invalid (such as an all-zero trace id).
#[must_use]
pub fn extract_trace_context(traceparent: Option<&str>) -> Option<Context> {
    let token = traceparent?.trim();
    if token.is_empty() {
        return None;
    }

    let context = TraceContextPropagator::new().extract(&TraceparentCarrier(token));
    let valid = context.span().span_context().is_valid();
    valid.then_some(context)
}

/// The active span's context as a `traceparent` token.
///
/// Returns `None` when no valid trace is active (no subscriber, or a
/// span outside any sampled trace).
#[must_use]
pub fn current_traceparent() -> Option<String> {
    let context = Span::current().context();
    let mut carrier: HashMap<String, String> = HashMap::new();
    TraceContextPropagator::new().inject_context(&context, &mut carrier);

    carrier
        .remove(TRACEPARENT_VARIABLE)
        .filter(|token| !token.is_empty())
}

/// Consumer span for one job delivery, parented by the job's
/// `traceparent` variable when it carries a valid token.
///
/// `otel.status_code` starts empty; the worker records `ERROR` on
/// failure. The span closes exactly once, when the instrumented future
/// finishes.
#[must_use]
pub fn job_span(job: &Job, transfer_id: &str) -> Span {
    let span = tracing::info_span!(
        "saga.job",
        otel.kind = "consumer",
        otel.status_code = tracing::field::Empty,
        saga.job.r#type = %job.job_type,
        transfer.id = %transfer_id,
        process.instance.key = job.process_instance_key,
    );

    let token = job
        .variables
        .get(TRACEPARENT_VARIABLE)
        .and_then(Value::as_str);
    if let Some(parent) = extract_trace_context(token) {
        span.set_parent(parent);
    }

    span
}
