//! Distributed-trace context propagation over transport headers.
//!
//! The propagator is an explicit value handed to the components that need
//! it, so no process-wide tracer provider has to be installed. The default
//! wire format is W3C Trace Context (`traceparent` / `tracestate`).

use std::collections::HashMap;
use std::sync::Arc;

use opentelemetry::Context;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry_sdk::propagation::TraceContextPropagator;

use crate::types::Headers;

/// Opaque trace context carried alongside a message.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    cx: Context,
}

impl TraceContext {
    /// Context continuing a remote span.
    pub fn from_span_context(span_context: SpanContext) -> Self {
        Self {
            cx: Context::new().with_remote_span_context(span_context),
        }
    }

    /// Whether a valid upstream trace was found.
    pub fn is_active(&self) -> bool {
        self.cx.span().span_context().is_valid()
    }

    /// Hex trace id of the upstream trace.
    pub fn trace_id(&self) -> Option<String> {
        let span = self.cx.span();
        let span_context = span.span_context();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    }

    pub fn context(&self) -> &Context {
        &self.cx
    }
}

/// Extracts and injects [`TraceContext`]s.
#[derive(Clone)]
pub struct Propagator {
    inner: Arc<dyn TextMapPropagator + Send + Sync>,
}

impl Propagator {
    pub fn new(propagator: impl TextMapPropagator + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(propagator),
        }
    }

    /// W3C Trace Context propagator.
    pub fn w3c() -> Self {
        Self::new(TraceContextPropagator::new())
    }

    /// Build a trace context from the string-valued headers.
    ///
    /// Non-string values are skipped. Missing or malformed trace headers
    /// yield a context without an active trace.
    pub fn extract(&self, headers: &Headers) -> TraceContext {
        let carrier: HashMap<String, String> = headers
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_text()
                    .map(|text| (key.to_ascii_lowercase(), text.to_string()))
            })
            .collect();

        TraceContext {
            cx: self.inner.extract_with_context(&Context::new(), &carrier),
        }
    }

    /// Serialize a trace context into a flat header map.
    pub fn inject(&self, trace: &TraceContext) -> HashMap<String, String> {
        let mut carrier = HashMap::new();
        self.inner.inject_context(&trace.cx, &mut carrier);
        carrier
    }
}

impl Default for Propagator {
    fn default() -> Self {
        Self::w3c()
    }
}

impl std::fmt::Debug for Propagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Propagator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{SpanId, TraceFlags, TraceId, TraceState};

    use super::*;
    use crate::types::HeaderValue;

    const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn test_extract_valid_traceparent() {
        let mut headers = Headers::new();
        headers.insert("traceparent".to_string(), TRACEPARENT.into());

        let trace = Propagator::w3c().extract(&headers);
        assert!(trace.is_active());
        assert_eq!(
            trace.trace_id().as_deref(),
            Some("4bf92f3577b34da6a3ce929d0e0e4736")
        );
    }

    #[test]
    fn test_extract_without_headers_has_no_trace() {
        let trace = Propagator::w3c().extract(&Headers::new());
        assert!(!trace.is_active());
        assert_eq!(trace.trace_id(), None);
    }

    #[test]
    fn test_extract_ignores_non_string_values() {
        let mut headers = Headers::new();
        headers.insert("traceparent".to_string(), HeaderValue::Integer(1));
        assert!(!Propagator::w3c().extract(&headers).is_active());
    }

    #[test]
    fn test_extract_malformed_traceparent() {
        let mut headers = Headers::new();
        headers.insert("traceparent".to_string(), "garbage".into());
        assert!(!Propagator::w3c().extract(&headers).is_active());
    }

    #[test]
    fn test_extract_mixed_case_key() {
        let mut headers = Headers::new();
        headers.insert("Traceparent".to_string(), TRACEPARENT.into());
        assert!(Propagator::w3c().extract(&headers).is_active());
    }

    #[test]
    fn test_inject_round_trips_through_extract() {
        let span_context = SpanContext::new(
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap(),
            SpanId::from_hex("b7ad6b7169203331").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let propagator = Propagator::w3c();
        let injected = propagator.inject(&TraceContext::from_span_context(span_context));
        assert_eq!(
            injected.get("traceparent").map(String::as_str),
            Some("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01")
        );

        let headers: Headers = injected
            .into_iter()
            .map(|(k, v)| (k, HeaderValue::Text(v)))
            .collect();
        assert_eq!(
            propagator.extract(&headers).trace_id().as_deref(),
            Some("0af7651916cd43dd8448eb211c80319c")
        );
    }

    #[test]
    fn test_inject_empty_context_writes_nothing() {
        assert!(Propagator::w3c().inject(&TraceContext::default()).is_empty());
    }
}
