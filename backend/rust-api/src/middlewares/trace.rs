use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Trace id of the current request, available to handlers as an extension.
#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

/// Reuses the caller's `x-trace-id` or assigns a fresh one, and echoes it on
/// the response.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let trace_id = incoming
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });
    let header = HeaderValue::from_str(&trace_id).ok();
    if let (None, Some(value)) = (&incoming, &header) {
        request
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_ID_HEADER), value.clone());
    }

    let span = tracing::debug_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        uri = %request.uri()
    );
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response
            .headers_mut()
            .entry(HeaderName::from_static(TRACE_ID_HEADER))
            .or_insert(value);
    }

    response
}
