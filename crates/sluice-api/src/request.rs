//! Request correlation ids.

use axum::extract::{FromRequestParts, Request};
use axum::http::header::HeaderMap;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::convert::Infallible;
use std::fmt;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Id stamped on every log line and error body of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_REQUEST_ID_LEN
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return None;
    }
    Some(trimmed.to_string())
}

fn header_id(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(sanitize_request_id)
}

/// Request-scoped id first, then the inbound correlation headers, else a new
/// UUID.
pub fn extract_request_id(extensions: &Extensions, headers: &HeaderMap) -> RequestId {
    if let Some(id) = extensions.get::<RequestId>() {
        return id.clone();
    }
    header_id(headers, REQUEST_ID_HEADER)
        .or_else(|| header_id(headers, CORRELATION_ID_HEADER))
        .map(RequestId)
        .unwrap_or_else(RequestId::generate)
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(extract_request_id(&parts.extensions, &parts.headers))
    }
}

/// Stamp a [`RequestId`] into the request extensions and echo it as the
/// `x-request-id` response header.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = extract_request_id(req.extensions(), req.headers());
    req.extensions_mut().insert(id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().entry(REQUEST_ID_HEADER).or_insert(value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn extension_wins_over_headers() {
        let mut extensions = Extensions::new();
        extensions.insert(RequestId::new("from-ctx"));
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(extract_request_id(&extensions, &headers).as_str(), "from-ctx");
    }

    #[test]
    fn correlation_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, HeaderValue::from_static("corr-1"));
        assert_eq!(extract_request_id(&Extensions::new(), &headers).as_str(), "corr-1");
    }

    #[test]
    fn hostile_header_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("a b<script>"));
        let id = extract_request_id(&Extensions::new(), &headers);
        assert_ne!(id.as_str(), "a b<script>");
        assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
    }

    #[tokio::test]
    async fn middleware_propagates_id() {
        let app = Router::new()
            .route("/", get(|id: RequestId| async move { id.to_string() }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"req-42");
    }
}
