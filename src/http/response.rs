//! Response handling and transformation.
//!
//! The upstream response passes through an ordered chain of pure steps:
//! 1. status, headers and body taken verbatim (every `Set-Cookie` kept as its own entry)
//! 2. CORS grant for cross-origin callers, without overriding upstream values
//! 3. marker header appended last
//!
//! The body is never buffered; streaming responses reach the client as they arrive.

use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;

use crate::http::cors::CorsGrant;

/// Marker identifying responses that passed through the proxy.
pub const X_PROXIED_BY: HeaderName = HeaderName::from_static("x-proxied-by");

/// Apply the proxy's response rules to an upstream (or synthesized) response.
pub fn decorate(mut response: Response, grant: Option<&CorsGrant>, marker: &HeaderValue) -> Response {
    if let Some(grant) = grant {
        grant.apply(response.headers_mut());
    }
    response.headers_mut().append(X_PROXIED_BY, marker.clone());
    response
}
