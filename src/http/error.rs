//! Upstream failure translation.
//!
//! Every upstream I/O failure is local to one exchange. When no response head
//! has reached the client yet, the failure becomes a synthesized 502 with a
//! JSON body naming the target.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Failures of a single forwarded exchange.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Connection refused, DNS failure, reset before a response head arrived.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    /// The WebSocket handshake with the upstream could not be completed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
    /// The outbound request could not be built from the inbound one.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Unreachable(_) => "unreachable",
            ProxyError::Handshake(_) => "handshake",
            ProxyError::InvalidRequest(_) => "invalid_request",
        }
    }

    fn message(&self) -> &str {
        match self {
            ProxyError::Unreachable(m) | ProxyError::Handshake(m) | ProxyError::InvalidRequest(m) => m,
        }
    }

    /// Render the client-visible error for this failure against `target`.
    pub fn into_response_for(self, target: &str) -> Response {
        let body = ErrorBody {
            error: "Proxy Error",
            message: self.message().to_string(),
            target: target.to_string(),
            hint: Some(format!("Make sure the upstream service is running at {}", target)),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// JSON body of a synthesized error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Flatten an error and its sources into one line.
pub(crate) fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_body_has_target_and_hint() {
        let response = ProxyError::Unreachable("connection refused".into())
            .into_response_for("http://127.0.0.1:3845");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Proxy Error");
        assert_eq!(body["message"], "connection refused");
        assert_eq!(body["target"], "http://127.0.0.1:3845");
        assert_eq!(
            body["hint"],
            "Make sure the upstream service is running at http://127.0.0.1:3845"
        );
    }

    #[test]
    fn describe_walks_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        assert_eq!(describe(&outer), "refused");
    }
}
