//! Health endpoint answered by the proxy itself.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::config::UpstreamTarget;

/// Path answered directly by the ingress filter, for every method.
pub const HEALTH_PATH: &str = "/health";

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub status: String,
    pub target: String,
    pub port: u16,
    pub timestamp: String,
}

impl HealthReport {
    /// `target` is reported exactly as error bodies report it.
    pub fn current(target: &UpstreamTarget, port: u16) -> Self {
        Self {
            status: "ok".to_string(),
            target: target.as_str().to_string(),
            port,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub fn health_response(target: &UpstreamTarget, port: u16) -> Response {
    (StatusCode::OK, Json(HealthReport::current(target, port))).into_response()
}
