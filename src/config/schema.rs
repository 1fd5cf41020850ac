//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root configuration for the session proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// The single upstream every exchange is forwarded to.
    pub upstream: UpstreamConfig,

    /// Cross-origin policy applied by the ingress filter.
    pub cors: CorsConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Socket address string the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listener.bind_host, self.listener.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 6969,
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream base URL (e.g., "http://127.0.0.1:3845").
    pub url: String,

    /// How the `Host` header is handled on the way upstream.
    pub host_policy: HeaderPolicy,

    /// Value of the `X-Proxied-By` marker added to every response.
    pub marker: String,

    /// Skip certificate verification for `https`/`wss` upstreams.
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3845".to_string(),
            host_policy: HeaderPolicy::default(),
            marker: "session-proxy".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// Host header policy for forwarded requests.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Keep the client-supplied `Host` (upstream does host-based session logic).
    #[default]
    #[serde(alias = "preserve")]
    PreserveHost,
    /// Replace `Host` with the upstream authority.
    #[serde(alias = "rewrite")]
    RewriteHost,
}

impl FromStr for HeaderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "preserve" | "preserve_host" => Ok(HeaderPolicy::PreserveHost),
            "rewrite" | "rewrite_host" => Ok(HeaderPolicy::RewriteHost),
            other => Err(format!(
                "unknown host policy '{}' (expected 'preserve' or 'rewrite')",
                other
            )),
        }
    }
}

impl fmt::Display for HeaderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderPolicy::PreserveHost => f.write_str("preserve_host"),
            HeaderPolicy::RewriteHost => f.write_str("rewrite_host"),
        }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS handling. When disabled, preflights are forwarded like any request.
    pub enabled: bool,

    /// Send `Access-Control-Allow-Credentials: true` and echo the origin.
    pub allow_credentials: bool,

    /// Methods advertised in preflight responses.
    pub allowed_methods: Vec<String>,

    /// Headers advertised in preflight responses ("*" mirrors the requested ones).
    pub allowed_headers: Vec<String>,

    /// Headers exposed to scripts on actual responses.
    pub exposed_headers: Vec<String>,

    /// Optional `Access-Control-Max-Age` for preflight caching.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_credentials: true,
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH", "HEAD"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["*".to_string()],
            exposed_headers: vec!["*".to_string()],
            max_age_secs: None,
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound on waiting for upgraded tunnels after the listener closed.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
