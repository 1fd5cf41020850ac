//! Upstream target resolution.
//!
//! The configured upstream URL is parsed once at startup into the pieces the
//! forwarding engine needs for every exchange: scheme, authority and base path.

use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderValue, Uri};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Reasons an upstream URL cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported upstream scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
    #[error("upstream url '{0}' has no host")]
    MissingHost(String),
    #[error("upstream authority '{0}' is not valid")]
    InvalidAuthority(String),
}

/// The single upstream every exchange is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    url: String,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl UpstreamTarget {
    /// Parse an upstream URL. `ws://` and `wss://` are accepted as aliases for
    /// `http://` and `https://`.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = Url::parse(raw).map_err(|e| TargetError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "http" | "ws" => Scheme::HTTP,
            "https" | "wss" => Scheme::HTTPS,
            other => return Err(TargetError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .ok_or_else(|| TargetError::MissingHost(raw.to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = authority
            .parse::<Authority>()
            .map_err(|_| TargetError::InvalidAuthority(authority.clone()))?;

        Ok(Self {
            url: raw.to_string(),
            scheme,
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// The URL as configured, used in health reports and error bodies.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Whether connections to the upstream are wrapped in TLS.
    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    /// Host to dial, without IPv6 brackets.
    pub fn host(&self) -> &str {
        self.authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
    }

    /// Port to dial, defaulting by scheme.
    pub fn port(&self) -> u16 {
        match self.authority.port_u16() {
            Some(port) => port,
            None if self.is_tls() => 443,
            None => 80,
        }
    }

    /// Value for `Host` when the policy rewrites it.
    pub fn host_header(&self) -> HeaderValue {
        // Authority is a validated subset of visible ASCII.
        HeaderValue::from_str(self.authority.as_str())
            .unwrap_or_else(|_| HeaderValue::from_static("localhost"))
    }

    /// Absolute upstream URI for an inbound path and query.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        let path_and_query = if path_and_query.starts_with('/') {
            format!("{}{}", self.base_path, path_and_query)
        } else {
            format!("{}/{}", self.base_path, path_and_query)
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
