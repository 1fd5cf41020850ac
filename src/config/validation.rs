//! Configuration validation.
//!
//! Serde handles syntax; this module checks that values are usable:
//! the upstream URL resolves to a target, CORS lists hold valid HTTP tokens,
//! and the marker fits in a header value. All errors are reported, not just the first.

use axum::http::{HeaderName, HeaderValue, Method};
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::target::{TargetError, UpstreamTarget};

/// A single semantic problem in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Upstream(#[from] TargetError),
    #[error("marker '{0}' is not a valid header value")]
    InvalidMarker(String),
    #[error("cors method '{0}' is not a valid HTTP method")]
    InvalidMethod(String),
    #[error("cors header '{0}' is not a valid header name")]
    InvalidHeaderName(String),
    #[error("cors.allowed_methods must not be empty")]
    NoMethods,
    #[error("metrics address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = UpstreamTarget::parse(&config.upstream.url) {
        errors.push(e.into());
    }

    if config.upstream.marker.is_empty() || HeaderValue::from_str(&config.upstream.marker).is_err() {
        errors.push(ValidationError::InvalidMarker(config.upstream.marker.clone()));
    }

    if config.cors.enabled {
        if config.cors.allowed_methods.is_empty() {
            errors.push(ValidationError::NoMethods);
        }
        for method in &config.cors.allowed_methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod(method.clone()));
            }
        }
        for name in config.cors.allowed_headers.iter().chain(&config.cors.exposed_headers) {
            if name != "*" && HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidHeaderName(name.clone()));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.upstream.url = "gopher://old.example".into();
        config.upstream.marker = "bad\nmarker".into();
        config.cors.allowed_methods = vec!["GET".into(), "NOT A METHOD".into()];
        config.cors.exposed_headers = vec!["x ok".into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidMethod("NOT A METHOD".into())));
        assert!(errors.contains(&ValidationError::InvalidHeaderName("x ok".into())));
    }

    #[test]
    fn cors_lists_ignored_when_disabled() {
        let mut config = ProxyConfig::default();
        config.cors.enabled = false;
        config.cors.allowed_methods.clear();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
