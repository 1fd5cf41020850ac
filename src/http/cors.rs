//! Cross-origin policy.
//!
//! Preflights (`OPTIONS` carrying `Origin`) are answered by the proxy itself.
//! Actual requests carrying `Origin` get a [`CorsGrant`] that the response
//! chain applies to whatever comes back from the upstream.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode};

use crate::config::CorsConfig;

const WILDCARD: &str = "*";

/// Precomputed CORS headers derived from [`CorsConfig`].
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    enabled: bool,
    allow_credentials: bool,
    allow_methods: HeaderValue,
    /// `None` mirrors `Access-Control-Request-Headers`.
    allow_headers: Option<HeaderValue>,
    expose_headers: HeaderValue,
    max_age: Option<HeaderValue>,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let mirror_headers = config.allowed_headers.iter().any(|h| h == WILDCARD);
        Self {
            enabled: config.enabled,
            allow_credentials: config.allow_credentials,
            allow_methods: join_header_list(&config.allowed_methods),
            allow_headers: (!mirror_headers).then(|| join_header_list(&config.allowed_headers)),
            expose_headers: join_header_list(&config.exposed_headers),
            max_age: config.max_age_secs.map(HeaderValue::from),
        }
    }

    /// A preflight is an `OPTIONS` request that carries `Origin`.
    /// `OPTIONS` without `Origin` is an ordinary request and is forwarded.
    pub fn is_preflight(&self, method: &Method, headers: &HeaderMap) -> bool {
        self.enabled && method == Method::OPTIONS && headers.contains_key(header::ORIGIN)
    }

    /// Build the direct answer to a preflight request.
    pub fn preflight_response(&self, request_headers: &HeaderMap) -> Response<Body> {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();

        if let Some(origin) = request_headers.get(header::ORIGIN) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin(origin));
        }
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());

        let allow_headers = match &self.allow_headers {
            Some(list) => list.clone(),
            None => request_headers
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static(WILDCARD)),
        };
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);

        if let Some(max_age) = &self.max_age {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
        headers.insert(
            header::VARY,
            HeaderValue::from_static("Origin, Access-Control-Request-Headers"),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    }

    /// Grant for an actual (non-preflight) request, if it is cross-origin.
    pub fn grant(&self, request_headers: &HeaderMap) -> Option<CorsGrant> {
        if !self.enabled {
            return None;
        }
        let origin = request_headers.get(header::ORIGIN)?;
        Some(CorsGrant {
            allow_origin: self.allow_origin(origin),
            allow_credentials: self.allow_credentials,
            expose_headers: self.expose_headers.clone(),
        })
    }

    fn allow_origin(&self, origin: &HeaderValue) -> HeaderValue {
        if self.allow_credentials {
            origin.clone()
        } else {
            HeaderValue::from_static(WILDCARD)
        }
    }
}

/// CORS headers owed to one cross-origin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsGrant {
    allow_origin: HeaderValue,
    allow_credentials: bool,
    expose_headers: HeaderValue,
}

impl CorsGrant {
    /// Add the grant's headers. Values the upstream already set are left alone.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers
            .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .or_insert_with(|| self.allow_origin.clone());
        if self.allow_credentials {
            headers
                .entry(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .or_insert_with(|| HeaderValue::from_static("true"));
        }
        headers
            .entry(header::ACCESS_CONTROL_EXPOSE_HEADERS)
            .or_insert_with(|| self.expose_headers.clone());

        let varies_on_origin = headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(',').any(|item| item.trim().eq_ignore_ascii_case("origin")));
        if !varies_on_origin {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
}

fn join_header_list(items: &[String]) -> HeaderValue {
    HeaderValue::from_str(&items.join(",")).unwrap_or_else(|_| HeaderValue::from_static(WILDCARD))
}
