//! Forwarding engine for ordinary HTTP exchanges.
//!
//! # Responsibilities
//! - Derive the outbound request from the inbound one (target URI, header rule)
//! - Send it to the single upstream and hand back the response unbuffered
//! - Translate transport failures into [`ProxyError`]
//!
//! # Header rule
//! Every inbound header is copied, all values in order, except `Host`, which
//! follows [`HeaderPolicy`]. `Cookie` is never touched.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, Uri, Version};
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use rustls::ClientConfig;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

use crate::config::{HeaderPolicy, UpstreamTarget};
use crate::http::error::{describe, ProxyError};

/// Relays exchanges to the configured upstream.
#[derive(Clone)]
pub struct Forwarder {
    target: UpstreamTarget,
    policy: HeaderPolicy,
    client: Client<HttpsConnector<HttpConnector>, Body>,
    tls: TlsConnector,
}

impl Forwarder {
    /// `tls` is only used when the target scheme is `https`/`wss`.
    pub fn new(target: UpstreamTarget, policy: HeaderPolicy, tls: Arc<ClientConfig>) -> Self {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(ClientConfig::clone(&tls))
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            target,
            policy,
            client,
            tls: TlsConnector::from(tls),
        }
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// Connector for dedicated TLS connections to the upstream.
    pub fn tls_connector(&self) -> &TlsConnector {
        &self.tls
    }

    /// Build the outbound request. The body is moved, not read.
    pub fn outbound_request(&self, inbound: Request<Body>) -> Result<Request<Body>, ProxyError> {
        let (parts, body) = inbound.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri = self
            .target
            .uri_for(path_and_query)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        let headers = outbound_headers(parts.headers, &parts.uri, self.policy, &self.target);

        let mut outbound = Request::new(body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = uri;
        *outbound.version_mut() = Version::HTTP_11;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }

    /// Forward one exchange and return the upstream response with its body still streaming.
    pub async fn forward(&self, inbound: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let request_id = inbound
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let outbound = self.outbound_request(inbound)?;

        tracing::debug!(
            request_id = %request_id,
            method = %outbound.method(),
            upstream = %outbound.uri(),
            "Forwarding request"
        );

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| ProxyError::Unreachable(describe(&e)))?;

        tracing::debug!(
            request_id = %request_id,
            status = %response.status(),
            "Upstream responded"
        );

        // Head is already on its way; a body failure can only end the stream.
        Ok(response.map(move |body| {
            Body::new(body.map_err(move |e| {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Upstream body failed mid-stream, terminating response"
                );
                e
            }))
        }))
    }
}

/// Apply the header rule to an inbound header map.
///
/// Under [`HeaderPolicy::PreserveHost`] a request without `Host` (HTTP/2 carries it in
/// the URI authority) gets the authority the client addressed.
pub fn outbound_headers(
    mut headers: HeaderMap,
    inbound_uri: &Uri,
    policy: HeaderPolicy,
    target: &UpstreamTarget,
) -> HeaderMap {
    match policy {
        HeaderPolicy::PreserveHost => {
            if !headers.contains_key(header::HOST) {
                if let Some(value) = inbound_uri
                    .authority()
                    .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
                {
                    headers.insert(header::HOST, value);
                }
            }
        }
        HeaderPolicy::RewriteHost => {
            headers.insert(header::HOST, target.host_header());
        }
    }
    headers
}

/// A request asking to switch to the WebSocket protocol.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("upgrade")));
    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    connection_upgrade && upgrade_websocket
}
