//! WebSocket proxy handling.
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Upstream
//! ```
//!
//! The handshake is sent upstream on a dedicated HTTP/1.1 connection (TLS for
//! `wss`/`https` targets) using the same header rule as ordinary requests. On `101 Switching Protocols` both
//! upgraded streams are spliced with no framing interpretation. One task owns
//! both ends: EOF on one side shuts down the other side's write half, and both
//! ends are shut down when the relay finishes.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use hyper::client::conn::http1::SendRequest;
use hyper_util::rt::TokioIo;
use tokio::io::{copy_bidirectional, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::http::error::{describe, ProxyError};
use crate::http::forward::Forwarder;
use crate::net::connection::{ExchangeId, ExchangeState, ExchangeTracker};
use crate::net::tls;
use crate::observability::metrics;

/// Perform the upstream handshake and, on success, spawn the byte relay.
///
/// Returns the response for the client: the upstream's `101` (which completes
/// the client-side upgrade) or whatever non-101 answer the upstream gave.
pub async fn tunnel(
    forwarder: &Forwarder,
    mut inbound: Request<Body>,
    tracker: &ExchangeTracker,
    exchange_id: ExchangeId,
) -> Result<Response<Body>, ProxyError> {
    let client_upgrade = hyper::upgrade::on(&mut inbound);
    let mut outbound = forwarder.outbound_request(inbound)?;
    // Dedicated connection: the request line carries the origin form.
    let origin_form = outbound
        .uri()
        .path_and_query()
        .cloned()
        .map(Uri::from)
        .unwrap_or_else(|| Uri::from_static("/"));
    *outbound.uri_mut() = origin_form;

    let mut sender = dial(forwarder).await?;
    let mut response = sender
        .send_request(outbound)
        .await
        .map_err(|e| ProxyError::Handshake(describe(&e)))?;

    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::info!(
            exchange_id = %exchange_id,
            status = %response.status(),
            "Upstream declined websocket upgrade"
        );
        return Ok(response.map(Body::new));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut response);
    let (parts, _) = response.into_parts();
    let mut tunnel_guard = tracker.track_tunnel(exchange_id);

    tokio::spawn(async move {
        let (client, upstream) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(exchange_id = %tunnel_guard.id(), error = %e, "Websocket upgrade failed");
                return;
            }
        };

        tracing::info!(exchange_id = %tunnel_guard.id(), "Websocket tunnel established");
        metrics::record_tunnel("opened");

        let mut client = TokioIo::new(client);
        let mut upstream = TokioIo::new(upstream);
        match copy_bidirectional(&mut client, &mut upstream).await {
            Ok((to_upstream, to_client)) => {
                tracing::info!(
                    exchange_id = %tunnel_guard.id(),
                    bytes_to_upstream = to_upstream,
                    bytes_to_client = to_client,
                    "Websocket tunnel closed"
                );
            }
            Err(e) => {
                tracing::info!(exchange_id = %tunnel_guard.id(), error = %e, "Websocket tunnel aborted");
            }
        }
        let _ = client.shutdown().await;
        let _ = upstream.shutdown().await;
        tunnel_guard.advance(ExchangeState::StreamClosed);
        metrics::record_tunnel("closed");
    });

    Ok(Response::from_parts(parts, Body::empty()))
}

/// Open the dedicated upstream connection, wrapped in TLS for `https`/`wss` targets.
async fn dial(forwarder: &Forwarder) -> Result<SendRequest<Body>, ProxyError> {
    let target = forwarder.target();
    let stream = TcpStream::connect((target.host(), target.port()))
        .await
        .map_err(|e| ProxyError::Handshake(describe(&e)))?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY on upstream socket");
    }

    if !target.is_tls() {
        return handshake(stream).await;
    }

    let server_name =
        tls::server_name(target.host()).map_err(|e| ProxyError::Handshake(e.to_string()))?;
    let stream = forwarder
        .tls_connector()
        .connect(server_name, stream)
        .await
        .map_err(|e| ProxyError::Handshake(describe(&e)))?;
    handshake(stream).await
}

async fn handshake<S>(io: S) -> Result<SendRequest<Body>, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| ProxyError::Handshake(describe(&e)))?;
    tokio::spawn(async move {
        if let Err(e) = connection.with_upgrades().await {
            tracing::debug!(error = %e, "Upstream handshake connection ended with error");
        }
    });
    Ok(sender)
}
