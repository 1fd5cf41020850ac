//! Ingress filter.
//!
//! Runs before the forwarding engine for every request: logs it, answers CORS
//! preflights and `/health` directly, and tags everything else with its
//! exchange ID and CORS grant before handing it on.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;

use crate::http::health::{self, HEALTH_PATH};
use crate::http::server::AppState;
use crate::net::connection::ExchangeState;
use crate::observability::metrics;

pub async fn ingress_filter(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let mut exchange = state.exchanges.track();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    tracing::info!(
        exchange_id = %exchange.id(),
        method = %method,
        path = %path,
        peer = peer.as_deref().unwrap_or("-"),
        "Request received"
    );
    exchange.advance(ExchangeState::Filtered);

    if state.cors.is_preflight(&method, request.headers()) {
        let response = state.cors.preflight_response(request.headers());
        exchange.advance(ExchangeState::Completed);
        metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
        return response;
    }

    let grant = state.cors.grant(request.headers());

    if path == HEALTH_PATH {
        let mut response =
            health::health_response(state.forwarder.target(), state.config.listener.port);
        if let Some(grant) = &grant {
            grant.apply(response.headers_mut());
        }
        exchange.advance(ExchangeState::Completed);
        metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
        return response;
    }

    if let Some(grant) = grant {
        request.extensions_mut().insert(grant);
    }
    request.extensions_mut().insert(exchange.id());
    exchange.advance(ExchangeState::Forwarding);

    let response = next.run(request).await;

    let outcome = response
        .extensions()
        .get::<ExchangeState>()
        .copied()
        .unwrap_or(ExchangeState::Completed);
    exchange.advance(outcome);
    response
}
