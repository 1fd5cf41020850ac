//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the ingress filter and the forwarding handler
//! - Wire up middleware (tracing, request ID)
//! - Serve on a bound listener until shutdown, then drain upgraded tunnels

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware,
    response::Response,
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ConfigError, ProxyConfig, UpstreamTarget};
use crate::http::cors::{CorsGrant, CorsPolicy};
use crate::http::forward::{is_websocket_upgrade, Forwarder};
use crate::http::middleware::ingress_filter;
use crate::http::response::decorate;
use crate::http::websocket;
use crate::net::connection::{ExchangeId, ExchangeState, ExchangeTracker};
use crate::net::tls;
use crate::observability::metrics;

/// Application state injected into handlers. Everything in it is read-only
/// after construction.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub forwarder: Arc<Forwarder>,
    pub cors: Arc<CorsPolicy>,
    pub exchanges: ExchangeTracker,
    pub marker: HeaderValue,
}

/// HTTP server for the session proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    exchanges: ExchangeTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let target = UpstreamTarget::parse(&config.upstream.url)
            .map_err(|e| ConfigError::Validation(vec![e.into()]))?;
        let marker = HeaderValue::from_str(&config.upstream.marker).map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidMarker(config.upstream.marker.clone())])
        })?;

        let tls = tls::client_config(config.upstream.accept_invalid_certs)?;

        let config = Arc::new(config);
        let exchanges = ExchangeTracker::new();
        let state = AppState {
            forwarder: Arc::new(Forwarder::new(target, config.upstream.host_policy, tls)),
            cors: Arc::new(CorsPolicy::from_config(&config.cors)),
            config: Arc::clone(&config),
            exchanges: exchanges.clone(),
            marker,
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            exchanges,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(state.clone(), ingress_filter))
            .with_state(state)
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then let in-flight exchanges finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.config.upstream.url,
            host_policy = %self.config.upstream.host_policy,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, no longer accepting connections");
            })
            .await?;

        let remaining = self.exchanges.active_count();
        if remaining > 0 {
            let drain = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
            tracing::info!(remaining, drain_timeout = ?drain, "Draining upgraded connections");
            if !self.exchanges.wait_idle(drain).await {
                tracing::warn!(
                    remaining = self.exchanges.active_count(),
                    "Drain timeout elapsed with connections still open"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forwarding handler: everything the ingress filter lets through ends up here.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let grant = request.extensions().get::<CorsGrant>().cloned();
    let exchange_id = request
        .extensions()
        .get::<ExchangeId>()
        .copied()
        .unwrap_or_default();

    let result = if is_websocket_upgrade(request.headers()) {
        tracing::info!(
            exchange_id = %exchange_id,
            path = %request.uri().path(),
            "Websocket upgrade request"
        );
        websocket::tunnel(&state.forwarder, request, &state.exchanges, exchange_id).await
    } else {
        state.forwarder.forward(request).await
    };

    let (response, outcome) = match result {
        Ok(response) if response.status() == StatusCode::SWITCHING_PROTOCOLS => {
            (response, ExchangeState::Upgraded)
        }
        Ok(response) => (response, ExchangeState::Completed),
        Err(e) => {
            tracing::error!(
                exchange_id = %exchange_id,
                target = %state.forwarder.target(),
                error = %e,
                "Proxy error"
            );
            metrics::record_upstream_error(e.kind());
            (
                e.into_response_for(state.forwarder.target().as_str()),
                ExchangeState::Failed,
            )
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);

    let mut response = decorate(response, grant.as_ref(), &state.marker);
    response.extensions_mut().insert(outcome);
    response
}
