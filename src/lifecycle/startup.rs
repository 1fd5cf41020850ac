//! Startup orchestration.
//!
//! Order: validated config → metrics (optional) → server → bound listener.
//! Any failure here is fatal; nothing is accepted until the listener is bound.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, ProxyConfig};
use crate::http::HttpServer;
use crate::net::listener::{bind, ListenerError};
use crate::observability::metrics;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Build the server and bind its listener.
pub async fn start(config: ProxyConfig) -> Result<(HttpServer, TcpListener), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener_config = config.listener.clone();
    let target = config.upstream.url.clone();
    let server = HttpServer::new(config)?;

    let listener = bind(&listener_config).await?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
    announce(local_addr, &target);
    Ok((server, listener))
}

fn announce(local_addr: SocketAddr, target: &str) {
    tracing::info!(
        local = %format!("http://localhost:{}", local_addr.port()),
        network = %format!("http://{}", local_addr),
        target = %target,
        "Session proxy ready to accept connections"
    );
}
