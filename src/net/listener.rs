//! TCP listener setup.

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    BindAddress {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to query the bound socket.
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),
}

/// Bind the listening socket described by `config`.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address = format!("{}:{}", config.bind_host, config.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::BindAddress {
            address: address.clone(),
            source,
        })?;

    tracing::info!(address = %address, "Listener bound");
    Ok(listener)
}
