//! session-proxy binary.
//!
//! Configuration precedence: CLI flag > environment variable > config file > default.

use clap::Parser;
use std::path::PathBuf;

use session_proxy::config::loader::{resolve_config, ConfigOverrides};
use session_proxy::config::HeaderPolicy;
use session_proxy::lifecycle::{startup, Shutdown};
use session_proxy::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "session-proxy", version)]
#[command(about = "Transparent reverse proxy preserving cookies, headers and WebSocket sessions")]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Upstream URL every request is forwarded to
    #[arg(short, long, env = "TARGET_URL")]
    target: Option<String>,

    /// Host header handling: preserve or rewrite
    #[arg(long, env = "HOST_POLICY")]
    host_policy: Option<HeaderPolicy>,

    /// Value of the X-Proxied-By response header
    #[arg(long, env = "PROXY_MARKER")]
    marker: Option<String>,

    /// Accept self-signed or otherwise invalid certificates from an https/wss upstream
    #[arg(long, env = "UPSTREAM_ACCEPT_INVALID_CERTS")]
    accept_invalid_certs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = resolve_config(
        cli.config.as_deref(),
        ConfigOverrides {
            port: cli.port,
            target_url: cli.target,
            host_policy: cli.host_policy,
            marker: cli.marker,
            accept_invalid_certs: cli.accept_invalid_certs,
        },
    )?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "session-proxy starting");
    tracing::info!(
        port = config.listener.port,
        target = %config.upstream.url,
        host_policy = %config.upstream.host_policy,
        cors = config.cors.enabled,
        "Configuration loaded"
    );

    let (server, listener) = match startup::start(config).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
