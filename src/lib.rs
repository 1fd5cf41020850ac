//! Session-preserving reverse proxy.
//!
//! Forwards HTTP and WebSocket traffic to a single upstream while keeping
//! cookies and headers intact in both directions and relaxing CORS for
//! browser clients.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ net::listener ──▶ http::server ──▶ ingress filter ──┬──▶ /health, preflight (answered)
//!                                                                   │
//!                                                                   ▼
//!                                                          forwarding engine
//!                                                    (forward.rs | websocket.rs)
//!                                                                   │
//!   Client ◀── response chain (CORS grant, marker) ◀────────────────┴──── Upstream
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
