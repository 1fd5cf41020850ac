//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → middleware/ingress.rs (log, CORS preflight, /health)
//!     → forward.rs (header rule, stream to upstream)  |  websocket.rs (handshake, byte relay)
//!     → response.rs (CORS grant, marker header)
//!     → Send to client
//! ```

pub mod cors;
pub mod error;
pub mod forward;
pub mod health;
pub mod middleware;
pub mod response;
pub mod server;
pub mod websocket;

pub use error::ProxyError;
pub use forward::Forwarder;
pub use response::X_PROXIED_BY;
pub use server::{AppState, HttpServer};
