//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs (bind)
//!     → Hand off to HTTP layer
//!     → connection.rs (per-exchange state machine, in-flight tracking)
//!
//! tls.rs (client config for https/wss upstreams)
//! ```

pub mod connection;
pub mod listener;
pub mod tls;
