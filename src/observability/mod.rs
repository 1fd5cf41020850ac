//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ingress filter, forwarding engine, tunnels
//!     → logging.rs (structured tracing events, one per request at INFO)
//!     → metrics.rs (counters, histograms; Prometheus scrape when enabled)
//! ```
//!
//! # Design Decisions
//! - Exchange IDs and request IDs are attached to every event of an exchange
//! - Metrics are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
