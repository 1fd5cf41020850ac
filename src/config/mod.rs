//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file, then env/CLI overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to every exchange
//! ```
//!
//! # Design Decisions
//! - Config is decided once at startup and never mutated afterwards
//! - All fields have defaults so the proxy runs with no config at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod target;
pub mod validation;

pub use loader::{ConfigError, ConfigOverrides};
pub use schema::{CorsConfig, HeaderPolicy, ListenerConfig, ObservabilityConfig, ProxyConfig};
pub use target::UpstreamTarget;
