//! # Configuration System
//!
//! TOML-based configuration for the gateway: binding, logging, admission
//! rules, breaker thresholds, downstream timeouts, event channel, and the
//! registry seed. Every section has defaults so a missing file still
//! yields a runnable gateway.
//!
//! ## Example
//!
//! ```toml
//! [gateway]
//! name = "reservation-gateway"
//! bind_address = "127.0.0.1"
//! port = 8080
//!
//! [admission]
//! enabled = true
//!
//! [breaker]
//! failure_threshold = 5
//! cooldown_ms = 5000
//!
//! [[registry.instances]]
//! service = "reservation-service"
//! host = "127.0.0.1"
//! port = 8081
//! ```

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{
    GatewayConfig, GatewaySection, LogFormat, LogLevel, LoggingConfig, RegistryConfig,
};
