//! Configuration type definitions.

use crate::admission::AdmissionConfig;
use crate::breaker::BreakerConfig;
use crate::discovery::InstanceAddress;
use crate::events::EventsConfig;
use crate::gateway::DownstreamConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Root configuration for the reservation gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identity and binding.
    pub gateway: GatewaySection,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Admission control (rate limiting) per route.
    pub admission: AdmissionConfig,

    /// Circuit breaker for the read path.
    pub breaker: BreakerConfig,

    /// Downstream call parameters.
    pub downstream: DownstreamConfig,

    /// Event channel for the write path.
    pub events: EventsConfig,

    /// Seeded registry instances.
    pub registry: RegistryConfig,
}

/// Gateway section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Instance name, used in logs.
    pub name: String,

    /// Bind address for the inbound HTTP surface.
    pub bind_address: IpAddr,

    /// Bind port.
    pub port: u16,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            name: "reservation-gateway".to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
        }
    }
}

impl GatewaySection {
    /// The socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: LogLevel,

    /// Log format (json, pretty, compact).
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable).
    Json,
    /// Pretty format with colors (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

/// Registry seed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Instances registered at startup.
    pub instances: Vec<InstanceAddress>,
}
