//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has the wrong shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is syntactically valid but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::NotFound(PathBuf::from("/etc/gateway.toml"));
        assert_eq!(
            err.to_string(),
            "configuration file not found: /etc/gateway.toml"
        );

        let err = ConfigError::Invalid("port must be non-zero".to_string());
        assert_eq!(err.to_string(), "invalid configuration: port must be non-zero");
    }
}
