//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::GatewayConfig;
use std::path::Path;

/// Loads and sanity-checks gateway configuration.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed,
    /// or fails validation.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<GatewayConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.load_str(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn load_str(&self, content: &str) -> ConfigResult<GatewayConfig> {
        let config: GatewayConfig = toml::from_str(content)?;
        validate(&config)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_or_default<P: AsRef<Path>>(&self, path: P) -> ConfigResult<GatewayConfig> {
        let path = path.as_ref();
        if path.exists() {
            self.load(path)
        } else {
            Ok(GatewayConfig::default())
        }
    }
}

/// Reject values that would break the gateway at runtime.
fn validate(config: &GatewayConfig) -> ConfigResult<()> {
    if config.downstream.service.is_empty() {
        return Err(ConfigError::Invalid(
            "downstream.service must not be empty".to_string(),
        ));
    }
    if config.breaker.failure_threshold == 0 {
        return Err(ConfigError::Invalid(
            "breaker.failure_threshold must be at least 1".to_string(),
        ));
    }
    if config.events.buffer == 0 {
        return Err(ConfigError::Invalid(
            "events.buffer must be at least 1".to_string(),
        ));
    }
    for (route, rule) in &config.admission.routes {
        if rule.refill_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "admission.routes.{route}: refill_rate must be positive"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_string() {
        let config = ConfigLoader::new()
            .load_str(
                r#"
            [gateway]
            name = "test"
        "#,
            )
            .unwrap();
        assert_eq!(config.gateway.name, "test");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            r#"
            [gateway]
            name = "file-test"
        "#,
        )
        .unwrap();

        let config = ConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.gateway.name, "file-test");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::new().load("/nonexistent/gateway.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let config = ConfigLoader::new()
            .load_or_default("/nonexistent/gateway.toml")
            .unwrap();
        assert_eq!(config.gateway.name, "reservation-gateway");
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = ConfigLoader::new().load_str(
            r#"
            [breaker]
            failure_threshold = 0
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_positive_refill_rejected() {
        let result = ConfigLoader::new().load_str(
            r#"
            [admission.routes."reservations:read"]
            capacity = 1
            refill_rate = 0.0
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = ConfigLoader::new().load_str("[gateway\nname = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
