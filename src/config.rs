//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub federation: FederationConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "social.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
    /// Username of the server identity used to sign outbound activities
    pub actor: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://social.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Federation delivery configuration
///
/// Retry and concurrency limits are deployment tunables, not constants.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Per-request delivery timeout in seconds
    pub timeout_seconds: u64,
    /// Delivery attempts per target (including the first)
    pub retry_attempts: u32,
    /// Delay between delivery attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum in-flight deliveries during fan-out
    pub max_concurrent_deliveries: usize,
    /// RSA key size for the server identity key pair
    pub key_bits: usize,
}

/// Endpoint discovery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Scheme used for remote federation endpoints ("https" in production)
    pub protocol: String,
    /// TTL for cached endpoint resolutions in seconds
    pub cache_ttl_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEDGATE_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("server.actor", "fedgate")?
            .set_default("federation.timeout_seconds", 10)?
            .set_default("federation.retry_attempts", 3)?
            .set_default("federation.retry_delay_ms", 1000)?
            .set_default("federation.max_concurrent_deliveries", 10)?
            .set_default("federation.key_bits", 4096)?
            .set_default("discovery.protocol", "https")?
            .set_default("discovery.cache_ttl_seconds", 300)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FEDGATE_*)
            .add_source(
                Environment::with_prefix("FEDGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_KEY_BITS: usize = 1024;

        for (name, value) in [
            ("server.protocol", &self.server.protocol),
            ("discovery.protocol", &self.discovery.protocol),
        ] {
            if !value.eq_ignore_ascii_case("http") && !value.eq_ignore_ascii_case("https") {
                return Err(crate::error::AppError::Config(format!(
                    "{} must be http or https",
                    name
                )));
            }
        }

        if self.federation.retry_attempts == 0 {
            return Err(crate::error::AppError::Config(
                "federation.retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.federation.max_concurrent_deliveries == 0 {
            return Err(crate::error::AppError::Config(
                "federation.max_concurrent_deliveries must be at least 1".to_string(),
            ));
        }

        if self.federation.key_bits < MIN_KEY_BITS {
            return Err(crate::error::AppError::Config(format!(
                "federation.key_bits must be at least {}",
                MIN_KEY_BITS
            )));
        }

        if self.server.actor.is_empty() || self.server.actor.contains('@') {
            return Err(crate::error::AppError::Config(
                "server.actor must be a bare username without '@'".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
                actor: "fedgate".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/fedgate-test.db"),
            },
            federation: FederationConfig {
                timeout_seconds: 10,
                retry_attempts: 3,
                retry_delay_ms: 1000,
                max_concurrent_deliveries: 10,
                key_bits: 4096,
            },
            discovery: DiscoveryConfig {
                protocol: "https".to_string(),
                cache_ttl_seconds: 300,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        let config = valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_retry_attempts() {
        let mut config = valid_config();
        config.federation.retry_attempts = 0;

        let error = config
            .validate()
            .expect_err("zero retry attempts must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("retry_attempts")
        ));
    }

    #[test]
    fn validate_rejects_unknown_protocol() {
        let mut config = valid_config();
        config.discovery.protocol = "gopher".to_string();

        let error = config.validate().expect_err("unknown scheme must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("discovery.protocol")
        ));
    }

    #[test]
    fn validate_rejects_actor_with_domain() {
        let mut config = valid_config();
        config.server.actor = "relay@example.com".to_string();

        let error = config.validate().expect_err("actor with '@' must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("server.actor")
        ));
    }

    #[test]
    fn base_url_joins_protocol_and_domain() {
        let config = valid_config();
        assert_eq!(config.server.base_url(), "http://localhost");
    }
}
