//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `VERBAND` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use verband_service::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod audit;
mod auth;
mod database;
mod error;
mod features;
mod server;
mod settings;

pub use audit::AuditConfig;
pub use auth::AuthConfig;
pub use database::{DatabaseConfig, MEMORY_URL};
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use server::{Environment, ServerConfig};
pub use settings::SettingsConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL or `memory://`)
    pub database: DatabaseConfig,

    /// Authentication configuration (HS256 bearer tokens)
    pub auth: AuthConfig,

    /// Audit trail policy
    #[serde(default)]
    pub audit: AuditConfig,

    /// Settings resolver cache
    #[serde(default)]
    pub settings: SettingsConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `VERBAND` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `VERBAND__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `VERBAND__DATABASE__URL=...` -> `database.url = ...`
    /// - `VERBAND__AUDIT__POLICY=best_effort` -> `audit.policy = best_effort`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VERBAND")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate(&self.server.environment)?;
        self.auth.validate(&self.server.environment)?;
        self.settings.validate()?;
        if self.is_production() && self.features.verbose_errors {
            return Err(ValidationError::VerboseErrorsInProduction);
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::AuditPolicy;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "VERBAND__DATABASE__URL",
        "VERBAND__AUTH__JWT_SECRET",
        "VERBAND__SERVER__PORT",
        "VERBAND__SERVER__ENVIRONMENT",
        "VERBAND__AUDIT__POLICY",
        "VERBAND__SETTINGS__CACHE_TTL_SECS",
        "VERBAND__FEATURES__VERBOSE_ERRORS",
    ];

    fn set_minimal_env() {
        env::set_var("VERBAND__DATABASE__URL", "postgresql://test@localhost/verband");
        env::set_var("VERBAND__AUTH__JWT_SECRET", "dev-secret");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/verband");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.audit.policy, AuditPolicy::Transactional);
        assert!(config.settings.cache_ttl().is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("VERBAND__SERVER__PORT", "3000"),
            ("VERBAND__AUDIT__POLICY", "best_effort"),
            ("VERBAND__SETTINGS__CACHE_TTL_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.audit.policy, AuditPolicy::BestEffort);
        assert_eq!(config.settings.cache_ttl_secs, 30);
    }

    #[test]
    fn test_missing_auth_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("VERBAND__DATABASE__URL", "memory://");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_production_rules() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("VERBAND__SERVER__ENVIRONMENT", "production"),
            ("VERBAND__FEATURES__VERBOSE_ERRORS", "true"),
        ])
        .unwrap();

        assert!(config.is_production());
        assert!(config.validate().is_err());
    }
}
