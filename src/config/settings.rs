//! Settings resolver configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Settings cache configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsConfig {
    /// Cache lifetime in seconds; 0 disables the cache
    #[serde(default)]
    pub cache_ttl_secs: u64,
}

impl SettingsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cache_ttl_secs > 3600 {
            return Err(ValidationError::CacheTtlTooLong);
        }
        Ok(())
    }
}
