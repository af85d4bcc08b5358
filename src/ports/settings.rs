//! Settings ports.
//!
//! `SettingsResolver` is the read contract lifecycle operations use;
//! `SettingsRepository` adds the administrative write path.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::foundation::{DomainError, Money};
use crate::domain::membership::{Setting, SettingValue, VerbandSettings};

/// Typed lookup of association settings.
///
/// Missing keys resolve to `None`; the `*_or` helpers apply a default.
#[async_trait]
pub trait SettingsResolver: Send + Sync {
    /// Value of one key.
    async fn get(&self, key: &str) -> Result<Option<SettingValue>, DomainError>;

    /// All stored values, keyed by name.
    async fn all(&self) -> Result<HashMap<String, SettingValue>, DomainError>;

    /// Resolved snapshot for one lifecycle operation.
    async fn snapshot(&self) -> Result<VerbandSettings, DomainError> {
        let values = self.all().await?;
        Ok(VerbandSettings::from_lookup(|key| values.get(key).cloned()))
    }

    async fn money_or(&self, key: &str, default: Money) -> Result<Money, DomainError> {
        Ok(self.get(key).await?.and_then(|v| v.as_money()).unwrap_or(default))
    }

    async fn number_or(&self, key: &str, default: i64) -> Result<i64, DomainError> {
        Ok(self.get(key).await?.and_then(|v| v.as_i64()).unwrap_or(default))
    }

    async fn bool_or(&self, key: &str, default: bool) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.and_then(|v| v.as_bool()).unwrap_or(default))
    }

    async fn string_or(&self, key: &str, default: &str) -> Result<String, DomainError> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string()))
    }
}

/// Stored settings rows.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// All rows, ordered by key.
    async fn list(&self) -> Result<Vec<Setting>, DomainError>;

    /// One row. Returns `None` for an unknown key.
    async fn find(&self, key: &str) -> Result<Option<Setting>, DomainError>;

    /// Writes new values for existing keys, all or nothing.
    ///
    /// # Errors
    ///
    /// - `SettingNotFound` if a key does not exist
    /// - `DatabaseError` on persistence failure
    async fn save_values(&self, values: &[(String, SettingValue)]) -> Result<(), DomainError>;
}
