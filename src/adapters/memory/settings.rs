//! In-memory settings store, seeded with the known keys and their defaults.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::membership::{known_settings, Setting, SettingValue};
use crate::ports::{SettingsRepository, SettingsResolver};

pub struct InMemorySettings {
    rows: RwLock<BTreeMap<String, Setting>>,
    unavailable: AtomicBool,
}

impl InMemorySettings {
    /// Store containing every known key at its default value.
    pub fn with_defaults() -> Self {
        let rows = known_settings()
            .into_iter()
            .map(|(key, value, description)| {
                (
                    key.to_string(),
                    Setting {
                        schluessel: key.to_string(),
                        wert: value,
                        beschreibung: Some(description.to_string()),
                        updated_at: Timestamp::now(),
                    },
                )
            })
            .collect();
        Self {
            rows: RwLock::new(rows),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Store without any rows.
    pub fn empty() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    // === Test Helpers ===

    /// Inserts or replaces a row directly.
    pub async fn put(&self, key: &str, value: SettingValue) {
        self.rows.write().await.insert(
            key.to_string(),
            Setting {
                schluessel: key.to_string(),
                wert: value,
                beschreibung: None,
                updated_at: Timestamp::now(),
            },
        );
    }

    /// Makes every read fail, as if the settings table were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::database("Failed to read settings", "settings store unavailable"));
        }
        Ok(())
    }
}

impl Default for InMemorySettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl SettingsResolver for InMemorySettings {
    async fn get(&self, key: &str) -> Result<Option<SettingValue>, DomainError> {
        self.check_available()?;
        Ok(self.rows.read().await.get(key).map(|s| s.wert.clone()))
    }

    async fn all(&self) -> Result<HashMap<String, SettingValue>, DomainError> {
        self.check_available()?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .map(|(k, s)| (k.clone(), s.wert.clone()))
            .collect())
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettings {
    async fn list(&self) -> Result<Vec<Setting>, DomainError> {
        self.check_available()?;
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn find(&self, key: &str) -> Result<Option<Setting>, DomainError> {
        self.check_available()?;
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn save_values(&self, values: &[(String, SettingValue)]) -> Result<(), DomainError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        if let Some((key, _)) = values.iter().find(|(k, _)| !rows.contains_key(k)) {
            return Err(DomainError::new(ErrorCode::SettingNotFound, "Setting not found")
                .with_detail("key", key.clone()));
        }
        let now = Timestamp::now();
        for (key, value) in values {
            if let Some(row) = rows.get_mut(key) {
                row.wert = value.clone();
                row.updated_at = now;
            }
        }
        Ok(())
    }
}
