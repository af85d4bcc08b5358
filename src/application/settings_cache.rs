//! Bounded TTL cache in front of a settings store.
//!
//! Disabled by default (`settings.cache_ttl_secs = 0`), in which case every
//! lookup goes to the store. Writes through [`CachingSettingsResolver`]'s
//! repository side invalidate the cache immediately. Counters never read
//! from here.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::membership::{Setting, SettingValue};
use crate::ports::{SettingsRepository, SettingsResolver};

struct CachedValues {
    values: HashMap<String, SettingValue>,
    loaded_at: Instant,
}

/// Pluggable store that is both resolver and repository.
pub trait SettingsStore: SettingsResolver + SettingsRepository {}

impl<T: SettingsResolver + SettingsRepository> SettingsStore for T {}

pub struct CachingSettingsResolver {
    inner: Arc<dyn SettingsStore>,
    ttl: Duration,
    cache: RwLock<Option<CachedValues>>,
}

impl CachingSettingsResolver {
    pub fn new(inner: Arc<dyn SettingsStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn cached_all(&self) -> Result<HashMap<String, SettingValue>, DomainError> {
        if !self.is_enabled() {
            return self.inner.all().await;
        }
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.values.clone());
            }
        }
        let values = self.inner.all().await?;
        *self.cache.write().await = Some(CachedValues {
            values: values.clone(),
            loaded_at: Instant::now(),
        });
        Ok(values)
    }
}

#[async_trait]
impl SettingsResolver for CachingSettingsResolver {
    async fn get(&self, key: &str) -> Result<Option<SettingValue>, DomainError> {
        if !self.is_enabled() {
            return self.inner.get(key).await;
        }
        Ok(self.cached_all().await?.get(key).cloned())
    }

    async fn all(&self) -> Result<HashMap<String, SettingValue>, DomainError> {
        self.cached_all().await
    }
}

#[async_trait]
impl SettingsRepository for CachingSettingsResolver {
    async fn list(&self) -> Result<Vec<Setting>, DomainError> {
        self.inner.list().await
    }

    async fn find(&self, key: &str) -> Result<Option<Setting>, DomainError> {
        self.inner.find(key).await
    }

    async fn save_values(&self, values: &[(String, SettingValue)]) -> Result<(), DomainError> {
        let result = self.inner.save_values(values).await;
        self.invalidate().await;
        result
    }
}
