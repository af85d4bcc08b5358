//! In-memory dojo statistics.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DojoId, DomainError};
use crate::ports::{DojoStats, DojoStatsProvider};

#[derive(Default)]
pub struct InMemoryDojoStats {
    stats: RwLock<HashMap<DojoId, DojoStats>>,
}

impl InMemoryDojoStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, dojo_id: DojoId, stats: DojoStats) {
        self.stats.write().await.insert(dojo_id, stats);
    }
}

#[async_trait]
impl DojoStatsProvider for InMemoryDojoStats {
    async fn stats(&self, dojo_id: DojoId) -> Result<Option<DojoStats>, DomainError> {
        Ok(self.stats.read().await.get(&dojo_id).cloned())
    }
}
