//! ListSettingsHandler - Query handler for all stored settings.

use std::sync::Arc;

use crate::domain::membership::{MembershipError, Setting};
use crate::ports::SettingsRepository;

pub struct ListSettingsHandler {
    repository: Arc<dyn SettingsRepository>,
}

impl ListSettingsHandler {
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self { repository }
    }

    /// All rows, ordered by key.
    pub async fn handle(&self) -> Result<Vec<Setting>, MembershipError> {
        Ok(self.repository.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySettings;
    use crate::domain::membership::{known_settings, setting_keys};

    #[tokio::test]
    async fn lists_all_known_settings_in_key_order() {
        let handler = ListSettingsHandler::new(Arc::new(InMemorySettings::with_defaults()));
        let rows = handler.handle().await.unwrap();

        assert_eq!(rows.len(), known_settings().len());
        let keys: Vec<&str> = rows.iter().map(|s| s.schluessel.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&setting_keys::MWST_SATZ));
    }

    #[tokio::test]
    async fn store_failure_is_an_infrastructure_error() {
        let settings = Arc::new(InMemorySettings::with_defaults());
        settings.set_unavailable(true);
        let handler = ListSettingsHandler::new(settings);

        assert!(matches!(
            handler.handle().await,
            Err(MembershipError::Infrastructure { .. })
        ));
    }
}
