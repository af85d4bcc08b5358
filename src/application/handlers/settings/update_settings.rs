//! UpdateSettingsHandler - Command handler for changing settings.
//!
//! Used for single-key and bulk updates. Every value is checked against the
//! stored type of its key and the range rules of known keys before
//! anything is written; a bulk update is all or nothing.

use serde_json::Value;
use std::sync::Arc;

use crate::domain::membership::{validate_known, MembershipError, SettingValue};
use crate::ports::SettingsRepository;

#[derive(Debug, Clone)]
pub struct UpdateSettingsCommand {
    pub values: Vec<(String, Value)>,
}

pub struct UpdateSettingsHandler {
    repository: Arc<dyn SettingsRepository>,
}

impl UpdateSettingsHandler {
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self { repository }
    }

    /// Returns the keys that were written.
    pub async fn handle(&self, cmd: UpdateSettingsCommand) -> Result<Vec<String>, MembershipError> {
        if cmd.values.is_empty() {
            return Err(MembershipError::validation("einstellungen", "no settings given"));
        }

        let mut typed = Vec::with_capacity(cmd.values.len());
        for (key, raw) in cmd.values {
            let existing = self
                .repository
                .find(&key)
                .await?
                .ok_or_else(|| MembershipError::setting_not_found(key.clone()))?;
            let value = SettingValue::from_json(existing.wert.typ(), &raw)
                .map_err(|e| MembershipError::validation(key.clone(), e.to_string()))?;
            validate_known(&key, &value)?;
            typed.push((key, value));
        }

        self.repository.save_values(&typed).await?;
        let keys: Vec<String> = typed.into_iter().map(|(k, _)| k).collect();

        tracing::info!(keys = %keys.join(","), "Settings updated");
        Ok(keys)
    }
}
