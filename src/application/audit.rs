//! Audit trail writer.
//!
//! Lifecycle handlers hand every history entry to [`AuditTrail::record`].
//! Under [`AuditPolicy::Transactional`] the entry is appended inside the
//! operation's transaction, so a failed append rolls the operation back.
//! Under [`AuditPolicy::BestEffort`] entries are collected and appended in a
//! separate transaction after commit; failures there are logged and dropped.

use serde::Deserialize;
use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::domain::membership::NewHistoryEntry;
use crate::ports::{VerbandStore, VerbandTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPolicy {
    #[default]
    Transactional,
    BestEffort,
}

/// Entries deferred until after commit.
#[derive(Debug, Default)]
#[must_use = "pass the batch to AuditTrail::complete after commit"]
pub struct AuditBatch {
    deferred: Vec<NewHistoryEntry>,
}

impl AuditBatch {
    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }
}

pub struct AuditTrail {
    store: Arc<dyn VerbandStore>,
    policy: AuditPolicy,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn VerbandStore>, policy: AuditPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> AuditPolicy {
        self.policy
    }

    /// Records an entry according to the policy.
    pub async fn record(
        &self,
        tx: &mut dyn VerbandTransaction,
        batch: &mut AuditBatch,
        entry: NewHistoryEntry,
    ) -> Result<(), DomainError> {
        match self.policy {
            AuditPolicy::Transactional => {
                tx.append_history(&entry).await?;
            }
            AuditPolicy::BestEffort => batch.deferred.push(entry),
        }
        Ok(())
    }

    /// Appends deferred entries after the operation committed.
    pub async fn complete(&self, batch: AuditBatch) {
        for entry in batch.deferred {
            if let Err(e) = self.append_detached(&entry).await {
                tracing::warn!(
                    membership_id = %entry.membership_id,
                    aktion = %entry.aktion,
                    error = %e,
                    "Failed to write audit trail entry"
                );
            }
        }
    }

    async fn append_detached(&self, entry: &NewHistoryEntry) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        tx.append_history(entry).await?;
        tx.commit().await
    }
}
