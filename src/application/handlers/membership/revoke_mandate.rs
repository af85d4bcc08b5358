//! RevokeMandateHandler - Command handler for revoking a SEPA mandate.
//!
//! Mandates are never deleted. Revoking the active mandate also drops the
//! bank details from the membership, which falls back to invoice payment.

use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MandateId};
use crate::domain::membership::{
    HistoryAction, Membership, MembershipError, NewHistoryEntry, SepaMandate,
};
use crate::ports::VerbandStore;

use super::common::lock_membership;

#[derive(Debug, Clone)]
pub struct RevokeMandateCommand {
    pub mandate_id: MandateId,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct RevokeMandateResult {
    pub mandate: SepaMandate,
    pub membership: Membership,
}

pub struct RevokeMandateHandler {
    store: Arc<dyn VerbandStore>,
    audit: Arc<AuditTrail>,
}

impl RevokeMandateHandler {
    pub fn new(store: Arc<dyn VerbandStore>, audit: Arc<AuditTrail>) -> Self {
        Self { store, audit }
    }

    pub async fn handle(&self, cmd: RevokeMandateCommand) -> Result<RevokeMandateResult, MembershipError> {
        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let owner = tx
            .mandate_owner(cmd.mandate_id)
            .await?
            .ok_or_else(|| MembershipError::mandate_not_found(cmd.mandate_id))?;
        let mut membership = lock_membership(&mut *tx, owner).await?;
        let mut mandate = tx
            .lock_mandate(cmd.mandate_id)
            .await?
            .ok_or_else(|| MembershipError::mandate_not_found(cmd.mandate_id))?;

        if !mandate.is_active() {
            return Err(MembershipError::invalid_state(mandate.status.as_str(), "revoke mandate"));
        }
        mandate.revoke()?;
        tx.update_mandate(&mandate).await?;

        // At most one mandate is active, so the snapshot belongs to this one.
        let before = membership.snapshot();
        membership.clear_sepa();
        tx.update_membership(&membership).await?;

        let entry = NewHistoryEntry::new(
            membership.id,
            HistoryAction::SepaGeaendert,
            format!("SEPA-Mandat {} widerrufen", mandate.mandatsreferenz),
            &cmd.actor,
        )
        .with_before(before)
        .with_after(json!({
            "mandatsreferenz": mandate.mandatsreferenz,
            "mandatsstatus": mandate.status,
            "iban": mandate.iban_maskiert,
            "zahlungsart": membership.zahlungsart,
        }));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            mandatsreferenz = %mandate.mandatsreferenz,
            "SEPA mandate revoked"
        );

        Ok(RevokeMandateResult { mandate, membership })
    }
}
