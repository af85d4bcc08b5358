//! SetFeeExemptionHandler - Command handler for toggling `beitragsfrei`.
//!
//! Turning the exemption on zeroes the fee, voids all open invoices and
//! activates a pending membership. Turning it off restores the default fee
//! for the membership kind from the current settings.

use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MembershipId};
use crate::domain::membership::{
    HistoryAction, InvoiceNumber, Membership, MembershipError, NewHistoryEntry,
};
use crate::ports::{SettingsResolver, VerbandStore};

use super::common::lock_membership;

#[derive(Debug, Clone)]
pub struct SetFeeExemptionCommand {
    pub membership_id: MembershipId,
    pub beitragsfrei: bool,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct SetFeeExemptionResult {
    pub membership: Membership,
    /// Invoices voided by this change.
    pub storniert: Vec<InvoiceNumber>,
    pub activated: bool,
}

pub struct SetFeeExemptionHandler {
    store: Arc<dyn VerbandStore>,
    settings: Arc<dyn SettingsResolver>,
    audit: Arc<AuditTrail>,
}

impl SetFeeExemptionHandler {
    pub fn new(
        store: Arc<dyn VerbandStore>,
        settings: Arc<dyn SettingsResolver>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            store,
            settings,
            audit,
        }
    }

    pub async fn handle(&self, cmd: SetFeeExemptionCommand) -> Result<SetFeeExemptionResult, MembershipError> {
        let settings = self.settings.snapshot().await?;

        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let mut membership = lock_membership(&mut *tx, cmd.membership_id).await?;
        let before = membership.snapshot();
        let default_fee = settings.price_for(membership.kind());
        let activated = membership.set_fee_exemption(cmd.beitragsfrei, default_fee);

        let mut storniert = Vec::new();
        if cmd.beitragsfrei {
            for mut payment in tx.open_payments(membership.id).await? {
                payment.void()?;
                tx.update_payment(&payment).await?;
                storniert.push(payment.rechnungsnummer);
            }
        }
        tx.update_membership(&membership).await?;

        let description = if cmd.beitragsfrei {
            "Beitragsfreiheit gewährt"
        } else {
            "Beitragsfreiheit aufgehoben"
        };
        let entry = NewHistoryEntry::new(membership.id, HistoryAction::Geaendert, description, &cmd.actor)
            .with_before(before)
            .with_after(json!({
                "beitragsfrei": membership.beitragsfrei,
                "jahresbeitrag": membership.jahresbeitrag,
                "status": membership.status,
                "stornierte_rechnungen": storniert,
            }));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            beitragsfrei = membership.beitragsfrei,
            voided = storniert.len(),
            activated,
            "Fee exemption changed"
        );

        Ok(SetFeeExemptionResult {
            membership,
            storniert,
            activated,
        })
    }
}
