//! IssueMandateHandler - Command handler for new SEPA mandates.
//!
//! A membership has at most one active mandate. Issuing a new one revokes
//! the previous mandate in the same transaction and copies the new bank
//! details onto the membership.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MembershipId, StateMachine, Timestamp};
use crate::domain::membership::{
    HistoryAction, MandateReference, MandateSignature, Membership, MembershipError,
    NewHistoryEntry, NewMandate, SepaMandate,
};
use crate::ports::VerbandStore;

use super::common::lock_membership;

/// Bank details for a SEPA direct debit mandate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MandateDetails {
    pub iban: String,
    #[serde(default)]
    pub bic: Option<String>,
    /// Defaults to the membership's display name when absent.
    #[serde(default)]
    pub kontoinhaber: Option<String>,
    #[serde(default)]
    pub bankname: Option<String>,
}

/// Command to issue a mandate.
#[derive(Debug, Clone)]
pub struct IssueMandateCommand {
    pub membership_id: MembershipId,
    pub details: MandateDetails,
    /// Name of the signer if different from the account holder.
    pub unterschrieben_von: Option<String>,
    pub actor: Actor,
}

/// Result of a successful mandate issue.
#[derive(Debug, Clone)]
pub struct IssueMandateResult {
    pub mandate: SepaMandate,
    pub membership: Membership,
    /// References of mandates revoked by this issue.
    pub revoked: Vec<MandateReference>,
}

/// Handler for issuing mandates.
pub struct IssueMandateHandler {
    store: Arc<dyn VerbandStore>,
    audit: Arc<AuditTrail>,
}

impl IssueMandateHandler {
    pub fn new(store: Arc<dyn VerbandStore>, audit: Arc<AuditTrail>) -> Self {
        Self { store, audit }
    }

    pub async fn handle(&self, cmd: IssueMandateCommand) -> Result<IssueMandateResult, MembershipError> {
        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let mut membership = lock_membership(&mut *tx, cmd.membership_id).await?;
        if membership.status.is_terminal() {
            return Err(MembershipError::invalid_state(
                membership.status.as_str(),
                "issue SEPA mandate",
            ));
        }

        let holder = cmd
            .details
            .kontoinhaber
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| membership.party.display_name());
        let signature = MandateSignature {
            unterschrieben_von: Some(
                cmd.unterschrieben_von
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| holder.clone()),
            ),
            unterschrieben_am: Some(Timestamp::now()),
            unterschrift_ip: cmd.actor.ip.clone(),
        };
        let new_mandate = NewMandate::build(
            membership.id,
            &cmd.details.iban,
            cmd.details.bic,
            &holder,
            cmd.details.bankname,
            signature,
        )?;

        // Replace any active mandate
        let mut revoked = Vec::new();
        for mut previous in tx.active_mandates(membership.id).await? {
            previous.revoke()?;
            tx.update_mandate(&previous).await?;
            revoked.push(previous.mandatsreferenz);
        }

        let mandate = tx.insert_mandate(&new_mandate).await?;
        membership.attach_mandate(&new_mandate);
        tx.update_membership(&membership).await?;

        let mut entry = NewHistoryEntry::new(
            membership.id,
            HistoryAction::SepaAngelegt,
            format!("SEPA-Mandat {} angelegt", mandate.mandatsreferenz),
            &cmd.actor,
        )
        .with_after(json!({
            "mandatsreferenz": mandate.mandatsreferenz,
            "iban": mandate.iban_maskiert,
            "bic": mandate.bic,
            "kontoinhaber": mandate.kontoinhaber,
            "unterschrieben_von": mandate.signature.unterschrieben_von,
            "unterschrieben_am": mandate.signature.unterschrieben_am,
        }));
        if !revoked.is_empty() {
            entry = entry.with_before(json!({ "widerrufen": revoked }));
        }
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            mandatsreferenz = %mandate.mandatsreferenz,
            replaced = revoked.len(),
            "SEPA mandate issued"
        );

        Ok(IssueMandateResult {
            mandate,
            membership,
            revoked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, Fixture};
    use crate::domain::membership::{MandateStatus, MembershipStatus, PaymentMethod};
    use crate::ports::MembershipReader;

    fn details(iban: &str) -> MandateDetails {
        MandateDetails {
            iban: iban.to_string(),
            bic: None,
            kontoinhaber: Some("Kim Sato".to_string()),
            bankname: None,
        }
    }

    fn command(id: MembershipId, iban: &str) -> IssueMandateCommand {
        IssueMandateCommand {
            membership_id: id,
            details: details(iban),
            unterschrieben_von: None,
            actor: admin(),
        }
    }

    #[tokio::test]
    async fn issues_mandate_and_switches_to_direct_debit() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = IssueMandateHandler::new(fx.store.clone(), fx.audit.clone());

        let result = handler.handle(command(m.id, "DE89370400440532013000")).await.unwrap();

        assert_eq!(result.mandate.status, MandateStatus::Active);
        assert!(result.mandate.mandatsreferenz.as_str().starts_with(&format!("VM-{}-", m.id)));
        assert_eq!(result.membership.zahlungsart, PaymentMethod::Sepa);
        assert_eq!(
            result.mandate.signature.unterschrieben_von.as_deref(),
            Some("Kim Sato")
        );
        assert!(result.revoked.is_empty());
    }

    #[tokio::test]
    async fn second_mandate_revokes_the_first() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = IssueMandateHandler::new(fx.store.clone(), fx.audit.clone());

        let first = handler.handle(command(m.id, "DE89370400440532013000")).await.unwrap();
        let second = handler.handle(command(m.id, "GB82WEST12345698765432")).await.unwrap();

        assert_eq!(second.revoked, vec![first.mandate.mandatsreferenz.clone()]);
        let mandates = fx.store.mandates(m.id).await.unwrap();
        assert_eq!(mandates.len(), 2);
        assert_eq!(mandates.iter().filter(|m| m.is_active()).count(), 1);
        assert_eq!(
            fx.store.get(m.id).await.unwrap().unwrap().sepa.unwrap().iban,
            "GB82WEST12345698765432"
        );
    }

    #[tokio::test]
    async fn history_never_contains_full_iban() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = IssueMandateHandler::new(fx.store.clone(), fx.audit.clone());
        handler.handle(command(m.id, "DE89370400440532013000")).await.unwrap();

        let history = fx.store.history(m.id).await.unwrap();
        assert_eq!(history[0].aktion, HistoryAction::SepaAngelegt);
        let text = serde_json::to_string(&history).unwrap();
        assert!(text.contains("DE89****3000"));
        assert!(!text.contains("DE89370400440532013000"));
    }

    #[tokio::test]
    async fn rejects_invalid_iban() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = IssueMandateHandler::new(fx.store.clone(), fx.audit.clone());

        let err = handler.handle(command(m.id, "DE89370400440532013001")).await.unwrap_err();
        assert!(matches!(err, MembershipError::ValidationFailed { .. }));
        assert!(fx.store.mandates(m.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_cancelled_membership() {
        let fx = Fixture::new();
        let mut m = fx.register_dojo().await;
        m.status = MembershipStatus::Cancelled;
        fx.store.put_membership(m.clone()).await;
        let handler = IssueMandateHandler::new(fx.store.clone(), fx.audit.clone());

        let err = handler.handle(command(m.id, "DE89370400440532013000")).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn unknown_membership_is_not_found() {
        let fx = Fixture::new();
        let handler = IssueMandateHandler::new(fx.store.clone(), fx.audit.clone());
        let err = handler
            .handle(command(MembershipId::new(42).unwrap(), "DE89370400440532013000"))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::NotFound(_)));
    }
}
