//! SignMembershipHandler - Command handler for capturing consent and signature.

use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MembershipId};
use crate::domain::membership::{
    Consent, HistoryAction, Membership, MembershipError, NewHistoryEntry, Signature,
};
use crate::ports::VerbandStore;

use super::common::lock_membership;

/// Command to sign a membership.
#[derive(Debug, Clone)]
pub struct SignMembershipCommand {
    pub membership_id: MembershipId,
    pub consent: Consent,
    /// Signature image, usually a data URL.
    pub unterschrift: String,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct SignMembershipResult {
    pub membership: Membership,
}

pub struct SignMembershipHandler {
    store: Arc<dyn VerbandStore>,
    audit: Arc<AuditTrail>,
}

impl SignMembershipHandler {
    pub fn new(store: Arc<dyn VerbandStore>, audit: Arc<AuditTrail>) -> Self {
        Self { store, audit }
    }

    pub async fn handle(&self, cmd: SignMembershipCommand) -> Result<SignMembershipResult, MembershipError> {
        let signature = Signature::captured(cmd.unterschrift, cmd.actor.ip.clone())?;
        cmd.consent.require_complete()?;

        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let mut membership = lock_membership(&mut *tx, cmd.membership_id).await?;
        let before = membership.status;
        membership.sign(cmd.consent, signature)?;
        tx.update_membership(&membership).await?;

        let entry = NewHistoryEntry::new(
            membership.id,
            HistoryAction::Geaendert,
            "Vertrag unterschrieben",
            &cmd.actor,
        )
        .with_before(json!({ "status": before }))
        .with_after(json!({
            "status": membership.status,
            "unterschrift_datum": membership.signature.unterschrift_datum,
        }));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(membership_id = %membership.id, status = %membership.status, "Membership signed");

        Ok(SignMembershipResult { membership })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, Fixture};
    use crate::domain::membership::{setting_keys, MembershipStatus, SettingValue};
    use crate::ports::MembershipReader;

    fn command(id: MembershipId) -> SignMembershipCommand {
        SignMembershipCommand {
            membership_id: id,
            consent: Consent::new(true, true),
            unterschrift: "data:image/png;base64,iVBORw0KGgo=".to_string(),
            actor: Actor::public(Some("192.0.2.7".to_string())),
        }
    }

    #[tokio::test]
    async fn signing_releases_pending_signature() {
        let fx = Fixture::new();
        fx.settings
            .put(setting_keys::UNTERSCHRIFT_ERFORDERLICH, SettingValue::Boolean(true))
            .await;
        let m = fx.register_dojo().await;
        assert_eq!(m.status, MembershipStatus::PendingSignature);

        let handler = SignMembershipHandler::new(fx.store.clone(), fx.audit.clone());
        let result = handler.handle(command(m.id)).await.unwrap();

        assert_eq!(result.membership.status, MembershipStatus::Pending);
        assert!(result.membership.signature.unterschrift_datum.is_some());
        assert_eq!(
            result.membership.signature.unterschrift_ip.as_deref(),
            Some("192.0.2.7")
        );
        let history = fx.store.history(m.id).await.unwrap();
        assert_eq!(history[0].aktion, HistoryAction::Geaendert);
        assert_eq!(history[0].durchgefuehrt_von, "Selbstanmeldung");
    }

    #[tokio::test]
    async fn empty_signature_is_rejected() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = SignMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let mut cmd = command(m.id);
        cmd.unterschrift = "   ".to_string();
        let err = handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, MembershipError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn cancelled_membership_cannot_be_signed() {
        let fx = Fixture::new();
        let mut m = fx.register_dojo().await;
        m.status = MembershipStatus::Cancelled;
        fx.store.put_membership(m.clone()).await;

        let handler = SignMembershipHandler::new(fx.store.clone(), fx.audit.clone());
        let mut cmd = command(m.id);
        cmd.actor = admin();
        let err = handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidState { .. }));
    }
}
