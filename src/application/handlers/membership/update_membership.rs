//! UpdateMembershipHandler - Command handler for administrative edits.
//!
//! Only the fields that actually changed are recorded in the audit trail.
//! An update that changes nothing succeeds without writing anything.

use serde_json::Value;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MembershipId};
use crate::domain::membership::{
    HistoryAction, Membership, MembershipError, MembershipUpdate, NewHistoryEntry,
};
use crate::ports::VerbandStore;

use super::common::lock_membership;

#[derive(Debug, Clone)]
pub struct UpdateMembershipCommand {
    pub membership_id: MembershipId,
    pub update: MembershipUpdate,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct UpdateMembershipResult {
    pub membership: Membership,
    pub changed_fields: Vec<String>,
}

pub struct UpdateMembershipHandler {
    store: Arc<dyn VerbandStore>,
    audit: Arc<AuditTrail>,
}

impl UpdateMembershipHandler {
    pub fn new(store: Arc<dyn VerbandStore>, audit: Arc<AuditTrail>) -> Self {
        Self { store, audit }
    }

    pub async fn handle(&self, cmd: UpdateMembershipCommand) -> Result<UpdateMembershipResult, MembershipError> {
        if cmd.update.is_empty() {
            return Err(MembershipError::validation("body", "no fields to update"));
        }

        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let mut membership = lock_membership(&mut *tx, cmd.membership_id).await?;
        let changes = membership.apply_update(cmd.update)?;
        let changed_fields: Vec<String> = changes.field_names().into_iter().map(str::to_string).collect();

        if changes.is_empty() {
            return Ok(UpdateMembershipResult {
                membership,
                changed_fields,
            });
        }

        tx.update_membership(&membership).await?;
        let entry = NewHistoryEntry::new(
            membership.id,
            HistoryAction::Geaendert,
            format!("Geändert: {}", changed_fields.join(", ")),
            &cmd.actor,
        )
        .with_before(Value::Object(changes.before))
        .with_after(Value::Object(changes.after));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            fields = %changed_fields.join(","),
            "Membership updated"
        );

        Ok(UpdateMembershipResult {
            membership,
            changed_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, Fixture};
    use crate::domain::foundation::Money;
    use crate::domain::membership::MembershipStatus;
    use crate::ports::MembershipReader;
    use serde_json::json;

    fn command(id: MembershipId, update: MembershipUpdate) -> UpdateMembershipCommand {
        UpdateMembershipCommand {
            membership_id: id,
            update,
            actor: admin(),
        }
    }

    #[tokio::test]
    async fn records_only_changed_fields() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = UpdateMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let update = MembershipUpdate {
            jahresbeitrag: Some(Money::from_cents(8000)),
            dojo_name: Some("Dojo Nord".to_string()),
            telefon: Some("+49 40 123".to_string()),
            ..Default::default()
        };
        let result = handler.handle(command(m.id, update)).await.unwrap();

        let mut fields = result.changed_fields.clone();
        fields.sort();
        assert_eq!(fields, vec!["jahresbeitrag", "telefon"]);

        let history = fx.store.history(m.id).await.unwrap();
        assert_eq!(history[0].aktion, HistoryAction::Geaendert);
        assert_eq!(history[0].alte_werte.as_ref().unwrap()["jahresbeitrag"], json!(99.0));
        assert_eq!(history[0].neue_werte.as_ref().unwrap()["jahresbeitrag"], json!(80.0));
        assert!(history[0].neue_werte.as_ref().unwrap().get("dojo_name").is_none());
    }

    #[tokio::test]
    async fn unchanged_values_write_no_history() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = UpdateMembershipHandler::new(fx.store.clone(), fx.audit.clone());
        let before = fx.store.history_count().await;

        let update = MembershipUpdate {
            email: Some(m.contact.email.clone()),
            ..Default::default()
        };
        let result = handler.handle(command(m.id, update)).await.unwrap();

        assert!(result.changed_fields.is_empty());
        assert_eq!(fx.store.history_count().await, before);
    }

    #[tokio::test]
    async fn status_can_move_between_active_and_contract_free() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = UpdateMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let update = MembershipUpdate {
            status: Some(MembershipStatus::ContractFree),
            ..Default::default()
        };
        let result = handler.handle(command(m.id, update)).await.unwrap();
        assert_eq!(result.membership.status, MembershipStatus::ContractFree);
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = UpdateMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let err = handler
            .handle(command(m.id, MembershipUpdate::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn pending_membership_cannot_be_activated_by_update() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = UpdateMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let update = MembershipUpdate {
            status: Some(MembershipStatus::Active),
            ..Default::default()
        };
        let err = handler.handle(command(m.id, update)).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidState { .. }));
    }
}
