//! CancelMembershipHandler - Command handler for cancelling memberships.
//!
//! Cancelling is idempotent: a second cancel succeeds without changing the
//! membership, but is still recorded in the audit trail.

use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MembershipId};
use crate::domain::membership::{HistoryAction, Membership, MembershipError, NewHistoryEntry};
use crate::ports::VerbandStore;

use super::common::lock_membership;

/// Command to cancel a membership.
#[derive(Debug, Clone)]
pub struct CancelMembershipCommand {
    pub membership_id: MembershipId,
    pub grund: Option<String>,
    pub actor: Actor,
}

/// Result of a cancellation.
#[derive(Debug, Clone)]
pub struct CancelMembershipResult {
    pub membership: Membership,
    pub already_cancelled: bool,
}

/// Handler for cancelling memberships.
///
/// Open invoices are left untouched; they are voided separately if needed.
pub struct CancelMembershipHandler {
    store: Arc<dyn VerbandStore>,
    audit: Arc<AuditTrail>,
}

impl CancelMembershipHandler {
    pub fn new(store: Arc<dyn VerbandStore>, audit: Arc<AuditTrail>) -> Self {
        Self { store, audit }
    }

    pub async fn handle(
        &self,
        cmd: CancelMembershipCommand,
    ) -> Result<CancelMembershipResult, MembershipError> {
        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        // 1. Lock the membership
        let mut membership = lock_membership(&mut *tx, cmd.membership_id).await?;
        let previous = membership.status;

        // 2. Cancel (domain logic)
        let changed = membership.cancel()?;
        if changed {
            tx.update_membership(&membership).await?;
        }

        // 3. Record, even when nothing changed
        let grund = cmd.grund.filter(|g| !g.trim().is_empty());
        let description = match (&grund, changed) {
            (Some(reason), _) => format!("Mitgliedschaft gekündigt: {}", reason),
            (None, true) => "Mitgliedschaft gekündigt".to_string(),
            (None, false) => "Kündigung erneut angefordert (bereits gekündigt)".to_string(),
        };
        let entry = NewHistoryEntry::new(membership.id, HistoryAction::Gekuendigt, description, &cmd.actor)
            .with_before(json!({ "status": previous }))
            .with_after(json!({ "status": membership.status, "grund": grund }));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            already_cancelled = !changed,
            "Membership cancelled"
        );

        Ok(CancelMembershipResult {
            membership,
            already_cancelled: !changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, Fixture};
    use crate::domain::membership::{MembershipStatus, PaymentStatus};
    use crate::ports::MembershipReader;

    fn command(id: MembershipId) -> CancelMembershipCommand {
        CancelMembershipCommand {
            membership_id: id,
            grund: None,
            actor: admin(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancels_active_membership() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = CancelMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let result = handler.handle(command(m.id)).await.unwrap();

        assert!(!result.already_cancelled);
        assert_eq!(result.membership.status, MembershipStatus::Cancelled);
        let stored = fx.store.get(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MembershipStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancels_pending_membership_and_keeps_invoices() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = CancelMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        handler.handle(command(m.id)).await.unwrap();

        let payments = fx.store.all_payments().await;
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Open);
    }

    #[tokio::test]
    async fn second_cancel_succeeds_and_is_recorded() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = CancelMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        handler.handle(command(m.id)).await.unwrap();
        let again = handler.handle(command(m.id)).await.unwrap();

        assert!(again.already_cancelled);
        let cancels = fx
            .store
            .history(m.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|h| h.aktion == HistoryAction::Gekuendigt)
            .count();
        assert_eq!(cancels, 2);
    }

    #[tokio::test]
    async fn reason_ends_up_in_history() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        let handler = CancelMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let mut cmd = command(m.id);
        cmd.grund = Some("Dojo geschlossen".to_string());
        handler.handle(cmd).await.unwrap();

        let history = fx.store.history(m.id).await.unwrap();
        assert!(history[0].beschreibung.contains("Dojo geschlossen"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn fails_when_membership_not_found() {
        let fx = Fixture::new();
        let handler = CancelMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        let result = handler.handle(command(MembershipId::new(99).unwrap())).await;
        assert!(matches!(result, Err(MembershipError::NotFound(_))));
    }

    #[tokio::test]
    async fn failing_audit_keeps_membership_unchanged() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;
        fx.store.fail_history_appends(true);
        let handler = CancelMembershipHandler::new(fx.store.clone(), fx.audit.clone());

        assert!(handler.handle(command(m.id)).await.is_err());
        let stored = fx.store.get(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MembershipStatus::Active);
    }
}
