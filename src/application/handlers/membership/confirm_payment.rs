//! ConfirmPaymentHandler - Command handler for marking an invoice as paid.
//!
//! Confirming the payment of a pending membership activates it. Locks are
//! taken membership first, then payment, like every other lifecycle
//! operation.

use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, PaymentId};
use crate::domain::membership::{
    HistoryAction, Membership, MembershipError, NewHistoryEntry, Payment, PaymentMethod,
    PaymentStatus,
};
use crate::ports::VerbandStore;

use super::common::lock_membership;

#[derive(Debug, Clone)]
pub struct ConfirmPaymentCommand {
    pub payment_id: PaymentId,
    pub zahlungsart: Option<PaymentMethod>,
    pub transaktions_id: Option<String>,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct ConfirmPaymentResult {
    pub payment: Payment,
    pub membership: Membership,
    pub activated: bool,
}

pub struct ConfirmPaymentHandler {
    store: Arc<dyn VerbandStore>,
    audit: Arc<AuditTrail>,
}

impl ConfirmPaymentHandler {
    pub fn new(store: Arc<dyn VerbandStore>, audit: Arc<AuditTrail>) -> Self {
        Self { store, audit }
    }

    pub async fn handle(&self, cmd: ConfirmPaymentCommand) -> Result<ConfirmPaymentResult, MembershipError> {
        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let owner = tx
            .payment_owner(cmd.payment_id)
            .await?
            .ok_or_else(|| MembershipError::payment_not_found(cmd.payment_id))?;
        let mut membership = lock_membership(&mut *tx, owner).await?;
        let mut payment = tx
            .lock_payment(cmd.payment_id)
            .await?
            .ok_or_else(|| MembershipError::payment_not_found(cmd.payment_id))?;

        if payment.status != PaymentStatus::Open {
            return Err(MembershipError::invalid_state(payment.status.as_str(), "confirm payment"));
        }
        payment.confirm(cmd.zahlungsart, cmd.transaktions_id)?;
        tx.update_payment(&payment).await?;

        let previous = membership.status;
        let activated = membership.activate();
        if activated {
            tx.update_membership(&membership).await?;
        }

        let entry = NewHistoryEntry::new(
            membership.id,
            HistoryAction::Zahlung,
            format!("Zahlung zu Rechnung {} bestätigt", payment.rechnungsnummer),
            &cmd.actor,
        )
        .with_before(json!({ "status": previous, "zahlungsstatus": PaymentStatus::Open }))
        .with_after(json!({
            "status": membership.status,
            "zahlungsstatus": payment.status,
            "rechnungsnummer": payment.rechnungsnummer,
            "betrag_brutto": payment.betrag_brutto,
            "zahlungsart": payment.zahlungsart,
            "transaktions_id": payment.transaktions_id,
        }));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            payment_id = %payment.id,
            rechnungsnummer = %payment.rechnungsnummer,
            activated,
            "Payment confirmed"
        );

        Ok(ConfirmPaymentResult {
            payment,
            membership,
            activated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, Fixture};
    use crate::domain::membership::MembershipStatus;
    use crate::ports::MembershipReader;

    async fn first_payment(fx: &Fixture) -> (Membership, Payment) {
        let m = fx.register_dojo().await;
        let payment = fx.store.payments(m.id).await.unwrap().remove(0);
        (m, payment)
    }

    fn command(id: PaymentId) -> ConfirmPaymentCommand {
        ConfirmPaymentCommand {
            payment_id: id,
            zahlungsart: Some(PaymentMethod::Ueberweisung),
            transaktions_id: Some("TX-4711".to_string()),
            actor: admin(),
        }
    }

    #[tokio::test]
    async fn confirming_activates_pending_membership() {
        let fx = Fixture::new();
        let (m, payment) = first_payment(&fx).await;
        let handler = ConfirmPaymentHandler::new(fx.store.clone(), fx.audit.clone());

        let result = handler.handle(command(payment.id)).await.unwrap();

        assert!(result.activated);
        assert_eq!(result.payment.status, PaymentStatus::Paid);
        assert!(result.payment.bezahlt_am.is_some());
        assert_eq!(result.payment.zahlungsart, Some(PaymentMethod::Ueberweisung));
        assert_eq!(result.payment.transaktions_id.as_deref(), Some("TX-4711"));
        let stored = fx.store.get(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MembershipStatus::Active);

        let history = fx.store.history(m.id).await.unwrap();
        assert_eq!(history[0].aktion, HistoryAction::Zahlung);
    }

    #[tokio::test]
    async fn confirming_twice_is_a_state_conflict() {
        let fx = Fixture::new();
        let (_, payment) = first_payment(&fx).await;
        let handler = ConfirmPaymentHandler::new(fx.store.clone(), fx.audit.clone());

        handler.handle(command(payment.id)).await.unwrap();
        let err = handler.handle(command(payment.id)).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn active_membership_stays_active() {
        let fx = Fixture::new();
        let (mut m, payment) = first_payment(&fx).await;
        m.status = MembershipStatus::ContractFree;
        fx.store.put_membership(m.clone()).await;
        let handler = ConfirmPaymentHandler::new(fx.store.clone(), fx.audit.clone());

        let result = handler.handle(command(payment.id)).await.unwrap();
        assert!(!result.activated);
        assert_eq!(result.membership.status, MembershipStatus::ContractFree);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let fx = Fixture::new();
        let handler = ConfirmPaymentHandler::new(fx.store.clone(), fx.audit.clone());
        let err = handler
            .handle(command(PaymentId::new(77).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn failing_audit_leaves_payment_open() {
        let fx = Fixture::new();
        let (m, payment) = first_payment(&fx).await;
        fx.store.fail_history_appends(true);
        let handler = ConfirmPaymentHandler::new(fx.store.clone(), fx.audit.clone());

        assert!(handler.handle(command(payment.id)).await.is_err());
        let stored = fx.store.payments(m.id).await.unwrap();
        assert_eq!(stored[0].status, PaymentStatus::Open);
        assert_eq!(
            fx.store.get(m.id).await.unwrap().unwrap().status,
            MembershipStatus::Pending
        );
    }
}
