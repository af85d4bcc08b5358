//! RenewMembershipHandler - Command handler for extending a membership.
//!
//! Extends validity by one contract term and bills the new period, unless
//! the membership is fee-exempt. A lapsed membership restarts from today.

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, MembershipId};
use crate::domain::membership::{
    HistoryAction, InvoiceNumber, Membership, MembershipError, NewHistoryEntry, Payment,
};
use crate::ports::{SettingsResolver, VerbandStore};

use super::common::{issue_invoice, lock_membership, today};

#[derive(Debug, Clone)]
pub struct RenewMembershipCommand {
    pub membership_id: MembershipId,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct RenewMembershipResult {
    pub membership: Membership,
    pub neues_ende: NaiveDate,
    pub payment: Option<Payment>,
}

impl RenewMembershipResult {
    pub fn rechnungsnummer(&self) -> Option<&InvoiceNumber> {
        self.payment.as_ref().map(|p| &p.rechnungsnummer)
    }
}

pub struct RenewMembershipHandler {
    store: Arc<dyn VerbandStore>,
    settings: Arc<dyn SettingsResolver>,
    audit: Arc<AuditTrail>,
}

impl RenewMembershipHandler {
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

    pub async fn handle(&self, cmd: RenewMembershipCommand) -> Result<RenewMembershipResult, MembershipError> {
        let settings = self.settings.snapshot().await?;
        let today = today();

        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        let mut membership = lock_membership(&mut *tx, cmd.membership_id).await?;
        let before = membership.snapshot();
        let period = membership.renew(today, settings.laufzeit_monate)?;
        tx.update_membership(&membership).await?;

        let payment = if membership.beitragsfrei {
            None
        } else {
            Some(issue_invoice(&mut *tx, &membership, period, &settings, today).await?)
        };

        let entry = NewHistoryEntry::new(
            membership.id,
            HistoryAction::Verlaengert,
            format!("Mitgliedschaft verlängert bis {}", period.end),
            &cmd.actor,
        )
        .with_before(before)
        .with_after(json!({
            "status": membership.status,
            "zeitraum_von": period.start,
            "gueltig_bis": period.end,
            "rechnungsnummer": payment.as_ref().map(|p| &p.rechnungsnummer),
            "betrag_brutto": payment.as_ref().map(|p| p.betrag_brutto),
        }));
        self.audit.record(&mut *tx, &mut batch, entry).await?;

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            gueltig_bis = %period.end,
            invoiced = payment.is_some(),
            "Membership renewed"
        );

        Ok(RenewMembershipResult {
            neues_ende: period.end,
            membership,
            payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{admin, Fixture};
    use crate::domain::foundation::{add_months, Money};
    use crate::domain::membership::{MembershipStatus, PaymentStatus};
    use crate::ports::MembershipReader;
    use chrono::Duration;

    fn handler(fx: &Fixture) -> RenewMembershipHandler {
        RenewMembershipHandler::new(fx.store.clone(), fx.settings.clone(), fx.audit.clone())
    }

    fn command(id: MembershipId) -> RenewMembershipCommand {
        RenewMembershipCommand {
            membership_id: id,
            actor: admin(),
        }
    }

    #[tokio::test]
    async fn running_membership_extends_from_current_end() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;

        let result = handler(&fx).handle(command(m.id)).await.unwrap();

        let expected = add_months(m.gueltig_bis, 12).unwrap();
        assert_eq!(result.neues_ende, expected);
        let payment = result.payment.unwrap();
        assert_eq!(payment.zeitraum_von, m.gueltig_bis);
        assert_eq!(payment.zeitraum_bis, expected);
        assert_eq!(payment.status, PaymentStatus::Open);
        assert_eq!(payment.betrag_brutto, Money::from_cents(11781));
    }

    #[tokio::test]
    async fn lapsed_membership_restarts_today() {
        let fx = Fixture::new();
        let mut m = fx.active_dojo().await;
        let today = today();
        m.gueltig_ab = today - Duration::days(800);
        m.gueltig_bis = today - Duration::days(400);
        fx.store.put_membership(m.clone()).await;
        // The registration invoice also starts today; clear it out of the way.
        let mut tx = fx.store.begin().await.unwrap();
        for mut p in tx.open_payments(m.id).await.unwrap() {
            p.void().unwrap();
            tx.update_payment(&p).await.unwrap();
        }
        tx.commit().await.unwrap();

        let result = handler(&fx).handle(command(m.id)).await.unwrap();

        assert_eq!(result.neues_ende, add_months(today, 12).unwrap());
        assert_eq!(result.payment.unwrap().zeitraum_von, today);
    }

    #[tokio::test]
    async fn contract_free_becomes_active() {
        let fx = Fixture::new();
        let mut m = fx.active_dojo().await;
        m.status = MembershipStatus::ContractFree;
        fx.store.put_membership(m.clone()).await;

        let result = handler(&fx).handle(command(m.id)).await.unwrap();
        assert_eq!(result.membership.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn fee_exempt_renewal_issues_no_invoice() {
        let fx = Fixture::new();
        let mut m = fx.active_dojo().await;
        m.set_fee_exemption(true, Money::from_cents(9900));
        fx.store.put_membership(m.clone()).await;
        let before = fx.store.all_payments().await.len();

        let result = handler(&fx).handle(command(m.id)).await.unwrap();

        assert!(result.payment.is_none());
        assert!(result.rechnungsnummer().is_none());
        assert_eq!(fx.store.all_payments().await.len(), before);
        let history = fx.store.history(m.id).await.unwrap();
        assert_eq!(history[0].aktion, HistoryAction::Verlaengert);
    }

    #[tokio::test]
    async fn pending_membership_is_rejected() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;

        let err = handler(&fx).handle(command(m.id)).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidState { .. }));
        assert_eq!(fx.store.get(m.id).await.unwrap().unwrap().gueltig_bis, m.gueltig_bis);
    }

    #[tokio::test]
    async fn invoice_numbers_keep_counting() {
        let fx = Fixture::new();
        let m = fx.active_dojo().await;

        let first = handler(&fx).handle(command(m.id)).await.unwrap();
        let second = handler(&fx).handle(command(m.id)).await.unwrap();

        let first = first.rechnungsnummer().unwrap().as_str().to_string();
        let second = second.rechnungsnummer().unwrap().as_str().to_string();
        assert!(first.ends_with("-1001"));
        assert!(second.ends_with("-1002"));
    }
}
