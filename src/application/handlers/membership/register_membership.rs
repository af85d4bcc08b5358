//! RegisterMembershipHandler - Command handler for new Verband memberships.
//!
//! Used by the public self-registration and by administrators. One
//! transaction draws the membership number, inserts the membership, issues
//! the invoice for the first contract term and, for direct debit, stores
//! the SEPA mandate.

use serde_json::json;
use std::sync::Arc;

use crate::application::{AuditBatch, AuditTrail};
use crate::domain::foundation::{Actor, Timestamp, ValidationError};
use crate::domain::membership::{
    BillingPeriod, CountryCode, HistoryAction, Iban, MandateSignature, Membership, MembershipError,
    MembershipNumber, NewHistoryEntry, NewMandate, NewMembership, Payment, PaymentMethod,
    Registration, SepaMandate,
};
use crate::ports::{SettingsResolver, VerbandStore};

use super::common::{issue_invoice, today, with_fields};
use super::MandateDetails;

/// Command to register a membership.
#[derive(Debug, Clone)]
pub struct RegisterMembershipCommand {
    pub registration: Registration,
    /// Bank details; only used when the payment method is direct debit.
    pub sepa: Option<MandateDetails>,
    pub actor: Actor,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct RegisterMembershipResult {
    pub membership: Membership,
    pub payment: Option<Payment>,
    pub mandate: Option<SepaMandate>,
}

/// Handler for registering memberships.
pub struct RegisterMembershipHandler {
    store: Arc<dyn VerbandStore>,
    settings: Arc<dyn SettingsResolver>,
    audit: Arc<AuditTrail>,
}

impl RegisterMembershipHandler {
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

    pub async fn handle(
        &self,
        cmd: RegisterMembershipCommand,
    ) -> Result<RegisterMembershipResult, MembershipError> {
        // 1. Validate everything that needs no store access
        cmd.registration.validate()?;
        let sepa = match (cmd.registration.zahlungsart, cmd.sepa) {
            (PaymentMethod::Sepa, Some(details)) => {
                Iban::parse(&details.iban)?;
                Some(details)
            }
            (PaymentMethod::Sepa, None) => {
                return Err(ValidationError::empty_field("iban").into());
            }
            _ => None,
        };

        let settings = self.settings.snapshot().await?;
        let today = today();
        let kind = cmd.registration.kind();
        let country = CountryCode::resolve(cmd.registration.contact.land.as_deref());
        let holder_fallback = cmd.registration.party.display_name();

        let mut tx = self.store.begin().await?;
        let mut batch = AuditBatch::default();

        // 2. Draw the membership number and insert
        let sequence = tx.next_membership_sequence(kind).await?;
        let number = MembershipNumber::format(&settings.verband_kuerzel, &country, kind, sequence);
        let new = NewMembership::from_registration(
            cmd.registration,
            number,
            &settings,
            today,
            cmd.actor.ip.clone(),
        )?;
        let mut membership = tx.insert_membership(&new).await?;

        // 3. Invoice for the first contract term
        let period = BillingPeriod {
            start: membership.gueltig_ab,
            end: membership.gueltig_bis,
        };
        let payment = issue_invoice(&mut *tx, &membership, period, &settings, today).await?;

        // 4. Optional SEPA mandate
        let mandate = match sepa {
            Some(details) => {
                let holder = details
                    .kontoinhaber
                    .clone()
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or(holder_fallback);
                let signature = MandateSignature {
                    unterschrieben_von: Some(holder.clone()),
                    unterschrieben_am: Some(Timestamp::now()),
                    unterschrift_ip: cmd.actor.ip.clone(),
                };
                let new_mandate = NewMandate::build(
                    membership.id,
                    &details.iban,
                    details.bic,
                    &holder,
                    details.bankname,
                    signature,
                )?;
                let mandate = tx.insert_mandate(&new_mandate).await?;
                membership.attach_mandate(&new_mandate);
                tx.update_membership(&membership).await?;
                Some(mandate)
            }
            None => None,
        };

        // 5. Audit trail
        let created = NewHistoryEntry::new(
            membership.id,
            HistoryAction::Erstellt,
            format!("Mitgliedschaft {} angelegt", membership.mitgliedsnummer),
            &cmd.actor,
        )
        .with_after(with_fields(
            membership.snapshot(),
            json!({
                "mitgliedsnummer": membership.mitgliedsnummer,
                "typ": kind,
                "rechnungsnummer": payment.rechnungsnummer,
            }),
        ));
        self.audit.record(&mut *tx, &mut batch, created).await?;

        if let Some(mandate) = &mandate {
            let entry = NewHistoryEntry::new(
                membership.id,
                HistoryAction::SepaAngelegt,
                format!("SEPA-Mandat {} angelegt", mandate.mandatsreferenz),
                &cmd.actor,
            )
            .with_after(json!({
                "mandatsreferenz": mandate.mandatsreferenz,
                "iban": mandate.iban_maskiert,
                "kontoinhaber": mandate.kontoinhaber,
            }));
            self.audit.record(&mut *tx, &mut batch, entry).await?;
        }

        tx.commit().await?;
        self.audit.complete(batch).await;

        tracing::info!(
            membership_id = %membership.id,
            mitgliedsnummer = %membership.mitgliedsnummer,
            status = %membership.status,
            "Membership registered"
        );

        Ok(RegisterMembershipResult {
            membership,
            payment: Some(payment),
            mandate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::{
        admin, dojo_registration, person_registration, Fixture,
    };
    use crate::domain::foundation::Money;
    use crate::domain::membership::{setting_keys, MembershipStatus, PaymentStatus, SettingValue};
    use crate::ports::MembershipReader;

    fn sepa_details() -> MandateDetails {
        MandateDetails {
            iban: "DE89 3704 0044 0532 0130 00".to_string(),
            bic: Some("COBADEFFXXX".to_string()),
            kontoinhaber: None,
            bankname: Some("Commerzbank".to_string()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn first_dojo_gets_first_number() {
        let fx = Fixture::new();
        let result = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration: dojo_registration(),
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap();

        assert_eq!(result.membership.mitgliedsnummer.as_str(), "TDA-DE-D-0001");
        assert_eq!(result.membership.status, MembershipStatus::Pending);
        assert_eq!(result.membership.jahresbeitrag, Money::from_cents(9900));
        assert!(result.mandate.is_none());
    }

    #[tokio::test]
    async fn kinds_count_separately() {
        let fx = Fixture::new();
        fx.register_dojo().await;
        let second = fx.register_dojo().await;
        let person = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration: person_registration(),
                sepa: None,
                actor: Actor::public(None),
            })
            .await
            .unwrap()
            .membership;

        assert_eq!(second.mitgliedsnummer.as_str(), "TDA-DE-D-0002");
        assert_eq!(person.mitgliedsnummer.as_str(), "TDA-AT-E-0001");
    }

    #[tokio::test]
    async fn issues_first_term_invoice() {
        let fx = Fixture::new();
        let result = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration: dojo_registration(),
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap();

        let payment = result.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Open);
        assert_eq!(payment.betrag_netto, Money::from_cents(9900));
        assert_eq!(payment.mwst_betrag, Money::from_cents(1881));
        assert_eq!(payment.betrag_brutto, Money::from_cents(11781));
        assert_eq!(payment.zeitraum_von, result.membership.gueltig_ab);
        assert_eq!(payment.zeitraum_bis, result.membership.gueltig_bis);
        assert!(payment.rechnungsnummer.as_str().ends_with("-1000"));
    }

    #[tokio::test]
    async fn prefix_comes_from_settings() {
        let fx = Fixture::new();
        fx.settings
            .put(setting_keys::VERBAND_KUERZEL, SettingValue::String("KBV".into()))
            .await;
        let m = fx.register_dojo().await;
        assert_eq!(m.mitgliedsnummer.as_str(), "KBV-DE-D-0001");
    }

    #[tokio::test]
    async fn waits_for_signature_when_required() {
        let fx = Fixture::new();
        fx.settings
            .put(setting_keys::UNTERSCHRIFT_ERFORDERLICH, SettingValue::Boolean(true))
            .await;
        let m = fx.register_dojo().await;
        assert_eq!(m.status, MembershipStatus::PendingSignature);
    }

    #[tokio::test]
    async fn direct_debit_stores_mandate_and_snapshot() {
        let fx = Fixture::new();
        let mut registration = dojo_registration();
        registration.zahlungsart = PaymentMethod::Sepa;

        let result = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration,
                sepa: Some(sepa_details()),
                actor: admin(),
            })
            .await
            .unwrap();

        let mandate = result.mandate.unwrap();
        assert!(mandate.is_active());
        assert_eq!(mandate.kontoinhaber, "Dojo Nord");
        assert_eq!(mandate.iban_maskiert, "DE89****3000");
        let snapshot = result.membership.sepa.unwrap();
        assert_eq!(snapshot.iban, "DE89370400440532013000");

        let history = fx.store.history(result.membership.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!serde_json::to_string(&history).unwrap().contains("DE89370400440532013000"));
    }

    #[tokio::test]
    async fn writes_created_history_entry() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let history = fx.store.history(m.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].aktion, HistoryAction::Erstellt);
        assert_eq!(history[0].durchgefuehrt_von, "Kim Admin");
        assert_eq!(history[0].ip_adresse.as_deref(), Some("10.0.0.1"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn missing_consent_consumes_no_number() {
        let fx = Fixture::new();
        let mut registration = dojo_registration();
        registration.consent.datenschutz_akzeptiert = false;

        let err = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration,
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::ValidationFailed { .. }));

        let m = fx.register_dojo().await;
        assert_eq!(m.mitgliedsnummer.as_str(), "TDA-DE-D-0001");
    }

    #[tokio::test]
    async fn invalid_iban_is_rejected_before_anything_is_written() {
        let fx = Fixture::new();
        let mut registration = dojo_registration();
        registration.zahlungsart = PaymentMethod::Sepa;
        let mut details = sepa_details();
        details.iban = "DE00370400440532013000".to_string();

        let err = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration,
                sepa: Some(details),
                actor: admin(),
            })
            .await
            .unwrap_err();
        match err {
            MembershipError::ValidationFailed { field, .. } => assert_eq!(field, "iban"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(fx.store.history_count().await, 0);
    }

    #[tokio::test]
    async fn direct_debit_without_bank_details_is_rejected() {
        let fx = Fixture::new();
        let mut registration = dojo_registration();
        registration.zahlungsart = PaymentMethod::Sepa;

        let err = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration,
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap_err();
        match err {
            MembershipError::ValidationFailed { field, .. } => assert_eq!(field, "iban"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(fx.store.list(&Default::default()).await.unwrap().is_empty());
        assert_eq!(fx.store.history_count().await, 0);
    }

    #[tokio::test]
    async fn failing_audit_rolls_back_registration() {
        let fx = Fixture::new();
        fx.store.fail_history_appends(true);

        let err = fx
            .register_handler()
            .handle(RegisterMembershipCommand {
                registration: dojo_registration(),
                sepa: None,
                actor: admin(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Infrastructure { .. }));
        assert!(fx.store.all_payments().await.is_empty());

        fx.store.fail_history_appends(false);
        let m = fx.register_dojo().await;
        assert_eq!(m.mitgliedsnummer.as_str(), "TDA-DE-D-0001");
    }
}
