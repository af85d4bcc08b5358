//! In-memory transactional store.
//!
//! Backs tests and `database.url = "memory://"` runs. A transaction takes an
//! owned lock on the whole state and works on a copy, so transactions are
//! fully serialized and an uncommitted transaction leaves nothing behind.
//! The same uniqueness rules as the Postgres schema are enforced.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::{
    DomainError, ErrorCode, HistoryEntryId, MandateId, MembershipId, PaymentId, Timestamp,
};
use crate::domain::membership::{
    mask_iban, HistoryEntry, Membership, MembershipKind, NewHistoryEntry, NewMandate,
    NewMembership, NewPayment, Payment, PaymentStatus, SepaMandate, MandateStatus,
};
use crate::ports::{MembershipFilter, MembershipReader, VerbandStore, VerbandTransaction};

#[derive(Debug, Clone, Default)]
struct StoreState {
    memberships: BTreeMap<i64, Membership>,
    payments: BTreeMap<i64, Payment>,
    mandates: BTreeMap<i64, SepaMandate>,
    history: Vec<HistoryEntry>,
    number_sequences: HashMap<&'static str, i64>,
    invoice_sequences: HashMap<i32, i64>,
    last_membership_id: i64,
    last_payment_id: i64,
    last_mandate_id: i64,
    last_history_id: i64,
}

/// In-memory implementation of [`VerbandStore`] and [`MembershipReader`].
#[derive(Clone, Default)]
pub struct InMemoryVerbandStore {
    state: Arc<Mutex<StoreState>>,
    fail_history: Arc<AtomicBool>,
}

impl InMemoryVerbandStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Makes every subsequent history append fail with a database error.
    pub fn fail_history_appends(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    /// Total number of committed history entries.
    pub async fn history_count(&self) -> usize {
        self.state.lock().await.history.len()
    }

    /// Committed payments of all memberships.
    pub async fn all_payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.values().cloned().collect()
    }

    /// Overwrites a committed membership (for arranging test fixtures).
    pub async fn put_membership(&self, membership: Membership) {
        self.state
            .lock()
            .await
            .memberships
            .insert(membership.id.value(), membership);
    }
}

#[async_trait]
impl VerbandStore for InMemoryVerbandStore {
    async fn begin(&self) -> Result<Box<dyn VerbandTransaction>, DomainError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            fail_history: self.fail_history.load(Ordering::SeqCst),
        }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    fail_history: bool,
}

fn conflict(message: impl Into<String>) -> DomainError {
    DomainError::conflict(message)
}

fn missing(code: ErrorCode, what: &str, id: i64) -> DomainError {
    DomainError::new(code, format!("{} {} not found", what, id))
}

#[async_trait]
impl VerbandTransaction for InMemoryTransaction {
    async fn next_membership_sequence(&mut self, kind: MembershipKind) -> Result<i64, DomainError> {
        let counter = self
            .working
            .number_sequences
            .entry(kind.sequence_key())
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn next_invoice_sequence(&mut self, year: i32) -> Result<i64, DomainError> {
        if !self.working.invoice_sequences.contains_key(&year) {
            let issued = self
                .working
                .payments
                .values()
                .filter(|p| p.rechnungsnummer.year() == Some(year))
                .count() as i64;
            self.working.invoice_sequences.insert(year, issued);
        }
        let counter = self.working.invoice_sequences.entry(year).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_membership(&mut self, new: &NewMembership) -> Result<Membership, DomainError> {
        if self
            .working
            .memberships
            .values()
            .any(|m| m.mitgliedsnummer == new.mitgliedsnummer)
        {
            return Err(conflict(format!(
                "Mitgliedsnummer {} already exists",
                new.mitgliedsnummer
            )));
        }
        self.working.last_membership_id += 1;
        let now = Timestamp::now();
        let membership = Membership {
            id: MembershipId::new(self.working.last_membership_id)?,
            mitgliedsnummer: new.mitgliedsnummer.clone(),
            status: new.status,
            party: new.party.clone(),
            contact: new.contact.clone(),
            jahresbeitrag: new.jahresbeitrag,
            beitragsfrei: new.beitragsfrei,
            zahlungsart: new.zahlungsart,
            sepa: new.sepa.clone(),
            gueltig_ab: new.gueltig_ab,
            gueltig_bis: new.gueltig_bis,
            consent: new.consent,
            signature: new.signature.clone(),
            notizen: new.notizen.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working
            .memberships
            .insert(membership.id.value(), membership.clone());
        Ok(membership)
    }

    async fn lock_membership(&mut self, id: MembershipId) -> Result<Option<Membership>, DomainError> {
        Ok(self.working.memberships.get(&id.value()).cloned())
    }

    async fn update_membership(&mut self, membership: &Membership) -> Result<(), DomainError> {
        let slot = self
            .working
            .memberships
            .get_mut(&membership.id.value())
            .ok_or_else(|| missing(ErrorCode::MembershipNotFound, "Membership", membership.id.value()))?;
        let mut updated = membership.clone();
        updated.mitgliedsnummer = slot.mitgliedsnummer.clone();
        updated.created_at = slot.created_at;
        updated.updated_at = Timestamp::now();
        *slot = updated;
        Ok(())
    }

    async fn insert_payment(&mut self, new: &NewPayment) -> Result<Payment, DomainError> {
        if self
            .working
            .payments
            .values()
            .any(|p| p.rechnungsnummer == new.rechnungsnummer)
        {
            return Err(conflict(format!(
                "Rechnungsnummer {} already exists",
                new.rechnungsnummer
            )));
        }
        if self.working.payments.values().any(|p| {
            p.verbandsmitgliedschaft_id == new.membership_id
                && p.zeitraum_von == new.zeitraum_von
                && p.status != PaymentStatus::Voided
        }) {
            return Err(conflict(format!(
                "A payment for the period starting {} already exists",
                new.zeitraum_von
            )));
        }
        self.working.last_payment_id += 1;
        let payment = Payment {
            id: PaymentId::new(self.working.last_payment_id)?,
            verbandsmitgliedschaft_id: new.membership_id,
            rechnungsnummer: new.rechnungsnummer.clone(),
            rechnungsdatum: new.rechnungsdatum,
            faellig_am: new.faellig_am,
            betrag_netto: new.billing.betrag_netto,
            mwst_satz: new.billing.mwst_satz,
            mwst_betrag: new.billing.mwst_betrag,
            betrag_brutto: new.billing.betrag_brutto,
            zeitraum_von: new.zeitraum_von,
            zeitraum_bis: new.zeitraum_bis,
            status: PaymentStatus::Open,
            bezahlt_am: None,
            zahlungsart: Some(new.zahlungsart),
            transaktions_id: None,
            created_at: Timestamp::now(),
        };
        self.working.payments.insert(payment.id.value(), payment.clone());
        Ok(payment)
    }

    async fn payment_owner(&mut self, id: PaymentId) -> Result<Option<MembershipId>, DomainError> {
        Ok(self
            .working
            .payments
            .get(&id.value())
            .map(|p| p.verbandsmitgliedschaft_id))
    }

    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.working.payments.get(&id.value()).cloned())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        let slot = self
            .working
            .payments
            .get_mut(&payment.id.value())
            .ok_or_else(|| missing(ErrorCode::PaymentNotFound, "Payment", payment.id.value()))?;
        *slot = payment.clone();
        Ok(())
    }

    async fn open_payments(&mut self, membership_id: MembershipId) -> Result<Vec<Payment>, DomainError> {
        Ok(self
            .working
            .payments
            .values()
            .filter(|p| p.verbandsmitgliedschaft_id == membership_id && p.status == PaymentStatus::Open)
            .cloned()
            .collect())
    }

    async fn insert_mandate(&mut self, new: &NewMandate) -> Result<SepaMandate, DomainError> {
        if self
            .working
            .mandates
            .values()
            .any(|m| m.mandatsreferenz == new.mandatsreferenz)
        {
            return Err(conflict(format!(
                "Mandatsreferenz {} already exists",
                new.mandatsreferenz
            )));
        }
        if self
            .working
            .mandates
            .values()
            .any(|m| m.verbandsmitgliedschaft_id == new.membership_id && m.is_active())
        {
            return Err(conflict("Membership already has an active SEPA mandate"));
        }
        self.working.last_mandate_id += 1;
        let mandate = SepaMandate {
            id: MandateId::new(self.working.last_mandate_id)?,
            verbandsmitgliedschaft_id: new.membership_id,
            mandatsreferenz: new.mandatsreferenz.clone(),
            iban: new.iban.clone(),
            iban_maskiert: mask_iban(new.iban.as_str()),
            bic: new.bic.clone(),
            kontoinhaber: new.kontoinhaber.clone(),
            bankname: new.bankname.clone(),
            status: MandateStatus::Active,
            signature: new.signature.clone(),
            widerrufen_am: None,
            created_at: Timestamp::now(),
        };
        self.working.mandates.insert(mandate.id.value(), mandate.clone());
        Ok(mandate)
    }

    async fn mandate_owner(&mut self, id: MandateId) -> Result<Option<MembershipId>, DomainError> {
        Ok(self
            .working
            .mandates
            .get(&id.value())
            .map(|m| m.verbandsmitgliedschaft_id))
    }

    async fn lock_mandate(&mut self, id: MandateId) -> Result<Option<SepaMandate>, DomainError> {
        Ok(self.working.mandates.get(&id.value()).cloned())
    }

    async fn active_mandates(&mut self, membership_id: MembershipId) -> Result<Vec<SepaMandate>, DomainError> {
        Ok(self
            .working
            .mandates
            .values()
            .filter(|m| m.verbandsmitgliedschaft_id == membership_id && m.is_active())
            .cloned()
            .collect())
    }

    async fn update_mandate(&mut self, mandate: &SepaMandate) -> Result<(), DomainError> {
        let slot = self
            .working
            .mandates
            .get_mut(&mandate.id.value())
            .ok_or_else(|| missing(ErrorCode::MandateNotFound, "Mandate", mandate.id.value()))?;
        *slot = mandate.clone();
        Ok(())
    }

    async fn append_history(&mut self, entry: &NewHistoryEntry) -> Result<HistoryEntry, DomainError> {
        if self.fail_history {
            return Err(DomainError::database(
                "Failed to append history entry",
                "history writes disabled",
            ));
        }
        self.working.last_history_id += 1;
        let stored = HistoryEntry {
            id: HistoryEntryId::new(self.working.last_history_id)?,
            verbandsmitgliedschaft_id: entry.membership_id,
            aktion: entry.aktion,
            beschreibung: entry.beschreibung.clone(),
            alte_werte: entry.alte_werte.clone(),
            neue_werte: entry.neue_werte.clone(),
            durchgefuehrt_von: entry.durchgefuehrt_von.clone(),
            ip_adresse: entry.ip_adresse.clone(),
            created_at: Timestamp::now(),
        };
        self.working.history.push(stored.clone());
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl MembershipReader for InMemoryVerbandStore {
    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<Membership>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .values()
            .rev()
            .filter(|m| filter.typ.map_or(true, |t| m.kind() == t))
            .filter(|m| filter.status.map_or(true, |s| m.status == s))
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: MembershipId) -> Result<Option<Membership>, DomainError> {
        Ok(self.state.lock().await.memberships.get(&id.value()).cloned())
    }

    async fn payments(&self, id: MembershipId) -> Result<Vec<Payment>, DomainError> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.verbandsmitgliedschaft_id == id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.zeitraum_von.cmp(&a.zeitraum_von).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn mandates(&self, id: MembershipId) -> Result<Vec<SepaMandate>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .mandates
            .values()
            .rev()
            .filter(|m| m.verbandsmitgliedschaft_id == id)
            .cloned()
            .collect())
    }

    async fn history(&self, id: MembershipId) -> Result<Vec<HistoryEntry>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.verbandsmitgliedschaft_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Actor, Money};
    use crate::domain::membership::{
        compute_brutto, Consent, Contact, CountryCode, HistoryAction, InvoiceNumber,
        MembershipNumber, MembershipStatus, Party, PaymentMethod, Signature, VatRate,
    };
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_membership(seq: i64) -> NewMembership {
        NewMembership {
            mitgliedsnummer: MembershipNumber::format(
                "TDA",
                &CountryCode::resolve(Some("DE")),
                MembershipKind::Dojo,
                seq,
            ),
            status: MembershipStatus::Pending,
            party: Party::Dojo {
                dojo_id: None,
                dojo_name: "Dojo Süd".into(),
                dojo_inhaber: None,
            },
            contact: Contact {
                email: "sued@example.de".into(),
                ..Default::default()
            },
            jahresbeitrag: Money::from_cents(9900),
            beitragsfrei: false,
            zahlungsart: PaymentMethod::Rechnung,
            sepa: None,
            gueltig_ab: date(2026, 1, 1),
            gueltig_bis: date(2027, 1, 1),
            consent: Consent::new(true, true),
            signature: Signature::default(),
            notizen: None,
        }
    }

    fn new_payment(id: MembershipId, number: &str, from: NaiveDate) -> NewPayment {
        NewPayment {
            membership_id: id,
            rechnungsnummer: InvoiceNumber::from_stored(number),
            rechnungsdatum: from,
            faellig_am: from,
            billing: compute_brutto(Money::from_cents(9900), VatRate::STANDARD).unwrap(),
            zeitraum_von: from,
            zeitraum_bis: date(2030, 1, 1),
            zahlungsart: PaymentMethod::Rechnung,
        }
    }

    #[tokio::test]
    async fn uncommitted_transaction_leaves_no_trace() {
        let store = InMemoryVerbandStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_membership(&new_membership(1)).await.unwrap();
            // dropped without commit
        }
        assert!(store.list(&MembershipFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = InMemoryVerbandStore::new();
        let mut tx = store.begin().await.unwrap();
        let m = tx.insert_membership(&new_membership(1)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.get(m.id).await.unwrap().unwrap().mitgliedsnummer.as_str(), "TDA-DE-D-0001");
    }

    #[tokio::test]
    async fn sequences_count_per_kind() {
        let store = InMemoryVerbandStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_membership_sequence(MembershipKind::Dojo).await.unwrap(), 1);
        assert_eq!(tx.next_membership_sequence(MembershipKind::Dojo).await.unwrap(), 2);
        assert_eq!(tx.next_membership_sequence(MembershipKind::Einzelperson).await.unwrap(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn invoice_counter_is_seeded_from_existing_payments() {
        let store = InMemoryVerbandStore::new();
        let mut tx = store.begin().await.unwrap();
        let m = tx.insert_membership(&new_membership(1)).await.unwrap();
        tx.insert_payment(&new_payment(m.id, "2026/01/05-1000", date(2026, 1, 5)))
            .await
            .unwrap();
        tx.insert_payment(&new_payment(m.id, "2026/02/05-1001", date(2026, 2, 5)))
            .await
            .unwrap();
        assert_eq!(tx.next_invoice_sequence(2026).await.unwrap(), 3);
        assert_eq!(tx.next_invoice_sequence(2027).await.unwrap(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_invoice_number_is_a_conflict() {
        let store = InMemoryVerbandStore::new();
        let mut tx = store.begin().await.unwrap();
        let m = tx.insert_membership(&new_membership(1)).await.unwrap();
        tx.insert_payment(&new_payment(m.id, "2026/01/05-1000", date(2026, 1, 5)))
            .await
            .unwrap();
        let err = tx
            .insert_payment(&new_payment(m.id, "2026/01/05-1000", date(2026, 6, 5)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn second_payment_for_same_period_is_a_conflict() {
        let store = InMemoryVerbandStore::new();
        let mut tx = store.begin().await.unwrap();
        let m = tx.insert_membership(&new_membership(1)).await.unwrap();
        tx.insert_payment(&new_payment(m.id, "2026/01/05-1000", date(2026, 1, 5)))
            .await
            .unwrap();
        let err = tx
            .insert_payment(&new_payment(m.id, "2026/01/05-1001", date(2026, 1, 5)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let store = InMemoryVerbandStore::new();
        let mut tx = store.begin().await.unwrap();
        let m = tx.insert_membership(&new_membership(1)).await.unwrap();
        let actor = Actor::system();
        tx.append_history(&NewHistoryEntry::new(m.id, HistoryAction::Erstellt, "a", &actor))
            .await
            .unwrap();
        tx.append_history(&NewHistoryEntry::new(m.id, HistoryAction::Geaendert, "b", &actor))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let history = store.history(m.id).await.unwrap();
        assert_eq!(history[0].aktion, HistoryAction::Geaendert);
        assert_eq!(history[1].aktion, HistoryAction::Erstellt);
    }

    #[tokio::test]
    async fn failing_history_appends_are_reported() {
        let store = InMemoryVerbandStore::new();
        store.fail_history_appends(true);
        let mut tx = store.begin().await.unwrap();
        let m = tx.insert_membership(&new_membership(1)).await.unwrap();
        let err = tx
            .append_history(&NewHistoryEntry::new(m.id, HistoryAction::Erstellt, "a", &Actor::system()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
