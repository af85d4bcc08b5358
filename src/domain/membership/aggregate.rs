//! Membership aggregate entity.
//!
//! A Verband membership belongs to either a dojo or an individual and moves
//! through the status state machine by signing, payment, renewal, fee
//! exemption and cancellation.
//!
//! # Design Decisions
//!
//! - **Money in cents**: fees are `Money`, never floats
//! - **Store-assigned ids**: `NewMembership` has no id; `Membership` always does
//! - **SEPA snapshot**: IBAN/BIC/holder of the active mandate are copied onto
//!   the membership; history snapshots only ever carry the masked IBAN

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::domain::foundation::{
    add_months, MembershipId, Money, StateMachine, Timestamp, ValidationError,
};

use super::mandate::mask_iban;
use super::{
    Consent, Contact, MembershipError, MembershipKind, MembershipNumber, MembershipStatus,
    MembershipUpdate, NewMandate, Party, PaymentMethod, Signature, VerbandSettings,
};

/// Bank details copied from the active SEPA mandate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SepaSnapshot {
    pub iban: String,
    pub bic: Option<String>,
    pub kontoinhaber: String,
}

/// Membership aggregate.
///
/// # Invariants
///
/// - `gueltig_ab <= gueltig_bis`
/// - `beitragsfrei` implies `jahresbeitrag == 0`
/// - `mitgliedsnummer` never changes after insert
/// - Status transitions follow [`MembershipStatus`] rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub id: MembershipId,
    pub mitgliedsnummer: MembershipNumber,
    pub status: MembershipStatus,
    pub party: Party,
    pub contact: Contact,
    pub jahresbeitrag: Money,
    pub beitragsfrei: bool,
    pub zahlungsart: PaymentMethod,
    pub sepa: Option<SepaSnapshot>,
    pub gueltig_ab: NaiveDate,
    pub gueltig_bis: NaiveDate,
    pub consent: Consent,
    pub signature: Signature,
    pub notizen: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Data submitted by a self-registration or an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub party: Party,
    pub contact: Contact,
    pub zahlungsart: PaymentMethod,
    pub consent: Consent,
    pub unterschrift: Option<String>,
    pub notizen: Option<String>,
}

impl Registration {
    /// Runs every check that does not need the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.party.validate()?;
        self.contact.validate()?;
        self.consent.require_complete()
    }

    pub fn kind(&self) -> MembershipKind {
        self.party.kind()
    }
}

/// A membership about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMembership {
    pub mitgliedsnummer: MembershipNumber,
    pub status: MembershipStatus,
    pub party: Party,
    pub contact: Contact,
    pub jahresbeitrag: Money,
    pub beitragsfrei: bool,
    pub zahlungsart: PaymentMethod,
    pub sepa: Option<SepaSnapshot>,
    pub gueltig_ab: NaiveDate,
    pub gueltig_bis: NaiveDate,
    pub consent: Consent,
    pub signature: Signature,
    pub notizen: Option<String>,
}

impl NewMembership {
    /// Builds the row for a validated registration.
    ///
    /// The membership starts `ausstehend`, or `ausstehend_unterschrift` when
    /// a signature is required and none was given. It is valid from `today`
    /// for one contract term.
    pub fn from_registration(
        registration: Registration,
        mitgliedsnummer: MembershipNumber,
        settings: &VerbandSettings,
        today: NaiveDate,
        ip: Option<String>,
    ) -> Result<Self, ValidationError> {
        registration.validate()?;

        let signature = match registration.unterschrift.filter(|s| !s.trim().is_empty()) {
            Some(blob) => Signature::captured(blob, ip)?,
            None => Signature::default(),
        };
        let status = if settings.unterschrift_erforderlich && !signature.is_present() {
            MembershipStatus::PendingSignature
        } else {
            MembershipStatus::Pending
        };
        let gueltig_bis = term_end(today, settings.laufzeit_monate)?;

        Ok(Self {
            mitgliedsnummer,
            status,
            jahresbeitrag: settings.price_for(registration.party.kind()),
            party: registration.party,
            contact: registration.contact,
            beitragsfrei: false,
            zahlungsart: registration.zahlungsart,
            sepa: None,
            gueltig_ab: today,
            gueltig_bis,
            consent: registration.consent,
            signature,
            notizen: registration.notizen.filter(|n| !n.trim().is_empty()),
        })
    }

    pub fn kind(&self) -> MembershipKind {
        self.party.kind()
    }
}

/// Billing period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Before/after values of the fields an update actually changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    pub before: Map<String, Value>,
    pub after: Map<String, Value>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.after.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.after.keys().map(String::as_str).collect()
    }

    fn record<T: PartialEq + serde::Serialize>(&mut self, field: &str, old: &T, new: &T) {
        if old != new {
            self.before
                .insert(field.to_string(), serde_json::to_value(old).unwrap_or(Value::Null));
            self.after
                .insert(field.to_string(), serde_json::to_value(new).unwrap_or(Value::Null));
        }
    }
}

fn term_end(start: NaiveDate, months: u32) -> Result<NaiveDate, ValidationError> {
    add_months(start, months).ok_or_else(|| {
        ValidationError::invalid_format("gueltig_bis", "contract term leaves the supported date range")
    })
}

impl Membership {
    pub fn kind(&self) -> MembershipKind {
        self.party.kind()
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    /// Captures consent and signature.
    ///
    /// Allowed in every non-terminal state; only `ausstehend_unterschrift`
    /// changes status (to `ausstehend`).
    pub fn sign(&mut self, consent: Consent, signature: Signature) -> Result<(), MembershipError> {
        if self.status.is_terminal() {
            return Err(MembershipError::invalid_state(self.status.as_str(), "sign membership"));
        }
        consent.require_complete()?;
        if !signature.is_present() {
            return Err(ValidationError::empty_field("unterschrift_digital").into());
        }
        if self.status == MembershipStatus::PendingSignature {
            self.status = self.status.transition_to(MembershipStatus::Pending)?;
        }
        self.consent = consent;
        self.signature = signature;
        self.touch();
        Ok(())
    }

    /// Extends validity by one contract term.
    ///
    /// The new period starts at the later of the current end and `today`, so
    /// lapsed memberships restart from today instead of back-filling.
    pub fn renew(&mut self, today: NaiveDate, months: u32) -> Result<BillingPeriod, MembershipError> {
        if !self.status.is_renewable() {
            return Err(MembershipError::invalid_state(self.status.as_str(), "renew membership"));
        }
        let start = self.gueltig_bis.max(today);
        let end = term_end(start, months)?;
        self.status = self.status.transition_to(MembershipStatus::Active)?;
        self.gueltig_bis = end;
        self.touch();
        Ok(BillingPeriod { start, end })
    }

    /// Toggles fee exemption. Returns true if the membership was activated.
    ///
    /// On: fee drops to zero and a pending membership becomes active. Off:
    /// the fee is restored to `default_fee`. Voiding open payments is the
    /// caller's job since payments live outside the aggregate.
    pub fn set_fee_exemption(&mut self, exempt: bool, default_fee: Money) -> bool {
        self.beitragsfrei = exempt;
        let mut activated = false;
        if exempt {
            self.jahresbeitrag = Money::ZERO;
            activated = self.activate();
        } else {
            self.jahresbeitrag = default_fee;
        }
        self.touch();
        activated
    }

    /// Promotes `ausstehend` to `aktiv`. Returns true if the status changed.
    pub fn activate(&mut self) -> bool {
        if !self.status.awaits_activation() {
            return false;
        }
        match self.status.transition_to(MembershipStatus::Active) {
            Ok(next) => {
                self.status = next;
                self.touch();
                true
            }
            Err(_) => false,
        }
    }

    /// Cancels the membership. Returns false if it was already cancelled.
    pub fn cancel(&mut self) -> Result<bool, MembershipError> {
        if self.status == MembershipStatus::Cancelled {
            return Ok(false);
        }
        self.status = self.status.transition_to(MembershipStatus::Cancelled)?;
        self.touch();
        Ok(true)
    }

    /// Copies the mandate's bank details and switches to direct debit.
    pub fn attach_mandate(&mut self, mandate: &NewMandate) {
        self.sepa = Some(SepaSnapshot {
            iban: mandate.iban.as_str().to_string(),
            bic: mandate.bic.clone(),
            kontoinhaber: mandate.kontoinhaber.clone(),
        });
        self.zahlungsart = PaymentMethod::Sepa;
        self.touch();
    }

    /// Drops the bank details of a revoked mandate; direct debit falls back to invoice.
    pub fn clear_sepa(&mut self) {
        self.sepa = None;
        if self.zahlungsart == PaymentMethod::Sepa {
            self.zahlungsart = PaymentMethod::Rechnung;
        }
        self.touch();
    }

    /// Applies an administrative update.
    ///
    /// Everything is validated on a copy first, so a rejected update leaves
    /// the membership untouched.
    pub fn apply_update(&mut self, update: MembershipUpdate) -> Result<FieldChanges, MembershipError> {
        let mut next = self.clone();
        let mut changes = FieldChanges::default();

        if let Some(status) = update.status {
            if status != self.status {
                let adjustable = |s: MembershipStatus| {
                    matches!(s, MembershipStatus::Active | MembershipStatus::ContractFree)
                };
                let allowed = adjustable(self.status)
                    && adjustable(status)
                    && self.status.can_transition_to(&status);
                if !allowed {
                    return Err(MembershipError::invalid_state(
                        self.status.as_str(),
                        format!("change status to '{}'", status),
                    ));
                }
                next.status = status;
            }
        }

        if let Some(fee) = update.jahresbeitrag {
            if fee.is_negative() {
                return Err(MembershipError::validation("jahresbeitrag", "must not be negative"));
            }
            if next.beitragsfrei && !fee.is_zero() {
                return Err(MembershipError::validation(
                    "jahresbeitrag",
                    "fee-exempt memberships have no annual fee",
                ));
            }
            next.jahresbeitrag = fee;
        }

        if let Some(method) = update.zahlungsart {
            if method == PaymentMethod::Sepa && next.sepa.is_none() {
                return Err(MembershipError::validation(
                    "zahlungsart",
                    "direct debit needs an active SEPA mandate",
                ));
            }
            next.zahlungsart = method;
        }

        if let Some(from) = update.gueltig_ab {
            next.gueltig_ab = from;
        }
        if let Some(until) = update.gueltig_bis {
            next.gueltig_bis = until;
        }
        if next.gueltig_ab > next.gueltig_bis {
            return Err(MembershipError::validation(
                "gueltig_bis",
                "validity must not end before it starts",
            ));
        }

        apply_party_update(&mut next.party, &update)?;
        apply_contact_update(&mut next.contact, &update)?;

        if let Some(notes) = update.notizen {
            next.notizen = non_empty(notes);
        }

        changes.record("status", &self.status, &next.status);
        changes.record("jahresbeitrag", &self.jahresbeitrag, &next.jahresbeitrag);
        changes.record("zahlungsart", &self.zahlungsart, &next.zahlungsart);
        changes.record("gueltig_ab", &self.gueltig_ab, &next.gueltig_ab);
        changes.record("gueltig_bis", &self.gueltig_bis, &next.gueltig_bis);
        record_party_changes(&mut changes, &self.party, &next.party);
        changes.record("email", &self.contact.email, &next.contact.email);
        changes.record("telefon", &self.contact.telefon, &next.contact.telefon);
        changes.record("strasse", &self.contact.strasse, &next.contact.strasse);
        changes.record("plz", &self.contact.plz, &next.contact.plz);
        changes.record("ort", &self.contact.ort, &next.contact.ort);
        changes.record("land", &self.contact.land, &next.contact.land);
        changes.record("notizen", &self.notizen, &next.notizen);

        if !changes.is_empty() {
            next.touch();
        }
        *self = next;
        Ok(changes)
    }

    /// State snapshot written to history entries. Never contains a full IBAN.
    pub fn snapshot(&self) -> Value {
        json!({
            "status": self.status,
            "jahresbeitrag": self.jahresbeitrag,
            "beitragsfrei": self.beitragsfrei,
            "zahlungsart": self.zahlungsart,
            "gueltig_ab": self.gueltig_ab,
            "gueltig_bis": self.gueltig_bis,
            "iban": self.sepa.as_ref().map(|s| mask_iban(&s.iban)),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn required(field: &str, value: String) -> Result<String, ValidationError> {
    non_empty(value).ok_or_else(|| ValidationError::empty_field(field))
}

fn not_applicable(field: &str, kind: MembershipKind) -> MembershipError {
    MembershipError::validation(field, format!("not applicable to {} memberships", kind))
}

fn apply_party_update(party: &mut Party, update: &MembershipUpdate) -> Result<(), MembershipError> {
    let kind = party.kind();
    match party {
        Party::Dojo {
            dojo_name,
            dojo_inhaber,
            ..
        } => {
            if update.vorname.is_some() {
                return Err(not_applicable("vorname", kind));
            }
            if update.nachname.is_some() {
                return Err(not_applicable("nachname", kind));
            }
            if update.geburtsdatum.is_some() {
                return Err(not_applicable("geburtsdatum", kind));
            }
            if let Some(name) = &update.dojo_name {
                *dojo_name = required("dojo_name", name.clone())?;
            }
            if let Some(owner) = &update.dojo_inhaber {
                *dojo_inhaber = non_empty(owner.clone());
            }
        }
        Party::Einzelperson {
            vorname,
            nachname,
            geburtsdatum,
        } => {
            if update.dojo_name.is_some() {
                return Err(not_applicable("dojo_name", kind));
            }
            if update.dojo_inhaber.is_some() {
                return Err(not_applicable("dojo_inhaber", kind));
            }
            if let Some(first) = &update.vorname {
                *vorname = required("vorname", first.clone())?;
            }
            if let Some(last) = &update.nachname {
                *nachname = required("nachname", last.clone())?;
            }
            if let Some(born) = update.geburtsdatum {
                *geburtsdatum = Some(born);
            }
        }
    }
    Ok(())
}

fn apply_contact_update(contact: &mut Contact, update: &MembershipUpdate) -> Result<(), MembershipError> {
    if let Some(email) = &update.email {
        contact.email = required("email", email.clone())?;
        contact.validate()?;
    }
    let optional = [
        (&update.telefon, &mut contact.telefon),
        (&update.strasse, &mut contact.strasse),
        (&update.plz, &mut contact.plz),
        (&update.ort, &mut contact.ort),
        (&update.land, &mut contact.land),
    ];
    for (incoming, target) in optional {
        if let Some(value) = incoming {
            *target = non_empty(value.clone());
        }
    }
    Ok(())
}

fn record_party_changes(changes: &mut FieldChanges, old: &Party, new: &Party) {
    match (old, new) {
        (
            Party::Dojo {
                dojo_name: a_name,
                dojo_inhaber: a_owner,
                ..
            },
            Party::Dojo {
                dojo_name: b_name,
                dojo_inhaber: b_owner,
                ..
            },
        ) => {
            changes.record("dojo_name", a_name, b_name);
            changes.record("dojo_inhaber", a_owner, b_owner);
        }
        (
            Party::Einzelperson {
                vorname: a_first,
                nachname: a_last,
                geburtsdatum: a_born,
            },
            Party::Einzelperson {
                vorname: b_first,
                nachname: b_last,
                geburtsdatum: b_born,
            },
        ) => {
            changes.record("vorname", a_first, b_first);
            changes.record("nachname", a_last, b_last);
            changes.record("geburtsdatum", a_born, b_born);
        }
        _ => {}
    }
}
