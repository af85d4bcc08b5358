//! Data Transfer Objects for the Verband membership endpoints.
//!
//! Request bodies use the German field names of the registration form and
//! the admin UI. Responses never expose a full IBAN on the membership
//! itself; only the mandate endpoints return bank details in full.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::handlers::{
    MandateDetails, RegisterMembershipCommand, RegisterMembershipResult, RenewMembershipResult,
};
use crate::domain::foundation::{Actor, DojoId, MembershipId, Money, Timestamp};
use crate::domain::membership::{
    mask_iban, Consent, Contact, HistoryEntry, InvoiceNumber, MandateReference, Membership,
    MembershipKind, MembershipNumber, MembershipStatus, Party, PaymentMethod, Registration,
    Setting, Signature,
};
use crate::ports::DojoStats;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Registration form, used by the public and the admin endpoint.
///
/// Fields that do not belong to the selected `typ` are ignored. Bank
/// details are only read when `zahlungsart` is `sepa`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub typ: MembershipKind,

    // Dojo
    #[serde(default)]
    pub dojo_id: Option<DojoId>,
    #[serde(default)]
    pub dojo_name: Option<String>,
    #[serde(default)]
    pub dojo_inhaber: Option<String>,

    // Individual
    #[serde(default)]
    pub vorname: Option<String>,
    #[serde(default)]
    pub nachname: Option<String>,
    #[serde(default)]
    pub geburtsdatum: Option<NaiveDate>,

    // Contact
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub telefon: Option<String>,
    #[serde(default)]
    pub strasse: Option<String>,
    #[serde(default)]
    pub plz: Option<String>,
    #[serde(default)]
    pub ort: Option<String>,
    #[serde(default)]
    pub land: Option<String>,

    #[serde(default)]
    pub zahlungsart: PaymentMethod,
    #[serde(default)]
    pub agb_akzeptiert: bool,
    #[serde(default)]
    pub datenschutz_akzeptiert: bool,
    #[serde(default)]
    pub unterschrift_digital: Option<String>,
    #[serde(default)]
    pub notizen: Option<String>,

    // SEPA
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub bic: Option<String>,
    #[serde(default)]
    pub kontoinhaber: Option<String>,
    #[serde(default)]
    pub bankname: Option<String>,
}

impl RegistrationRequest {
    pub fn into_command(self, actor: Actor) -> RegisterMembershipCommand {
        let party = match self.typ {
            MembershipKind::Dojo => Party::Dojo {
                dojo_id: self.dojo_id,
                dojo_name: self.dojo_name.unwrap_or_default(),
                dojo_inhaber: self.dojo_inhaber,
            },
            MembershipKind::Einzelperson => Party::Einzelperson {
                vorname: self.vorname.unwrap_or_default(),
                nachname: self.nachname.unwrap_or_default(),
                geburtsdatum: self.geburtsdatum,
            },
        };
        let sepa = self.iban.map(|iban| MandateDetails {
            iban,
            bic: self.bic,
            kontoinhaber: self.kontoinhaber,
            bankname: self.bankname,
        });

        RegisterMembershipCommand {
            registration: Registration {
                party,
                contact: Contact {
                    email: self.email,
                    telefon: self.telefon,
                    strasse: self.strasse,
                    plz: self.plz,
                    ort: self.ort,
                    land: self.land,
                },
                zahlungsart: self.zahlungsart,
                consent: Consent::new(self.agb_akzeptiert, self.datenschutz_akzeptiert),
                unterschrift: self.unterschrift_digital,
                notizen: self.notizen,
            },
            sepa,
            actor,
        }
    }
}

/// Query parameters for `GET /`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub typ: Option<MembershipKind>,
    pub status: Option<MembershipStatus>,
    pub limit: Option<u32>,
}

/// Request body for `POST /:id/beitragsfrei`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeExemptionRequest {
    pub beitragsfrei: bool,
}

/// Query parameters for `DELETE /:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelParams {
    pub grund: Option<String>,
}

/// Optional body for `POST /rechnungsnummern`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceNumberRequest {
    /// Invoice date; today when absent.
    #[serde(default)]
    pub datum: Option<NaiveDate>,
}

/// Optional body for `POST /zahlungen/:zahlungs_id/bezahlt`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub zahlungsart: Option<PaymentMethod>,
    #[serde(default)]
    pub transaktions_id: Option<String>,
}

/// Request body for `POST /:id/sepa`.
#[derive(Debug, Clone, Deserialize)]
pub struct MandateRequest {
    #[serde(flatten)]
    pub details: MandateDetails,
    #[serde(default)]
    pub unterschrieben_von: Option<String>,
}

/// Request body for `POST /:id/unterschreiben`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignRequest {
    #[serde(default)]
    pub agb_akzeptiert: bool,
    #[serde(default)]
    pub datenschutz_akzeptiert: bool,
    #[serde(default)]
    pub unterschrift_digital: String,
}

/// One entry of a bulk settings update.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingEntry {
    pub schluessel: String,
    pub wert: Value,
}

/// Request body for `PUT /einstellungen`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSettingsRequest {
    pub einstellungen: Vec<SettingEntry>,
}

/// Request body for `PUT /einstellungen/:key`.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingValueRequest {
    pub wert: Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Membership as shown in lists and on the detail page.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipResponse {
    pub id: MembershipId,
    pub mitgliedsnummer: MembershipNumber,
    pub status: MembershipStatus,
    pub anzeigename: String,
    #[serde(flatten)]
    pub party: Party,
    #[serde(flatten)]
    pub contact: Contact,
    pub jahresbeitrag: Money,
    pub beitragsfrei: bool,
    pub zahlungsart: PaymentMethod,
    pub iban_maskiert: Option<String>,
    pub bic: Option<String>,
    pub kontoinhaber: Option<String>,
    pub gueltig_ab: NaiveDate,
    pub gueltig_bis: NaiveDate,
    #[serde(flatten)]
    pub consent: Consent,
    #[serde(flatten)]
    pub signature: Signature,
    pub notizen: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Membership> for MembershipResponse {
    fn from(m: &Membership) -> Self {
        Self {
            id: m.id,
            mitgliedsnummer: m.mitgliedsnummer.clone(),
            status: m.status,
            anzeigename: m.party.display_name(),
            party: m.party.clone(),
            contact: m.contact.clone(),
            jahresbeitrag: m.jahresbeitrag,
            beitragsfrei: m.beitragsfrei,
            zahlungsart: m.zahlungsart,
            iban_maskiert: m.sepa.as_ref().map(|s| mask_iban(&s.iban)),
            bic: m.sepa.as_ref().and_then(|s| s.bic.clone()),
            kontoinhaber: m.sepa.as_ref().map(|s| s.kontoinhaber.clone()),
            gueltig_ab: m.gueltig_ab,
            gueltig_bis: m.gueltig_bis,
            consent: m.consent,
            signature: m.signature.clone(),
            notizen: m.notizen.clone(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Response for both registration endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub success: bool,
    pub id: MembershipId,
    pub mitgliedsnummer: MembershipNumber,
    pub status: MembershipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rechnungsnummer: Option<InvoiceNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mandatsreferenz: Option<MandateReference>,
}

impl From<&RegisterMembershipResult> for RegistrationResponse {
    fn from(r: &RegisterMembershipResult) -> Self {
        Self {
            success: true,
            id: r.membership.id,
            mitgliedsnummer: r.membership.mitgliedsnummer.clone(),
            status: r.membership.status,
            rechnungsnummer: r.payment.as_ref().map(|p| p.rechnungsnummer.clone()),
            mandatsreferenz: r.mandate.as_ref().map(|m| m.mandatsreferenz.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipListResponse {
    pub success: bool,
    pub mitgliedschaften: Vec<MembershipResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipDetailResponse {
    pub success: bool,
    pub mitgliedschaft: MembershipResponse,
    pub historie: Vec<HistoryEntry>,
    pub dojo_stats: Option<DojoStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub geaenderte_felder: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeExemptionResponse {
    pub success: bool,
    pub message: String,
    /// Invoices voided by switching the exemption on.
    pub storniert: Vec<InvoiceNumber>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalResponse {
    pub success: bool,
    pub neues_ende: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rechnungsnummer: Option<InvoiceNumber>,
    pub beitragsfrei: bool,
}

impl From<&RenewMembershipResult> for RenewalResponse {
    fn from(r: &RenewMembershipResult) -> Self {
        Self {
            success: true,
            neues_ende: r.neues_ende,
            rechnungsnummer: r.payment.as_ref().map(|p| p.rechnungsnummer.clone()),
            beitragsfrei: r.membership.beitragsfrei,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceNumberResponse {
    pub success: bool,
    pub rechnungsnummer: InvoiceNumber,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandateIssuedResponse {
    pub success: bool,
    pub mandatsreferenz: MandateReference,
    /// References of mandates revoked by this issue.
    pub widerrufen: Vec<MandateReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: MembershipStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsUpdatedResponse {
    pub success: bool,
    pub aktualisiert: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingResponse {
    pub schluessel: String,
    pub wert: Value,
    pub typ: &'static str,
    pub beschreibung: Option<String>,
    pub updated_at: Timestamp,
}

impl From<Setting> for SettingResponse {
    fn from(s: Setting) -> Self {
        Self {
            wert: s.wert.to_json(),
            typ: s.wert.typ().as_str(),
            schluessel: s.schluessel,
            beschreibung: s.beschreibung,
            updated_at: s.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(body: Value) -> RegisterMembershipCommand {
        serde_json::from_value::<RegistrationRequest>(body)
            .unwrap()
            .into_command(Actor::public(None))
    }

    #[test]
    fn dojo_form_builds_dojo_party() {
        let cmd = registration(json!({
            "typ": "dojo",
            "dojo_name": "Dojo Nord",
            "vorname": "ignored",
            "email": "info@dojo-nord.de",
            "agb_akzeptiert": true,
            "datenschutz_akzeptiert": true
        }));
        assert_eq!(
            cmd.registration.party,
            Party::Dojo {
                dojo_id: None,
                dojo_name: "Dojo Nord".to_string(),
                dojo_inhaber: None,
            }
        );
        assert_eq!(cmd.registration.zahlungsart, PaymentMethod::Rechnung);
        assert!(cmd.sepa.is_none());
    }

    #[test]
    fn person_form_carries_bank_details() {
        let cmd = registration(json!({
            "typ": "einzelperson",
            "vorname": "Mia",
            "nachname": "Berg",
            "email": "mia@example.de",
            "zahlungsart": "sepa",
            "iban": "DE89 3704 0044 0532 0130 00",
            "kontoinhaber": "Mia Berg"
        }));
        assert_eq!(cmd.registration.kind(), MembershipKind::Einzelperson);
        let sepa = cmd.sepa.unwrap();
        assert_eq!(sepa.iban, "DE89 3704 0044 0532 0130 00");
        assert_eq!(sepa.kontoinhaber.as_deref(), Some("Mia Berg"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_value::<RegistrationRequest>(json!({ "typ": "verein" }));
        assert!(result.is_err());
    }

    #[test]
    fn mandate_request_flattens_details() {
        let req: MandateRequest = serde_json::from_value(json!({
            "iban": "DE89370400440532013000",
            "bic": "COBADEFFXXX",
            "unterschrieben_von": "Kim Sato"
        }))
        .unwrap();
        assert_eq!(req.details.bic.as_deref(), Some("COBADEFFXXX"));
        assert_eq!(req.unterschrieben_von.as_deref(), Some("Kim Sato"));
    }
}
