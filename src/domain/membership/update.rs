//! Typed partial update for administrative edits.
//!
//! Only the fields listed here can be changed through `PUT /:id`; anything
//! else in the request body is rejected during deserialization. Optional text
//! fields are cleared by sending an empty string.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::foundation::Money;

use super::{MembershipStatus, PaymentMethod};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipUpdate {
    pub status: Option<MembershipStatus>,
    pub jahresbeitrag: Option<Money>,
    pub zahlungsart: Option<PaymentMethod>,
    pub gueltig_ab: Option<NaiveDate>,
    pub gueltig_bis: Option<NaiveDate>,

    // Dojo
    pub dojo_name: Option<String>,
    pub dojo_inhaber: Option<String>,

    // Individual
    pub vorname: Option<String>,
    pub nachname: Option<String>,
    pub geburtsdatum: Option<NaiveDate>,

    // Contact
    pub email: Option<String>,
    pub telefon: Option<String>,
    pub strasse: Option<String>,
    pub plz: Option<String>,
    pub ort: Option<String>,
    pub land: Option<String>,

    pub notizen: Option<String>,
}

impl MembershipUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<MembershipUpdate, _> =
            serde_json::from_str(r#"{"mitgliedsnummer": "TDA-DE-D-9999"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn parses_allowed_fields() {
        let update: MembershipUpdate = serde_json::from_str(
            r#"{"status": "vertragsfrei", "jahresbeitrag": "120.00", "ort": "Kiel"}"#,
        )
        .unwrap();
        assert_eq!(update.status, Some(MembershipStatus::ContractFree));
        assert_eq!(update.jahresbeitrag, Some(Money::from_cents(12000)));
        assert_eq!(update.ort.as_deref(), Some("Kiel"));
        assert!(!update.is_empty());
    }

    #[test]
    fn empty_body_is_an_empty_update() {
        let update: MembershipUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
    }
}
