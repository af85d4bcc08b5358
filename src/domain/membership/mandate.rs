//! SEPA direct-debit mandates and IBAN handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{
    MandateId, MembershipId, StateMachine, Timestamp, ValidationError,
};

/// Structurally valid IBAN, stored without spaces in upper case.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iban(String);

/// Registry lengths for the countries members usually bank in.
const IBAN_LENGTHS: &[(&str, usize)] = &[
    ("AT", 20),
    ("BE", 16),
    ("CH", 21),
    ("CZ", 24),
    ("DE", 22),
    ("DK", 18),
    ("ES", 24),
    ("FI", 18),
    ("FR", 27),
    ("GB", 22),
    ("IE", 22),
    ("IT", 27),
    ("LI", 21),
    ("LU", 20),
    ("NL", 18),
    ("NO", 15),
    ("PL", 28),
    ("PT", 25),
    ("SE", 24),
];

impl Iban {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let iban: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if iban.is_empty() {
            return Err(ValidationError::empty_field("iban"));
        }
        let invalid = |reason: &str| ValidationError::invalid_format("iban", reason.to_string());

        if !(15..=34).contains(&iban.len()) {
            return Err(invalid("length must be between 15 and 34 characters"));
        }
        if !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("only letters and digits are allowed"));
        }
        let country = &iban[0..2];
        if !country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(invalid("must start with a country code"));
        }
        if !iban[2..4].chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("check digits must be numeric"));
        }
        if let Some((_, len)) = IBAN_LENGTHS.iter().find(|(cc, _)| *cc == country) {
            if iban.len() != *len {
                return Err(invalid(&format!("{} IBANs have {} characters", country, len)));
            }
        }
        if mod97(&iban) != 1 {
            return Err(invalid("checksum mismatch"));
        }
        Ok(Self(iban))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First four and last four characters, the rest hidden: `DE89****3000`.
    pub fn masked(&self) -> String {
        let len = self.0.len();
        format!("{}****{}", &self.0[..4], &self.0[len - 4..])
    }

    pub fn country(&self) -> &str {
        &self.0[..2]
    }
}

/// ISO 7064 MOD 97-10 over the rearranged IBAN.
fn mod97(iban: &str) -> u32 {
    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return 0,
        };
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    remainder
}

impl fmt::Debug for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iban").field(&self.masked()).finish()
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Iban {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Iban {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Iban> for String {
    fn from(iban: Iban) -> Self {
        iban.0
    }
}

/// Masks any stored IBAN-like string, valid or not.
pub fn mask_iban(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() <= 8 {
        return "****".to_string();
    }
    let len = compact.len();
    format!("{}****{}", &compact[..4], &compact[len - 4..])
}

/// SEPA mandate reference, at most 35 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MandateReference(String);

impl MandateReference {
    pub const MAX_LEN: usize = 35;

    /// `VM-<membership id>-<12 hex chars of a random UUID>`.
    pub fn generate(membership_id: MembershipId) -> Self {
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        let mut reference = format!("VM-{}-{}", membership_id, &random[..12]);
        reference.truncate(Self::MAX_LEN);
        Self(reference)
    }

    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MandateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MandateStatus {
    #[serde(rename = "aktiv")]
    Active,
    #[serde(rename = "widerrufen")]
    Revoked,
}

impl MandateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MandateStatus::Active => "aktiv",
            MandateStatus::Revoked => "widerrufen",
        }
    }
}

impl FromStr for MandateStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aktiv" => Ok(MandateStatus::Active),
            "widerrufen" => Ok(MandateStatus::Revoked),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown mandate status '{}'", other),
            )),
        }
    }
}

impl StateMachine for MandateStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (MandateStatus::Active, MandateStatus::Revoked))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            MandateStatus::Active => vec![MandateStatus::Revoked],
            MandateStatus::Revoked => vec![],
        }
    }
}

/// Who signed the mandate, when and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandateSignature {
    pub unterschrieben_von: Option<String>,
    pub unterschrieben_am: Option<Timestamp>,
    pub unterschrift_ip: Option<String>,
}

/// A mandate as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SepaMandate {
    pub id: MandateId,
    pub verbandsmitgliedschaft_id: MembershipId,
    pub mandatsreferenz: MandateReference,
    pub iban: Iban,
    pub iban_maskiert: String,
    pub bic: Option<String>,
    pub kontoinhaber: String,
    pub bankname: Option<String>,
    pub status: MandateStatus,
    #[serde(flatten)]
    pub signature: MandateSignature,
    pub widerrufen_am: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl SepaMandate {
    pub fn is_active(&self) -> bool {
        self.status == MandateStatus::Active
    }

    /// Revokes the mandate. Mandates are never deleted.
    pub fn revoke(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(MandateStatus::Revoked)?;
        self.widerrufen_am = Some(Timestamp::now());
        Ok(())
    }
}

/// A mandate about to be inserted (always `aktiv`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMandate {
    pub membership_id: MembershipId,
    pub mandatsreferenz: MandateReference,
    pub iban: Iban,
    pub bic: Option<String>,
    pub kontoinhaber: String,
    pub bankname: Option<String>,
    pub signature: MandateSignature,
}

impl NewMandate {
    /// Validates holder data and generates the mandate reference.
    pub fn build(
        membership_id: MembershipId,
        iban: &str,
        bic: Option<String>,
        kontoinhaber: &str,
        bankname: Option<String>,
        signature: MandateSignature,
    ) -> Result<Self, ValidationError> {
        let iban = Iban::parse(iban)?;
        let kontoinhaber = kontoinhaber.trim();
        if kontoinhaber.is_empty() {
            return Err(ValidationError::empty_field("kontoinhaber"));
        }
        let bic = bic
            .map(|b| b.trim().to_uppercase())
            .filter(|b| !b.is_empty());
        if let Some(bic) = &bic {
            if !(bic.len() == 8 || bic.len() == 11) || !bic.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ValidationError::invalid_format("bic", "BIC must have 8 or 11 characters"));
            }
        }
        Ok(Self {
            membership_id,
            mandatsreferenz: MandateReference::generate(membership_id),
            iban,
            bic,
            kontoinhaber: kontoinhaber.to_string(),
            bankname: bankname.filter(|b| !b.trim().is_empty()),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "DE89370400440532013000";

    #[test]
    fn accepts_known_valid_iban() {
        let iban = Iban::parse(VALID).unwrap();
        assert_eq!(iban.country(), "DE");
    }

    #[test]
    fn accepts_spaced_lowercase_input() {
        let iban = Iban::parse("de89 3704 0044 0532 0130 00").unwrap();
        assert_eq!(iban.as_str(), VALID);
    }

    #[test]
    fn rejects_single_digit_mutation() {
        let err = Iban::parse("DE89370400440532013001").unwrap_err();
        assert_eq!(err.field(), "iban");
    }

    #[test]
    fn rejects_wrong_length_for_country() {
        assert!(Iban::parse("DE8937040044053201300").is_err());
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(Iban::parse("  "), Err(ValidationError::EmptyField { .. })));
        assert!(Iban::parse("12345678901234567").is_err());
        assert!(Iban::parse("DE89-3704-0044-0532-0130-00").is_err());
    }

    #[test]
    fn accepts_other_countries() {
        assert!(Iban::parse("AT611904300234573201").is_ok());
        assert!(Iban::parse("GB29NWBK60161331926819").is_ok());
    }

    #[test]
    fn masks_first_and_last_four() {
        assert_eq!(Iban::parse(VALID).unwrap().masked(), "DE89****3000");
        assert_eq!(mask_iban("DE89 3704 0044 0532 0130 00"), "DE89****3000");
        assert_eq!(mask_iban("short"), "****");
    }

    #[test]
    fn debug_output_never_shows_full_iban() {
        let dbg = format!("{:?}", Iban::parse(VALID).unwrap());
        assert!(!dbg.contains(VALID));
        assert!(dbg.contains("DE89****3000"));
    }

    #[test]
    fn mandate_reference_fits_sepa_limit() {
        let r = MandateReference::generate(MembershipId::new(i64::MAX).unwrap());
        assert!(r.as_str().len() <= MandateReference::MAX_LEN);
        let r = MandateReference::generate(MembershipId::new(17).unwrap());
        assert!(r.as_str().starts_with("VM-17-"));
        assert_eq!(r.as_str().len(), "VM-17-".len() + 12);
    }

    #[test]
    fn mandate_references_are_random() {
        let id = MembershipId::new(3).unwrap();
        assert_ne!(MandateReference::generate(id), MandateReference::generate(id));
    }

    #[test]
    fn new_mandate_requires_holder() {
        let err = NewMandate::build(
            MembershipId::new(1).unwrap(),
            VALID,
            None,
            " ",
            None,
            MandateSignature::default(),
        )
        .unwrap_err();
        assert_eq!(err.field(), "kontoinhaber");
    }

    #[test]
    fn new_mandate_normalizes_bic() {
        let m = NewMandate::build(
            MembershipId::new(1).unwrap(),
            VALID,
            Some(" cobadeffxxx ".into()),
            "Dojo Nord e.V.",
            Some("".into()),
            MandateSignature::default(),
        )
        .unwrap();
        assert_eq!(m.bic.as_deref(), Some("COBADEFFXXX"));
        assert_eq!(m.bankname, None);
    }

    #[test]
    fn revoked_mandate_stays_revoked() {
        assert!(MandateStatus::Revoked.is_terminal());
        assert!(MandateStatus::Active.can_transition_to(&MandateStatus::Revoked));
    }
}
