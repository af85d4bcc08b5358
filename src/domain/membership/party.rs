//! The party owning a membership and its contact data.
//!
//! Dojo and individual memberships carry different identifying fields; the
//! enum keeps them mutually exclusive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DojoId, ValidationError};

use super::MembershipKind;

/// Owner of a membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "lowercase")]
pub enum Party {
    Dojo {
        dojo_id: Option<DojoId>,
        dojo_name: String,
        dojo_inhaber: Option<String>,
    },
    Einzelperson {
        vorname: String,
        nachname: String,
        geburtsdatum: Option<NaiveDate>,
    },
}

impl Party {
    pub fn kind(&self) -> MembershipKind {
        match self {
            Party::Dojo { .. } => MembershipKind::Dojo,
            Party::Einzelperson { .. } => MembershipKind::Einzelperson,
        }
    }

    /// Name shown in lists and history descriptions.
    pub fn display_name(&self) -> String {
        match self {
            Party::Dojo { dojo_name, .. } => dojo_name.clone(),
            Party::Einzelperson {
                vorname, nachname, ..
            } => format!("{} {}", vorname, nachname),
        }
    }

    pub fn dojo_id(&self) -> Option<DojoId> {
        match self {
            Party::Dojo { dojo_id, .. } => *dojo_id,
            Party::Einzelperson { .. } => None,
        }
    }

    /// Checks the required identifying fields for the party's kind.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Party::Dojo { dojo_name, .. } => require("dojo_name", dojo_name),
            Party::Einzelperson {
                vorname, nachname, ..
            } => {
                require("vorname", vorname)?;
                require("nachname", nachname)
            }
        }
    }
}

/// Postal and electronic contact data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub telefon: Option<String>,
    pub strasse: Option<String>,
    pub plz: Option<String>,
    pub ort: Option<String>,
    pub land: Option<String>,
}

impl Contact {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("email", &self.email)?;
        validate_email(&self.email)
    }
}

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::empty_field(field))
    } else {
        Ok(())
    }
}

/// Structural email check: one `@`, a non-empty local part and a dotted
/// domain without whitespace.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let invalid = || ValidationError::invalid_format("email", format!("'{}' is not an email address", email));
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}
