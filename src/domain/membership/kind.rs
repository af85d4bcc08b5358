//! Membership type: a dojo (school) or an individual person.

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipKind {
    Dojo,
    Einzelperson,
}

impl MembershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipKind::Dojo => "dojo",
            MembershipKind::Einzelperson => "einzelperson",
        }
    }

    /// Letter used in the membership number (`TDA-DE-D-0001`).
    pub fn number_letter(&self) -> char {
        match self {
            MembershipKind::Dojo => 'D',
            MembershipKind::Einzelperson => 'E',
        }
    }

    /// Key of the number sequence row for this kind.
    pub fn sequence_key(&self) -> &'static str {
        match self {
            MembershipKind::Dojo => "dojo",
            MembershipKind::Einzelperson => "einzel",
        }
    }
}

impl fmt::Display for MembershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dojo" => Ok(MembershipKind::Dojo),
            "einzelperson" => Ok(MembershipKind::Einzelperson),
            other => Err(ValidationError::invalid_format(
                "typ",
                format!("unknown membership type '{}'", other),
            )),
        }
    }
}
