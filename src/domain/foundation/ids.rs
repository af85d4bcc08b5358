//! Strongly-typed identifier value objects.
//!
//! Verband records are keyed by surrogate `BIGSERIAL` ids assigned by the
//! store, so ids only exist after insert.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a store-assigned id. Ids are strictly positive.
            pub fn new(value: i64) -> Result<Self, ValidationError> {
                if value <= 0 {
                    return Err(ValidationError::out_of_range($field, 1, i64::MAX, value));
                }
                Ok(Self(value))
            }

            /// Returns the raw id.
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| ValidationError::invalid_format($field, e.to_string()))?;
                Self::new(value)
            }
        }
    };
}

surrogate_id!(
    /// Identifier of a Verband membership.
    MembershipId,
    "id"
);

surrogate_id!(
    /// Identifier of a membership payment (one billing period).
    PaymentId,
    "zahlungs_id"
);

surrogate_id!(
    /// Identifier of a SEPA direct-debit mandate.
    MandateId,
    "sepa_id"
);

surrogate_id!(
    /// Identifier of an audit trail entry.
    HistoryEntryId,
    "historie_id"
);

/// Dojo (tenant) identifier from the surrounding platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DojoId(i64);

impl DojoId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for DojoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier (typically the `sub` claim of the bearer token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_id_rejects_zero_and_negative() {
        assert!(MembershipId::new(0).is_err());
        assert!(MembershipId::new(-4).is_err());
        assert_eq!(MembershipId::new(7).unwrap().value(), 7);
    }

    #[test]
    fn payment_id_parses_from_path_segment() {
        let id: PaymentId = "42".parse().unwrap();
        assert_eq!(id.value(), 42);
        assert!("abc".parse::<PaymentId>().is_err());
    }

    #[test]
    fn parse_error_names_the_path_field() {
        let err = "x".parse::<MandateId>().unwrap_err();
        assert_eq!(err.field(), "sepa_id");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id = MembershipId::new(12).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "12");
    }

    #[test]
    fn user_id_rejects_blank() {
        assert!(UserId::new("  ").is_err());
        assert_eq!(UserId::new("admin-1").unwrap().as_str(), "admin-1");
    }
}
