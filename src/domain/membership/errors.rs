//! Membership-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound / PaymentNotFound / MandateNotFound / SettingNotFound | 404 |
//! | InvalidState | 409 |
//! | Conflict | 409 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{
    DomainError, ErrorCode, MandateId, MembershipId, PaymentId, ValidationError,
};

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Membership was not found.
    NotFound(MembershipId),

    /// Payment was not found.
    PaymentNotFound(PaymentId),

    /// SEPA mandate was not found.
    MandateNotFound(MandateId),

    /// Settings key does not exist.
    SettingNotFound(String),

    /// Operation not allowed in the current state.
    InvalidState {
        current: String,
        attempted: String,
    },

    /// A uniqueness rule was violated (invoice number, mandate reference,
    /// duplicate billing period).
    Conflict(String),

    /// Validation failed.
    ValidationFailed {
        field: String,
        message: String,
    },

    /// Store or other infrastructure failure. `cause` is only shown to
    /// clients when verbose errors are enabled.
    Infrastructure {
        message: String,
        cause: Option<String>,
    },
}

impl MembershipError {
    pub fn not_found(id: MembershipId) -> Self {
        MembershipError::NotFound(id)
    }

    pub fn payment_not_found(id: PaymentId) -> Self {
        MembershipError::PaymentNotFound(id)
    }

    pub fn mandate_not_found(id: MandateId) -> Self {
        MembershipError::MandateNotFound(id)
    }

    pub fn setting_not_found(key: impl Into<String>) -> Self {
        MembershipError::SettingNotFound(key.into())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        MembershipError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        MembershipError::Conflict(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        MembershipError::Infrastructure {
            message: message.into(),
            cause: None,
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::NotFound(_) => ErrorCode::MembershipNotFound,
            MembershipError::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            MembershipError::MandateNotFound(_) => ErrorCode::MandateNotFound,
            MembershipError::SettingNotFound(_) => ErrorCode::SettingNotFound,
            MembershipError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            MembershipError::Conflict(_) => ErrorCode::Conflict,
            MembershipError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            MembershipError::Infrastructure { .. } => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            MembershipError::NotFound(id) => format!("Mitgliedschaft {} nicht gefunden", id),
            MembershipError::PaymentNotFound(id) => format!("Zahlung {} nicht gefunden", id),
            MembershipError::MandateNotFound(id) => format!("SEPA-Mandat {} nicht gefunden", id),
            MembershipError::SettingNotFound(key) => format!("Einstellung '{}' nicht gefunden", key),
            MembershipError::InvalidState { current, attempted } => {
                format!("Cannot {} in state '{}'", attempted, current)
            }
            MembershipError::Conflict(msg) => msg.clone(),
            MembershipError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            MembershipError::Infrastructure { message, .. } => message.clone(),
        }
    }

    /// Internal detail for diagnostics, if any.
    pub fn cause(&self) -> Option<&str> {
        match self {
            MembershipError::Infrastructure { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MembershipError {}

impl From<ValidationError> for MembershipError {
    fn from(err: ValidationError) -> Self {
        MembershipError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        let detail = |key: &str| err.details.get(key).cloned();
        match err.code {
            ErrorCode::Conflict => MembershipError::Conflict(err.message),
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => MembershipError::ValidationFailed {
                field: detail("field").unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => MembershipError::InvalidState {
                current: detail("current").unwrap_or_else(|| "unknown".to_string()),
                attempted: err.message,
            },
            ErrorCode::SettingNotFound => MembershipError::SettingNotFound(
                detail("key").unwrap_or(err.message),
            ),
            _ => MembershipError::Infrastructure {
                cause: detail("cause"),
                message: err.message,
            },
        }
    }
}

impl From<MembershipError> for DomainError {
    fn from(err: MembershipError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ════════════════════════════════════════════════════════════════════
    // Codes and messages
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn not_found_variants_have_their_own_codes() {
        let m = MembershipError::not_found(MembershipId::new(9).unwrap());
        let p = MembershipError::payment_not_found(PaymentId::new(9).unwrap());
        assert_eq!(m.code(), ErrorCode::MembershipNotFound);
        assert_eq!(p.code(), ErrorCode::PaymentNotFound);
        assert!(m.message().contains('9'));
    }

    #[test]
    fn invalid_state_message_names_operation_and_state() {
        let err = MembershipError::invalid_state("gekuendigt", "renew membership");
        assert_eq!(err.message(), "Cannot renew membership in state 'gekuendigt'");
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    }

    // ════════════════════════════════════════════════════════════════════
    // Conversions
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn validation_error_keeps_field() {
        let err: MembershipError = ValidationError::empty_field("email").into();
        assert!(matches!(err, MembershipError::ValidationFailed { ref field, .. } if field == "email"));
    }

    #[test]
    fn domain_conflict_maps_to_conflict() {
        let err: MembershipError = DomainError::conflict("duplicate rechnungsnummer").into();
        assert_eq!(err, MembershipError::Conflict("duplicate rechnungsnummer".to_string()));
    }

    #[test]
    fn database_error_keeps_cause_separate() {
        let err: MembershipError = DomainError::database("Failed to insert payment", "pool timed out").into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(err.message(), "Failed to insert payment");
        assert_eq!(err.cause(), Some("pool timed out"));
    }

    #[test]
    fn setting_not_found_uses_key_detail() {
        let domain = DomainError::new(ErrorCode::SettingNotFound, "missing").with_detail("key", "foo");
        let err: MembershipError = domain.into();
        assert_eq!(err, MembershipError::SettingNotFound("foo".to_string()));
    }
}
