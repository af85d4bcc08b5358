//! State machine trait for status enums.
//!
//! Membership, payment and mandate statuses all declare their allowed
//! transitions through this trait so lifecycle handlers share one check.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for PaymentStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Offen, Bezahlt) | (Offen, Storniert))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Offen => vec![Bezahlt, Storniert],
///             Bezahlt | Storniert => vec![],
///         }
///     }
/// }
///
/// let paid = payment.status.transition_to(PaymentStatus::Bezahlt)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
