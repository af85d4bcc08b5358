//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the Verband domain.

mod auth;
mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use auth::{Actor, AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{DojoId, HistoryEntryId, MandateId, MembershipId, PaymentId, UserId};
pub use money::Money;
pub use state_machine::StateMachine;
pub use timestamp::{add_months, Timestamp};
