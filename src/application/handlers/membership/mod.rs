//! Membership handlers.
//!
//! Command and query handlers for the Verband membership lifecycle:
//!
//! ## Commands
//! - Registering memberships (public and admin)
//! - Signing, renewing, cancelling
//! - Fee exemption
//! - Confirming payments and drawing invoice numbers
//! - Issuing and revoking SEPA mandates
//! - Administrative updates
//!
//! ## Queries
//! - Membership list and detail view
//! - Payments, mandates and audit trail of a membership
//! - Public configuration for the registration form

mod cancel_membership;
mod common;
mod confirm_payment;
mod get_membership;
mod get_public_config;
mod issue_invoice_number;
mod issue_mandate;
mod list_memberships;
mod membership_records;
mod register_membership;
mod renew_membership;
mod revoke_mandate;
mod set_fee_exemption;
mod sign_membership;
mod update_membership;

#[cfg(test)]
pub(crate) mod test_support;

// Commands
pub use cancel_membership::{CancelMembershipCommand, CancelMembershipHandler, CancelMembershipResult};
pub use confirm_payment::{ConfirmPaymentCommand, ConfirmPaymentHandler, ConfirmPaymentResult};
pub use issue_invoice_number::{IssueInvoiceNumberCommand, IssueInvoiceNumberHandler};
pub use issue_mandate::{IssueMandateCommand, IssueMandateHandler, IssueMandateResult, MandateDetails};
pub use register_membership::{
    RegisterMembershipCommand, RegisterMembershipHandler, RegisterMembershipResult,
};
pub use renew_membership::{RenewMembershipCommand, RenewMembershipHandler, RenewMembershipResult};
pub use revoke_mandate::{RevokeMandateCommand, RevokeMandateHandler, RevokeMandateResult};
pub use set_fee_exemption::{SetFeeExemptionCommand, SetFeeExemptionHandler, SetFeeExemptionResult};
pub use sign_membership::{SignMembershipCommand, SignMembershipHandler, SignMembershipResult};
pub use update_membership::{UpdateMembershipCommand, UpdateMembershipHandler, UpdateMembershipResult};

// Queries
pub use get_membership::{GetMembershipHandler, GetMembershipQuery, GetMembershipResult};
pub use get_public_config::{GetPublicConfigHandler, PublicConfig};
pub use list_memberships::{ListMembershipsHandler, ListMembershipsQuery};
pub use membership_records::{MembershipRecordsHandler, MembershipRecordsQuery};
