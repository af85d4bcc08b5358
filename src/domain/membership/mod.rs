//! Verband membership domain module.
//!
//! Handles the membership lifecycle, billing, SEPA mandates and the audit
//! trail vocabulary.
//!
//! # Module Structure
//!
//! - `aggregate` - Membership aggregate, registration and typed updates
//! - `status` - MembershipStatus state machine
//! - `kind` / `country` / `number` - membership numbers `TDA-DE-D-0001`
//! - `party` / `consent` - owner, contact data, consent and signature
//! - `billing` / `payment` / `invoice_number` - invoices in integer cents
//! - `mandate` - SEPA mandates and IBAN validation
//! - `history` - append-only audit entries
//! - `settings` - typed association settings

mod aggregate;
mod billing;
mod consent;
mod country;
mod errors;
mod history;
mod invoice_number;
mod kind;
mod mandate;
mod number;
mod party;
mod payment;
mod settings;
mod status;
mod update;

pub use aggregate::{
    FieldChanges, Membership, NewMembership, Registration, BillingPeriod, SepaSnapshot,
};
pub use billing::{compute_brutto, BillingBreakdown, VatRate};
pub use consent::{Consent, Signature};
pub use country::CountryCode;
pub use errors::MembershipError;
pub use history::{HistoryAction, HistoryEntry, NewHistoryEntry};
pub use invoice_number::InvoiceNumber;
pub use kind::MembershipKind;
pub use mandate::{
    mask_iban, Iban, MandateReference, MandateSignature, MandateStatus, NewMandate, SepaMandate,
};
pub use number::MembershipNumber;
pub use party::{validate_email, Contact, Party};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
pub use settings::{
    keys as setting_keys, known_settings, validate_known, Setting, SettingType, SettingValue,
    VerbandSettings,
};
pub use status::MembershipStatus;
pub use update::MembershipUpdate;
