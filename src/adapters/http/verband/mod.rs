//! HTTP adapter for the Verband membership endpoints.
//!
//! Exposes the membership lifecycle under `/api/verbandsmitgliedschaften`:
//! public self-registration and configuration, plus the admin area for
//! memberships, payments, SEPA mandates, the audit trail and settings.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::VerbandAppState;
pub use routes::{admin_routes, public_routes, verband_router, API_PREFIX};
