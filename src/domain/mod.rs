//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `membership` - Verband membership lifecycle, billing, SEPA and audit vocabulary

pub mod foundation;
pub mod membership;
