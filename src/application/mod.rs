//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).
//! Every lifecycle command runs in one store transaction and writes its
//! audit trail entry through [`AuditTrail`].

mod audit;
pub mod handlers;
mod settings_cache;

pub use audit::{AuditBatch, AuditPolicy, AuditTrail};
pub use settings_cache::{CachingSettingsResolver, SettingsStore};
