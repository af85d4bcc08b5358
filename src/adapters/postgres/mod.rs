//! PostgreSQL adapters - Database implementations for the persistence ports.
//!
//! - `PostgresVerbandStore` - transactional writes for lifecycle operations
//! - `PostgresMembershipReader` - list and detail queries
//! - `PostgresSettings` - settings resolver and repository
//! - `PostgresDojoStats` - read-only usage numbers from the platform tables

mod dojo_stats;
mod membership_reader;
mod rows;
mod settings;
mod verband_store;

pub use dojo_stats::PostgresDojoStats;
pub use membership_reader::PostgresMembershipReader;
pub use settings::PostgresSettings;
pub use verband_store::{PostgresVerbandStore, PostgresVerbandTransaction};
