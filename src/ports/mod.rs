//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `VerbandStore` / `VerbandTransaction` - transactional writes across
//!   memberships, payments, mandates, history and counters
//! - `MembershipReader` - list and detail queries
//! - `SettingsResolver` / `SettingsRepository` - association settings
//! - `DojoStatsProvider` - usage numbers of a linked dojo
//!
//! ## Auth Ports
//!
//! - `SessionValidator` - bearer token validation

mod dojo_stats;
mod membership_reader;
mod session_validator;
mod settings;
mod verband_store;

pub use dojo_stats::{DojoStats, DojoStatsProvider};
pub use membership_reader::{MembershipFilter, MembershipReader};
pub use session_validator::SessionValidator;
pub use settings::{SettingsRepository, SettingsResolver};
pub use verband_store::{VerbandStore, VerbandTransaction};
