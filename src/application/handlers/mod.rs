//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod membership;
pub mod settings;

pub use membership::*;
pub use settings::*;
