//! In-memory adapters for tests and local runs (`database.url = "memory://"`).

mod dojo_stats;
mod settings;
mod verband_store;

pub use dojo_stats::InMemoryDojoStats;
pub use settings::InMemorySettings;
pub use verband_store::InMemoryVerbandStore;
