//! Settings handlers.
//!
//! Administrative read and write access to the association settings.

mod list_settings;
mod update_settings;

pub use list_settings::ListSettingsHandler;
pub use update_settings::{UpdateSettingsCommand, UpdateSettingsHandler};
