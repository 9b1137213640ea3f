mod manager;
mod settings;

pub use manager::{SettingsError, SettingsManager};
pub use settings::{Settings, StorageBackend};
