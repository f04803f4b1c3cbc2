use crate::models::error::MonitorError;
use crate::storage::settings::AppSettings;

/// Persistence for user settings.
pub trait SettingsStore: Send + Sync {
    /// Read persisted settings. A store with nothing saved yet returns defaults.
    fn load(&self) -> Result<AppSettings, MonitorError>;

    fn save(&self, settings: &AppSettings) -> Result<(), MonitorError>;
}
