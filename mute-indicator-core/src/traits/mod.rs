pub mod capture_provider;
pub mod device_events;
pub mod device_source;
pub mod lighting;
pub mod monitor_delegate;
pub mod settings_store;
