pub mod cancel;
pub mod capture;
pub mod catalog;
pub mod channel_delegate;
pub mod indicator;
pub mod monitor;
pub mod reconnect;
