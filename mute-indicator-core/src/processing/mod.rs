pub mod aggregate;
pub mod mute_detector;
