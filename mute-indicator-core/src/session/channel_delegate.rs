use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::models::device::AudioDevice;
use crate::traits::monitor_delegate::MonitorDelegate;

/// A monitor notification as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    DeviceListChanged(Vec<AudioDevice>),
    Muted,
    Unmuted,
}

/// Delegate that forwards notifications over a channel, so a UI loop can
/// drain them on its own thread.
pub struct ChannelDelegate {
    sender: Sender<MonitorEvent>,
}

impl ChannelDelegate {
    pub fn new() -> (Arc<Self>, Receiver<MonitorEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Arc::new(Self { sender }), receiver)
    }

    fn forward(&self, event: MonitorEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Monitor event dropped, receiver closed");
        }
    }
}

impl MonitorDelegate for ChannelDelegate {
    fn on_device_list_changed(&self, devices: &[AudioDevice]) {
        self.forward(MonitorEvent::DeviceListChanged(devices.to_vec()));
    }

    fn on_muted(&self) {
        self.forward(MonitorEvent::Muted);
    }

    fn on_unmuted(&self) {
        self.forward(MonitorEvent::Unmuted);
    }
}
