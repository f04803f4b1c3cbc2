/// Counters for debugging a running monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorDiagnostics {
    pub buffers_received: u64,
    pub mute_transitions: u64,
    pub reconnect_loops_started: u64,
    pub reconnect_attempts: u64,
    /// Highest number of reconnect loops ever observed running at once.
    pub peak_concurrent_reconnect_loops: usize,
}
