/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → capturing → stopped
///            ↓   ↑
///        reconnecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Stopped,
    Reconnecting,
}

impl CaptureState {
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Reconnecting)
    }
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MuteState {
    Muted,
    #[default]
    Unmuted,
}

impl MuteState {
    pub fn from_muted(muted: bool) -> Self {
        if muted {
            Self::Muted
        } else {
            Self::Unmuted
        }
    }

    pub fn is_muted(&self) -> bool {
        matches!(self, Self::Muted)
    }
}
