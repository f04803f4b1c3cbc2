use crate::models::config::DEFAULT_MUTE_EPSILON;
use crate::models::state::MuteState;

/// Edge-triggered mute classifier over per-buffer mean amplitudes.
///
/// A muted endpoint delivers a constant sample stream, so consecutive
/// buffer means barely move; a live microphone's mean drifts buffer to
/// buffer. Each buffer is classified as muted when
/// `|mean - previous_mean| < epsilon`.
///
/// This compares drift, not absolute level: a live input carrying an exactly
/// constant signal reads as muted, and a muted input with a noisy floor reads
/// as live.
#[derive(Debug, Clone)]
pub struct MuteDetector {
    epsilon: f32,
    last_aggregate: f32,
    state: MuteState,
}

impl MuteDetector {
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            last_aggregate: 0.0,
            state: MuteState::Unmuted,
        }
    }

    /// Whether two consecutive means are close enough to count as muted.
    #[inline]
    pub fn is_flat(previous: f32, current: f32, epsilon: f32) -> bool {
        (current - previous).abs() < epsilon
    }

    /// Feed one buffer mean. Returns the new state only when it differs from
    /// the last one reported.
    pub fn observe(&mut self, aggregate: f32) -> Option<MuteState> {
        let muted = Self::is_flat(self.last_aggregate, aggregate, self.epsilon);
        self.last_aggregate = aggregate;

        let next = MuteState::from_muted(muted);
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }

    pub fn state(&self) -> MuteState {
        self.state
    }

    pub fn last_aggregate(&self) -> f32 {
        self.last_aggregate
    }
}

impl Default for MuteDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MUTE_EPSILON)
    }
}
