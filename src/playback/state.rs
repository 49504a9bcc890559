use serde::Serialize;

use crate::playback::source::MediaSource;

/// Lifecycle of a playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    /// Constructed, never activated
    #[default]
    Idle,
    /// Playing with the end-of-item subscription live
    Active,
    /// Subscription released and playback paused
    Stopped,
}

impl ControllerState {
    pub fn is_active(&self) -> bool {
        matches!(self, ControllerState::Active)
    }
}

/// Point-in-time view of a controller for host UIs.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: ControllerState,
    pub source: MediaSource,
    pub is_muted: bool,
    pub is_looping: bool,
    pub is_subscribed: bool,
    pub loops_completed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_for_hosts() {
        let status = PlaybackStatus {
            state: ControllerState::Active,
            source: MediaSource::Remote {
                url: "https://x/y.mp4".into(),
            },
            is_muted: true,
            is_looping: true,
            is_subscribed: true,
            loops_completed: 3,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["source"]["kind"], "remote");
        assert_eq!(json["source"]["url"], "https://x/y.mp4");
        assert_eq!(json["loops_completed"], 3);
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(ControllerState::default(), ControllerState::Idle);
        assert!(!ControllerState::Idle.is_active());
        assert!(ControllerState::Active.is_active());
    }
}
