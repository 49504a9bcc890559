//! Player configuration and the stock presets.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::playback::source::LocalResource;

/// Sample stream used by the remote preset.
pub const SAMPLE_STREAM_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

/// What to play and how to start it.
///
/// Every field is optional in JSON:
///
/// ```json
/// { "resource": { "name": "clip", "ext": "mp4" }, "muted": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Explicit URL; wins over `resource` when non-empty.
    pub url: Option<String>,
    /// Bundled asset used when no URL is given.
    pub resource: Option<LocalResource>,
    /// Mute flag applied on the first activation.
    pub muted: bool,
    /// Restart from the beginning whenever the item ends.
    pub looping: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            url: None,
            resource: None,
            muted: false,
            looping: true,
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Plays the sample stream once, with sound.
    pub fn remote_stream() -> Self {
        Self {
            url: Some(SAMPLE_STREAM_URL.to_string()),
            looping: false,
            ..Self::default()
        }
    }

    /// Plays `local_video.mp4` once, with sound.
    pub fn local_clip() -> Self {
        Self {
            resource: Some(LocalResource::new("local_video", "mp4")),
            looping: false,
            ..Self::default()
        }
    }

    /// Loops `local_video_sound.mp4` with sound; the host exposes a mute toggle.
    pub fn advanced() -> Self {
        Self {
            resource: Some(LocalResource::new("local_video_sound", "mp4")),
            ..Self::default()
        }
    }

    /// Loops `url` if given, otherwise `local_video.mp4`, starting muted.
    pub fn beveled(url: Option<String>) -> Self {
        Self {
            url,
            resource: Some(LocalResource::new("local_video", "mp4")),
            muted: true,
            looping: true,
        }
    }
}
