//! Looping, mutable playback sessions over a pluggable media engine.
//!
//! A [`PlaybackController`] binds one engine session to a [`MediaSource`]
//! resolved from an explicit URL or a bundled asset. Hosts call
//! [`activate`](PlaybackController::activate) when the player becomes visible
//! and [`deactivate`](PlaybackController::deactivate) when it leaves view;
//! while active, every end-of-item notification restarts the item from zero.
//!
//! ```no_run
//! use loopplay::{BundleDir, PlaybackController, PlayerConfig, RodioEngine};
//! use std::time::Duration;
//!
//! let engine = RodioEngine::new()?;
//! let config = PlayerConfig::advanced();
//! let mut player = PlaybackController::from_config(engine, &config, &BundleDir::default_location());
//!
//! let mut session = player.visible();
//! session.toggle_mute();
//! while session.loops_completed() < 3 {
//!     session.wait_for_event(Duration::from_millis(250));
//! }
//! # Ok::<(), loopplay::Error>(())
//! ```

mod error;
pub mod playback;

pub use error::{Error, Result};
pub use playback::{
    resolve, AssetLookup, BundleDir, ControllerState, LocalResource, Locator, MediaEngine,
    MediaSource, PlaybackController, PlaybackStatus, PlayerConfig, SubscriptionToken,
    VisibleSession,
};
#[cfg(feature = "rodio-backend")]
pub use playback::{EngineStatus, RodioEngine};
