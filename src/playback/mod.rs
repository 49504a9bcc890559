pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
#[cfg(feature = "rodio-backend")]
pub mod rodio_engine;
pub mod source;
pub mod state;

pub use config::PlayerConfig;
pub use controller::{PlaybackController, VisibleSession};
pub use engine::{ItemEndedListener, MediaEngine, SubscriptionToken};
pub use events::{EventQueue, PlaybackEvent};
#[cfg(feature = "rodio-backend")]
pub use rodio_engine::{EngineStatus, RodioEngine};
pub use source::{resolve, AssetLookup, BundleDir, LocalResource, Locator, MediaSource};
pub use state::{ControllerState, PlaybackStatus};
