//! Interface to the platform media engine.
//!
//! The controller never decodes or buffers anything itself. It drives an
//! engine through this trait:
//! - Transport requests (`load`, `play`, `pause`, `seek`, `set_muted`) are
//!   best effort and never fail from the controller's point of view
//! - End-of-item notifications are delivered to registered listeners, which
//!   may run on any thread
//! - Every listener is identified by a [`SubscriptionToken`] that must be
//!   handed back through [`MediaEngine::unsubscribe`]

use std::time::Duration;

use crate::playback::source::Locator;

/// Handle for one registered end-of-item listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Called once per full playthrough of the current item.
pub type ItemEndedListener = Box<dyn Fn() + Send + 'static>;

pub trait MediaEngine {
    /// Bind the engine to `locator`. `None` leaves it with no content.
    fn load(&mut self, locator: Option<&Locator>);

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, position: Duration);

    fn set_muted(&mut self, muted: bool);

    fn on_item_ended(&mut self, listener: ItemEndedListener) -> SubscriptionToken;

    /// Remove a listener. Unknown or already released tokens are ignored.
    fn unsubscribe(&mut self, token: SubscriptionToken);
}

impl<E: MediaEngine + ?Sized> MediaEngine for Box<E> {
    fn load(&mut self, locator: Option<&Locator>) {
        (**self).load(locator)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, position: Duration) {
        (**self).seek(position)
    }

    fn set_muted(&mut self, muted: bool) {
        (**self).set_muted(muted)
    }

    fn on_item_ended(&mut self, listener: ItemEndedListener) -> SubscriptionToken {
        (**self).on_item_ended(listener)
    }

    fn unsubscribe(&mut self, token: SubscriptionToken) {
        (**self).unsubscribe(token)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::recording::{Call, RecordingEngine};
    use super::*;

    #[test]
    fn unknown_token_release_is_ignored() {
        let mut engine = RecordingEngine::default();
        let token = engine.on_item_ended(Box::new(|| {}));
        engine.unsubscribe(token);
        engine.unsubscribe(token);
        engine.unsubscribe(SubscriptionToken::new(99));
        assert_eq!(engine.count(&Call::Unsubscribe(token)), 1);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn boxed_engine_forwards_to_inner() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut engine: Box<RecordingEngine> = Box::default();
        let counter = fired.clone();
        MediaEngine::on_item_ended(
            &mut engine,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        MediaEngine::play(&mut engine);
        engine.finish_item();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(engine.count(&Call::Play), 1);
    }
}
