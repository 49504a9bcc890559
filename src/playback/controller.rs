//! Loop-on-end playback controller.
//!
//! Owns one engine session bound to a resolved [`MediaSource`] and maps the
//! host's visibility lifecycle onto it:
//! - `activate`: apply mute, start playback, subscribe to end-of-item
//! - end-of-item: seek to zero and play again
//! - `deactivate`: release the subscription and pause
//!
//! End-of-item notifications may be raised on an engine thread. They are
//! queued and only acted upon when the owner calls [`PlaybackController::pump_events`]
//! or [`PlaybackController::wait_for_event`], so all session state is mutated
//! from a single thread.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::playback::config::PlayerConfig;
use crate::playback::engine::{MediaEngine, SubscriptionToken};
use crate::playback::events::{EventQueue, PlaybackEvent};
use crate::playback::source::{resolve, AssetLookup, MediaSource};
use crate::playback::state::{ControllerState, PlaybackStatus};

struct Subscription {
    token: SubscriptionToken,
    generation: u64,
}

pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    source: MediaSource,
    state: ControllerState,
    muted: bool,
    looping: bool,
    /// Source is handed to the engine on first activation only
    loaded: bool,
    subscription: Option<Subscription>,
    /// Bumped for every subscription so late events from released ones are dropped
    generation: u64,
    loops_completed: u64,
    events: EventQueue,
}

impl<E: MediaEngine> PlaybackController<E> {
    /// Create an idle, looping controller. Nothing reaches the engine until
    /// the first [`activate`](Self::activate).
    pub fn new(engine: E, source: MediaSource, initial_muted: bool) -> Self {
        Self {
            engine,
            source,
            state: ControllerState::Idle,
            muted: initial_muted,
            looping: true,
            loaded: false,
            subscription: None,
            generation: 0,
            loops_completed: 0,
            events: EventQueue::new(),
        }
    }

    /// Resolve the configured source against `assets` and build a controller.
    pub fn from_config(engine: E, config: &PlayerConfig, assets: &impl AssetLookup) -> Self {
        let source = resolve(config.url.as_deref(), config.resource.as_ref(), assets);
        log::info!("Resolved player source: {:?}", source);
        Self::new(engine, source, config.muted).with_looping(config.looping)
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn loops_completed(&self) -> u64 {
        self.loops_completed
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            source: self.source.clone(),
            is_muted: self.muted,
            is_looping: self.looping,
            is_subscribed: self.is_subscribed(),
            loops_completed: self.loops_completed,
        }
    }

    /// Host became visible: start playing. No-op while already active.
    pub fn activate(&mut self) {
        if self.state.is_active() {
            return;
        }

        if !self.loaded {
            let locator = self.source.locator();
            self.engine.load(locator.as_ref());
            self.loaded = true;
        }

        self.engine.set_muted(self.muted);
        self.engine.play();

        if self.looping {
            self.subscribe();
        }

        self.state = ControllerState::Active;
        log::info!("Playback activated (muted: {}, looping: {})", self.muted, self.looping);
    }

    /// Host left view: release the subscription and pause. No-op unless active.
    pub fn deactivate(&mut self) {
        if !self.state.is_active() {
            return;
        }

        self.release_subscription();
        self.engine.pause();

        self.state = ControllerState::Stopped;
        log::info!("Playback stopped after {} loop(s)", self.loops_completed);
    }

    /// Activate now and deactivate when the returned guard goes out of scope.
    pub fn visible(&mut self) -> VisibleSession<'_, E> {
        self.activate();
        VisibleSession { controller: self }
    }

    /// Takes effect immediately when active, otherwise on the next activation.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if self.state.is_active() {
            self.engine.set_muted(muted);
        }
        log::debug!("Muted: {}", muted);
    }

    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.muted);
    }

    /// Enable or disable looping; an active session gains or loses its
    /// end-of-item subscription right away.
    pub fn set_looping(&mut self, looping: bool) {
        if self.looping == looping {
            return;
        }
        self.looping = looping;

        if self.state.is_active() {
            if looping {
                self.subscribe();
            } else {
                self.release_subscription();
            }
        }
    }

    /// Handle every queued notification. Returns how many restarts happened.
    pub fn pump_events(&mut self) -> usize {
        let mut restarts = 0;
        for event in self.events.drain() {
            if self.handle_event(event) {
                restarts += 1;
            }
        }
        restarts
    }

    /// Block for at most `timeout` waiting for one notification and handle it.
    /// Returns `true` if it restarted playback.
    pub fn wait_for_event(&mut self, timeout: Duration) -> bool {
        match self.events.next_timeout(timeout) {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    fn handle_event(&mut self, event: PlaybackEvent) -> bool {
        match event {
            PlaybackEvent::ItemEnded { generation } => {
                let current = self.subscription.as_ref().map(|s| s.generation);
                if !self.state.is_active() || current != Some(generation) {
                    log::debug!("Ignoring stale end-of-item (generation {})", generation);
                    return false;
                }
                self.restart_item();
                true
            }
        }
    }

    fn restart_item(&mut self) {
        self.engine.seek(Duration::ZERO);
        self.engine.play();
        self.loops_completed += 1;
        log::debug!("Item ended, looping (#{})", self.loops_completed);
    }

    fn subscribe(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        self.generation += 1;
        let listener = self.events.item_ended_listener(self.generation);
        let token = self.engine.on_item_ended(listener);
        self.subscription = Some(Subscription {
            token,
            generation: self.generation,
        });
    }

    fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.engine.unsubscribe(subscription.token);
        }
    }
}

impl<E: MediaEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// A controller borrowed for as long as its host is on screen.
pub struct VisibleSession<'a, E: MediaEngine> {
    controller: &'a mut PlaybackController<E>,
}

impl<E: MediaEngine> Deref for VisibleSession<'_, E> {
    type Target = PlaybackController<E>;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl<E: MediaEngine> DerefMut for VisibleSession<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.controller
    }
}

impl<E: MediaEngine> Drop for VisibleSession<'_, E> {
    fn drop(&mut self) {
        self.controller.deactivate();
    }
}
