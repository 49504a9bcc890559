use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::playback::engine::ItemEndedListener;

/// Notifications produced by engine threads for the controller's owner thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The current item reached its end while subscription `generation` was live.
    ItemEnded { generation: u64 },
}

/// Single-consumer queue that moves engine notifications onto the thread
/// owning the controller.
pub struct EventQueue {
    tx: Sender<PlaybackEvent>,
    rx: Receiver<PlaybackEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Build an engine listener that tags its notifications with `generation`.
    pub fn item_ended_listener(&self, generation: u64) -> ItemEndedListener {
        let tx = self.tx.clone();
        Box::new(move || {
            // The queue is gone once the controller is dropped
            let _ = tx.send(PlaybackEvent::ItemEnded { generation });
        })
    }

    /// Everything queued right now, without blocking.
    pub fn drain(&self) -> Vec<PlaybackEvent> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PlaybackEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            // Unreachable while `self.tx` is alive
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
