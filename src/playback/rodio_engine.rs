//! Media engine implementation using Rodio.
//!
//! Architecture:
//! - `RodioEngine`: handle (Send) owned by the controller, sends commands to the audio thread
//! - `Playback`: runs on a dedicated thread that owns the audio output and processes commands
//! - Uses crossbeam channels for thread-safe command passing
//! - SharedStatus (Arc<RwLock<EngineStatus>>) for reading engine state from any thread
//! - End-of-item is detected on the audio thread and reported through `ItemEndedListeners`

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use rodio::{Decoder, OutputStream, Sink};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::playback::engine::{ItemEndedListener, MediaEngine, SubscriptionToken};
use crate::playback::source::Locator;

/// Interval for position updates and item-end checks
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Sink volume while not muted
const UNMUTED_VOLUME: f32 = 1.0;

/// Commands sent to the audio thread
#[derive(Debug)]
enum EngineCommand {
    Load(Option<Locator>),
    Play,
    Pause,
    Seek(Duration),
    SetMuted(bool),
}

/// What the audio thread is doing, readable from any thread.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub locator: Option<String>,
    pub is_playing: bool,
    pub position_secs: f64,
    pub is_muted: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Full playthroughs since the last load
    pub items_completed: u64,
}

type SharedStatus = Arc<RwLock<EngineStatus>>;

#[derive(Default)]
struct ListenerTable {
    next_token: u64,
    listeners: HashMap<SubscriptionToken, ItemEndedListener>,
}

/// End-of-item listeners, shared between the engine handle and the audio thread.
#[derive(Clone, Default)]
struct ItemEndedListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl ItemEndedListeners {
    fn subscribe(&self, listener: ItemEndedListener) -> SubscriptionToken {
        let mut table = self.table.lock();
        table.next_token += 1;
        let token = SubscriptionToken::new(table.next_token);
        table.listeners.insert(token, listener);
        token
    }

    /// Returns `false` for unknown or already released tokens.
    fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.table.lock().listeners.remove(&token).is_some()
    }

    fn notify(&self) {
        for listener in self.table.lock().listeners.values() {
            listener();
        }
    }
}

/// Handle for driving the audio thread.
///
/// Dropping it closes the command channel, which shuts the thread down.
pub struct RodioEngine {
    cmd_tx: Sender<EngineCommand>,
    status: SharedStatus,
    listeners: ItemEndedListeners,
}

impl RodioEngine {
    /// Open the default audio output and spawn the audio thread.
    pub fn new() -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded::<EngineCommand>(32);
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);
        let status: SharedStatus = Arc::new(RwLock::new(EngineStatus::default()));
        let listeners = ItemEndedListeners::default();

        let status_clone = status.clone();
        let listeners_clone = listeners.clone();
        thread::Builder::new()
            .name("loopplay-audio".into())
            .spawn(move || {
                run_audio_thread(cmd_rx, ready_tx, status_clone, listeners_clone);
            })
            .map_err(|e| Error::Spawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Output(e)),
            Err(_) => return Err(Error::Output("audio thread exited during startup".into())),
        }

        log::info!("Audio engine initialized");
        Ok(Self {
            cmd_tx,
            status,
            listeners,
        })
    }

    pub fn status(&self) -> EngineStatus {
        self.status.read().clone()
    }

    fn send(&self, cmd: EngineCommand) {
        if let Err(e) = self.cmd_tx.send(cmd) {
            log::warn!("Audio thread not responding: {}", e);
        }
    }
}

impl MediaEngine for RodioEngine {
    fn load(&mut self, locator: Option<&Locator>) {
        self.send(EngineCommand::Load(locator.cloned()));
    }

    fn play(&mut self) {
        self.send(EngineCommand::Play);
    }

    fn pause(&mut self) {
        self.send(EngineCommand::Pause);
    }

    fn seek(&mut self, position: Duration) {
        self.send(EngineCommand::Seek(position));
    }

    fn set_muted(&mut self, muted: bool) {
        self.send(EngineCommand::SetMuted(muted));
    }

    fn on_item_ended(&mut self, listener: ItemEndedListener) -> SubscriptionToken {
        self.listeners.subscribe(listener)
    }

    fn unsubscribe(&mut self, token: SubscriptionToken) {
        self.listeners.unsubscribe(token);
    }
}

/// Tracks playback position using wall-clock time.
///
/// Since Rodio doesn't expose the current playback position, we track it
/// by measuring elapsed time while playing.
struct PositionTracker {
    /// When playback started (or resumed)
    play_start: Option<Instant>,
    /// Accumulated position from previous play segments
    accumulated_secs: f64,
}

impl PositionTracker {
    fn new() -> Self {
        Self {
            play_start: None,
            accumulated_secs: 0.0,
        }
    }

    /// Start or resume tracking
    fn start(&mut self) {
        if self.play_start.is_none() {
            self.play_start = Some(Instant::now());
        }
    }

    /// Pause tracking, accumulating elapsed time
    fn pause(&mut self) {
        if let Some(start) = self.play_start.take() {
            self.accumulated_secs += start.elapsed().as_secs_f64();
        }
    }

    /// Reset to zero
    fn reset(&mut self) {
        self.play_start = None;
        self.accumulated_secs = 0.0;
    }

    /// Seek to a specific position
    fn seek(&mut self, position_secs: f64) {
        self.accumulated_secs = position_secs;
        // Reset the start time if currently playing
        if self.play_start.is_some() {
            self.play_start = Some(Instant::now());
        }
    }

    /// Get current position in seconds
    fn position(&self) -> f64 {
        let current_segment = self
            .play_start
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.accumulated_secs + current_segment
    }

    /// Check if currently tracking (playing)
    fn is_playing(&self) -> bool {
        self.play_start.is_some()
    }
}

/// The parts of a Rodio [`Sink`] the playback loop drives.
trait Output {
    /// Queue a fresh decoder over `bytes`.
    fn append(&self, bytes: Bytes) -> Result<()>;
    fn is_empty(&self) -> bool;
    fn play(&self);
    fn pause(&self);
    /// Drop everything queued and stay paused.
    fn clear(&self);
    fn seek(&self, position: Duration) -> std::result::Result<(), String>;
    fn set_volume(&self, volume: f32);
}

impl Output for Sink {
    fn append(&self, bytes: Bytes) -> Result<()> {
        let decoder =
            Decoder::new(Cursor::new(bytes)).map_err(|e| Error::Decode(e.to_string()))?;
        Sink::append(self, decoder);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        Sink::empty(self)
    }

    fn play(&self) {
        Sink::play(self)
    }

    fn pause(&self) {
        Sink::pause(self)
    }

    fn clear(&self) {
        Sink::stop(self);
        Sink::pause(self);
    }

    fn seek(&self, position: Duration) -> std::result::Result<(), String> {
        Sink::try_seek(self, position).map_err(|e| e.to_string())
    }

    fn set_volume(&self, volume: f32) {
        Sink::set_volume(self, volume)
    }
}

/// Main loop for the audio thread.
///
/// The OutputStream and Sink are not Send, so both are created here and never
/// leave this thread.
fn run_audio_thread(
    cmd_rx: Receiver<EngineCommand>,
    ready_tx: Sender<std::result::Result<(), String>>,
    status: SharedStatus,
    listeners: ItemEndedListeners,
) {
    // Initialize audio output on this thread
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to open audio output: {}", e);
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };

    let sink = match Sink::try_new(&stream_handle) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to create audio sink: {}", e);
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };
    sink.pause();

    let _ = ready_tx.send(Ok(()));
    log::info!("Audio thread started");

    let mut playback = Playback::new(sink, status, listeners);

    // Main loop: process commands with timeout for periodic tasks
    loop {
        match cmd_rx.recv_timeout(TICK_INTERVAL) {
            Ok(cmd) => playback.handle_command(cmd),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => playback.tick(),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                log::info!("Audio thread shutting down");
                break;
            }
        }
    }
}

/// Playback state owned by the audio thread.
///
/// Keeps the encoded bytes of the loaded item so the item can be queued
/// again after it has played to the end. Only `play` and `seek` requeue;
/// the tick merely reports the end.
struct Playback<O: Output> {
    output: O,
    status: SharedStatus,
    listeners: ItemEndedListeners,
    position: PositionTracker,
    media: Option<Bytes>,
}

impl<O: Output> Playback<O> {
    fn new(output: O, status: SharedStatus, listeners: ItemEndedListeners) -> Self {
        Self {
            output,
            status,
            listeners,
            position: PositionTracker::new(),
            media: None,
        }
    }

    /// Periodic tick for position updates and item-end detection
    fn tick(&mut self) {
        if self.position.is_playing() && self.output.is_empty() {
            self.on_item_ended();
            return;
        }

        if self.position.is_playing() {
            self.status.write().position_secs = self.position.position();
        }
    }

    fn on_item_ended(&mut self) {
        log::debug!("Item ended");

        self.position.reset();
        {
            let mut status = self.status.write();
            status.is_playing = false;
            status.position_secs = 0.0;
            status.items_completed += 1;
        }

        self.listeners.notify();
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Load(locator) => self.load(locator),
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Seek(position) => self.seek(position),
            EngineCommand::SetMuted(muted) => self.set_muted(muted),
        }
    }

    fn load(&mut self, locator: Option<Locator>) {
        self.output.clear();
        self.position.reset();
        self.media = None;

        {
            let mut status = self.status.write();
            status.locator = locator.as_ref().map(ToString::to_string);
            status.is_playing = false;
            status.position_secs = 0.0;
            status.error = None;
            status.items_completed = 0;
            status.is_loading = locator.is_some();
        }

        let Some(locator) = locator else {
            log::debug!("Loaded empty source");
            return;
        };

        let result = fetch(&locator).and_then(|bytes| {
            self.output.append(bytes.clone())?;
            Ok(bytes)
        });

        let mut status = self.status.write();
        status.is_loading = false;
        match result {
            Ok(bytes) => {
                log::debug!("Loaded {} ({} bytes)", locator, bytes.len());
                self.media = Some(bytes);
            }
            Err(e) => {
                log::error!("Failed to load {}: {}", locator, e);
                status.error = Some(e.to_string());
            }
        }
    }

    /// Put the loaded item back on the output after it played to the end.
    fn requeue(&mut self) {
        if !self.output.is_empty() {
            return;
        }
        if let Some(bytes) = self.media.clone() {
            if let Err(e) = self.output.append(bytes) {
                log::warn!("Failed to requeue item: {}", e);
            }
        }
    }

    fn play(&mut self) {
        if self.media.is_none() {
            log::debug!("Nothing loaded, ignoring play");
            return;
        }

        self.requeue();
        self.output.play();
        self.position.start();
        self.status.write().is_playing = true;
        log::debug!("Playing");
    }

    fn pause(&mut self) {
        self.output.pause();
        self.position.pause();

        let mut status = self.status.write();
        status.is_playing = false;
        status.position_secs = self.position.position();
        log::debug!("Paused at {:.1}s", status.position_secs);
    }

    fn seek(&mut self, position: Duration) {
        if self.media.is_none() {
            return;
        }

        self.requeue();
        match self.output.seek(position) {
            Ok(()) => log::debug!("Seeked to {:.1}s", position.as_secs_f64()),
            Err(e) => log::warn!("Seek failed: {}", e),
        }

        self.position.seek(position.as_secs_f64());
        self.status.write().position_secs = position.as_secs_f64();
    }

    fn set_muted(&mut self, muted: bool) {
        self.status.write().is_muted = muted;
        self.output.set_volume(if muted { 0.0 } else { UNMUTED_VOLUME });
    }
}

/// Read the whole item into memory.
fn fetch(locator: &Locator) -> Result<Bytes> {
    match locator {
        Locator::File(path) => {
            log::debug!("Loading local file: {}", path.display());
            Ok(Bytes::from(std::fs::read(path)?))
        }
        Locator::Remote(url) => {
            log::debug!("Loading HTTP stream: {}", url);
            let response =
                reqwest::blocking::get(url).map_err(|e| Error::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(Error::Status(response.status().as_u16()));
            }

            response.bytes().map_err(|e| Error::Network(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Stands in for a Sink: counts queued items instead of decoding them.
    #[derive(Default)]
    struct FakeOutput {
        queued: Cell<usize>,
        appends: Cell<usize>,
        paused: Cell<bool>,
        volume: Cell<f32>,
        seeks: RefCell<Vec<Duration>>,
    }

    impl FakeOutput {
        /// The queued item played to its end.
        fn drain(&self) {
            self.queued.set(0);
        }
    }

    impl Output for FakeOutput {
        fn append(&self, _bytes: Bytes) -> Result<()> {
            self.queued.set(self.queued.get() + 1);
            self.appends.set(self.appends.get() + 1);
            Ok(())
        }

        fn is_empty(&self) -> bool {
            self.queued.get() == 0
        }

        fn play(&self) {
            self.paused.set(false);
        }

        fn pause(&self) {
            self.paused.set(true);
        }

        fn clear(&self) {
            self.queued.set(0);
            self.paused.set(true);
        }

        fn seek(&self, position: Duration) -> std::result::Result<(), String> {
            self.seeks.borrow_mut().push(position);
            Ok(())
        }

        fn set_volume(&self, volume: f32) {
            self.volume.set(volume);
        }
    }

    fn counting_listener(counter: &Arc<AtomicUsize>) -> ItemEndedListener {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    struct Harness {
        playback: Playback<FakeOutput>,
        status: SharedStatus,
        ended: Arc<AtomicUsize>,
        _dir: tempfile::TempDir,
    }

    /// A playback loaded from a real file, with one end-of-item listener.
    fn loaded_playback() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"encoded media").unwrap();

        let status: SharedStatus = Arc::new(RwLock::new(EngineStatus::default()));
        let listeners = ItemEndedListeners::default();
        let ended = Arc::new(AtomicUsize::new(0));
        listeners.subscribe(counting_listener(&ended));

        let mut playback = Playback::new(FakeOutput::default(), status.clone(), listeners);
        playback.handle_command(EngineCommand::Load(Some(Locator::File(path))));
        Harness {
            playback,
            status,
            ended,
            _dir: dir,
        }
    }

    #[test]
    fn listeners_stop_firing_after_unsubscribe() {
        let listeners = ItemEndedListeners::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let token = listeners.subscribe(counting_listener(&fired));

        listeners.notify();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(listeners.unsubscribe(token));
        listeners.notify();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_unsubscribe_is_a_no_op() {
        let listeners = ItemEndedListeners::default();
        let first = listeners.subscribe(Box::new(|| {}));
        let second = listeners.subscribe(Box::new(|| {}));
        assert_ne!(first, second);

        assert!(listeners.unsubscribe(first));
        assert!(!listeners.unsubscribe(first));
        assert!(!listeners.unsubscribe(SubscriptionToken::new(42)));
        assert!(listeners.unsubscribe(second));
    }

    #[test]
    fn load_queues_item_once_and_caches_bytes() {
        let h = loaded_playback();
        assert_eq!(h.playback.output.appends.get(), 1);
        assert!(h.playback.media.is_some());

        let status = h.status.read();
        assert!(!status.is_loading);
        assert!(status.error.is_none());
        assert!(status.locator.as_deref().unwrap().ends_with("clip.mp4"));
    }

    #[test]
    fn item_end_is_reported_once_and_only_seek_requeues() {
        let mut h = loaded_playback();
        h.playback.handle_command(EngineCommand::Play);
        assert_eq!(h.playback.output.appends.get(), 1);

        h.playback.output.drain();
        h.playback.tick();
        assert_eq!(h.ended.load(Ordering::SeqCst), 1);
        assert_eq!(h.status.read().items_completed, 1);
        assert!(!h.status.read().is_playing);

        // further ticks neither refire nor put the item back
        h.playback.tick();
        h.playback.tick();
        assert_eq!(h.ended.load(Ordering::SeqCst), 1);
        assert_eq!(h.playback.output.appends.get(), 1);

        h.playback.handle_command(EngineCommand::Seek(Duration::ZERO));
        assert_eq!(h.playback.output.appends.get(), 2);
        assert_eq!(*h.playback.output.seeks.borrow(), vec![Duration::ZERO]);

        // the item is queued again, so play must not append a second copy
        h.playback.handle_command(EngineCommand::Play);
        assert_eq!(h.playback.output.appends.get(), 2);
        assert!(h.status.read().is_playing);
    }

    #[test]
    fn play_after_end_requeues_the_item() {
        let mut h = loaded_playback();
        h.playback.handle_command(EngineCommand::Play);
        h.playback.output.drain();
        h.playback.tick();

        h.playback.handle_command(EngineCommand::Play);
        assert_eq!(h.playback.output.appends.get(), 2);
        assert!(!h.playback.output.paused.get());
    }

    #[test]
    fn empty_source_ignores_transport_and_never_ends() {
        let status: SharedStatus = Arc::new(RwLock::new(EngineStatus::default()));
        let listeners = ItemEndedListeners::default();
        let ended = Arc::new(AtomicUsize::new(0));
        listeners.subscribe(counting_listener(&ended));

        let mut playback = Playback::new(FakeOutput::default(), status.clone(), listeners);
        playback.handle_command(EngineCommand::Load(None));
        playback.handle_command(EngineCommand::Play);
        playback.handle_command(EngineCommand::Seek(Duration::ZERO));
        playback.tick();

        assert_eq!(playback.output.appends.get(), 0);
        assert!(playback.output.seeks.borrow().is_empty());
        assert_eq!(ended.load(Ordering::SeqCst), 0);
        assert!(!status.read().is_playing);
    }

    #[test]
    fn failed_load_is_recorded_in_status() {
        let status: SharedStatus = Arc::new(RwLock::new(EngineStatus::default()));
        let mut playback =
            Playback::new(FakeOutput::default(), status.clone(), ItemEndedListeners::default());
        playback.handle_command(EngineCommand::Load(Some(Locator::File(
            "/definitely/not/here.mp4".into(),
        ))));

        assert!(playback.media.is_none());
        assert!(status.read().error.is_some());
        assert!(!status.read().is_loading);
    }

    #[test]
    fn mute_silences_output_and_unmute_restores_full_volume() {
        let mut h = loaded_playback();
        h.playback.handle_command(EngineCommand::SetMuted(true));
        assert_eq!(h.playback.output.volume.get(), 0.0);
        assert!(h.status.read().is_muted);

        h.playback.handle_command(EngineCommand::SetMuted(false));
        assert_eq!(h.playback.output.volume.get(), UNMUTED_VOLUME);
        assert!(!h.status.read().is_muted);
    }

    #[test]
    fn position_tracker_accumulates_and_resets() {
        let mut tracker = PositionTracker::new();
        assert!(!tracker.is_playing());
        tracker.seek(12.5);
        assert_eq!(tracker.position(), 12.5);

        tracker.start();
        assert!(tracker.is_playing());
        tracker.pause();
        assert!(tracker.position() >= 12.5);

        tracker.reset();
        assert_eq!(tracker.position(), 0.0);
        assert!(!tracker.is_playing());
    }

    #[test]
    fn fetch_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"abc").unwrap();

        let bytes = fetch(&Locator::File(path)).unwrap();
        assert_eq!(&bytes[..], b"abc");
    }

    #[test]
    fn fetch_reports_missing_files() {
        let err = fetch(&Locator::File("/definitely/not/here.mp4".into())).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
