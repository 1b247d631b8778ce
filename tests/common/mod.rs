//! Shared fakes for the service tests
#![allow(dead_code)]

use lullaby::audio::PlaybackBackend;
use lullaby::error::{PlayerError, Result};
use lullaby::events::{EventBus, PlayerEvent};
use lullaby::notification::{Notification, NotificationSink};
use lullaby::playlist::{Playlist, Track};
use lullaby::service::{
    PlaybackHandle, PlaybackOptions, PlaybackService, SleepTimerHandle, SleepTimerOptions,
    SleepTimerService,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

static INIT: Once = Once::new();

pub const TRACK_LENGTH: Duration = Duration::from_secs(180);

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub loaded: Option<PathBuf>,
    pub loads: Vec<PathBuf>,
    pub playing: bool,
    pub position: Duration,
    pub volume: f32,
    pub finished: bool,
    pub stops: usize,
    /// Paths whose load fails
    pub broken: Vec<PathBuf>,
}

/// In-memory backend; tests inspect and poke `state`
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn finish_track(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.finished = true;
    }
}

impl PlaybackBackend for FakeBackend {
    fn load(&mut self, path: &Path) -> Result<Duration> {
        let mut state = self.state.lock();
        state.loads.push(path.to_path_buf());
        state.playing = false;
        state.position = Duration::ZERO;
        if state.broken.iter().any(|p| p == path) {
            state.loaded = None;
            return Err(PlayerError::decode(path, "unsupported format"));
        }
        state.loaded = Some(path.to_path_buf());
        Ok(TRACK_LENGTH)
    }

    fn play(&mut self) {
        let mut state = self.state.lock();
        if state.loaded.is_some() {
            state.playing = true;
        }
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.loaded = None;
        state.playing = false;
        state.position = Duration::ZERO;
        state.stops += 1;
    }

    fn seek(&mut self, position: Duration) -> Result<Duration> {
        self.state.lock().position = position;
        Ok(position)
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn position(&self) -> Duration {
        self.state.lock().position
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn take_finished(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().finished)
    }
}

#[derive(Debug, Clone)]
pub enum SinkCall {
    Post(Notification),
    Cancel(u32),
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    pub fn last(&self) -> Option<SinkCall> {
        self.calls.lock().last().cloned()
    }

    pub fn last_post(&self, id: u32) -> Option<Notification> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            SinkCall::Post(n) if n.id == id => Some(n.clone()),
            _ => None,
        })
    }

    pub fn post_count(&self, id: u32) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, SinkCall::Post(n) if n.id == id))
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn post(&mut self, notification: &Notification) -> Result<()> {
        self.calls.lock().push(SinkCall::Post(notification.clone()));
        Ok(())
    }

    fn cancel(&mut self, id: u32) -> Result<()> {
        self.calls.lock().push(SinkCall::Cancel(id));
        Ok(())
    }
}

pub fn test_playlist(len: usize) -> Playlist {
    Playlist::new(
        (0..len)
            .map(|i| Track::new(format!("Song {}", i + 1), format!("/music/song_{}.mp3", i + 1)))
            .collect(),
    )
    .unwrap()
}

pub fn default_options() -> PlaybackOptions {
    PlaybackOptions {
        auto_next: true,
        volume: 1.0,
        completion_poll: Duration::from_millis(200),
    }
}

pub struct Harness {
    pub backend: FakeBackend,
    pub playback_sink: RecordingSink,
    pub timer_sink: RecordingSink,
    pub events: EventBus,
    pub playback: PlaybackHandle,
    pub timer: SleepTimerHandle,
}

impl Harness {
    pub fn new(tracks: usize, options: PlaybackOptions) -> Self {
        init_logging();

        let backend = FakeBackend::default();
        let playback_sink = RecordingSink::default();
        let timer_sink = RecordingSink::default();
        let events = EventBus::new();

        let (playback, _) = PlaybackService::new(
            Box::new(backend.clone()),
            Box::new(playback_sink.clone()),
            test_playlist(tracks),
            events.clone(),
            options,
        )
        .spawn();

        let (timer, _) = SleepTimerService::new(
            Box::new(timer_sink.clone()),
            events.clone(),
            playback.clone(),
            SleepTimerOptions {
                notify_every: Duration::from_secs(30),
                finish_linger: Duration::from_secs(5),
            },
        )
        .spawn();

        Self {
            backend,
            playback_sink,
            timer_sink,
            events,
            playback,
            timer,
        }
    }
}

/// Receive until `pred` matches, skipping anything else
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<PlayerEvent>, mut pred: F) -> PlayerEvent
where
    F: FnMut(&PlayerEvent) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), wait)
        .await
        .expect("event never arrived")
}

/// Everything published so far, without waiting
pub fn drain(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}
