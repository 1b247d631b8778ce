// Background playback service
// Owns the only `PlaybackBackend`, the playlist and the playback state.
// The controller, notification actions and the sleep timer all reach it
// through a cloneable `PlaybackHandle`.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::PlaybackBackend;
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::notification::{Notification, NotificationSink, NOW_PLAYING_ID};
use crate::playlist::Playlist;
use crate::settings::AppSettings;

#[derive(Debug)]
pub enum PlaybackCommand {
    /// Play the given track, or the current one
    Play(Option<usize>),
    Pause,
    Resume,
    Toggle,
    Stop,
    Seek(Duration),
    Next,
    Previous,
    SetVolume(f32),
    Status(oneshot::Sender<PlaybackSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Stopped,
    Paused,
    Playing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub index: usize,
    pub position: Duration,
    pub duration: Duration,
    pub status: PlayStatus,
    /// A track is loaded in the backend
    pub prepared: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            index: 0,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            status: PlayStatus::Stopped,
            prepared: false,
        }
    }
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.status == PlayStatus::Playing
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub title: String,
    pub track_count: usize,
    pub volume: f32,
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub auto_next: bool,
    pub volume: f32,
    pub completion_poll: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for PlaybackOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            auto_next: settings.playback.auto_next,
            volume: settings.playback.volume,
            completion_poll: settings.completion_poll(),
        }
    }
}

/// Cloneable command interface to the playback service
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<PlaybackCommand>,
}

impl PlaybackHandle {
    fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlayerError::ServiceClosed("playback"))
    }

    pub fn play(&self, index: Option<usize>) -> Result<()> {
        self.send(PlaybackCommand::Play(index))
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlaybackCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(PlaybackCommand::Resume)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(PlaybackCommand::Toggle)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(PlaybackCommand::Stop)
    }

    pub fn seek(&self, position: Duration) -> Result<()> {
        self.send(PlaybackCommand::Seek(position))
    }

    pub fn next(&self) -> Result<()> {
        self.send(PlaybackCommand::Next)
    }

    pub fn previous(&self) -> Result<()> {
        self.send(PlaybackCommand::Previous)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(PlaybackCommand::SetVolume(volume))
    }

    pub async fn status(&self) -> Result<PlaybackSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(PlaybackCommand::Status(tx))?;
        rx.await.map_err(|_| PlayerError::ServiceClosed("playback"))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(PlaybackCommand::Shutdown)
    }
}

pub struct PlaybackService {
    backend: Box<dyn PlaybackBackend>,
    notifier: Box<dyn NotificationSink>,
    playlist: Playlist,
    events: EventBus,
    options: PlaybackOptions,
    state: PlaybackState,
}

impl PlaybackService {
    pub fn new(
        backend: Box<dyn PlaybackBackend>,
        notifier: Box<dyn NotificationSink>,
        playlist: Playlist,
        events: EventBus,
        options: PlaybackOptions,
    ) -> Self {
        Self {
            backend,
            notifier,
            playlist,
            events,
            options,
            state: PlaybackState::default(),
        }
    }

    /// Start the service task
    pub fn spawn(mut self) -> (PlaybackHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        self.options.volume = self.options.volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.options.volume);
        let task = tokio::spawn(self.run(receiver));
        (PlaybackHandle { commands }, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PlaybackCommand>) {
        tracing::info!(tracks = self.playlist.len(), "playback service started");

        let mut completion = tokio::time::interval(self.options.completion_poll);
        completion.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PlaybackCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = completion.tick() => self.check_completion(),
            }
        }

        self.stop();
        tracing::info!("playback service stopped");
    }

    fn handle(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play(index) => self.play(index.unwrap_or(self.state.index)),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Resume => self.resume(),
            PlaybackCommand::Toggle => self.toggle(),
            PlaybackCommand::Stop => self.stop(),
            PlaybackCommand::Seek(position) => self.seek(position),
            PlaybackCommand::Next => self.skip(self.playlist.next_index(self.state.index)),
            PlaybackCommand::Previous => self.skip(self.playlist.previous_index(self.state.index)),
            PlaybackCommand::SetVolume(volume) => self.set_volume(volume),
            PlaybackCommand::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
            PlaybackCommand::Shutdown => {}
        }
    }

    fn play(&mut self, index: usize) {
        if index >= self.playlist.len() {
            let e = PlayerError::TrackNotFound {
                index,
                len: self.playlist.len(),
            };
            tracing::warn!(error = %e, "play request ignored");
            self.events.publish(PlayerEvent::MusicError {
                message: e.to_string(),
            });
            return;
        }

        if index == self.state.index && self.state.prepared {
            // Same track: just make sure it is playing
            if !self.state.is_playing() {
                self.resume();
            }
            return;
        }

        self.load(index, true);
    }

    /// Load `index` into the backend, playing it if `autoplay`
    fn load(&mut self, index: usize, autoplay: bool) {
        let track = match self.playlist.get(index) {
            Ok(track) => track.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot load track");
                return;
            }
        };
        self.state.index = index;
        self.state.position = Duration::ZERO;

        match self.backend.load(&track.path) {
            Ok(duration) => {
                self.state.duration = if duration.is_zero() {
                    track.duration.unwrap_or_default()
                } else {
                    duration
                };
                self.state.prepared = true;

                if autoplay {
                    self.backend.play();
                    self.state.status = PlayStatus::Playing;
                } else {
                    self.state.status = PlayStatus::Paused;
                }

                tracing::info!(index, title = %track.title, autoplay, "track prepared");
                self.events.publish(PlayerEvent::MusicPrepared {
                    index,
                    title: track.title.clone(),
                    duration: self.state.duration,
                });
                self.notify();
            }
            Err(e) => {
                tracing::warn!(index, path = %track.path.display(), error = %e, "failed to open track");
                self.backend.stop();
                self.state.prepared = false;
                self.state.status = PlayStatus::Stopped;
                self.state.duration = Duration::ZERO;
                self.cancel_notification();
                self.events.publish(PlayerEvent::MusicError {
                    message: format!("Cannot play \"{}\": {}", track.title, e),
                });
            }
        }
    }

    fn pause(&mut self) {
        if !self.state.is_playing() {
            tracing::debug!("pause ignored, not playing");
            return;
        }

        self.backend.pause();
        self.refresh_position();
        self.state.status = PlayStatus::Paused;
        self.notify();
        self.events.publish(PlayerEvent::MusicPaused);
    }

    fn resume(&mut self) {
        if !self.state.prepared || self.state.is_playing() {
            tracing::debug!(prepared = self.state.prepared, "resume ignored");
            return;
        }

        self.backend.play();
        self.state.status = PlayStatus::Playing;
        self.notify();
        self.events.publish(PlayerEvent::MusicResumed);
    }

    fn toggle(&mut self) {
        if self.state.is_playing() {
            self.pause();
        } else if self.state.prepared {
            self.resume();
        } else {
            self.play(self.state.index);
        }
    }

    /// Always leaves the service stopped and unprepared
    fn stop(&mut self) {
        self.backend.stop();
        self.state.prepared = false;
        self.state.status = PlayStatus::Stopped;
        self.state.position = Duration::ZERO;
        self.cancel_notification();
        tracing::info!("playback stopped");
        self.events.publish(PlayerEvent::MusicStopped);
    }

    fn seek(&mut self, position: Duration) {
        if !self.state.prepared {
            tracing::debug!("seek ignored, nothing loaded");
            return;
        }
        // Unknown duration does not bound the seek
        if !self.state.duration.is_zero() && position > self.state.duration {
            let e = PlayerError::SeekOutOfRange {
                requested: position,
                duration: self.state.duration,
            };
            tracing::debug!(error = %e, "seek ignored");
            return;
        }

        match self.backend.seek(position) {
            Ok(reached) => {
                self.state.position = reached;
                self.events.publish(PlayerEvent::MusicSeeked { position: reached });
            }
            Err(e) => {
                tracing::warn!(error = %e, "seek failed");
            }
        }
    }

    /// Move to another track, keeping it playing if we were
    fn skip(&mut self, index: usize) {
        let was_playing = self.state.is_playing();
        self.load(index, was_playing);
    }

    fn set_volume(&mut self, volume: f32) {
        self.options.volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.options.volume);
    }

    fn check_completion(&mut self) {
        if !self.backend.take_finished() {
            return;
        }

        let index = self.state.index;
        self.state.position = self.state.duration;
        tracing::debug!(index, "track completed");
        self.events.publish(PlayerEvent::MusicCompleted { index });

        if self.options.auto_next {
            self.load(self.playlist.next_index(index), true);
        } else {
            self.stop();
        }
    }

    fn refresh_position(&mut self) {
        if !self.state.prepared {
            return;
        }
        let position = self.backend.position();
        self.state.position = if self.state.duration.is_zero() {
            position
        } else {
            position.min(self.state.duration)
        };
    }

    fn snapshot(&mut self) -> PlaybackSnapshot {
        self.refresh_position();
        let title = self
            .playlist
            .get(self.state.index)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        PlaybackSnapshot {
            state: self.state.clone(),
            title,
            track_count: self.playlist.len(),
            volume: self.options.volume,
        }
    }

    fn notify(&mut self) {
        let title = self
            .playlist
            .get(self.state.index)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        let notification = Notification::now_playing(&title, self.state.is_playing());
        if let Err(e) = self.notifier.post(&notification) {
            tracing::warn!(error = %e, "failed to post now playing notification");
        }
    }

    fn cancel_notification(&mut self) {
        if let Err(e) = self.notifier.cancel(NOW_PLAYING_ID) {
            tracing::warn!(error = %e, "failed to remove now playing notification");
        }
    }
}
