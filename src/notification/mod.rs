// Persistent notifications
// Both services describe their state as a `Notification` and hand it to a
// `NotificationSink`. Each notification carries transport actions; when a
// surface reports one being pressed, `ActionRouter` sends it back into the
// owning service through the same handle the controller uses.

pub mod media_controls;

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;
use crate::format::format_remaining;
use crate::service::playback::PlaybackHandle;
use crate::service::sleep_timer::SleepTimerHandle;

pub const NOW_PLAYING_ID: u32 = 101;
pub const SLEEP_TIMER_ID: u32 = 102;

pub const NOW_PLAYING_CHANNEL: &str = "music_player_channel";
pub const SLEEP_TIMER_CHANNEL: &str = "sleep_timer_channel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationAction {
    Previous,
    Pause,
    Resume,
    Next,
    Stop,
    PauseTimer,
    ResumeTimer,
    StopTimer,
}

impl NotificationAction {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationAction::Previous => "Previous",
            NotificationAction::Pause => "Pause",
            NotificationAction::Resume => "Play",
            NotificationAction::Next => "Next",
            NotificationAction::Stop => "Stop",
            NotificationAction::PauseTimer => "Pause timer",
            NotificationAction::ResumeTimer => "Resume timer",
            NotificationAction::StopTimer => "Stop timer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u32,
    pub channel: &'static str,
    pub title: String,
    pub text: String,
    pub actions: Vec<NotificationAction>,
    pub ongoing: bool,
    pub posted_at: DateTime<Local>,
}

impl Notification {
    /// The playback service's notification: previous, play/pause, next, stop
    pub fn now_playing(track_title: &str, playing: bool) -> Self {
        let play_pause = if playing {
            NotificationAction::Pause
        } else {
            NotificationAction::Resume
        };

        Self {
            id: NOW_PLAYING_ID,
            channel: NOW_PLAYING_CHANNEL,
            title: if playing { "Now playing" } else { "Paused" }.to_string(),
            text: track_title.to_string(),
            actions: vec![
                NotificationAction::Previous,
                play_pause,
                NotificationAction::Next,
                NotificationAction::Stop,
            ],
            ongoing: true,
            posted_at: Local::now(),
        }
    }

    /// The sleep timer's notification: pause/resume, stop
    pub fn sleep_timer(remaining: Duration, running: bool) -> Self {
        let left = format_remaining(remaining.as_secs() / 60);
        let has_time = !remaining.is_zero();

        let (text, first) = if running && has_time {
            (format!("Remaining: {}", left), NotificationAction::PauseTimer)
        } else if has_time {
            (format!("Paused: {}", left), NotificationAction::ResumeTimer)
        } else {
            ("Finished".to_string(), NotificationAction::StopTimer)
        };

        Self {
            id: SLEEP_TIMER_ID,
            channel: SLEEP_TIMER_CHANNEL,
            title: "Sleep timer".to_string(),
            text,
            actions: vec![first, NotificationAction::StopTimer],
            ongoing: true,
            posted_at: Local::now(),
        }
    }

    /// Same content, ignoring the timestamp
    pub fn same_content(&self, other: &Notification) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.text == other.text
            && self.actions == other.actions
    }
}

/// A surface that can show notifications
pub trait NotificationSink: Send {
    /// Post or replace the notification with `notification.id`
    fn post(&mut self, notification: &Notification) -> Result<()>;

    fn cancel(&mut self, id: u32) -> Result<()>;
}

/// Writes notifications to the log, once per content change
#[derive(Debug, Default)]
pub struct LogNotifier {
    shown: HashMap<u32, Notification>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationSink for LogNotifier {
    fn post(&mut self, notification: &Notification) -> Result<()> {
        if let Some(previous) = self.shown.get(&notification.id) {
            if previous.same_content(notification) {
                return Ok(());
            }
        }

        let actions: Vec<&str> = notification.actions.iter().map(|a| a.label()).collect();
        tracing::info!(
            id = notification.id,
            channel = notification.channel,
            actions = ?actions,
            "{}: {}",
            notification.title,
            notification.text
        );
        self.shown.insert(notification.id, notification.clone());
        Ok(())
    }

    fn cancel(&mut self, id: u32) -> Result<()> {
        if self.shown.remove(&id).is_some() {
            tracing::debug!(id, "notification removed");
        }
        Ok(())
    }
}

/// Posts to several sinks; a failing sink is logged and skipped
#[derive(Default)]
pub struct NotifierSet {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl NotificationSink for NotifierSet {
    fn post(&mut self, notification: &Notification) -> Result<()> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.post(notification) {
                tracing::warn!(id = notification.id, error = %e, "failed to post notification");
            }
        }
        Ok(())
    }

    fn cancel(&mut self, id: u32) -> Result<()> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.cancel(id) {
                tracing::warn!(id, error = %e, "failed to cancel notification");
            }
        }
        Ok(())
    }
}

/// Sends notification actions back into the service that owns them
#[derive(Clone)]
pub struct ActionRouter {
    playback: PlaybackHandle,
    timer: SleepTimerHandle,
}

impl ActionRouter {
    pub fn new(playback: PlaybackHandle, timer: SleepTimerHandle) -> Self {
        Self { playback, timer }
    }

    pub fn dispatch(&self, action: NotificationAction) -> Result<()> {
        tracing::debug!(action = action.label(), "notification action");
        match action {
            NotificationAction::Previous => self.playback.previous(),
            NotificationAction::Pause => self.playback.pause(),
            NotificationAction::Resume => self.playback.resume(),
            NotificationAction::Next => self.playback.next(),
            NotificationAction::Stop => self.playback.stop(),
            NotificationAction::PauseTimer => self.timer.pause(),
            NotificationAction::ResumeTimer => self.timer.resume(),
            NotificationAction::StopTimer => self.timer.cancel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_playing_actions_follow_state() {
        let playing = Notification::now_playing("Song", true);
        assert_eq!(playing.id, NOW_PLAYING_ID);
        assert_eq!(playing.text, "Song");
        assert_eq!(
            playing.actions,
            vec![
                NotificationAction::Previous,
                NotificationAction::Pause,
                NotificationAction::Next,
                NotificationAction::Stop,
            ]
        );

        let paused = Notification::now_playing("Song", false);
        assert_eq!(paused.actions[1], NotificationAction::Resume);
        assert_eq!(paused.title, "Paused");
    }

    #[test]
    fn test_sleep_timer_text() {
        let running = Notification::sleep_timer(Duration::from_secs(75 * 60), true);
        assert_eq!(running.text, "Remaining: 1h 15m");
        assert_eq!(running.actions[0], NotificationAction::PauseTimer);

        let paused = Notification::sleep_timer(Duration::from_secs(5 * 60), false);
        assert_eq!(paused.text, "Paused: 5m");
        assert_eq!(paused.actions[0], NotificationAction::ResumeTimer);

        let finished = Notification::sleep_timer(Duration::ZERO, false);
        assert_eq!(finished.text, "Finished");
        assert_eq!(
            finished.actions,
            vec![NotificationAction::StopTimer, NotificationAction::StopTimer]
        );
    }

    #[test]
    fn test_sleep_timer_last_minute_keeps_controls() {
        let paused = Notification::sleep_timer(Duration::from_secs(30), false);
        assert_eq!(paused.text, "Paused: 0m");
        assert_eq!(paused.actions[0], NotificationAction::ResumeTimer);

        let running = Notification::sleep_timer(Duration::from_secs(30), true);
        assert_eq!(running.text, "Remaining: 0m");
        assert_eq!(running.actions[0], NotificationAction::PauseTimer);
    }

    #[test]
    fn test_same_content_ignores_timestamp() {
        let a = Notification::now_playing("Song", true);
        let mut b = a.clone();
        b.posted_at = b.posted_at + chrono::Duration::seconds(30);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&Notification::now_playing("Song", false)));
    }

    #[test]
    fn test_log_notifier_tracks_shown() {
        let mut notifier = LogNotifier::new();
        notifier.post(&Notification::now_playing("Song", true)).unwrap();
        assert!(notifier.shown.contains_key(&NOW_PLAYING_ID));
        notifier.cancel(NOW_PLAYING_ID).unwrap();
        assert!(notifier.shown.is_empty());
    }
}
