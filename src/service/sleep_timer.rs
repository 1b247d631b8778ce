// Sleep timer service
// Counts down against a fixed deadline. On expiry it stops playback through
// the `PlaybackHandle`, shows "Finished" for a few seconds and clears it.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::{PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::notification::{Notification, NotificationSink, SLEEP_TIMER_ID};
use crate::service::playback::PlaybackHandle;
use crate::settings::AppSettings;

const TICK: Duration = Duration::from_secs(1);

/// Longest countdown the controller and CLI accept, one day
pub const MAX_MINUTES: u64 = 24 * 60;

#[derive(Debug)]
pub enum TimerCommand {
    Start(u64),
    Pause,
    Resume,
    Cancel,
    Status(oneshot::Sender<TimerSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub total: Duration,
    pub remaining: Duration,
    pub running: bool,
}

impl TimerSnapshot {
    /// Whole minutes left, rounded down
    pub fn remaining_minutes(&self) -> u64 {
        self.remaining.as_secs() / 60
    }

    /// Running, or paused with time left
    pub fn is_active(&self) -> bool {
        self.running || !self.remaining.is_zero()
    }
}

#[derive(Debug, Clone)]
pub struct SleepTimerOptions {
    /// Notification refresh interval while more than a minute is left
    pub notify_every: Duration,
    pub finish_linger: Duration,
}

impl Default for SleepTimerOptions {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for SleepTimerOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            notify_every: Duration::from_secs(settings.sleep_timer.notify_every_secs.max(1)),
            finish_linger: Duration::from_secs(settings.sleep_timer.finish_linger_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SleepTimerHandle {
    commands: mpsc::UnboundedSender<TimerCommand>,
}

impl SleepTimerHandle {
    fn send(&self, command: TimerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlayerError::ServiceClosed("sleep timer"))
    }

    /// Start or restart the countdown
    pub fn start(&self, minutes: u64) -> Result<()> {
        self.send(TimerCommand::Start(minutes))
    }

    pub fn pause(&self) -> Result<()> {
        self.send(TimerCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(TimerCommand::Resume)
    }

    pub fn cancel(&self) -> Result<()> {
        self.send(TimerCommand::Cancel)
    }

    pub async fn status(&self) -> Result<TimerSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(TimerCommand::Status(tx))?;
        rx.await.map_err(|_| PlayerError::ServiceClosed("sleep timer"))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(TimerCommand::Shutdown)
    }
}

pub struct SleepTimerService {
    notifier: Box<dyn NotificationSink>,
    events: EventBus,
    playback: PlaybackHandle,
    options: SleepTimerOptions,
    total: Duration,
    /// Time left as of the last tick or pause
    remaining: Duration,
    running: bool,
    deadline: Option<Instant>,
    next_tick: Option<Instant>,
    clear_at: Option<Instant>,
}

impl SleepTimerService {
    pub fn new(
        notifier: Box<dyn NotificationSink>,
        events: EventBus,
        playback: PlaybackHandle,
        options: SleepTimerOptions,
    ) -> Self {
        Self {
            notifier,
            events,
            playback,
            options,
            total: Duration::ZERO,
            remaining: Duration::ZERO,
            running: false,
            deadline: None,
            next_tick: None,
            clear_at: None,
        }
    }

    pub fn spawn(self) -> (SleepTimerHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(receiver));
        (SleepTimerHandle { commands }, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<TimerCommand>) {
        tracing::info!("sleep timer service started");

        loop {
            let now = Instant::now();
            let deadline = self.deadline;
            let next_tick = self.next_tick;
            let clear_at = self.clear_at;

            tokio::select! {
                biased;
                _ = sleep_until(deadline.unwrap_or(now)), if deadline.is_some() => self.finish(),
                _ = sleep_until(next_tick.unwrap_or(now)), if next_tick.is_some() => self.tick(),
                _ = sleep_until(clear_at.unwrap_or(now)), if clear_at.is_some() => {
                    self.clear_at = None;
                    self.cancel_notification();
                }
                command = commands.recv() => match command {
                    Some(TimerCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
            }
        }

        self.cancel_notification();
        tracing::info!("sleep timer service stopped");
    }

    fn handle(&mut self, command: TimerCommand) {
        // Deadline may have passed while the command was queued
        if self.running && self.live_remaining().is_zero() {
            self.finish();
        }

        match command {
            TimerCommand::Start(minutes) => self.start(minutes),
            TimerCommand::Pause => self.pause(),
            TimerCommand::Resume => self.resume(),
            TimerCommand::Cancel => self.cancel(),
            TimerCommand::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
            TimerCommand::Shutdown => {}
        }
    }

    fn start(&mut self, minutes: u64) {
        let total = Duration::from_secs(minutes.saturating_mul(60));
        let now = Instant::now();
        let Some(deadline) = now.checked_add(total) else {
            tracing::warn!(minutes, "sleep timer duration out of range, ignored");
            return;
        };

        self.total = total;
        self.remaining = total;
        self.clear_at = None;

        tracing::info!(minutes, "sleep timer started");
        self.events.publish(PlayerEvent::TimerStarted { minutes });

        if total.is_zero() {
            self.finish();
            return;
        }

        self.running = true;
        self.deadline = Some(deadline);
        self.next_tick = Some(now + TICK);
        self.notify();
    }

    fn pause(&mut self) {
        if !self.running {
            tracing::debug!("timer pause ignored, not running");
            return;
        }

        self.remaining = self.live_remaining();
        self.running = false;
        self.deadline = None;
        self.next_tick = None;
        self.notify();
        self.events.publish(PlayerEvent::TimerPaused {
            remaining: self.remaining,
        });
    }

    fn resume(&mut self) {
        if self.running || self.remaining.is_zero() {
            tracing::debug!(running = self.running, "timer resume ignored");
            return;
        }

        let now = Instant::now();
        let Some(deadline) = now.checked_add(self.remaining) else {
            tracing::warn!(remaining = ?self.remaining, "timer resume out of range, ignored");
            return;
        };
        self.running = true;
        self.deadline = Some(deadline);
        self.next_tick = Some(now + TICK);
        self.notify();
        self.events.publish(PlayerEvent::TimerResumed {
            remaining: self.remaining,
        });
    }

    fn cancel(&mut self) {
        self.reset();
        self.cancel_notification();
        tracing::info!("sleep timer cancelled");
        self.events.publish(PlayerEvent::TimerCancelled);
    }

    fn tick(&mut self) {
        let remaining = self.live_remaining();
        self.remaining = remaining;
        if remaining.is_zero() {
            self.finish();
            return;
        }

        self.events.publish(PlayerEvent::TimerTick { remaining });

        // Refresh often near the end, otherwise every `notify_every`
        let secs = rounded_secs(remaining);
        if secs < 60 || secs % self.options.notify_every.as_secs().max(1) == 0 {
            self.notify();
        }

        let now = Instant::now();
        self.next_tick = self
            .next_tick
            .map(|tick| tick + TICK)
            .filter(|tick| *tick > now)
            .or(Some(now + TICK));
    }

    fn finish(&mut self) {
        self.reset();
        tracing::info!("sleep timer finished, stopping playback");
        self.events.publish(PlayerEvent::TimerFinished);
        self.notify();

        if let Err(e) = self.playback.stop() {
            tracing::warn!(error = %e, "sleep timer could not stop playback");
        }

        self.clear_at = Some(Instant::now() + self.options.finish_linger);
    }

    fn reset(&mut self) {
        self.remaining = Duration::ZERO;
        self.running = false;
        self.deadline = None;
        self.next_tick = None;
        self.clear_at = None;
    }

    fn live_remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) if self.running => deadline.saturating_duration_since(Instant::now()),
            _ => self.remaining,
        }
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            total: self.total,
            remaining: self.live_remaining(),
            running: self.running,
        }
    }

    fn notify(&mut self) {
        let notification = Notification::sleep_timer(self.snapshot().remaining, self.running);
        if let Err(e) = self.notifier.post(&notification) {
            tracing::warn!(error = %e, "failed to post sleep timer notification");
        }
    }

    fn cancel_notification(&mut self) {
        if let Err(e) = self.notifier.cancel(SLEEP_TIMER_ID) {
            tracing::warn!(error = %e, "failed to remove sleep timer notification");
        }
    }
}

fn rounded_secs(duration: Duration) -> u64 {
    (duration.as_millis() as u64 + 500) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_minutes_round_down() {
        let snapshot = TimerSnapshot {
            total: Duration::from_secs(600),
            remaining: Duration::from_secs(119),
            running: true,
        };
        assert_eq!(snapshot.remaining_minutes(), 1);
        assert!(snapshot.is_active());
    }

    #[test]
    fn test_idle_snapshot_is_inactive() {
        let snapshot = TimerSnapshot {
            total: Duration::ZERO,
            remaining: Duration::ZERO,
            running: false,
        };
        assert!(!snapshot.is_active());
    }

    #[test]
    fn test_rounded_secs() {
        assert_eq!(rounded_secs(Duration::from_millis(29_998)), 30);
        assert_eq!(rounded_secs(Duration::from_millis(30_400)), 30);
        assert_eq!(rounded_secs(Duration::ZERO), 0);
    }
}
