// Player events
// Fire-and-forget notifications published by the services for anything that
// wants to follow along (the terminal controller, logs). Delivery is best
// effort: publishing with no subscribers is fine, and a subscriber that falls
// behind by more than `EVENT_CAPACITY` events skips the oldest ones.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

/// Events buffered per subscriber before the oldest are dropped
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A track was loaded and is ready to play
    MusicPrepared {
        index: usize,
        title: String,
        duration: Duration,
    },
    MusicPaused,
    MusicResumed,
    MusicStopped,
    MusicSeeked {
        position: Duration,
    },
    /// A track played through to its end
    MusicCompleted {
        index: usize,
    },
    /// A track could not be opened or decoded
    MusicError {
        message: String,
    },
    TimerStarted {
        minutes: u64,
    },
    TimerTick {
        remaining: Duration,
    },
    TimerPaused {
        remaining: Duration,
    },
    TimerResumed {
        remaining: Duration,
    },
    TimerFinished,
    TimerCancelled,
}

impl PlayerEvent {
    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::MusicPrepared { .. } => "music_prepared",
            PlayerEvent::MusicPaused => "music_paused",
            PlayerEvent::MusicResumed => "music_resumed",
            PlayerEvent::MusicStopped => "music_stopped",
            PlayerEvent::MusicSeeked { .. } => "music_seeked",
            PlayerEvent::MusicCompleted { .. } => "music_completed",
            PlayerEvent::MusicError { .. } => "music_error",
            PlayerEvent::TimerStarted { .. } => "timer_started",
            PlayerEvent::TimerTick { .. } => "timer_tick",
            PlayerEvent::TimerPaused { .. } => "timer_paused",
            PlayerEvent::TimerResumed { .. } => "timer_resumed",
            PlayerEvent::TimerFinished => "timer_finished",
            PlayerEvent::TimerCancelled => "timer_cancelled",
        }
    }
}

/// Broadcast bus shared by both services
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an event; never fails
    pub fn publish(&self, event: PlayerEvent) {
        tracing::trace!(event = event.name(), "publish");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }
}
