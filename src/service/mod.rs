// Background services
// Each service is a tokio task that owns its state and is driven through a handle

pub mod playback;
pub mod sleep_timer;

pub use playback::{PlaybackHandle, PlaybackOptions, PlaybackService, PlaybackSnapshot, PlayStatus};
pub use sleep_timer::{SleepTimerHandle, SleepTimerOptions, SleepTimerService, TimerSnapshot};
