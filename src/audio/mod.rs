// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod output;
pub mod player;
pub mod resample;

use std::path::Path;
use std::time::Duration;

use crate::error::Result;

pub use player::Player;

/// The single playback handle owned by the playback service.
///
/// `Player` is the real implementation; tests substitute a scripted one.
pub trait PlaybackBackend: Send {
    /// Open `path` and leave it paused at the start. Returns the track duration,
    /// or zero when the container does not report one.
    fn load(&mut self, path: &Path) -> Result<Duration>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Unload the current track
    fn stop(&mut self);

    /// Returns the position actually reached
    fn seek(&mut self, position: Duration) -> Result<Duration>;

    fn set_volume(&mut self, volume: f32);

    fn position(&self) -> Duration;

    fn is_playing(&self) -> bool;

    /// True once per track when it plays to the end
    fn take_finished(&mut self) -> bool;
}
