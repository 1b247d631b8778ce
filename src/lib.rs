// Lullaby - local music player with a background playback service and sleep timer
// Module declarations
pub mod audio;
pub mod controller;
pub mod error;
pub mod events;
pub mod format;
pub mod library;
pub mod metadata;
pub mod notification;
pub mod playlist;
pub mod service;
pub mod settings;

pub use audio::{PlaybackBackend, Player};
pub use error::{PlayerError, Result};
pub use events::{EventBus, PlayerEvent};
pub use playlist::{Playlist, Track};
