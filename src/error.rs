// Error types shared by the player, services and settings
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Track index {index} out of bounds (playlist has {len} tracks)")]
    TrackNotFound { index: usize, len: usize },

    #[error("Failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Failed to read metadata: {0}")]
    Metadata(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Seek to {requested:?} is past the end of the track ({duration:?})")]
    SeekOutOfRange { requested: Duration, duration: Duration },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0} service is no longer running")]
    ServiceClosed(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
