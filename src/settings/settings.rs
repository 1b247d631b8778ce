// Settings management and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::service::sleep_timer::MAX_MINUTES;

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Start the next track when one finishes
    pub auto_next: bool,
    pub volume: f32, // 0.0-1.0
    /// How often the playback service checks for end of track
    pub completion_poll_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            auto_next: true,
            volume: 1.0,
            completion_poll_ms: 200,
        }
    }
}

/// Sleep timer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepTimerSettings {
    pub default_minutes: u64,
    pub presets: Vec<u64>,
    /// Notification refresh interval while more than a minute is left
    pub notify_every_secs: u64,
    /// How long the "Finished" notification stays up
    pub finish_linger_secs: u64,
}

impl Default for SleepTimerSettings {
    fn default() -> Self {
        Self {
            default_minutes: 15,
            presets: vec![15, 30, 60],
            notify_every_secs: 30,
            finish_linger_secs: 5,
        }
    }
}

/// Interface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceSettings {
    /// Interval for the position poll / progress line
    pub progress_interval_ms: u64,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: 1000,
        }
    }
}

/// Library settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directory to build the playlist from; the sample playlist is used when unset
    pub music_dir: Option<PathBuf>,
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub playback: PlaybackSettings,
    pub sleep_timer: SleepTimerSettings,
    pub interface: InterfaceSettings,
    pub library: LibrarySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            playback: PlaybackSettings::default(),
            sleep_timer: SleepTimerSettings::default(),
            interface: InterfaceSettings::default(),
            library: LibrarySettings::default(),
        }
    }
}

impl AppSettings {
    /// Default data directory, `<config dir>/lullaby`
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lullaby")
    }

    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| PlayerError::Settings(format!("Failed to read settings file: {}", e)))?;

        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| PlayerError::Settings(format!("Failed to parse settings: {}", e)))?;

        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings.sanitized())
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir).map_err(|e| {
            PlayerError::Settings(format!("Failed to create settings directory: {}", e))
        })?;

        let path = Self::get_settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PlayerError::Settings(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&path, content)
            .map_err(|e| PlayerError::Settings(format!("Failed to write settings file: {}", e)))?;

        tracing::info!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Clamp values a hand-edited file may have put out of range
    pub fn sanitized(mut self) -> Self {
        self.playback.volume = self.playback.volume.clamp(0.0, 1.0);
        self.playback.completion_poll_ms = self.playback.completion_poll_ms.max(10);
        self.interface.progress_interval_ms = self.interface.progress_interval_ms.max(50);
        self.sleep_timer.notify_every_secs = self.sleep_timer.notify_every_secs.max(1);
        self.sleep_timer.default_minutes = self.sleep_timer.default_minutes.min(MAX_MINUTES);
        self.sleep_timer.presets.retain(|m| *m <= MAX_MINUTES);
        self
    }

    pub fn completion_poll(&self) -> Duration {
        Duration::from_millis(self.playback.completion_poll_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.interface.progress_interval_ms)
    }
}
