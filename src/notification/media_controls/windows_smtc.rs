// Windows SMTC implementation using windows-rs crate

use std::sync::{Arc, Mutex};
use windows::Foundation::TypedEventHandler;
use windows::Media::Playback::MediaPlayer;
use windows::Media::{
    MediaPlaybackStatus, MediaPlaybackType, SystemMediaTransportControls,
    SystemMediaTransportControlsButton, SystemMediaTransportControlsButtonPressedEventArgs,
};

use crate::error::{PlayerError, Result};
use crate::notification::NotificationAction;

type ButtonCallback = Arc<Mutex<Option<Box<dyn Fn(NotificationAction) + Send + Sync + 'static>>>>;

fn smtc_error(context: &str, e: windows::core::Error) -> PlayerError {
    PlayerError::Output(format!("SMTC: {}: {}", context, e))
}

pub struct Smtc {
    _media_player: MediaPlayer,
    smtc: SystemMediaTransportControls,
    button_callback: ButtonCallback,
}

impl Smtc {
    pub fn new() -> Result<Self> {
        // A MediaPlayer gives us access to SMTC
        let media_player = MediaPlayer::new().map_err(|e| smtc_error("create MediaPlayer", e))?;

        // We drive SMTC ourselves
        media_player
            .CommandManager()
            .map_err(|e| smtc_error("get CommandManager", e))?
            .SetIsEnabled(false)
            .map_err(|e| smtc_error("disable CommandManager", e))?;

        let smtc = media_player
            .SystemMediaTransportControls()
            .map_err(|e| smtc_error("get controls", e))?;

        smtc.SetIsEnabled(true).map_err(|e| smtc_error("enable controls", e))?;
        smtc.SetIsPlayEnabled(true).map_err(|e| smtc_error("enable play", e))?;
        smtc.SetIsPauseEnabled(true).map_err(|e| smtc_error("enable pause", e))?;
        smtc.SetIsStopEnabled(true).map_err(|e| smtc_error("enable stop", e))?;
        smtc.SetIsNextEnabled(true).map_err(|e| smtc_error("enable next", e))?;
        smtc.SetIsPreviousEnabled(true).map_err(|e| smtc_error("enable previous", e))?;

        let button_callback: ButtonCallback = Arc::new(Mutex::new(None));

        let callback_clone = button_callback.clone();
        let handler = TypedEventHandler::new(
            move |_sender: &Option<SystemMediaTransportControls>,
                  args: &Option<SystemMediaTransportControlsButtonPressedEventArgs>| {
                let action = args.as_ref().and_then(|args| args.Button().ok()).and_then(|button| {
                    match button {
                        SystemMediaTransportControlsButton::Play => Some(NotificationAction::Resume),
                        SystemMediaTransportControlsButton::Pause => Some(NotificationAction::Pause),
                        SystemMediaTransportControlsButton::Stop => Some(NotificationAction::Stop),
                        SystemMediaTransportControlsButton::Next => Some(NotificationAction::Next),
                        SystemMediaTransportControlsButton::Previous => Some(NotificationAction::Previous),
                        _ => None,
                    }
                });

                if let Some(action) = action {
                    if let Ok(guard) = callback_clone.lock() {
                        if let Some(ref cb) = *guard {
                            cb(action);
                        }
                    }
                }
                Ok(())
            },
        );

        smtc.ButtonPressed(&handler)
            .map_err(|e| smtc_error("register button handler", e))?;

        Ok(Self {
            _media_player: media_player,
            smtc,
            button_callback,
        })
    }

    pub fn update_metadata(&self, title: &str) -> Result<()> {
        let updater = self.smtc.DisplayUpdater().map_err(|e| smtc_error("display updater", e))?;
        updater
            .SetType(MediaPlaybackType::Music)
            .map_err(|e| smtc_error("set type", e))?;

        let music_props = updater
            .MusicProperties()
            .map_err(|e| smtc_error("music properties", e))?;
        music_props
            .SetTitle(&windows::core::HSTRING::from(title))
            .map_err(|e| smtc_error("set title", e))?;

        updater.Update().map_err(|e| smtc_error("update display", e))
    }

    /// `None` means nothing is loaded
    pub fn set_playback_status(&self, playing: Option<bool>) -> Result<()> {
        let status = match playing {
            Some(true) => MediaPlaybackStatus::Playing,
            Some(false) => MediaPlaybackStatus::Paused,
            None => MediaPlaybackStatus::Stopped,
        };
        self.smtc
            .SetPlaybackStatus(status)
            .map_err(|e| smtc_error("set playback status", e))
    }

    pub fn set_button_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(NotificationAction) + Send + Sync + 'static,
    {
        let mut guard = self
            .button_callback
            .lock()
            .map_err(|e| PlayerError::Output(format!("SMTC: lock callback: {}", e)))?;
        *guard = Some(Box::new(callback));
        Ok(())
    }
}

// SMTC objects are agile COM objects
unsafe impl Send for Smtc {}
unsafe impl Sync for Smtc {}
