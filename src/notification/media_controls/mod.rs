// System media controls: the OS-level now-playing overlay and media keys.
// Implemented with Windows System Media Transport Controls (SMTC); a no-op elsewhere.

use super::{Notification, NotificationAction, NotificationSink, NOW_PLAYING_ID};
use crate::error::Result;

#[cfg(windows)]
mod windows_smtc;

#[cfg(windows)]
use windows_smtc::Smtc as Backend;

#[cfg(not(windows))]
use stub::Smtc as Backend;

/// Mirrors the now-playing notification into the system media controls
pub struct SystemMediaControls {
    backend: Backend,
}

impl SystemMediaControls {
    pub fn new() -> Result<Self> {
        Ok(Self {
            backend: Backend::new()?,
        })
    }

    /// Forward media buttons as notification actions
    pub fn set_action_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(NotificationAction) + Send + Sync + 'static,
    {
        self.backend.set_button_callback(handler)
    }
}

impl NotificationSink for SystemMediaControls {
    fn post(&mut self, notification: &Notification) -> Result<()> {
        // Only the playback notification maps onto media controls
        if notification.id != NOW_PLAYING_ID {
            return Ok(());
        }

        let playing = notification.actions.contains(&NotificationAction::Pause);
        self.backend.update_metadata(&notification.text)?;
        self.backend.set_playback_status(Some(playing))
    }

    fn cancel(&mut self, id: u32) -> Result<()> {
        if id != NOW_PLAYING_ID {
            return Ok(());
        }
        self.backend.set_playback_status(None)
    }
}

#[cfg(not(windows))]
mod stub {
    use crate::error::Result;
    use crate::notification::NotificationAction;

    pub struct Smtc;

    impl Smtc {
        pub fn new() -> Result<Self> {
            Ok(Self)
        }

        pub fn update_metadata(&self, _title: &str) -> Result<()> {
            Ok(())
        }

        pub fn set_playback_status(&self, _playing: Option<bool>) -> Result<()> {
            Ok(())
        }

        pub fn set_button_callback<F>(&self, _callback: F) -> Result<()>
        where
            F: Fn(NotificationAction) + Send + Sync + 'static,
        {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_ignores_sleep_timer_notification() {
        let mut controls = SystemMediaControls::new().unwrap();
        controls
            .post(&Notification::sleep_timer(std::time::Duration::from_secs(600), true))
            .unwrap();
        controls.post(&Notification::now_playing("Song", true)).unwrap();
        controls.cancel(NOW_PLAYING_ID).unwrap();
    }
}
