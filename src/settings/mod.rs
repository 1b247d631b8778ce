// Settings module
// Application settings persisted as JSON in the data directory

#[allow(clippy::module_inception)]
mod settings;

pub use settings::{
    AppSettings, InterfaceSettings, LibrarySettings, PlaybackSettings, SleepTimerSettings,
};
