// Terminal controller
// Reads line commands, forwards them to the service handles and prints what
// happens. It holds no playback state of its own; everything it shows comes
// from status queries or the event bus.

use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::events::{EventBus, PlayerEvent};
use crate::format::{format_duration, format_remaining, parse_position};
use crate::playlist::Playlist;
use crate::service::sleep_timer::MAX_MINUTES;
use crate::service::{PlaybackHandle, SleepTimerHandle};
use crate::settings::AppSettings;

pub const HELP: &str = "\
commands:
  play [N]              play track N (1-based) or the current track
  pause | resume | toggle | stop
  next | prev
  seek <pos>            SS, MM:SS or HH:MM:SS
  vol <0-100>
  sleep [minutes]       start the sleep timer (up to 1440)
  sleep pause|resume|cancel
  status | list | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Zero-based track index
    Play(Option<usize>),
    Pause,
    Resume,
    Toggle,
    Stop,
    Next,
    Previous,
    Seek(Duration),
    Volume(u8),
    /// `None` uses the configured default
    Sleep(Option<u64>),
    SleepPause,
    SleepResume,
    SleepCancel,
    Status,
    List,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command \"{0}\", try \"help\"")]
    Unknown(String),

    #[error("{command} needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("invalid argument \"{value}\" for {command}: expected {expected}")]
    InvalidArgument {
        command: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Command {
    pub fn parse(line: &str) -> std::result::Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?.to_lowercase();
        let arg = words.next();

        let command = match name.as_str() {
            "play" | "p" => match arg {
                None => Command::Play(None),
                Some(value) => match value.parse::<usize>() {
                    Ok(n) if n >= 1 => Command::Play(Some(n - 1)),
                    _ => return Err(invalid("play", value, "a track number starting at 1")),
                },
            },
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "toggle" | "t" => Command::Toggle,
            "stop" => Command::Stop,
            "next" | "n" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "seek" => {
                let value = arg.ok_or(CommandError::MissingArgument {
                    command: "seek",
                    expected: "a position",
                })?;
                let position = parse_position(value)
                    .map_err(|_| invalid("seek", value, "SS, MM:SS or HH:MM:SS"))?;
                Command::Seek(position)
            }
            "vol" | "volume" => {
                let value = arg.ok_or(CommandError::MissingArgument {
                    command: "vol",
                    expected: "a volume from 0 to 100",
                })?;
                match value.parse::<u8>() {
                    Ok(volume) if volume <= 100 => Command::Volume(volume),
                    _ => return Err(invalid("vol", value, "0 to 100")),
                }
            }
            "sleep" => match arg {
                None => Command::Sleep(None),
                Some("pause") => Command::SleepPause,
                Some("resume") => Command::SleepResume,
                Some("cancel") | Some("stop") => Command::SleepCancel,
                Some(value) => match value.parse::<u64>() {
                    Ok(minutes) if minutes <= MAX_MINUTES => Command::Sleep(Some(minutes)),
                    _ => {
                        return Err(invalid(
                            "sleep",
                            value,
                            "0 to 1440 minutes, pause, resume or cancel",
                        ))
                    }
                },
            },
            "status" | "s" => Command::Status,
            "list" | "ls" => Command::List,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandError::Unknown(name)),
        };

        Ok(command)
    }
}

fn invalid(command: &'static str, value: &str, expected: &'static str) -> CommandError {
    CommandError::InvalidArgument {
        command,
        value: value.to_string(),
        expected,
    }
}

pub struct Controller {
    playback: PlaybackHandle,
    timer: SleepTimerHandle,
    events: broadcast::Receiver<PlayerEvent>,
    titles: Vec<String>,
    default_sleep_minutes: u64,
    sleep_presets: Vec<u64>,
    progress_interval: Duration,
}

impl Controller {
    pub fn new(
        playback: PlaybackHandle,
        timer: SleepTimerHandle,
        events: &EventBus,
        playlist: &Playlist,
        settings: &AppSettings,
    ) -> Self {
        Self {
            playback,
            timer,
            events: events.subscribe(),
            titles: playlist.iter().map(|t| t.title.clone()).collect(),
            default_sleep_minutes: settings.sleep_timer.default_minutes,
            sleep_presets: settings.sleep_timer.presets.clone(),
            progress_interval: settings.progress_interval(),
        }
    }

    /// Run until `quit`, end of input, or a service goes away
    pub async fn run<R>(mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut progress = tokio::time::interval(self.progress_interval);
        progress.set_missed_tick_behavior(MissedTickBehavior::Skip);

        println!("{}", HELP);

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if !self.handle_line(&line).await? {
                            break;
                        }
                    }
                    None => break,
                },
                _ = progress.tick() => self.print_progress().await?,
                event = self.events.recv() => match event {
                    Ok(event) => self.print_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "controller fell behind on events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        Ok(())
    }

    /// Returns false when the controller should exit
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(CommandError::Empty) => return Ok(true),
            Err(e) => {
                println!("{}", e);
                return Ok(true);
            }
        };

        tracing::debug!(?command, "controller command");
        match command {
            Command::Play(index) => self.playback.play(index)?,
            Command::Pause => self.playback.pause()?,
            Command::Resume => self.playback.resume()?,
            Command::Toggle => self.playback.toggle()?,
            Command::Stop => self.playback.stop()?,
            Command::Next => self.playback.next()?,
            Command::Previous => self.playback.previous()?,
            Command::Seek(position) => self.playback.seek(position)?,
            Command::Volume(volume) => self.playback.set_volume(f32::from(volume) / 100.0)?,
            Command::Sleep(minutes) => self
                .timer
                .start(minutes.unwrap_or(self.default_sleep_minutes))?,
            Command::SleepPause => self.timer.pause()?,
            Command::SleepResume => self.timer.resume()?,
            Command::SleepCancel => self.timer.cancel()?,
            Command::Status => self.print_status().await?,
            Command::List => self.print_list(),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }

        Ok(true)
    }

    async fn print_progress(&self) -> Result<()> {
        let status = self.playback.status().await?;
        if status.state.is_playing() {
            print!(
                "\r{}  {} / {}   ",
                status.title,
                format_duration(status.state.position),
                format_duration(status.state.duration)
            );
            let _ = std::io::stdout().flush();
        }
        Ok(())
    }

    async fn print_status(&self) -> Result<()> {
        let playback = self.playback.status().await?;
        let timer = self.timer.status().await?;

        println!(
            "[{}/{}] {} {:?} {} / {} vol {}%",
            playback.state.index + 1,
            playback.track_count,
            playback.title,
            playback.state.status,
            format_duration(playback.state.position),
            format_duration(playback.state.duration),
            (playback.volume * 100.0).round()
        );

        if timer.running {
            println!("sleep timer: {} left", format_remaining(timer.remaining_minutes()));
        } else if timer.is_active() {
            println!("sleep timer: paused, {} left", format_remaining(timer.remaining_minutes()));
        } else {
            println!(
                "sleep timer: off ({})",
                presets_line(&self.sleep_presets, self.default_sleep_minutes)
            );
        }
        Ok(())
    }

    fn print_list(&self) {
        for (i, title) in self.titles.iter().enumerate() {
            println!("{:>3}. {}", i + 1, title);
        }
    }

    fn print_event(&self, event: &PlayerEvent) {
        match event {
            PlayerEvent::MusicPrepared { index, title, duration } => {
                println!("\n[{}] {} ({})", index + 1, title, format_duration(*duration))
            }
            PlayerEvent::MusicError { message } => println!("\nerror: {}", message),
            PlayerEvent::MusicStopped => println!("\nstopped"),
            PlayerEvent::TimerStarted { minutes } => {
                println!("sleep timer set for {}", format_remaining(*minutes))
            }
            PlayerEvent::TimerPaused { .. } => println!("sleep timer paused"),
            PlayerEvent::TimerResumed { .. } => println!("sleep timer resumed"),
            PlayerEvent::TimerFinished => println!("\nsleep timer finished"),
            PlayerEvent::TimerCancelled => println!("sleep timer cancelled"),
            _ => {}
        }
    }
}

/// `presets 15m, 30m, 1h 00m; default 15m`
fn presets_line(presets: &[u64], default_minutes: u64) -> String {
    let presets: Vec<String> = presets.iter().map(|m| format_remaining(*m)).collect();
    if presets.is_empty() {
        format!("default {}", format_remaining(default_minutes))
    } else {
        format!(
            "presets {}; default {}",
            presets.join(", "),
            format_remaining(default_minutes)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play() {
        assert_eq!(Command::parse("play"), Ok(Command::Play(None)));
        assert_eq!(Command::parse("play 3"), Ok(Command::Play(Some(2))));
        assert_eq!(Command::parse("  PLAY   1 "), Ok(Command::Play(Some(0))));
        assert!(matches!(
            Command::parse("play 0"),
            Err(CommandError::InvalidArgument { command: "play", .. })
        ));
        assert!(Command::parse("play two").is_err());
    }

    #[test]
    fn test_parse_transport() {
        assert_eq!(Command::parse("pause"), Ok(Command::Pause));
        assert_eq!(Command::parse("resume"), Ok(Command::Resume));
        assert_eq!(Command::parse("toggle"), Ok(Command::Toggle));
        assert_eq!(Command::parse("stop"), Ok(Command::Stop));
        assert_eq!(Command::parse("next"), Ok(Command::Next));
        assert_eq!(Command::parse("prev"), Ok(Command::Previous));
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_seek() {
        assert_eq!(
            Command::parse("seek 1:30"),
            Ok(Command::Seek(Duration::from_secs(90)))
        );
        assert_eq!(
            Command::parse("seek"),
            Err(CommandError::MissingArgument {
                command: "seek",
                expected: "a position",
            })
        );
        assert!(Command::parse("seek 1:99").is_err());
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(Command::parse("vol 0"), Ok(Command::Volume(0)));
        assert_eq!(Command::parse("vol 100"), Ok(Command::Volume(100)));
        assert!(Command::parse("vol 101").is_err());
        assert!(Command::parse("vol -5").is_err());
    }

    #[test]
    fn test_parse_sleep() {
        assert_eq!(Command::parse("sleep"), Ok(Command::Sleep(None)));
        assert_eq!(Command::parse("sleep 30"), Ok(Command::Sleep(Some(30))));
        assert_eq!(Command::parse("sleep pause"), Ok(Command::SleepPause));
        assert_eq!(Command::parse("sleep resume"), Ok(Command::SleepResume));
        assert_eq!(Command::parse("sleep cancel"), Ok(Command::SleepCancel));
        assert!(Command::parse("sleep soon").is_err());
        assert_eq!(
            Command::parse("sleep 1440"),
            Ok(Command::Sleep(Some(MAX_MINUTES)))
        );
        assert!(matches!(
            Command::parse("sleep 1441"),
            Err(CommandError::InvalidArgument { command: "sleep", .. })
        ));
        assert!(Command::parse("sleep 307445734551805660").is_err());
    }

    #[test]
    fn test_parse_seek_out_of_range() {
        assert!(matches!(
            Command::parse("seek 307445734561825861:00"),
            Err(CommandError::InvalidArgument { command: "seek", .. })
        ));
    }

    #[test]
    fn test_presets_line() {
        assert_eq!(
            presets_line(&[15, 30, 60], 15),
            "presets 15m, 30m, 1h 00m; default 15m"
        );
        assert_eq!(presets_line(&[], 45), "default 45m");
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            Command::parse("dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }
}
