// Audio player implementation
// A dedicated engine thread owns the cpal output and the current decoder;
// `Player` drives it over a command channel.
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::decoder::AudioDecoder;
use super::output::AudioOutput;
use super::resample::SampleConverter;
use super::PlaybackBackend;
use crate::error::{PlayerError, Result};

/// How long the engine sleeps waiting for commands when it has nothing to decode
const IDLE_POLL: Duration = Duration::from_millis(20);
/// Back-off while the ring buffer is full
const BUFFER_FULL_BACKOFF: Duration = Duration::from_millis(5);
/// Upper bound on waiting for the output callback to drain after a clear
const CLEAR_TIMEOUT: Duration = Duration::from_millis(100);

enum EngineCommand {
    Load(Box<AudioDecoder>, SyncSender<Result<()>>),
    Play,
    Pause,
    Stop,
    Seek(Duration, SyncSender<Result<Duration>>),
    SetVolume(f32),
    Shutdown,
}

/// Flags the engine publishes for the service side
#[derive(Default)]
struct Shared {
    playing: AtomicBool,
    finished: AtomicBool,
    position_ms: AtomicU64,
}

pub struct Player {
    commands: Sender<EngineCommand>,
    shared: Arc<Shared>,
    engine: Option<JoinHandle<()>>,
}

impl Player {
    /// Open the default output device and start the engine thread
    pub fn new() -> Result<Self> {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let shared = Arc::new(Shared::default());

        let engine_shared = shared.clone();
        let engine = thread::Builder::new()
            .name("lullaby-audio".to_string())
            .spawn(move || {
                let output = match AudioOutput::new() {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(()));
                        output
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                Engine::new(output, receiver, engine_shared).run();
            })?;

        ready_rx
            .recv()
            .map_err(|_| PlayerError::ServiceClosed("audio engine"))??;

        Ok(Self {
            commands,
            shared,
            engine: Some(engine),
        })
    }

    fn send(&self, command: EngineCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!("audio engine thread has exited");
        }
    }
}

impl PlaybackBackend for Player {
    fn load(&mut self, path: &Path) -> Result<Duration> {
        let decoder = AudioDecoder::open(path)?;
        let duration = decoder.duration();

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.shared.finished.store(false, Ordering::SeqCst);
        self.shared.playing.store(false, Ordering::SeqCst);
        self.send(EngineCommand::Load(Box::new(decoder), reply_tx));
        reply_rx
            .recv()
            .map_err(|_| PlayerError::ServiceClosed("audio engine"))??;

        Ok(duration)
    }

    fn play(&mut self) {
        self.shared.playing.store(true, Ordering::SeqCst);
        self.send(EngineCommand::Play);
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        self.send(EngineCommand::Pause);
    }

    fn stop(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        self.shared.finished.store(false, Ordering::SeqCst);
        self.shared.position_ms.store(0, Ordering::SeqCst);
        self.send(EngineCommand::Stop);
    }

    fn seek(&mut self, position: Duration) -> Result<Duration> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.send(EngineCommand::Seek(position, reply_tx));
        reply_rx
            .recv()
            .map_err(|_| PlayerError::ServiceClosed("audio engine"))?
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(EngineCommand::SetVolume(volume));
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.shared.position_ms.load(Ordering::Relaxed))
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::SeqCst)
    }

    fn take_finished(&mut self) -> bool {
        self.shared.finished.swap(false, Ordering::SeqCst)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}

/// Decoder plus the conversion state for the track being played
struct ActiveTrack {
    decoder: AudioDecoder,
    converter: SampleConverter,
    pending: Vec<f32>,
    offset: usize,
    /// Track position the output frame count is measured from
    base: Duration,
    exhausted: bool,
}

struct Engine {
    output: AudioOutput,
    commands: Receiver<EngineCommand>,
    shared: Arc<Shared>,
    track: Option<ActiveTrack>,
    playing: bool,
}

impl Engine {
    fn new(output: AudioOutput, commands: Receiver<EngineCommand>, shared: Arc<Shared>) -> Self {
        Self {
            output,
            commands,
            shared,
            track: None,
            playing: false,
        }
    }

    fn run(mut self) {
        loop {
            let command = if self.playing && self.track.is_some() {
                match self.commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv_timeout(IDLE_POLL) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            if let Some(command) = command {
                if !self.handle(command) {
                    break;
                }
                continue;
            }

            if !self.pump() {
                thread::sleep(BUFFER_FULL_BACKOFF);
            }
            self.publish_position();
        }

        tracing::debug!("audio engine stopped");
    }

    /// Returns false when the engine should exit
    fn handle(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Load(decoder, reply) => {
                let _ = reply.send(self.load(*decoder));
            }
            EngineCommand::Play => {
                if self.track.is_some() {
                    self.playing = true;
                    self.output.set_paused(false);
                }
            }
            EngineCommand::Pause => {
                self.playing = false;
                self.output.set_paused(true);
            }
            EngineCommand::Stop => {
                self.track = None;
                self.playing = false;
                self.output.set_paused(true);
                self.clear_output();
                self.shared.position_ms.store(0, Ordering::SeqCst);
            }
            EngineCommand::Seek(position, reply) => {
                let _ = reply.send(self.seek(position));
            }
            EngineCommand::SetVolume(volume) => self.output.set_volume(volume),
            EngineCommand::Shutdown => return false,
        }
        true
    }

    fn load(&mut self, decoder: AudioDecoder) -> Result<()> {
        self.playing = false;
        self.output.set_paused(true);
        self.clear_output();

        let converter = SampleConverter::new(
            decoder.sample_rate(),
            decoder.channels(),
            self.output.sample_rate(),
            self.output.channels() as usize,
        )?;

        tracing::debug!(
            path = %decoder.path().display(),
            sample_rate = decoder.sample_rate(),
            channels = decoder.channels(),
            "track loaded"
        );

        self.track = Some(ActiveTrack {
            decoder,
            converter,
            pending: Vec::new(),
            offset: 0,
            base: Duration::ZERO,
            exhausted: false,
        });
        self.shared.position_ms.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<Duration> {
        let Some(track) = self.track.as_mut() else {
            return Err(PlayerError::InvalidPosition("no track loaded".to_string()));
        };

        let reached = track.decoder.seek(position)?;
        track.converter.reset();
        track.pending.clear();
        track.offset = 0;
        track.exhausted = false;
        track.base = reached;

        self.clear_output();
        self.shared.finished.store(false, Ordering::SeqCst);
        self.shared
            .position_ms
            .store(reached.as_millis() as u64, Ordering::SeqCst);
        Ok(reached)
    }

    /// Feed the ring buffer; returns false when no progress was possible
    fn pump(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        let Some(track) = self.track.as_mut() else {
            return false;
        };

        let mut progressed = false;
        let mut drained = false;
        while self.output.available_space() > 0 {
            if track.offset >= track.pending.len() {
                if track.exhausted {
                    drained = self.output.buffered() == 0;
                    break;
                }

                match track.decoder.decode_next() {
                    Ok(Some(samples)) => {
                        track.converter.set_input_channels(track.decoder.channels());
                        match track.converter.process(&samples) {
                            Ok(converted) => track.pending = converted,
                            Err(e) => {
                                tracing::warn!(error = %e, "sample conversion failed, ending track");
                                track.pending.clear();
                                track.exhausted = true;
                            }
                        }
                    }
                    Ok(None) => {
                        track.pending = track.converter.flush().unwrap_or_default();
                        track.exhausted = true;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "decode failed, ending track");
                        track.pending.clear();
                        track.exhausted = true;
                    }
                }
                track.offset = 0;
                progressed = true;
                continue;
            }

            let written = self.output.write(&track.pending[track.offset..]);
            if written == 0 {
                break;
            }
            track.offset += written;
            progressed = true;
        }

        if drained {
            self.finish();
        }
        progressed
    }

    fn finish(&mut self) {
        tracing::debug!("end of track reached");
        self.playing = false;
        self.output.set_paused(true);
        self.shared.playing.store(false, Ordering::SeqCst);
        self.shared.finished.store(true, Ordering::SeqCst);
    }

    fn publish_position(&self) {
        let Some(track) = self.track.as_ref() else {
            return;
        };
        let rate = self.output.sample_rate().max(1) as f64;
        let played = Duration::from_secs_f64(self.output.played_frames() as f64 / rate);
        let position = track.base + played;
        self.shared
            .position_ms
            .store(position.as_millis() as u64, Ordering::Relaxed);
    }

    fn clear_output(&self) {
        self.output.clear();
        let started = std::time::Instant::now();
        while self.output.is_clearing() && started.elapsed() < CLEAR_TIMEOUT {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
