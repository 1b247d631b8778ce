// Audio output using cpal
// Handles cross-platform audio output with a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{PlayerError, Result};

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// State shared with the cpal callback
struct CallbackState {
    consumer: Mutex<RingConsumer>,
    volume: Mutex<f32>,
    clear_flag: AtomicBool,
    paused: AtomicBool,
    /// Samples actually sent to the device since the last reset
    played_samples: AtomicU64,
}

/// Owns the cpal stream; not `Send`, so it lives on the audio engine thread
pub struct AudioOutput {
    _stream: Stream,
    producer: Mutex<RingProducer>,
    state: Arc<CallbackState>,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Create a new audio output with default device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::Output("No output device available".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| PlayerError::Output(format!("Failed to get default output config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let state = Arc::new(CallbackState {
            consumer: Mutex::new(consumer),
            volume: Mutex::new(1.0),
            clear_flag: AtomicBool::new(false),
            paused: AtomicBool::new(true),
            played_samples: AtomicU64::new(0),
        });

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), state.clone())?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), state.clone())?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), state.clone())?,
            format => {
                return Err(PlayerError::Output(format!(
                    "Unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| PlayerError::Output(format!("Failed to start stream: {}", e)))?;

        tracing::info!(sample_rate, channels, device = ?device.name().ok(), "audio output opened");

        Ok(Self {
            _stream: stream,
            producer: Mutex::new(producer),
            state,
            sample_rate,
            channels,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        state: Arc<CallbackState>,
    ) -> Result<Stream> {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut consumer = state.consumer.lock();

                    // Drain everything queued before a seek or stop
                    if state.clear_flag.swap(false, Ordering::SeqCst) {
                        while consumer.try_pop().is_some() {}
                    }

                    // Paused output is silence and leaves the buffer untouched
                    if state.paused.load(Ordering::Relaxed) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    let vol = *state.volume.lock();
                    let mut played = 0u64;
                    for sample in data.iter_mut() {
                        let value = match consumer.try_pop() {
                            Some(v) => {
                                played += 1;
                                v * vol
                            }
                            None => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }
                    state.played_samples.fetch_add(played, Ordering::Relaxed);
                },
                move |err| {
                    tracing::error!(error = %err, "audio output stream error");
                },
                None,
            )
            .map_err(|e| PlayerError::Output(format!("Failed to build output stream: {}", e)))
    }

    /// Write samples to the output buffer.
    /// Returns the number of samples actually written.
    pub fn write(&self, samples: &[f32]) -> usize {
        self.producer.lock().push_slice(samples)
    }

    pub fn available_space(&self) -> usize {
        self.producer.lock().vacant_len()
    }

    /// Samples still queued for the device
    pub fn buffered(&self) -> usize {
        self.producer.lock().occupied_len()
    }

    /// Discard queued audio and restart the played-frame count
    pub fn clear(&self) {
        self.state.clear_flag.store(true, Ordering::SeqCst);
        self.state.played_samples.store(0, Ordering::SeqCst);
    }

    /// True until the callback has drained the buffer after `clear`
    pub fn is_clearing(&self) -> bool {
        self.state.clear_flag.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.paused.store(paused, Ordering::SeqCst);
    }

    /// Frames (samples per channel) played since the last `clear`
    pub fn played_frames(&self) -> u64 {
        self.state.played_samples.load(Ordering::Relaxed) / self.channels.max(1) as u64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.state.volume.lock() = vol.clamp(0.0, 1.0);
    }
}
