// Converts decoded audio to the output device's channel layout and sample rate
use rubato::{FftFixedIn, Resampler};

use crate::error::{PlayerError, Result};

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

pub struct SampleConverter {
    in_channels: usize,
    out_channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    /// Planar frames waiting for a full resampler chunk
    pending: Vec<Vec<f32>>,
}

impl SampleConverter {
    pub fn new(in_rate: u32, in_channels: usize, out_rate: u32, out_channels: usize) -> Result<Self> {
        let in_channels = in_channels.max(1);
        let out_channels = out_channels.max(1);

        let resampler = if in_rate != out_rate {
            let resampler = FftFixedIn::<f32>::new(
                in_rate as usize,
                out_rate as usize,
                RESAMPLE_CHUNK_FRAMES,
                2,
                out_channels,
            )
            .map_err(|e| PlayerError::Output(format!("Failed to create resampler: {}", e)))?;
            tracing::debug!(in_rate, out_rate, "resampling enabled");
            Some(resampler)
        } else {
            None
        };

        Ok(Self {
            in_channels,
            out_channels,
            resampler,
            pending: vec![Vec::new(); out_channels],
        })
    }

    /// Update the input layout when the decoder reports a different channel count
    pub fn set_input_channels(&mut self, channels: usize) {
        self.in_channels = channels.max(1);
    }

    /// Convert interleaved input samples, returning interleaved output samples.
    /// May return fewer frames than given while the resampler fills its chunk.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let remapped = remap_channels(input, self.in_channels, self.out_channels);

        if self.resampler.is_none() {
            return Ok(remapped);
        }

        for frame in remapped.chunks_exact(self.out_channels) {
            for (channel, sample) in frame.iter().enumerate() {
                self.pending[channel].push(*sample);
            }
        }

        self.drain(false)
    }

    /// Push out whatever is buffered in the resampler, padding with silence
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            return Ok(Vec::new());
        }
        self.drain(true)
    }

    /// Drop buffered frames, used after a seek
    pub fn reset(&mut self) {
        for channel in &mut self.pending {
            channel.clear();
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    fn drain(&mut self, pad: bool) -> Result<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };

        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            let available = self.pending[0].len();

            if available < needed {
                if !pad || available == 0 {
                    break;
                }
                for channel in &mut self.pending {
                    channel.resize(needed, 0.0);
                }
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();

            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| PlayerError::Output(format!("Resampling failed: {}", e)))?;

            let frames = resampled.first().map(|c| c.len()).unwrap_or(0);
            output.reserve(frames * self.out_channels);
            for frame in 0..frames {
                for channel in &resampled {
                    output.push(channel[frame]);
                }
            }
        }

        Ok(output)
    }
}

/// Map interleaved samples from `in_channels` to `out_channels`.
///
/// Mono is copied to every output channel, anything to mono is averaged,
/// otherwise channels are matched by position and missing ones repeat.
pub fn remap_channels(input: &[f32], in_channels: usize, out_channels: usize) -> Vec<f32> {
    if in_channels == out_channels || in_channels == 0 || out_channels == 0 {
        return input.to_vec();
    }

    let frames = input.len() / in_channels;
    let mut output = Vec::with_capacity(frames * out_channels);

    for frame in input.chunks_exact(in_channels) {
        if out_channels == 1 {
            output.push(frame.iter().sum::<f32>() / in_channels as f32);
        } else if in_channels == 1 {
            output.extend(std::iter::repeat(frame[0]).take(out_channels));
        } else {
            for channel in 0..out_channels {
                output.push(frame[channel % in_channels]);
            }
        }
    }

    output
}
