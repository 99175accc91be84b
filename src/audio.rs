/*
 * @file audio.rs
 * @brief Microphone capture, WAV decoding and speaker playback
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Audio capture and playback.
//!
//! Microphone windows are captured with CPAL as 16 kHz mono PCM. Sound
//! effects are decoded with hound and played on the default output device,
//! converted to whatever rate and channel count that device runs at.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, StreamError};
use tracing::warn;

/// Sample rate for audio recording (16kHz).
///
/// Value is expressed in Hertz and matches Whisper's preferred input rate.
pub const SAMPLE_RATE: u32 = 16000;

/// Number of audio channels captured (mono).
const CHANNELS: u16 = 1;

/// Silence appended after a clip so the device buffer drains before the
/// stream is dropped.
const PLAYBACK_TAIL: Duration = Duration::from_millis(150);

/// Decoded sound effect.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    /// Mono samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Records audio from the default input device for a fixed duration.
///
/// # Arguments
/// * `window` - How long to keep the stream open.
///
/// # Returns
/// A vector of 16-bit PCM samples at [`SAMPLE_RATE`].
///
/// # Errors
/// Returns an error if:
/// - No input device is available
/// - The audio stream cannot be created
/// - Recording fails
pub fn record_window(window: Duration) -> Result<Vec<i16>> {
    let device = default_input_device()?;
    let config = input_config();
    let samples = shared_samples();
    let stream = build_input_stream(&device, &config, samples.clone())?;
    stream.play()?;
    std::thread::sleep(window);
    drop(stream);
    let captured = samples
        .lock()
        .map_err(|_| anyhow!("sample buffer poisoned"))?
        .clone();
    Ok(captured)
}

/// Detects whether audio samples contain meaningful speech content.
///
/// # Details
/// Compares the root mean square energy of the window against `threshold`.
///
/// # Arguments
/// * `samples` - PCM audio samples as signed 16-bit integers.
/// * `threshold` - Minimum RMS treated as speech.
///
/// # Returns
/// * `bool` - `true` when the RMS energy reaches the threshold.
pub fn contains_speech(samples: &[i16], threshold: f32) -> bool {
    if samples.is_empty() {
        return false;
    }
    let energy = samples
        .iter()
        .map(|sample| (*sample as f32).powi(2))
        .sum::<f32>()
        / samples.len() as f32;
    energy.sqrt() >= threshold
}

/// Normalizes i16 samples to the f32 range [-1.0, 1.0].
pub fn normalize_samples(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(audio: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return audio;
    }
    let channels = channels as usize;
    audio
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resamples audio data from one sample rate to another using linear interpolation.
///
/// # Details
/// Not as precise as sinc interpolation, but speech and short sound effects
/// do not need a perfect frequency response.
///
/// # Arguments
/// * `input` - The source audio samples at the original sample rate.
/// * `from_rate` - The original sample rate in Hz (e.g., 44100).
/// * `to_rate` - The target sample rate in Hz (e.g., 16000).
///
/// # Returns
/// * `Vec<f32>` - Resampled audio, or the input unchanged when the rates match.
pub fn resample(input: Vec<f32>, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return input;
    }
    let ratio = from_rate as f32 / to_rate as f32;
    let output_len = (input.len() as f32 / ratio) as usize;
    interpolate_audio(&input, ratio, output_len)
}

fn interpolate_audio(input: &[f32], ratio: f32, output_len: usize) -> Vec<f32> {
    (0..output_len)
        .map(|i| sample_at_position(input, i as f32 * ratio))
        .collect()
}

/// Linearly interpolated sample at a fractional position; zero past the end.
fn sample_at_position(input: &[f32], pos: f32) -> f32 {
    let idx = pos as usize;
    if idx + 1 < input.len() {
        let frac = pos - idx as f32;
        input[idx] * (1.0 - frac) + input[idx + 1] * frac
    } else if idx < input.len() {
        input[idx]
    } else {
        0.0
    }
}

/// Decodes a WAV file into a mono [`Clip`].
///
/// # Arguments
/// * `path` - The WAV file to read.
///
/// # Errors
/// Returns an error if the file cannot be opened, is not a valid WAV, or
/// sample reading fails.
pub fn load_clip(path: &Path) -> Result<Clip> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| "Failed to read WAV samples")?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| "Failed to read WAV samples")?
        }
    };
    Ok(Clip {
        samples: downmix(interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

/// Plays a WAV file on the default output device, blocking until it ends.
///
/// # Errors
/// Returns an error when the file cannot be decoded or no output device
/// is available.
pub fn play_wav(path: &Path) -> Result<()> {
    let clip = load_clip(path)?;
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device"))?;
    let config: StreamConfig = device
        .default_output_config()
        .with_context(|| "Failed to query output config")?
        .into();
    let samples = resample(clip.samples, clip.sample_rate, config.sample_rate.0);
    let length = Duration::from_secs_f64(samples.len() as f64 / config.sample_rate.0 as f64);
    let stream = build_output_stream(&device, &config, samples)?;
    stream.play()?;
    std::thread::sleep(length + PLAYBACK_TAIL);
    drop(stream);
    Ok(())
}

fn default_input_device() -> Result<Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device"))
}

fn input_config() -> StreamConfig {
    StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    }
}

fn shared_samples() -> Arc<Mutex<Vec<i16>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<Stream> {
    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &_| push_samples(&samples, data),
            log_stream_error,
            None,
        )
        .map_err(|err| anyhow!(err))
}

/// Feeds mono samples to every channel of the output stream, then silence.
fn build_output_stream(device: &Device, config: &StreamConfig, mono: Vec<f32>) -> Result<Stream> {
    let channels = config.channels.max(1) as usize;
    let mut cursor = 0usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = mono.get(cursor).copied().unwrap_or(0.0);
                    cursor += 1;
                    frame.fill(value);
                }
            },
            log_stream_error,
            None,
        )
        .map_err(|err| anyhow!(err))
}

/// Converts floating-point frames into 16-bit PCM and appends them to the buffer.
fn push_samples(buffer: &Arc<Mutex<Vec<i16>>>, data: &[f32]) {
    if let Ok(mut guard) = buffer.lock() {
        guard.extend(data.iter().map(|&sample| (sample * i16::MAX as f32) as i16));
    }
}

fn log_stream_error(error: StreamError) {
    warn!(%error, "audio stream error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_config_is_whisper_friendly() {
        let config = input_config();
        assert_eq!(config.channels, CHANNELS);
        assert_eq!(config.sample_rate.0, SAMPLE_RATE);
    }

    #[test]
    fn push_samples_converts_floats() {
        let samples = shared_samples();
        push_samples(&samples, &[0.0, 0.5, -1.0]);
        let guard = samples.lock().unwrap();
        assert_eq!(guard.len(), 3);
        assert_eq!(guard[0], 0);
        assert!(guard[1] > 0);
        assert!(guard[2] < 0);
    }

    #[test]
    fn contains_speech_requires_energy() {
        assert!(!contains_speech(&[], 150.0));
        assert!(!contains_speech(&[0_i16; 1600], 150.0));
        assert!(contains_speech(&vec![i16::MAX / 2; 1600], 150.0));
        assert!(!contains_speech(&vec![100_i16; 1600], 150.0));
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix(vec![0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(downmix(vec![0.5, 0.25], 1), vec![0.5, 0.25]);
    }

    #[test]
    fn resample_scales_length_and_interpolates() {
        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let halved = resample(input.clone(), 32000, 16000);
        assert_eq!(halved, vec![0.0, 2.0, 4.0, 6.0]);
        let doubled = resample(vec![0.0, 1.0], 8000, 16000);
        assert_eq!(doubled, vec![0.0, 0.5, 1.0, 1.0]);
        assert_eq!(resample(input.clone(), 16000, 16000), input);
    }

    #[test]
    fn sample_at_position_handles_edges() {
        assert_eq!(sample_at_position(&[1.0], 0.0), 1.0);
        assert_eq!(sample_at_position(&[1.0], 3.0), 0.0);
    }

    #[test]
    fn load_clip_decodes_stereo_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for sample in [16384_i16, 0, -16384, -16384] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let clip = load_clip(&path).unwrap();
        assert_eq!(clip.sample_rate, 22050);
        assert_eq!(clip.samples, vec![0.25, -0.5]);
    }
}
