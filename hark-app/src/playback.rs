//! MP3 decode and output-device playback for synthesized speech.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tracing::debug;

use crate::error::{AppError, Result};

pub struct SpeechPlayer;

impl SpeechPlayer {
    pub fn new() -> Self {
        Self
    }

    /// Decode MP3 bytes and play them on the default output device,
    /// blocking until playback finishes. Empty input is a no-op.
    pub fn play_mp3(&self, mp3: &[u8]) -> Result<()> {
        if mp3.is_empty() {
            return Ok(());
        }
        let (samples, sample_rate) = decode_mp3(mp3)?;
        if samples.is_empty() {
            return Ok(());
        }
        play_samples(samples, sample_rate)
    }
}

impl Default for SpeechPlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode MP3 bytes to mono f32 samples plus the stream's sample rate.
fn decode_mp3(mp3: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3.to_vec()));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                }
                samples.extend(mix_to_mono(&frame.data, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(AppError::Audio(format!("mp3 decode: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Interleaved i16 → mono f32 in [-1, 1], averaging channels.
fn mix_to_mono(data: &[i16], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|&s| f32::from(s) / 32768.0).collect();
    }
    data.chunks(channels)
        .map(|chunk| {
            let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
            sum / chunk.len() as f32
        })
        .collect()
}

fn play_samples(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AppError::Audio("no output device available".into()))?;

    // Mono at the decoded rate if the device offers it, stereo otherwise.
    let supported = device
        .supported_output_configs()
        .map_err(|e| AppError::Audio(e.to_string()))?
        .filter(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| {
            AppError::Audio(format!("no output config supports {sample_rate} Hz"))
        })?;
    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    let total = samples.len();
    let shared = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));

    let cb_samples = Arc::clone(&shared);
    let cb_position = Arc::clone(&position);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = cb_position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let sample = cb_samples.get(pos).copied().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                    if pos < cb_samples.len() {
                        pos += 1;
                    }
                }
                cb_position.store(pos, Ordering::Relaxed);
            },
            |err| tracing::error!(error = %err, "output stream error"),
            None,
        )
        .map_err(|e| AppError::Audio(e.to_string()))?;

    stream.play().map_err(|e| AppError::Audio(e.to_string()))?;

    let duration = Duration::from_millis((total as u64 * 1000) / u64::from(sample_rate));
    let deadline = Instant::now() + duration + Duration::from_millis(500);
    while position.load(Ordering::Relaxed) < total && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    // Let the tail drain from the device buffer before tearing down.
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    debug!(samples = total, sample_rate, "playback complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mp3_is_a_noop() {
        SpeechPlayer::new().play_mp3(&[]).unwrap();
    }

    #[test]
    fn mono_passes_through_scaled() {
        let mixed = mix_to_mono(&[0, 16_384, -16_384], 1);
        assert_eq!(mixed.len(), 3);
        assert!((mixed[1] - 0.5).abs() < 1e-3);
        assert!((mixed[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn stereo_averages_channels() {
        let mixed = mix_to_mono(&[16_384, -16_384, 16_384, 16_384], 2);
        assert_eq!(mixed.len(), 2);
        assert!(mixed[0].abs() < 1e-3);
        assert!((mixed[1] - 0.5).abs() < 1e-3);
    }
}
