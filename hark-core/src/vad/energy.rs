//! Energy-based VAD: RMS threshold plus a hangover counter.
//!
//! 1. Compute the RMS of the frame (i16 normalised to [-1, 1]).
//! 2. RMS ≥ `threshold` → speech, hangover reloaded.
//! 3. RMS < `threshold` while hangover > 0 → still speech, counter
//!    decremented (keeps syllable endings attached).
//! 4. Otherwise → non-speech.

use super::VoiceActivityDetector;
use crate::audio::frame::Frame;

/// A simple energy-based voice activity detector.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    /// RMS amplitude threshold; frames at or above it count as speech.
    /// Typical range 0.01–0.05 for a quiet microphone.
    threshold: f32,
    /// Below-threshold frames still reported as speech after real speech
    /// ends.
    hangover_frames: u32,
    hangover_counter: u32,
}

impl EnergyVad {
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            threshold,
            hangover_frames,
            hangover_counter: 0,
        }
    }

    pub(crate) fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples
            .iter()
            .map(|&s| {
                let x = s as f32 / 32768.0;
                x * x
            })
            .sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.02, 8)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn is_speech(&mut self, frame: &Frame) -> bool {
        if Self::rms(&frame.samples) >= self.threshold {
            self.hangover_counter = self.hangover_frames;
            true
        } else if self.hangover_counter > 0 {
            self.hangover_counter -= 1;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.hangover_counter = 0;
    }
}
