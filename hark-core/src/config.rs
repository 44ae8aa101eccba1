//! Pipeline configuration.
//!
//! All tunables are fixed at construction time and shared by the wake gate
//! and the segmenter. Thresholds are expressed in milliseconds and compared
//! against accumulated frame durations, never wall-clock time, so processing
//! jitter cannot move a segmentation boundary.

use serde::{Deserialize, Serialize};

use crate::error::{HarkError, Result};

/// Configuration for the capture → wake → segmentation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capture sample rate in Hz. Audio captured at other device rates is
    /// resampled to this before framing. Default: 16000.
    pub sample_rate_hz: u32,
    /// Frame duration in ms. Together with `sample_rate_hz` this fixes the
    /// per-frame sample count. Common VAD granularities are 10/20/30 ms.
    /// Default: 20.
    pub frame_ms: u32,
    /// Keyword confidence in [0, 1] at or above which the wake gate fires.
    /// Default: 0.5.
    pub wake_threshold: f32,
    /// Cumulative speech (ms) required before the segmenter commits to
    /// listening. Default: 250.
    pub speech_threshold_ms: u32,
    /// Accumulated trailing silence (ms) that ends an utterance.
    /// Default: 700.
    pub silence_threshold_ms: u32,
    /// Pre-roll capacity in ms, converted to a frame count. Audio captured
    /// before speech is confirmed is replayed from this buffer so the
    /// utterance onset is not lost. Default: 300.
    pub preroll_ms: u32,
    /// Bounded hand-off queue depth (frames) between the capture thread and
    /// the consumer. On overflow the oldest frame is dropped. Default: 32.
    pub handoff_capacity: usize,
    /// Preferred input device name; `None` selects the system default.
    pub preferred_device: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            frame_ms: 20,
            wake_threshold: 0.5,
            speech_threshold_ms: 250,
            silence_threshold_ms: 700,
            preroll_ms: 300,
            handoff_capacity: 32,
            preferred_device: None,
        }
    }
}

impl PipelineConfig {
    /// Samples per frame at the configured rate and frame duration.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate_hz as usize * self.frame_ms as usize) / 1000
    }

    /// Pre-roll ring capacity in frames.
    pub fn preroll_frames(&self) -> usize {
        (self.preroll_ms / self.frame_ms) as usize
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(HarkError::Other(anyhow::anyhow!(
                "sample_rate_hz must be non-zero"
            )));
        }
        if self.frame_ms == 0 || self.frame_samples() == 0 {
            return Err(HarkError::Other(anyhow::anyhow!(
                "frame_ms {} yields an empty frame at {} Hz",
                self.frame_ms,
                self.sample_rate_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.wake_threshold) {
            return Err(HarkError::Other(anyhow::anyhow!(
                "wake_threshold {} outside [0, 1]",
                self.wake_threshold
            )));
        }
        if self.handoff_capacity == 0 {
            return Err(HarkError::Other(anyhow::anyhow!(
                "handoff_capacity must be at least 1"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_is_320_samples() {
        let cfg = PipelineConfig::default();
        // 16 kHz * 20 ms
        assert_eq!(cfg.frame_samples(), 320);
    }

    #[test]
    fn preroll_capacity_in_frames() {
        let cfg = PipelineConfig::default();
        // 300 ms / 20 ms
        assert_eq!(cfg.preroll_frames(), 15);
    }

    #[test]
    fn default_config_validates() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_wake_threshold() {
        let cfg = PipelineConfig {
            wake_threshold: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_frame() {
        let cfg = PipelineConfig {
            frame_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = PipelineConfig {
            preferred_device: Some("USB Microphone".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize config");
        let back: PipelineConfig = serde_json::from_str(&json).expect("deserialize config");
        assert_eq!(back.sample_rate_hz, cfg.sample_rate_hz);
        assert_eq!(back.preferred_device.as_deref(), Some("USB Microphone"));
    }
}
