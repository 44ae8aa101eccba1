//! `EnergyScorer` — local, model-free keyword scorer.
//!
//! Maps smoothed frame energy into a single-keyword confidence: sustained
//! voice-level energy scores near 1, silence near 0. A stand-in trigger for
//! deployments without a neural keyword model; the confidence shape matches
//! what the gate expects from a real scorer.

use crate::audio::frame::Frame;
use crate::error::Result;
use crate::vad::energy::EnergyVad;
use crate::wake::{KeywordScore, KeywordScorer};

/// RMS level that maps to full confidence.
const FULL_SCALE_RMS: f32 = 0.08;

/// Exponential smoothing factor for per-frame RMS (≈5-frame window).
const SMOOTHING: f32 = 0.35;

pub struct EnergyScorer {
    keyword: String,
    smoothed_rms: f32,
}

impl EnergyScorer {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            smoothed_rms: 0.0,
        }
    }
}

impl KeywordScorer for EnergyScorer {
    fn score(&mut self, frame: &Frame) -> Result<Vec<KeywordScore>> {
        let rms = EnergyVad::rms(&frame.samples);
        self.smoothed_rms = self.smoothed_rms + SMOOTHING * (rms - self.smoothed_rms);

        let score = (self.smoothed_rms / FULL_SCALE_RMS).clamp(0.0, 1.0);
        Ok(vec![KeywordScore {
            keyword: self.keyword.clone(),
            score,
        }])
    }
}
