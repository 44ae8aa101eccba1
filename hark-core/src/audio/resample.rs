//! Device-rate → pipeline-rate conversion.
//!
//! Input devices rarely run at the pipeline's configured rate (48 kHz is
//! the common default; the pipeline wants 16 kHz mono). `SampleRateConverter`
//! bridges that gap on the framer thread, where allocation is allowed.
//! When the rates already match it degrades to a passthrough and no rubato
//! session is created.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::warn;

use crate::error::{HarkError, Result};

/// Converts mono f32 audio from the device rate to the pipeline rate.
pub struct SampleRateConverter {
    /// `None` in passthrough mode.
    inner: Option<FastFixedIn<f32>>,
    /// Carries partial input between calls — rubato consumes fixed blocks.
    pending: Vec<f32>,
    /// Input samples rubato expects per process call.
    block: usize,
    /// Pre-allocated `[1][output_frames_max]` output buffer.
    out: Vec<Vec<f32>>,
}

impl SampleRateConverter {
    /// # Errors
    /// `HarkError::AudioDevice` if rubato rejects the rate pair.
    pub fn new(device_rate: u32, pipeline_rate: u32, block: usize) -> Result<Self> {
        if device_rate == pipeline_rate {
            return Ok(Self {
                inner: None,
                pending: Vec::new(),
                block,
                out: Vec::new(),
            });
        }

        let ratio = pipeline_rate as f64 / device_rate as f64;
        let inner = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, block, 1)
            .map_err(|e| HarkError::AudioDevice(format!("resampler init: {e}")))?;

        let max_out = inner.output_frames_max();
        tracing::info!(device_rate, pipeline_rate, block, max_out, "resampling enabled");

        Ok(Self {
            inner: Some(inner),
            pending: Vec::new(),
            block,
            out: vec![vec![0f32; max_out]; 1],
        })
    }

    /// Feed device samples, returning converted output (possibly empty while
    /// a full rubato block is still accumulating).
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut inner) = self.inner else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);

        let mut converted = Vec::new();
        while self.pending.len() >= self.block {
            let input = &self.pending[..self.block];
            match inner.process_into_buffer(&[input], &mut self.out, None) {
                Ok((_consumed, produced)) => {
                    converted.extend_from_slice(&self.out[0][..produced]);
                }
                Err(e) => warn!("resampler process error: {e}"),
            }
            self.pending.drain(..self.block);
        }
        converted
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rates_pass_through() {
        let mut rc = SampleRateConverter::new(16_000, 16_000, 480).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..320).map(|i| (i as f32) / 320.0).collect();
        assert_eq!(rc.process(&samples), samples);
    }

    #[test]
    fn downsamples_48k_to_16k() {
        let mut rc = SampleRateConverter::new(48_000, 16_000, 480).unwrap();
        assert!(!rc.is_passthrough());
        let out = rc.process(&vec![0.0f32; 480]);
        // 480 in at 48 kHz ≈ 160 out at 16 kHz
        assert!(!out.is_empty());
        assert!(
            (out.len() as isize - 160).unsigned_abs() <= 8,
            "got {} samples",
            out.len()
        );
    }

    #[test]
    fn short_input_accumulates_until_a_block_fills() {
        let mut rc = SampleRateConverter::new(48_000, 16_000, 480).unwrap();
        assert!(rc.process(&vec![0.0f32; 250]).is_empty());
        // 250 + 250 ≥ 480 → one block converts
        assert!(!rc.process(&vec![0.0f32; 250]).is_empty());
    }
}
