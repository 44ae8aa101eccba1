//! The atomic unit of the pipeline: one fixed-duration block of PCM.

/// A fixed-duration block of signed 16-bit mono PCM samples.
///
/// Frames are immutable once produced; ownership moves from the capture
/// thread to whichever component (wake gate or segmenter) currently owns
/// the stream. Sequence position is implicit in delivery order — the
/// hand-off queue never reorders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Mono i16 samples.
    pub samples: Vec<i16>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Frame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Frame duration in milliseconds, derived from the sample count.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
