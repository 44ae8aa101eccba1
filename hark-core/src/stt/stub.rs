//! `StubRecognizer` — deterministic placeholder backend.
//!
//! Lets the wake → segment → transcript path run end-to-end before a real
//! recognizer is wired in, and gives tests a transcript whose content
//! encodes exactly what was fed in.

use tracing::debug;

use crate::audio::frame::Frame;
use crate::error::Result;
use crate::stt::StreamingRecognizer;

/// Accumulates frame metadata and reports it as the "transcript".
#[derive(Default)]
pub struct StubRecognizer {
    frames: usize,
    samples: usize,
    sample_rate: u32,
}

impl StubRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamingRecognizer for StubRecognizer {
    fn accept(&mut self, frame: &Frame) -> Result<()> {
        self.frames += 1;
        self.samples += frame.samples.len();
        self.sample_rate = frame.sample_rate;
        Ok(())
    }

    fn finalize(&mut self) -> Result<String> {
        debug!(frames = self.frames, samples = self.samples, "stub finalize");
        if self.frames == 0 {
            return Ok(String::new());
        }
        Ok(format!(
            "[stub: {} frames, {} samples @ {} Hz]",
            self.frames, self.samples, self.sample_rate
        ))
    }
}
