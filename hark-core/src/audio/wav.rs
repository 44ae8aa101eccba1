//! In-memory WAV encoding of captured frames.
//!
//! HTTP recognizer backends post whole utterances as WAV bodies; this keeps
//! the encoding next to the frame type instead of in every backend.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::frame::Frame;
use crate::error::{HarkError, Result};

/// Encode i16 mono samples as a complete WAV file in memory.
pub fn encode_pcm16(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| HarkError::Other(anyhow::anyhow!("wav writer: {e}")))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| HarkError::Other(anyhow::anyhow!("wav write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| HarkError::Other(anyhow::anyhow!("wav finalize: {e}")))?;
    }
    Ok(cursor.into_inner())
}

/// Encode a sequence of frames (in arrival order) as one WAV file.
pub fn encode_frames(frames: &[Frame], sample_rate: u32) -> Result<Vec<u8>> {
    let samples: Vec<i16> = frames
        .iter()
        .flat_map(|f| f.samples.iter().copied())
        .collect();
    encode_pcm16(&samples, sample_rate)
}
