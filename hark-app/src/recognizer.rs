//! HTTP transcription backend for the segmenter.
//!
//! Buffers every accepted frame in memory and posts the whole utterance as
//! one WAV multipart request on `finalize`. Whole-utterance batching keeps
//! the wire format simple; utterances are short by construction (trailing
//! silence ends them).

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use hark_core::audio::wav;
use hark_core::{Frame, HarkError, StreamingRecognizer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WhisperHttpRecognizer {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    samples: Vec<i16>,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperHttpRecognizer {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            base_url,
            model,
            samples: Vec::new(),
            sample_rate: 0,
        }
    }

    fn transcribe(&self, wav_bytes: Vec<u8>) -> hark_core::Result<String> {
        let part = reqwest::blocking::multipart::Part::bytes(wav_bytes)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| HarkError::Recognizer(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .map_err(|e| HarkError::Recognizer(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| HarkError::Recognizer(e.to_string()))?;
        if !status.is_success() {
            return Err(HarkError::Recognizer(format!("HTTP {status}: {body}")));
        }
        parse_transcription(&body)
    }
}

fn parse_transcription(body: &str) -> hark_core::Result<String> {
    let parsed: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| HarkError::Recognizer(format!("malformed transcription response: {e}")))?;
    Ok(parsed.text)
}

impl StreamingRecognizer for WhisperHttpRecognizer {
    fn accept(&mut self, frame: &Frame) -> hark_core::Result<()> {
        if self.samples.is_empty() {
            self.sample_rate = frame.sample_rate;
        }
        self.samples.extend_from_slice(&frame.samples);
        Ok(())
    }

    fn finalize(&mut self) -> hark_core::Result<String> {
        let samples = std::mem::take(&mut self.samples);
        if samples.is_empty() {
            return Ok(String::new());
        }

        debug!(
            samples = samples.len(),
            sample_rate = self.sample_rate,
            "posting utterance for transcription"
        );
        let wav_bytes = wav::encode_pcm16(&samples, self.sample_rate)?;
        self.transcribe(wav_bytes)
    }
}
