//! Speech synthesis.
//!
//! A `Synthesizer` turns reply text into MP3 bytes; playback is a separate
//! concern (see `playback`). Empty text is skipped, not an error.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns text into MP3 audio.
pub trait Synthesizer: Send {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// OpenAI speech endpoint backend.
pub struct OpenAiTts {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl OpenAiTts {
    pub fn new(api_key: String, base_url: String, model: String, voice: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            base_url,
            model,
            voice,
        }
    }
}

impl Synthesizer for OpenAiTts {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                response_format: "mp3",
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AppError::Tts(format!("HTTP {status}: {body}")));
        }

        let bytes = response.bytes()?.to_vec();
        debug!(bytes = bytes.len(), "speech synthesized");
        Ok(bytes)
    }
}
