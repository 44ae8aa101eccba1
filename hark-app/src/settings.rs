//! Runtime settings for the session loop.
//!
//! Everything is a CLI flag; secrets fall back to environment variables and
//! are never logged.

use clap::Args;
use hark_core::PipelineConfig;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a brief and clear voice assistant. \
Answer in at most three sentences and avoid unnecessary technical jargon.";

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Input device name (defaults to the system default input).
    #[arg(long)]
    pub device: Option<String>,

    /// Keyword the wake gate listens for.
    #[arg(long, default_value = "hey hark")]
    pub wake_keyword: String,

    /// Wake confidence threshold in [0, 1], inclusive.
    #[arg(long, default_value_t = 0.5)]
    pub wake_threshold: f32,

    /// Cumulative speech required to commit to an utterance.
    #[arg(long, default_value_t = 250)]
    pub speech_threshold_ms: u32,

    /// Trailing silence that ends an utterance.
    #[arg(long, default_value_t = 700)]
    pub silence_threshold_ms: u32,

    /// Audio retained from before the utterance was confirmed.
    #[arg(long, default_value_t = 300)]
    pub preroll_ms: u32,

    /// RMS level at or above which a frame counts as speech.
    #[arg(long, default_value_t = 0.02)]
    pub vad_threshold: f32,

    /// Below-threshold frames still counted as speech after real speech.
    #[arg(long, default_value_t = 8)]
    pub vad_hangover_frames: u32,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Chat-completion model.
    #[arg(long, default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Transcription model.
    #[arg(long, default_value = "whisper-1")]
    pub stt_model: String,

    /// Speech-synthesis model.
    #[arg(long, default_value = "tts-1")]
    pub tts_model: String,

    /// Speech-synthesis voice.
    #[arg(long, default_value = "alloy")]
    pub tts_voice: String,

    /// History cap: system message plus this many recent messages.
    #[arg(long, default_value_t = 12)]
    pub max_turns: usize,

    /// System prompt for the assistant.
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Transcribe and chat but never speak the replies.
    #[arg(long)]
    pub mute: bool,
}

impl RunArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            wake_threshold: self.wake_threshold,
            speech_threshold_ms: self.speech_threshold_ms,
            silence_threshold_ms: self.silence_threshold_ms,
            preroll_ms: self.preroll_ms,
            preferred_device: self.device.clone(),
            ..Default::default()
        }
    }
}
