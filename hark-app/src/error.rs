//! Application-level error type.
//!
//! Pipeline errors stay in [`hark_core::HarkError`]; this enum covers the
//! collaborators the session loop talks to.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("chat completion failed: {0}")]
    Chat(String),

    #[error("speech synthesis failed: {0}")]
    Tts(String),

    #[error("web search failed: {0}")]
    Search(String),

    #[error("audio playback error: {0}")]
    Audio(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] hark_core::HarkError),
}

pub type Result<T> = std::result::Result<T, AppError>;
