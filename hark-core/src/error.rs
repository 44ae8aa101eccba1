use thiserror::Error;

/// All errors produced by hark-core.
///
/// An empty transcript is deliberately *not* represented here — a session
/// that ends before any speech was confirmed returns `Ok("")` so callers can
/// tell "nothing recognised" apart from a crashed session.
#[derive(Debug, Error)]
pub enum HarkError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("keyword scorer error: {0}")]
    Scorer(String),

    #[error("recognizer error: {0}")]
    Recognizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarkError>;
