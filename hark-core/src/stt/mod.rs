//! Streaming speech recognition abstraction.
//!
//! The `StreamingRecognizer` trait decouples the segmenter from any
//! concrete backend (HTTP transcription, on-device decoder, test double).
//! `&mut self` expresses that decoders are stateful; one recognizer
//! instance serves exactly one utterance session and is discarded after
//! finalization — never reused across utterances.

pub mod stub;

pub use stub::StubRecognizer;

use crate::audio::frame::Frame;
use crate::error::Result;

/// Contract for speech recognition backends.
pub trait StreamingRecognizer: Send + 'static {
    /// Feed one frame of the utterance, in capture order.
    ///
    /// # Errors
    /// A backend fault here aborts the session — a frame whose
    /// classification is undefined must not be silently skipped.
    fn accept(&mut self, frame: &Frame) -> Result<()>;

    /// Close the session and return the best transcript. Called exactly
    /// once, after which the recognizer is discarded.
    fn finalize(&mut self) -> Result<String>;
}
