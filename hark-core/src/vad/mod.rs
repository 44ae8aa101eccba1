//! Voice activity detection abstraction.
//!
//! The `VoiceActivityDetector` trait is the segmenter's extensibility seam:
//! the default `EnergyVad` can be swapped for a WebRTC-style or neural
//! detector without touching the state machine, and tests substitute
//! scripted decision sequences.

pub mod energy;

pub use energy::EnergyVad;

use crate::audio::frame::Frame;

/// Trait for all VAD implementations.
///
/// Implementors may be stateful (hangover counters, model hidden state).
/// The frame's sample rate and size must match whatever granularity the
/// detector supports — commonly 10/20/30 ms.
pub trait VoiceActivityDetector: Send + 'static {
    /// Classify one frame as speech or non-speech.
    fn is_speech(&mut self, frame: &Frame) -> bool;

    /// Clear internal state between recording sessions.
    fn reset(&mut self);
}
