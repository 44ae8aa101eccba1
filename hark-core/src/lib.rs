//! # hark-core
//!
//! Wake gating and utterance segmentation for a voice-interaction front end.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → FrameSource (RT callback → SPSC ring → framer thread)
//!                  │  bounded frame hand-off, drop-oldest
//!                  ▼
//!              WakeGate ── KeywordScorer (per-frame score set vs threshold)
//!                  │  KeywordHit
//!                  ▼
//!         UtteranceSegmenter ── VoiceActivityDetector
//!          pre-roll ring + two-phase speech/silence state machine
//!                  │  StreamingRecognizer::accept / finalize
//!                  ▼
//!             transcript (or "" when the stream ends first)
//! ```
//!
//! The pipeline is synchronous: one capture producer per session, one
//! consumer blocking on the hand-off queue. Scorer, detector and recognizer
//! are trait objects so the whole path runs against scripted doubles in
//! tests, with no audio hardware.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod error;
pub mod segment;
pub mod stt;
pub mod vad;
pub mod wake;

// Convenience re-exports for downstream crates
pub use audio::frame::Frame;
pub use audio::{frame_channel, FrameSender, FrameSource, FrameStream};
pub use config::PipelineConfig;
pub use error::{HarkError, Result};
pub use segment::{SegmentStep, SegmenterState, UtteranceSegmenter};
pub use stt::StreamingRecognizer;
pub use vad::{EnergyVad, VoiceActivityDetector};
pub use wake::{EnergyScorer, KeywordHit, KeywordScore, KeywordScorer, WakeGate};
