//! Utterance segmentation: start/end boundary detection over live frames.
//!
//! ## State machine (per recording session)
//!
//! ```text
//! PreSpeech ──(cumulative speech ≥ speech_threshold_ms)──► InSpeech
//!    │                                                        │
//!    │ every frame → pre-roll ring                            │ every frame → recognizer
//!    │ (oldest evicted at capacity)                           │ speech frame → silence counter := 0
//!    │                                                        │ other frame → counter += frame ms
//!    ▼                                                        ▼
//! stream end → Ok("")            (counter ≥ silence_threshold_ms) → finalize → transcript
//! ```
//!
//! Both thresholds compare accumulated frame durations with `>=`, so the
//! transition happens on the frame that crosses the line, and wall-clock
//! jitter never moves a boundary. In `PreSpeech` the speech accumulator is
//! cumulative: a non-speech blip between speech frames does not restart it.
//!
//! On the `PreSpeech → InSpeech` transition the pre-roll ring (which at that
//! point ends with the triggering frame) is drained into the recognizer in
//! arrival order, so utterance onset audio captured before confirmation is
//! not lost and the triggering frame is fed exactly once.

pub mod preroll;

use std::sync::{atomic::AtomicBool, Arc};

use tracing::{debug, info};

use crate::audio::frame::Frame;
use crate::audio::{FrameSource, FrameStream};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::stt::StreamingRecognizer;
use crate::vad::VoiceActivityDetector;
use preroll::PrerollBuffer;

/// Segmentation phase of the current recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for enough cumulative speech to commit to listening.
    PreSpeech,
    /// Committed: every frame goes to the recognizer until trailing
    /// silence ends the utterance.
    InSpeech,
}

/// Outcome of feeding one frame to the segmenter.
#[derive(Debug)]
pub enum SegmentStep {
    /// Session continues; feed the next frame.
    Continue,
    /// Terminal: trailing silence reached the threshold and the recognizer
    /// was finalized. No further frames are consumed for this session.
    Finalized(String),
}

/// Determines the boundaries of one spoken utterance and produces its
/// transcript.
///
/// One segmenter serves exactly one session: counters start at zero, the
/// pre-roll ring starts empty, and the recognizer is finalized at most once
/// — `run` and `record_and_transcribe` consume the segmenter.
pub struct UtteranceSegmenter {
    speech_threshold_ms: u32,
    silence_threshold_ms: u32,
    vad: Box<dyn VoiceActivityDetector>,
    recognizer: Box<dyn StreamingRecognizer>,
    state: SegmenterState,
    speech_accum_ms: u32,
    silence_accum_ms: u32,
    preroll: PrerollBuffer,
}

impl UtteranceSegmenter {
    pub fn new(
        config: &PipelineConfig,
        vad: Box<dyn VoiceActivityDetector>,
        recognizer: Box<dyn StreamingRecognizer>,
    ) -> Self {
        Self {
            speech_threshold_ms: config.speech_threshold_ms,
            silence_threshold_ms: config.silence_threshold_ms,
            vad,
            recognizer,
            state: SegmenterState::PreSpeech,
            speech_accum_ms: 0,
            silence_accum_ms: 0,
            preroll: PrerollBuffer::new(config.preroll_frames()),
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    pub fn speech_accum_ms(&self) -> u32 {
        self.speech_accum_ms
    }

    pub fn silence_accum_ms(&self) -> u32 {
        self.silence_accum_ms
    }

    pub fn preroll_len(&self) -> usize {
        self.preroll.len()
    }

    /// Feed one frame through the state machine.
    ///
    /// Must not be called again after `SegmentStep::Finalized` is returned.
    pub fn process(&mut self, frame: Frame) -> Result<SegmentStep> {
        let frame_ms = frame.duration_ms();
        let is_speech = self.vad.is_speech(&frame);

        match self.state {
            SegmenterState::PreSpeech => {
                let unbuffered = self.preroll.push(frame);
                if is_speech {
                    // Cumulative, not contiguous: silence in between does
                    // not reset the accumulator.
                    self.speech_accum_ms += frame_ms;
                }

                if self.speech_accum_ms >= self.speech_threshold_ms {
                    debug!(
                        speech_ms = self.speech_accum_ms,
                        buffered = self.preroll.len(),
                        "speech confirmed — replaying pre-roll into recognizer"
                    );
                    self.state = SegmenterState::InSpeech;
                    self.silence_accum_ms = 0;

                    let buffered: Vec<Frame> = self.preroll.drain().collect();
                    for buffered_frame in &buffered {
                        self.recognizer.accept(buffered_frame)?;
                    }
                    // A zero-capacity ring could not hold the triggering
                    // frame; it must still reach the recognizer exactly
                    // once.
                    if let Some(trigger) = unbuffered {
                        self.recognizer.accept(&trigger)?;
                    }
                }
                Ok(SegmentStep::Continue)
            }

            SegmenterState::InSpeech => {
                // Recognition continues through brief pauses — every frame
                // is fed regardless of its classification.
                self.recognizer.accept(&frame)?;

                if is_speech {
                    self.silence_accum_ms = 0;
                } else {
                    self.silence_accum_ms += frame_ms;
                    if self.silence_accum_ms >= self.silence_threshold_ms {
                        debug!(
                            silence_ms = self.silence_accum_ms,
                            "end of utterance — finalizing"
                        );
                        let text = self.recognizer.finalize()?;
                        return Ok(SegmentStep::Finalized(text.trim().to_owned()));
                    }
                }
                Ok(SegmentStep::Continue)
            }
        }
    }

    /// Drive the state machine over an already-open frame stream until the
    /// utterance finalizes or the stream ends.
    ///
    /// A stream that ends first (device teardown, cancellation) yields
    /// `Ok("")` — "no utterance recognised" is not an error, and no partial
    /// transcript is ever returned.
    pub fn run(mut self, frames: &mut FrameStream) -> Result<String> {
        while let Some(frame) = frames.next() {
            if let SegmentStep::Finalized(text) = self.process(frame)? {
                return Ok(text);
            }
        }
        info!("frame stream ended before an utterance completed");
        Ok(String::new())
    }

    /// Open the configured device, record until trailing silence and return
    /// the transcript. The device is released on every exit path.
    pub fn record_and_transcribe(
        self,
        config: &PipelineConfig,
        running: Arc<AtomicBool>,
    ) -> Result<String> {
        let mut source = FrameSource::start_with(config, config.handoff_capacity, running)?;
        let text = self.run(source.frames())?;
        source.stop();
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::audio::frame_channel;
    use crate::error::HarkError;

    /// VAD double driven by a scripted decision list (repeats the last
    /// decision when exhausted).
    struct ScriptedVad {
        decisions: Vec<bool>,
        idx: usize,
    }

    impl ScriptedVad {
        fn new(decisions: Vec<bool>) -> Self {
            Self { decisions, idx: 0 }
        }
    }

    impl VoiceActivityDetector for ScriptedVad {
        fn is_speech(&mut self, _frame: &Frame) -> bool {
            let decision = self
                .decisions
                .get(self.idx)
                .copied()
                .unwrap_or_else(|| self.decisions.last().copied().unwrap_or(false));
            self.idx += 1;
            decision
        }

        fn reset(&mut self) {
            self.idx = 0;
        }
    }

    /// Recognizer double recording accepted frame tags and finalize calls.
    #[derive(Clone, Default)]
    struct Capture {
        accepted: Arc<Mutex<Vec<i16>>>,
        finalized: Arc<Mutex<u32>>,
    }

    struct RecordingRecognizer {
        capture: Capture,
        transcript: String,
    }

    impl RecordingRecognizer {
        fn new(capture: Capture, transcript: &str) -> Self {
            Self {
                capture,
                transcript: transcript.to_owned(),
            }
        }
    }

    impl StreamingRecognizer for RecordingRecognizer {
        fn accept(&mut self, frame: &Frame) -> Result<()> {
            self.capture.accepted.lock().push(frame.samples[0]);
            Ok(())
        }

        fn finalize(&mut self) -> Result<String> {
            *self.capture.finalized.lock() += 1;
            Ok(self.transcript.clone())
        }
    }

    struct FaultyRecognizer;

    impl StreamingRecognizer for FaultyRecognizer {
        fn accept(&mut self, _frame: &Frame) -> Result<()> {
            Err(HarkError::Recognizer("decoder fault".into()))
        }

        fn finalize(&mut self) -> Result<String> {
            Err(HarkError::Recognizer("decoder fault".into()))
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            sample_rate_hz: 16_000,
            frame_ms: 20,
            speech_threshold_ms: 250,
            silence_threshold_ms: 700,
            preroll_ms: 300,
            ..Default::default()
        }
    }

    /// 20 ms frame whose first sample tags its position in the sequence.
    fn tagged_frame(tag: i16) -> Frame {
        Frame::new(vec![tag; 320], 16_000)
    }

    fn segmenter_with(
        decisions: Vec<bool>,
        capture: Capture,
        transcript: &str,
    ) -> UtteranceSegmenter {
        UtteranceSegmenter::new(
            &test_config(),
            Box::new(ScriptedVad::new(decisions)),
            Box::new(RecordingRecognizer::new(capture, transcript)),
        )
    }

    #[test]
    fn all_nonspeech_never_leaves_pre_speech() {
        let capture = Capture::default();
        let mut seg = segmenter_with(vec![false; 50], capture.clone(), "unused");

        for i in 0..50 {
            match seg.process(tagged_frame(i)).unwrap() {
                SegmentStep::Continue => {}
                SegmentStep::Finalized(_) => panic!("must not finalize"),
            }
        }

        assert_eq!(seg.state(), SegmenterState::PreSpeech);
        assert_eq!(seg.speech_accum_ms(), 0);
        assert!(capture.accepted.lock().is_empty());
        assert_eq!(*capture.finalized.lock(), 0);
    }

    #[test]
    fn stream_end_before_speech_returns_empty_transcript() {
        let (tx, mut rx) = frame_channel(64);
        for i in 0..50 {
            tx.send(tagged_frame(i));
        }
        drop(tx);

        let capture = Capture::default();
        let seg = segmenter_with(vec![false; 50], capture.clone(), "unused");
        let text = seg.run(&mut rx).unwrap();

        assert_eq!(text, "");
        assert_eq!(*capture.finalized.lock(), 0);
    }

    #[test]
    fn speech_accumulates_cumulatively_across_silence_blips() {
        // speech, blip, speech, blip, … — the accumulator must keep the
        // earlier speech time.
        let decisions = vec![true, false, true, false, true];
        let capture = Capture::default();
        let mut seg = segmenter_with(decisions, capture, "unused");

        for i in 0..5 {
            seg.process(tagged_frame(i)).unwrap();
        }
        assert_eq!(seg.speech_accum_ms(), 60);
        assert_eq!(seg.state(), SegmenterState::PreSpeech);
    }

    #[test]
    fn transition_is_inclusive_on_the_crossing_frame() {
        // 250 ms threshold at 20 ms frames → 13th speech frame crosses
        // (12 × 20 = 240 < 250 ≤ 13 × 20 = 260).
        let capture = Capture::default();
        let mut seg = segmenter_with(vec![true; 64], capture.clone(), "unused");

        for i in 0..12 {
            seg.process(tagged_frame(i)).unwrap();
            assert_eq!(seg.state(), SegmenterState::PreSpeech);
        }

        seg.process(tagged_frame(12)).unwrap();
        assert_eq!(seg.state(), SegmenterState::InSpeech);
        assert_eq!(seg.speech_accum_ms(), 260);

        // Pre-roll (all 13 frames fit in the 15-frame ring) was replayed in
        // arrival order, triggering frame included exactly once.
        assert_eq!(
            *capture.accepted.lock(),
            (0..13).collect::<Vec<i16>>()
        );
    }

    #[test]
    fn preroll_holds_only_most_recent_frames_at_transition() {
        // 20 non-speech frames, then speech: at the transition the ring
        // must contain the newest 15 frames only (300 ms / 20 ms).
        let mut decisions = vec![false; 20];
        decisions.extend(vec![true; 13]);
        let capture = Capture::default();
        let mut seg = segmenter_with(decisions, capture.clone(), "unused");

        for i in 0..20 {
            seg.process(tagged_frame(i)).unwrap();
            assert!(seg.preroll_len() <= 15);
        }
        for i in 20..33 {
            seg.process(tagged_frame(i)).unwrap();
        }

        assert_eq!(seg.state(), SegmenterState::InSpeech);
        // Frames 18..33: the last two non-speech frames plus all 13 speech
        // frames.
        assert_eq!(
            *capture.accepted.lock(),
            (18..33).collect::<Vec<i16>>()
        );
    }

    #[test]
    fn silence_counter_resets_on_speech_and_finalizes_inclusively() {
        // InSpeech: a lone speech frame inside the trailing silence must
        // restart the countdown.
        let mut decisions = vec![true; 13]; // reach InSpeech
        decisions.extend(vec![false; 10]); // 200 ms silence
        decisions.push(true); // reset
        decisions.extend(vec![false; 40]); // full silence run
        let capture = Capture::default();
        let mut seg = segmenter_with(decisions, capture.clone(), "  hello world  ");

        let mut finalized_at = None;
        for i in 0..64 {
            match seg.process(tagged_frame(i)).unwrap() {
                SegmentStep::Continue => {}
                SegmentStep::Finalized(text) => {
                    finalized_at = Some((i, text));
                    break;
                }
            }
        }

        // 13 speech + 10 silence + 1 speech + 35 silence → finalize on the
        // 35th silence frame after the reset (35 × 20 = 700).
        let (idx, text) = finalized_at.expect("session must finalize");
        assert_eq!(idx, 13 + 10 + 1 + 35 - 1);
        assert_eq!(text, "hello world");
        assert_eq!(*capture.finalized.lock(), 1);
    }

    #[test]
    fn reference_scenario_20_nonspeech_13_speech_36_silence() {
        // The canonical tuning scenario: 16 kHz / 20 ms frames,
        // speech 250 ms, silence 700 ms, pre-roll 300 ms (15 frames).
        let mut decisions = vec![false; 20];
        decisions.extend(vec![true; 13]);
        decisions.extend(vec![false; 36]);
        let capture = Capture::default();
        let mut seg = segmenter_with(decisions, capture.clone(), "turn on the lights");

        let mut consumed = 0;
        let mut result = None;
        for i in 0..69 {
            consumed += 1;
            if let SegmentStep::Finalized(text) = seg.process(tagged_frame(i)).unwrap() {
                result = Some(text);
                break;
            }
            // Transition exactly on the 13th speech frame (overall #33).
            if i < 32 {
                assert_eq!(seg.state(), SegmenterState::PreSpeech);
            } else {
                assert_eq!(seg.state(), SegmenterState::InSpeech);
            }
        }

        assert_eq!(result.as_deref(), Some("turn on the lights"));
        // 20 + 13 + 35: the 36th silence frame is never consumed.
        assert_eq!(consumed, 68);

        // Recognizer saw the 15-frame pre-roll replay plus the 35 frames
        // that followed the transition.
        let accepted = capture.accepted.lock();
        assert_eq!(accepted.len(), 15 + 35);
        assert_eq!(accepted[0], 18);
        assert_eq!(*accepted.last().unwrap(), 67);
    }

    #[test]
    fn zero_preroll_still_feeds_the_triggering_frame() {
        // preroll_ms 0 is a valid "no pre-roll" tuning: earlier audio is
        // lost by design, but the frame that crosses the speech threshold
        // must reach the recognizer.
        let config = PipelineConfig {
            preroll_ms: 0,
            ..test_config()
        };
        let capture = Capture::default();
        let mut seg = UtteranceSegmenter::new(
            &config,
            Box::new(ScriptedVad::new(vec![true; 13])),
            Box::new(RecordingRecognizer::new(capture.clone(), "unused")),
        );

        for i in 0..13 {
            seg.process(tagged_frame(i)).unwrap();
        }

        assert_eq!(seg.state(), SegmenterState::InSpeech);
        // Only the triggering frame — nothing was buffered before it.
        assert_eq!(*capture.accepted.lock(), vec![12]);
    }

    #[test]
    fn recognizer_fault_aborts_the_session() {
        let mut seg = UtteranceSegmenter::new(
            &test_config(),
            Box::new(ScriptedVad::new(vec![true; 20])),
            Box::new(FaultyRecognizer),
        );

        let mut result = Ok(());
        for i in 0..20 {
            if let Err(e) = seg.process(tagged_frame(i)) {
                result = Err(e);
                break;
            }
        }
        assert!(matches!(result, Err(HarkError::Recognizer(_))));
    }

    #[test]
    fn fresh_segmenter_starts_with_clean_counters() {
        let seg = segmenter_with(vec![], Capture::default(), "unused");
        assert_eq!(seg.state(), SegmenterState::PreSpeech);
        assert_eq!(seg.speech_accum_ms(), 0);
        assert_eq!(seg.silence_accum_ms(), 0);
        assert_eq!(seg.preroll_len(), 0);
    }
}
