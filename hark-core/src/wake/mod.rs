//! Wake gating: continuous keyword evaluation of live frames.
//!
//! The gate pulls one frame at a time, asks the scorer for that frame's
//! per-keyword confidences and compares the best score against the wake
//! threshold. No score aggregation happens across frames — the scorer may
//! keep internal state, but the gate's decision is per frame. The gate
//! opens its frame source with a one-frame hand-off queue, so when scoring
//! is slower than capture the next evaluated frame is always the most
//! recently captured one (staleness bounded to a single frame; older
//! backlog is dropped rather than grown).

pub mod energy;

pub use energy::EnergyScorer;

use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::audio::frame::Frame;
use crate::audio::{FrameSource, FrameStream};
use crate::config::PipelineConfig;
use crate::error::Result;

/// Hand-off depth for the gate's frame source: evaluate-latest semantics.
const GATE_HANDOFF_FRAMES: usize = 1;

/// One keyword's confidence for a single frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordScore {
    pub keyword: String,
    /// Confidence in [0, 1].
    pub score: f32,
}

/// The keyword that fired the gate, with its confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordHit {
    pub keyword: String,
    pub score: f32,
}

/// Maps one audio frame to per-keyword confidence scores.
///
/// The underlying model may be stateful internally; the gate treats each
/// returned score set as independent.
pub trait KeywordScorer: Send + 'static {
    /// Score one frame. An empty result means "no opinion" and never fires
    /// the gate.
    ///
    /// # Errors
    /// A scorer fault aborts the session (the frame's classification would
    /// be undefined).
    fn score(&mut self, frame: &Frame) -> Result<Vec<KeywordScore>>;
}

/// Blocks on live frames until a keyword crosses the wake threshold.
pub struct WakeGate {
    threshold: f32,
    scorer: Box<dyn KeywordScorer>,
}

impl WakeGate {
    pub fn new(threshold: f32, scorer: Box<dyn KeywordScorer>) -> Self {
        Self { threshold, scorer }
    }

    /// Open the configured device and block until a keyword fires or the
    /// run flag is cleared.
    ///
    /// Returns `Ok(Some(hit))` exactly once per call on the first frame
    /// whose best score reaches the threshold (inclusive), `Ok(None)` if
    /// capture ends first. The device is closed before returning on every
    /// path.
    pub fn activate(
        &mut self,
        config: &PipelineConfig,
        running: Arc<AtomicBool>,
    ) -> Result<Option<KeywordHit>> {
        let mut source = FrameSource::start_with(config, GATE_HANDOFF_FRAMES, running)?;
        let hit = self.wait_for_hit(source.frames())?;
        source.stop();
        Ok(hit)
    }

    /// Gate an already-open frame stream. Exposed separately so tests can
    /// drive the gate from an in-memory channel.
    pub fn wait_for_hit(&mut self, frames: &mut FrameStream) -> Result<Option<KeywordHit>> {
        while let Some(frame) = frames.next() {
            let scores = self.scorer.score(&frame)?;
            let Some(best) = scores
                .iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
            else {
                continue;
            };

            trace!(keyword = %best.keyword, score = best.score, "frame scored");

            if best.score >= self.threshold {
                debug!(keyword = %best.keyword, score = best.score, "wake keyword hit");
                return Ok(Some(KeywordHit {
                    keyword: best.keyword.clone(),
                    score: best.score,
                }));
            }
        }
        // Stream ended before any hit: cancellation, not an error.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame_channel;

    struct ScriptedScorer {
        scores: Vec<f32>,
        calls: usize,
    }

    impl KeywordScorer for ScriptedScorer {
        fn score(&mut self, _frame: &Frame) -> Result<Vec<KeywordScore>> {
            let score = self.scores.get(self.calls).copied().unwrap_or(0.0);
            self.calls += 1;
            Ok(vec![KeywordScore {
                keyword: "hey hark".into(),
                score,
            }])
        }
    }

    struct FailingScorer;

    impl KeywordScorer for FailingScorer {
        fn score(&mut self, _frame: &Frame) -> Result<Vec<KeywordScore>> {
            Err(crate::error::HarkError::Scorer("model fault".into()))
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0i16; 320], 16_000)
    }

    #[test]
    fn fires_on_first_frame_reaching_threshold() {
        let (tx, mut rx) = frame_channel(8);
        for _ in 0..3 {
            tx.send(frame());
        }
        drop(tx);

        let scorer = ScriptedScorer {
            scores: vec![0.2, 0.4, 0.6],
            calls: 0,
        };
        let mut gate = WakeGate::new(0.5, Box::new(scorer));

        let hit = gate.wait_for_hit(&mut rx).unwrap().expect("hit expected");
        assert_eq!(hit.keyword, "hey hark");
        assert!((hit.score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn threshold_is_inclusive() {
        let (tx, mut rx) = frame_channel(8);
        tx.send(frame());
        drop(tx);

        let scorer = ScriptedScorer {
            scores: vec![0.5],
            calls: 0,
        };
        let mut gate = WakeGate::new(0.5, Box::new(scorer));
        assert!(gate.wait_for_hit(&mut rx).unwrap().is_some());
    }

    #[test]
    fn stream_end_returns_no_hit() {
        let (tx, mut rx) = frame_channel(8);
        for _ in 0..10 {
            tx.send(frame());
        }
        drop(tx);

        let scorer = ScriptedScorer {
            scores: vec![0.1; 10],
            calls: 0,
        };
        let mut gate = WakeGate::new(0.5, Box::new(scorer));
        assert!(gate.wait_for_hit(&mut rx).unwrap().is_none());
    }

    #[test]
    fn picks_highest_scoring_keyword() {
        struct TwoKeywordScorer;
        impl KeywordScorer for TwoKeywordScorer {
            fn score(&mut self, _frame: &Frame) -> Result<Vec<KeywordScore>> {
                Ok(vec![
                    KeywordScore {
                        keyword: "alpha".into(),
                        score: 0.3,
                    },
                    KeywordScore {
                        keyword: "bravo".into(),
                        score: 0.9,
                    },
                ])
            }
        }

        let (tx, mut rx) = frame_channel(8);
        tx.send(frame());
        drop(tx);

        let mut gate = WakeGate::new(0.5, Box::new(TwoKeywordScorer));
        let hit = gate.wait_for_hit(&mut rx).unwrap().unwrap();
        assert_eq!(hit.keyword, "bravo");
    }

    #[test]
    fn scorer_fault_aborts_session() {
        let (tx, mut rx) = frame_channel(8);
        tx.send(frame());
        drop(tx);

        let mut gate = WakeGate::new(0.5, Box::new(FailingScorer));
        assert!(gate.wait_for_hit(&mut rx).is_err());
    }
}
