//! The interactive session loop: wake → listen → transcribe → chat → speak.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use hark_core::{
    EnergyScorer, EnergyVad, PipelineConfig, UtteranceSegmenter, WakeGate,
};

use crate::assistant::{Assistant, OpenAiChat};
use crate::error::Result;
use crate::playback::SpeechPlayer;
use crate::recognizer::WhisperHttpRecognizer;
use crate::settings::RunArgs;
use crate::tts::{OpenAiTts, Synthesizer};

pub struct Session {
    args: RunArgs,
    config: PipelineConfig,
    assistant: Assistant,
    tts: Box<dyn Synthesizer>,
    player: SpeechPlayer,
    running: Arc<AtomicBool>,
}

impl Session {
    pub fn new(args: RunArgs, running: Arc<AtomicBool>) -> Result<Self> {
        let config = args.pipeline_config();
        config.validate()?;
        if args.openai_api_key.is_empty() {
            return Err(crate::error::AppError::Config(
                "OPENAI_API_KEY is required for the session loop".into(),
            ));
        }

        let transport = OpenAiChat::new(
            args.openai_api_key.clone(),
            args.openai_base_url.clone(),
            args.chat_model.clone(),
        );
        let assistant = Assistant::new(Box::new(transport), &args.system_prompt, args.max_turns);
        let tts = Box::new(OpenAiTts::new(
            args.openai_api_key.clone(),
            args.openai_base_url.clone(),
            args.tts_model.clone(),
            args.tts_voice.clone(),
        ));

        Ok(Self {
            args,
            config,
            assistant,
            tts,
            player: SpeechPlayer::new(),
            running,
        })
    }

    /// Run turns until capture ends or the run flag is cleared.
    ///
    /// Per turn: block on the wake gate, record one utterance, send the
    /// transcript to the assistant and speak the reply. An empty transcript
    /// (nothing said, or cancellation mid-recording) skips the turn.
    pub fn run(mut self) -> Result<()> {
        info!(keyword = %self.args.wake_keyword, "session started, waiting for the wake keyword");

        while self.running.load(Ordering::SeqCst) {
            let mut gate = WakeGate::new(
                self.config.wake_threshold,
                Box::new(EnergyScorer::new(self.args.wake_keyword.clone())),
            );
            let Some(hit) = gate.activate(&self.config, Arc::clone(&self.running))? else {
                info!("capture ended without a wake hit, stopping");
                break;
            };
            info!(keyword = %hit.keyword, score = hit.score, "awake, listening");

            let segmenter = UtteranceSegmenter::new(
                &self.config,
                Box::new(EnergyVad::new(
                    self.args.vad_threshold,
                    self.args.vad_hangover_frames,
                )),
                Box::new(WhisperHttpRecognizer::new(
                    self.args.openai_api_key.clone(),
                    self.args.openai_base_url.clone(),
                    self.args.stt_model.clone(),
                )),
            );
            let transcript =
                segmenter.record_and_transcribe(&self.config, Arc::clone(&self.running))?;
            if transcript.is_empty() {
                info!("no utterance recognised");
                continue;
            }
            info!(%transcript, "utterance transcribed");

            let reply = match self.assistant.chat(&transcript) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "chat failed, skipping this turn");
                    continue;
                }
            };
            info!(%reply, "assistant replied");

            if !self.args.mute {
                self.speak(&reply);
            }
        }

        info!("session loop stopped");
        Ok(())
    }

    fn speak(&self, reply: &str) {
        match self.tts.synthesize(reply) {
            Ok(mp3) => {
                if let Err(e) = self.player.play_mp3(&mp3) {
                    warn!(error = %e, "playback failed");
                }
            }
            Err(e) => warn!(error = %e, "speech synthesis failed"),
        }
    }
}
