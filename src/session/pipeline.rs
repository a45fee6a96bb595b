//! Correction and synthesis for one turn
//!
//! Runs strictly in sequence: clarify the transcript, synthesize the result,
//! decode the audio. Every collaborator failure is folded into the returned
//! [`Speech`] so the coordinator only ever sees an outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::turn::Turn;
use crate::Error;
use crate::voice::{
    Corrector, DEFAULT_CORRECTION_TIMEOUT, DEFAULT_MIN_CHARS, PcmBuffer, Synthesizer,
    VoiceProfile, clarify, decode_pcm16,
};

/// Audio produced for a turn
#[derive(Debug)]
pub enum Speech {
    /// Decoded and ready to play
    Ready(PcmBuffer),
    /// Synthesis failed or returned nothing; nothing to play
    Silent,
    /// Audio came back but could not be decoded
    Broken(Error),
}

/// Result of running the pipeline for one turn
#[derive(Debug)]
pub struct PipelineOutcome {
    pub turn: Turn,
    pub speech: Speech,
}

/// Correction and synthesis settings
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Transcripts shorter than this skip correction
    pub min_chars: usize,
    pub correction_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            correction_timeout: DEFAULT_CORRECTION_TIMEOUT,
        }
    }
}

/// The correction then synthesis sequence
pub struct TurnPipeline {
    corrector: Arc<dyn Corrector>,
    synthesizer: Arc<dyn Synthesizer>,
    settings: PipelineSettings,
}

impl TurnPipeline {
    #[must_use]
    pub fn new(
        corrector: Arc<dyn Corrector>,
        synthesizer: Arc<dyn Synthesizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            corrector,
            synthesizer,
            settings,
        }
    }

    /// Run the whole sequence for one accepted transcript
    pub async fn run(
        &self,
        id: u64,
        original: String,
        created_at: DateTime<Utc>,
        profile: VoiceProfile,
    ) -> PipelineOutcome {
        let corrected = clarify(
            self.corrector.as_ref(),
            &original,
            self.settings.min_chars,
            self.settings.correction_timeout,
        )
        .await;

        let speech = self.speak(&corrected, &profile).await;

        PipelineOutcome {
            turn: Turn::new(id, original, corrected, created_at),
            speech,
        }
    }

    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Speech {
        let audio = match self.synthesizer.synthesize(text, profile).await {
            Ok(Some(audio)) => audio,
            Ok(None) => {
                tracing::warn!("synthesis returned no audio");
                return Speech::Silent;
            }
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed");
                return Speech::Silent;
            }
        };

        match decode_pcm16(&audio.data, audio.format) {
            Ok(buffer) if buffer.is_empty() => {
                tracing::warn!("synthesized audio decoded to nothing");
                Speech::Silent
            }
            Ok(buffer) => {
                tracing::debug!(
                    frames = buffer.frames(),
                    sample_rate = buffer.sample_rate(),
                    channels = buffer.channels(),
                    "speech ready"
                );
                Speech::Ready(buffer)
            }
            Err(e) => Speech::Broken(e),
        }
    }
}
