//! Energy-based utterance segmentation
//!
//! Splits a microphone stream into utterances: speech starts when RMS energy
//! crosses a threshold and ends after a stretch of silence.

use std::time::Duration;

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to count as an utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends an utterance (in samples)
const SILENCE_SAMPLES: usize = 11_200; // 0.7 seconds

/// Longest utterance before it is cut and transcribed as-is (30 seconds)
const MAX_UTTERANCE_SAMPLES: usize = 30 * SAMPLE_RATE as usize;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Speech in progress, accumulating
    Speaking,
}

/// Accumulates speech and reports when an utterance is complete
pub struct UtteranceSegmenter {
    state: SegmenterState,
    speech_buffer: Vec<f32>,
    voiced_samples: usize,
    silence_counter: usize,
    idle_samples: usize,
}

impl UtteranceSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmenterState::Idle,
            speech_buffer: Vec::new(),
            voiced_samples: 0,
            silence_counter: 0,
            idle_samples: 0,
        }
    }

    /// Process audio samples
    ///
    /// Returns true once enough speech followed by silence has been seen, or
    /// once the utterance reaches [`MAX_UTTERANCE_SAMPLES`]
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.voiced_samples = samples.len();
                    self.silence_counter = 0;
                    self.idle_samples = 0;
                    tracing::trace!(energy, "speech detected");
                } else {
                    self.idle_samples += samples.len();
                }
            }
            SegmenterState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.voiced_samples += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.is_complete() {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return true;
                }

                // Steady background noise never goes quiet
                if self.speech_buffer.len() >= MAX_UTTERANCE_SAMPLES {
                    tracing::debug!(
                        samples = self.speech_buffer.len(),
                        "utterance cut at maximum length"
                    );
                    return true;
                }

                // Too much silence without enough speech: it was noise
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("noise burst discarded");
                    self.reset();
                }
            }
        }

        false
    }

    /// Whether the buffered speech forms a complete utterance
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, SegmenterState::Speaking)
            && self.silence_counter > SILENCE_SAMPLES
            && self.voiced_samples > MIN_SPEECH_SAMPLES
    }

    /// Whether enough speech is buffered to be worth transcribing
    #[must_use]
    pub fn has_speech(&self) -> bool {
        matches!(self.state, SegmenterState::Speaking) && self.voiced_samples > MIN_SPEECH_SAMPLES
    }

    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Take the utterance, returning to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.speech_buffer);
        self.reset();
        utterance
    }

    /// Feed the last captured samples and take whatever speech is buffered
    ///
    /// Used when a session is asked to finish early: speech that has not yet
    /// been followed by silence is still worth transcribing.
    pub fn flush(&mut self, tail: &[f32]) -> Option<Vec<f32>> {
        if !tail.is_empty() {
            self.process(tail);
        }

        if self.has_speech() {
            Some(self.take_utterance())
        } else {
            self.reset();
            None
        }
    }

    /// How long the segmenter has heard nothing but silence
    #[must_use]
    pub fn idle_duration(&self) -> Duration {
        Duration::from_millis(self.idle_samples as u64 * 1000 / u64::from(SAMPLE_RATE))
    }

    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.speech_buffer.clear();
        self.voiced_samples = 0;
        self.silence_counter = 0;
        self.idle_samples = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn test_noise_burst_is_discarded() {
        let mut segmenter = UtteranceSegmenter::new();

        // Short blip, well under the minimum speech length
        assert!(!segmenter.process(&vec![0.5f32; 800]));
        assert_eq!(segmenter.state(), SegmenterState::Speaking);

        let silence = vec![0.0f32; SILENCE_SAMPLES * 2 + 1];
        assert!(!segmenter.process(&silence));
        assert_eq!(segmenter.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_constant_noise_is_cut_at_maximum_length() {
        let mut segmenter = UtteranceSegmenter::new();
        let chunk = vec![0.1f32; 1600];
        let chunks_to_cap = MAX_UTTERANCE_SAMPLES / chunk.len();

        for _ in 1..chunks_to_cap {
            assert!(!segmenter.process(&chunk));
        }
        assert!(segmenter.process(&chunk));
        assert!(!segmenter.is_complete());

        let utterance = segmenter.take_utterance();
        assert_eq!(utterance.len(), MAX_UTTERANCE_SAMPLES);
        assert_eq!(segmenter.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_flush_takes_unfinished_speech() {
        let mut segmenter = UtteranceSegmenter::new();
        segmenter.process(&vec![0.5f32; 4000]);

        // Still speaking when the session is told to finish
        let utterance = segmenter.flush(&vec![0.5f32; 1600]).unwrap();
        assert_eq!(utterance.len(), 5600);
        assert_eq!(segmenter.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_flush_drops_too_little_speech() {
        let mut segmenter = UtteranceSegmenter::new();
        segmenter.process(&vec![0.5f32; 800]);

        assert!(segmenter.flush(&[]).is_none());
        assert_eq!(segmenter.state(), SegmenterState::Idle);
        assert!(segmenter.speech_buffer().is_empty());
    }

    #[test]
    fn test_idle_duration_accumulates() {
        let mut segmenter = UtteranceSegmenter::new();
        segmenter.process(&vec![0.0f32; SAMPLE_RATE as usize]);
        segmenter.process(&vec![0.0f32; SAMPLE_RATE as usize]);
        assert_eq!(segmenter.idle_duration(), Duration::from_secs(2));

        segmenter.process(&vec![0.5f32; 1600]);
        assert_eq!(segmenter.idle_duration(), Duration::ZERO);
    }
}
