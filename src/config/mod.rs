//! Configuration management for Clarion

pub mod file;

use std::time::Duration;

use crate::session::{DEFAULT_COOLDOWN, PipelineSettings, TurnSettings};
use crate::voice::{
    DEFAULT_CORRECTION_TIMEOUT, DEFAULT_GAIN, DEFAULT_MIN_CHARS, DEFAULT_NO_SPEECH_TIMEOUT,
    RecognitionOptions, SttProvider, TtsProvider, VoicePreset, VoiceProfile,
};
use crate::{Error, Result};

use self::file::ClarionConfigFile;

/// Default chat completions endpoint for correction
pub const DEFAULT_CORRECTION_URL: &str = "https://api.openai.com/v1";

/// Default correction model
pub const DEFAULT_CORRECTION_MODEL: &str = "gpt-4o-mini";

/// Clarion configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Voice preset and output gain
    pub voice: VoiceProfile,

    /// Silence after each playback; the sequencer raises it to its minimum
    pub cooldown: Duration,

    /// Recognition session options
    pub recognition: RecognitionOptions,

    /// Silence before a recognition session reports no speech
    pub no_speech_timeout: Duration,

    /// Speech-to-text backend
    pub stt: SttConfig,

    /// Text-to-speech backend
    pub tts: TtsConfig,

    /// Transcript correction
    pub correction: CorrectionConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttProvider,

    /// Model identifier (e.g. "whisper-1", "nova-2")
    pub model: String,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,

    /// Model identifier; only used by `OpenAI` (e.g. "tts-1")
    pub model: String,
}

/// Transcript correction configuration
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    /// Chat completions base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Transcripts shorter than this are spoken as-is
    pub min_chars: usize,

    /// How long to wait for a correction before speaking the original
    pub timeout: Duration,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, TTS, correction)
    pub openai: Option<String>,

    /// Google Cloud API key (Text-to-Speech)
    pub google: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn from_sources(
        fc: ClarionConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            google: env("GOOGLE_API_KEY").or(fc.api_keys.google),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        // Voice (env > toml > default)
        let preset = match env("CLARION_VOICE").or(fc.voice.preset) {
            Some(name) => name.parse::<VoicePreset>()?,
            None => VoicePreset::default(),
        };
        let gain = match env("CLARION_GAIN") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .map_err(|e| Error::Config(format!("invalid CLARION_GAIN {raw:?}: {e}")))?,
            None => fc.voice.gain.unwrap_or(DEFAULT_GAIN),
        };
        let voice = VoiceProfile::new(preset, gain)?;

        let cooldown_ms = match env("CLARION_COOLDOWN_MS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("invalid CLARION_COOLDOWN_MS {raw:?}: {e}"))
            })?),
            None => fc.voice.cooldown_ms,
        };
        let cooldown = cooldown_ms.map_or(DEFAULT_COOLDOWN, Duration::from_millis);

        let recognition = RecognitionOptions {
            locale: env("CLARION_LOCALE")
                .or(fc.recognition.locale)
                .unwrap_or_else(|| RecognitionOptions::default().locale),
            continuous: true,
            interim_results: fc.recognition.interim_results.unwrap_or(false),
        };
        let no_speech_timeout = fc
            .recognition
            .no_speech_timeout_secs
            .map_or(DEFAULT_NO_SPEECH_TIMEOUT, Duration::from_secs);

        let stt_provider = match env("CLARION_STT_PROVIDER").or(fc.stt.provider) {
            Some(name) => name.parse::<SttProvider>()?,
            None => SttProvider::default(),
        };
        let default_stt_model = match stt_provider {
            SttProvider::Whisper => "whisper-1",
            SttProvider::Deepgram => "nova-2",
        };
        let stt = SttConfig {
            provider: stt_provider,
            model: fc
                .stt
                .model
                .unwrap_or_else(|| default_stt_model.to_string()),
        };

        let tts_provider = match env("CLARION_TTS_PROVIDER").or(fc.tts.provider) {
            Some(name) => name.parse::<TtsProvider>()?,
            None => TtsProvider::default(),
        };
        let tts = TtsConfig {
            provider: tts_provider,
            model: fc.tts.model.unwrap_or_else(|| "tts-1".to_string()),
        };

        let correction = CorrectionConfig {
            base_url: env("CLARION_CORRECTION_URL")
                .or(fc.correction.base_url)
                .unwrap_or_else(|| DEFAULT_CORRECTION_URL.to_string()),
            model: env("CLARION_CORRECTION_MODEL")
                .or(fc.correction.model)
                .unwrap_or_else(|| DEFAULT_CORRECTION_MODEL.to_string()),
            min_chars: fc.correction.min_chars.unwrap_or(DEFAULT_MIN_CHARS),
            timeout: fc
                .correction
                .timeout_secs
                .map_or(DEFAULT_CORRECTION_TIMEOUT, Duration::from_secs),
        };

        tracing::debug!(
            preset = %voice.preset(),
            gain = voice.gain(),
            cooldown_ms = cooldown.as_millis(),
            stt = ?stt.provider,
            tts = ?tts.provider,
            "configuration loaded"
        );

        Ok(Self {
            voice,
            cooldown,
            recognition,
            no_speech_timeout,
            stt,
            tts,
            correction,
            api_keys,
        })
    }

    /// Settings for the turn coordinator
    #[must_use]
    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            pipeline: PipelineSettings {
                min_chars: self.correction.min_chars,
                correction_timeout: self.correction.timeout,
            },
            cooldown: self.cooldown,
            profile: self.voice,
        }
    }

    /// Key for the configured STT provider
    #[must_use]
    pub fn stt_api_key(&self) -> Option<&str> {
        match self.stt.provider {
            SttProvider::Whisper => self.api_keys.openai.as_deref(),
            SttProvider::Deepgram => self.api_keys.deepgram.as_deref(),
        }
    }

    /// Key for the configured TTS provider
    #[must_use]
    pub fn tts_api_key(&self) -> Option<&str> {
        match self.tts.provider {
            TtsProvider::Google => self.api_keys.google.as_deref(),
            TtsProvider::OpenAI => self.api_keys.openai.as_deref(),
        }
    }
}
