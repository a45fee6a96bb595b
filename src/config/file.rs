//! TOML configuration file loading
//!
//! Supports `~/.config/clarion/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ClarionConfigFile {
    /// Voice and playback configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Speech recognition configuration
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Speech-to-text backend
    #[serde(default)]
    pub stt: ProviderFileConfig,

    /// Text-to-speech backend
    #[serde(default)]
    pub tts: ProviderFileConfig,

    /// Transcript correction
    #[serde(default)]
    pub correction: CorrectionFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

impl ClarionConfigFile {
    /// Parse a config file body
    ///
    /// # Errors
    ///
    /// Returns error if the body is not valid TOML for this schema
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Voice and playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Voice preset ("feminine" or "masculine")
    pub preset: Option<String>,

    /// Output gain, 0.0 to 1.0
    pub gain: Option<f32>,

    /// Silence after each playback, in milliseconds
    pub cooldown_ms: Option<u64>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    /// BCP-47 locale (e.g. "en-US")
    pub locale: Option<String>,

    /// Emit partial transcripts
    pub interim_results: Option<bool>,

    /// Seconds of silence before a session reports no speech
    pub no_speech_timeout_secs: Option<u64>,
}

/// Provider selection
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// Provider name (e.g. "whisper", "google")
    pub provider: Option<String>,

    /// Provider model identifier
    pub model: Option<String>,
}

/// Transcript correction configuration
#[derive(Debug, Default, Deserialize)]
pub struct CorrectionFileConfig {
    /// Chat completions base URL
    pub base_url: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Transcripts shorter than this are spoken as-is
    pub min_chars: Option<usize>,

    /// Seconds to wait for a correction
    pub timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub google: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ClarionConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ClarionConfigFile {
    config_file_path().map_or_else(ClarionConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> ClarionConfigFile {
    if !path.exists() {
        return ClarionConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match ClarionConfigFile::parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ClarionConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ClarionConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/clarion/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("clarion").join("config.toml"))
}
