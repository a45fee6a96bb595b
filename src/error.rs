//! Error types for Clarion

use thiserror::Error;

/// Result type alias for Clarion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Clarion
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Transcript correction error
    #[error("correction error: {0}")]
    Correction(String),

    /// Audio decoding error
    #[error("decode error: {0}")]
    Decode(String),

    /// The turn coordinator is no longer running
    #[error("session closed")]
    Closed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Base64 transport decoding error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
