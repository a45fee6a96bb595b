//! Speech recognition capability
//!
//! A [`Recognizer`] runs one recognition session at a time. Every event it
//! emits is tagged with the [`SessionId`] passed to [`Recognizer::start`], so
//! the owner can detach a session by forgetting its id: anything that session
//! emits afterwards, including its own end-of-life event, is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies one recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

/// Recognition session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    /// BCP-47 locale, e.g. "en-US"
    pub locale: String,
    /// Keep listening after a final result instead of ending the session
    pub continuous: bool,
    /// Emit partial transcripts while the user is still speaking
    pub interim_results: bool,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            continuous: true,
            interim_results: false,
        }
    }
}

impl RecognitionOptions {
    /// Primary language subtag ("en" for "en-US")
    #[must_use]
    pub fn language(&self) -> &str {
        self.locale
            .split(['-', '_'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("en")
    }
}

/// Recognition failures reported by a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// No speech heard before the session timed out
    #[error("no speech detected")]
    NoSpeech,

    /// The session was aborted
    #[error("recognition aborted")]
    Aborted,

    /// Transcription backend unreachable or failed
    #[error("network error: {0}")]
    Network(String),

    /// Microphone access denied
    #[error("microphone access not allowed: {0}")]
    NotAllowed(String),

    /// Recognition unavailable on this platform
    #[error("speech recognition unsupported: {0}")]
    Unsupported(String),

    /// Capture device could not be opened or failed mid-session
    #[error("audio device error: {0}")]
    Device(String),
}

impl RecognitionError {
    /// Fatal errors stop the assistant; the rest are retried silently
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotAllowed(_) | Self::Unsupported(_) | Self::Device(_)
        )
    }
}

/// What happened in a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEventKind {
    Started,
    Result { text: String, is_final: bool },
    Error(RecognitionError),
    Ended,
}

/// An event from a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionEvent {
    pub session: SessionId,
    pub kind: RecognitionEventKind,
}

impl RecognitionEvent {
    #[must_use]
    pub const fn new(session: SessionId, kind: RecognitionEventKind) -> Self {
        Self { session, kind }
    }
}

/// Sender half handed to recognizers at construction
pub type RecognitionSender = mpsc::UnboundedSender<RecognitionEvent>;

/// Receiver half consumed by the turn coordinator
pub type RecognitionReceiver = mpsc::UnboundedReceiver<RecognitionEvent>;

/// Create the event channel a recognizer reports into
#[must_use]
pub fn recognition_channel() -> (RecognitionSender, RecognitionReceiver) {
    mpsc::unbounded_channel()
}

/// A speech recognition capability
///
/// Implementations deliver [`RecognitionEvent`]s through the sender they were
/// constructed with. A session ends with exactly one `Ended` event, whether
/// it stops on its own, is stopped, or is aborted.
pub trait Recognizer: Send {
    /// Begin a new session
    ///
    /// # Errors
    ///
    /// Returns error if recognition cannot start at all
    fn start(&mut self, session: SessionId) -> Result<(), RecognitionError>;

    /// Finish gracefully, delivering any pending final result
    fn stop(&mut self);

    /// Stop immediately, discarding any captured audio
    fn abort(&mut self);
}
