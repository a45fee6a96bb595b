//! Session state and turns

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the assistant is in its listen/speak cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not active; microphone and speaker released
    #[default]
    Idle,
    /// Waiting for the user to finish an utterance
    Listening,
    /// Correcting and synthesizing the last utterance
    Processing,
    /// Playing back the corrected speech, including the cooldown after it
    Speaking,
}

impl SessionState {
    /// Whether the user has the assistant switched on
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Processing => write!(f, "processing"),
            Self::Speaking => write!(f, "speaking"),
        }
    }
}

/// One utterance and its spoken correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    id: u64,
    original_text: String,
    corrected_text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    #[must_use]
    pub const fn new(
        id: u64,
        original_text: String,
        corrected_text: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            original_text,
            corrected_text,
            created_at,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The transcript as recognized
    #[must_use]
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    /// The text that was spoken back
    #[must_use]
    pub fn corrected_text(&self) -> &str {
        &self.corrected_text
    }

    /// When the transcript was accepted
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn was_corrected(&self) -> bool {
        self.original_text != self.corrected_text
    }
}

/// Everything observers may read about the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Processing guard: a turn is in flight
    pub processing: bool,
    /// Most recently completed turn
    pub turn: Option<Turn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Listening.to_string(), "listening");
        assert_eq!(SessionState::Processing.to_string(), "processing");
        assert_eq!(SessionState::Speaking.to_string(), "speaking");
    }

    #[test]
    fn only_idle_is_inactive() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Listening.is_active());
        assert!(SessionState::Speaking.is_active());
    }

    #[test]
    fn turn_correction_flag() {
        let now = Utc::now();
        let same = Turn::new(1, "hello".into(), "hello".into(), now);
        let fixed = Turn::new(2, "helo".into(), "Hello.".into(), now);
        assert!(!same.was_corrected());
        assert!(fixed.was_corrected());
    }

    #[test]
    fn snapshot_defaults_to_idle() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(!snapshot.processing);
        assert!(snapshot.turn.is_none());
    }
}
