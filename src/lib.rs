//! Clarion - voice amplification assistant
//!
//! Listens to the user, clarifies what was said with a language model, and
//! speaks the result back through the speaker in a chosen voice.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Turn Coordinator                    │
//! │   Idle → Listening → Processing → Speaking → ...    │
//! └──────┬──────────────────┬───────────────────┬───────┘
//!        │                  │                   │
//! ┌──────▼──────┐   ┌───────▼────────┐   ┌──────▼───────┐
//! │ Recognition │   │ Correction+TTS │   │   Playback   │
//! │  mic + STT  │   │    pipeline    │   │  + cooldown  │
//! └─────────────┘   └────────────────┘   └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use session::{
    CoordinatorHandle, Notice, SessionSnapshot, SessionState, Turn, TurnCoordinator,
};
pub use voice::{VoicePreset, VoiceProfile};
