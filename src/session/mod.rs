//! Conversation session
//!
//! The turn coordinator, the correction/synthesis pipeline it runs for each
//! turn, and the playback sequencer that enforces the post-speech cooldown.

mod coordinator;
mod pipeline;
mod sequencer;
mod turn;

pub use coordinator::{
    Collaborators, Command, CoordinatorHandle, Notice, TurnCoordinator, TurnSettings,
};
pub use pipeline::{PipelineOutcome, PipelineSettings, Speech, TurnPipeline};
pub use sequencer::{DEFAULT_COOLDOWN, MIN_COOLDOWN, PlaybackSequencer};
pub use turn::{SessionSnapshot, SessionState, Turn};
