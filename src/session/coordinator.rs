//! Turn coordinator - the assistant's state machine
//!
//! A single task owns all session state and reacts to three inbound streams:
//! user commands, recognition events, and progress reports from the
//! correction/synthesis and playback tasks it spawns. State and the
//! processing guard live in a `watch` channel so every decision reads the
//! current value and every observer sees the same snapshot.
//!
//! Transitions:
//!
//! ```text
//! Idle -> Listening            activate
//! Listening -> Processing      final transcript, guard clear
//! Processing -> Speaking       audio decoded
//! Processing -> Listening      no audio produced
//! Speaking -> Listening        playback and cooldown complete
//! Processing|Speaking -> Idle  decode or playback failure
//! any -> Idle                  deactivate, fatal recognition error
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};

use super::pipeline::{PipelineOutcome, PipelineSettings, Speech, TurnPipeline};
use super::sequencer::{DEFAULT_COOLDOWN, PlaybackSequencer};
use super::turn::{SessionSnapshot, SessionState};
use crate::voice::{
    Corrector, PlaybackDevice, RecognitionError, RecognitionEvent, RecognitionEventKind,
    RecognitionReceiver, Recognizer, SessionId, Synthesizer, VoiceProfile,
};
use crate::{Error, Result};

/// Requests from the user interface
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Activate,
    Deactivate,
    SetVoiceProfile(VoiceProfile),
    /// Switch to the next voice preset, keeping the gain
    CycleVoice,
    Shutdown,
}

/// Out-of-band messages for the user interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Partial transcript while the user is still speaking
    Interim(String),
    /// Something failed and the assistant returned to idle
    Fault(String),
}

/// Timing and voice settings for the coordinator
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub pipeline: PipelineSettings,
    pub cooldown: std::time::Duration,
    pub profile: VoiceProfile,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            cooldown: DEFAULT_COOLDOWN,
            profile: VoiceProfile::default(),
        }
    }
}

/// The capabilities the coordinator drives
pub struct Collaborators {
    pub recognizer: Box<dyn Recognizer>,
    /// Receiver for the events `recognizer` emits
    pub recognition_events: RecognitionReceiver,
    pub corrector: Arc<dyn Corrector>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub playback: Arc<dyn PlaybackDevice>,
}

/// Completion reports from spawned turn tasks
enum Progress {
    Processed { turn: u64, outcome: PipelineOutcome },
    Played { turn: u64, result: Result<()> },
}

/// Cloneable handle for driving and observing a running coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    live: watch::Receiver<SessionSnapshot>,
}

impl CoordinatorHandle {
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the coordinator has stopped
    pub fn activate(&self) -> Result<()> {
        self.send(Command::Activate)
    }

    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the coordinator has stopped
    pub fn deactivate(&self) -> Result<()> {
        self.send(Command::Deactivate)
    }

    /// Replace the voice profile; takes effect from the next turn
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the coordinator has stopped
    pub fn set_voice_profile(&self, profile: VoiceProfile) -> Result<()> {
        self.send(Command::SetVoiceProfile(profile))
    }

    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the coordinator has stopped
    pub fn cycle_voice(&self) -> Result<()> {
        self.send(Command::CycleVoice)
    }

    /// Deactivate and stop the coordinator task
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the coordinator has already stopped
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Current state, guard and last completed turn
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.live.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.live.borrow().state
    }

    /// Receiver that wakes on every snapshot change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.live.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Closed)
    }
}

/// Owns the session and sequences every turn
pub struct TurnCoordinator {
    live: watch::Sender<SessionSnapshot>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,

    recognizer: Box<dyn Recognizer>,
    recognition_events: RecognitionReceiver,
    /// Session whose events are honored; `None` when detached
    recognition: Option<SessionId>,
    next_session: u64,

    pipeline: Arc<TurnPipeline>,
    sequencer: PlaybackSequencer,
    profile: VoiceProfile,

    /// Turn whose tasks may still report progress
    in_flight: Option<u64>,
    next_turn: u64,
    progress_tx: mpsc::UnboundedSender<Progress>,
    progress: mpsc::UnboundedReceiver<Progress>,

    notices: mpsc::UnboundedSender<Notice>,
}

impl TurnCoordinator {
    /// Create an idle coordinator and the receiver for its notices
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        settings: TurnSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let Collaborators {
            recognizer,
            recognition_events,
            corrector,
            synthesizer,
            playback,
        } = collaborators;

        let (live, _) = watch::channel(SessionSnapshot::default());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (progress_tx, progress) = mpsc::unbounded_channel();
        let (notices, notices_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            live,
            commands_tx,
            commands,
            recognizer,
            recognition_events,
            recognition: None,
            next_session: 0,
            pipeline: Arc::new(TurnPipeline::new(corrector, synthesizer, settings.pipeline)),
            sequencer: PlaybackSequencer::new(playback, settings.cooldown),
            profile: settings.profile,
            in_flight: None,
            next_turn: 0,
            progress_tx,
            progress,
            notices,
        };

        (coordinator, notices_rx)
    }

    #[must_use]
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            commands: self.commands_tx.clone(),
            live: self.live.subscribe(),
        }
    }

    /// Process events until shut down, then release every device
    pub async fn run(mut self) {
        tracing::debug!("turn coordinator running");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        tracing::info!("shutdown requested");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.recognition_events.recv() => self.handle_recognition(event),
                Some(progress) = self.progress.recv() => self.handle_progress(progress),
            }
        }

        self.deactivate();
    }

    fn state(&self) -> SessionState {
        self.live.borrow().state
    }

    fn is_guarded(&self) -> bool {
        self.live.borrow().processing
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate => self.activate(),
            Command::Deactivate => self.deactivate(),
            Command::SetVoiceProfile(profile) => self.set_profile(profile),
            Command::CycleVoice => {
                let profile = self.profile.with_preset(self.profile.preset().next());
                self.set_profile(profile);
            }
            Command::Shutdown => {}
        }
    }

    fn set_profile(&mut self, profile: VoiceProfile) {
        tracing::info!(preset = %profile.preset(), gain = profile.gain(), "voice profile set");
        self.profile = profile;
    }

    fn activate(&mut self) {
        let state = self.state();
        if state != SessionState::Idle {
            tracing::debug!(%state, "already active");
            return;
        }

        self.in_flight = None;
        self.live.send_modify(|s| {
            s.state = SessionState::Listening;
            s.processing = false;
        });
        tracing::info!("activated");

        self.start_recognition();
    }

    /// Return to idle from any state, releasing the microphone and speaker
    fn deactivate(&mut self) {
        self.in_flight = None;
        self.detach_recognition();
        self.sequencer.stop();

        let was = self.state();
        self.live.send_modify(|s| {
            s.state = SessionState::Idle;
            s.processing = false;
            s.turn = None;
        });

        if was != SessionState::Idle {
            tracing::info!(from = %was, "deactivated");
        }
    }

    fn fault(&mut self, message: String) {
        tracing::error!(%message, "returning to idle");
        let _ = self.notices.send(Notice::Fault(message));
        self.deactivate();
    }

    fn start_recognition(&mut self) {
        self.detach_recognition();

        self.next_session += 1;
        let session = SessionId(self.next_session);

        match self.recognizer.start(session) {
            Ok(()) => {
                tracing::debug!(%session, "recognition started");
                self.recognition = Some(session);
            }
            Err(e) => self.fault(format!("could not start recognition: {e}")),
        }
    }

    /// Forget the current session, then abort it; its late events are ignored
    fn detach_recognition(&mut self) {
        if let Some(session) = self.recognition.take() {
            tracing::debug!(%session, "detaching recognition");
            self.recognizer.abort();
        }
    }

    fn handle_recognition(&mut self, event: RecognitionEvent) {
        if self.recognition != Some(event.session) {
            tracing::trace!(session = %event.session, "event from detached session ignored");
            return;
        }

        match event.kind {
            RecognitionEventKind::Started => {
                tracing::debug!(session = %event.session, "recognition session open");
            }
            RecognitionEventKind::Result {
                text,
                is_final: false,
            } => {
                if self.state() == SessionState::Listening && !self.is_guarded() {
                    let _ = self.notices.send(Notice::Interim(text));
                }
            }
            RecognitionEventKind::Result {
                text,
                is_final: true,
            } => self.accept_transcript(&text),
            RecognitionEventKind::Error(error) => self.recognition_error(&error),
            RecognitionEventKind::Ended => {
                self.recognition = None;
                self.heal_recognition();
            }
        }
    }

    fn recognition_error(&mut self, error: &RecognitionError) {
        if error.is_fatal() {
            self.fault(format!("speech recognition failed: {error}"));
        } else {
            // the session ends on its own and is restarted from `Ended`
            tracing::debug!(%error, "transient recognition error");
        }
    }

    /// Restart recognition that ended on its own while still listening
    fn heal_recognition(&mut self) {
        if self.state() == SessionState::Listening && !self.is_guarded() {
            tracing::debug!("recognition ended while listening, restarting");
            self.start_recognition();
        }
    }

    fn accept_transcript(&mut self, text: &str) {
        let state = self.state();
        if self.is_guarded() || state != SessionState::Listening {
            tracing::debug!(%state, "transcript dropped, turn already in flight");
            return;
        }

        let text = text.trim();
        if text.is_empty() {
            return;
        }

        // Guard and state flip together before anything else can run
        self.live.send_modify(|s| {
            s.processing = true;
            s.state = SessionState::Processing;
        });

        self.next_turn += 1;
        let turn = self.next_turn;
        self.in_flight = Some(turn);
        self.detach_recognition();

        tracing::info!(turn, transcript = %text, "processing turn");

        let pipeline = Arc::clone(&self.pipeline);
        let progress = self.progress_tx.clone();
        let original = text.to_string();
        let profile = self.profile;
        let created_at = Utc::now();

        tokio::spawn(async move {
            let outcome = pipeline.run(turn, original, created_at, profile).await;
            let _ = progress.send(Progress::Processed { turn, outcome });
        });
    }

    fn is_current(&self, turn: u64, expected: SessionState) -> bool {
        self.in_flight == Some(turn) && self.state() == expected
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::Processed { turn, outcome } => {
                if !self.is_current(turn, SessionState::Processing) {
                    tracing::debug!(turn, "stale pipeline outcome ignored");
                    return;
                }
                self.turn_processed(turn, outcome);
            }
            Progress::Played { turn, result } => {
                if !self.is_current(turn, SessionState::Speaking) {
                    tracing::debug!(turn, "stale playback outcome ignored");
                    return;
                }
                match result {
                    Ok(()) => self.finish_turn(turn),
                    Err(e) => self.fault(format!("playback failed: {e}")),
                }
            }
        }
    }

    fn turn_processed(&mut self, turn: u64, outcome: PipelineOutcome) {
        let PipelineOutcome {
            turn: completed,
            speech,
        } = outcome;

        tracing::info!(
            turn,
            original = completed.original_text(),
            corrected = completed.corrected_text(),
            "turn ready"
        );
        self.live.send_modify(|s| s.turn = Some(completed));

        match speech {
            Speech::Ready(buffer) => {
                self.live.send_modify(|s| s.state = SessionState::Speaking);

                let sequencer = self.sequencer.clone();
                let progress = self.progress_tx.clone();
                let gain = self.profile.gain();

                tokio::spawn(async move {
                    let result = sequencer.play_once(buffer, gain).await;
                    let _ = progress.send(Progress::Played { turn, result });
                });
            }
            Speech::Silent => {
                tracing::info!(turn, "no audio for turn, listening again");
                self.finish_turn(turn);
            }
            Speech::Broken(e) => self.fault(format!("could not decode speech: {e}")),
        }
    }

    fn finish_turn(&mut self, turn: u64) {
        self.in_flight = None;
        self.live.send_modify(|s| {
            s.state = SessionState::Listening;
            s.processing = false;
        });
        tracing::debug!(turn, "turn complete");

        self.start_recognition();
    }
}
