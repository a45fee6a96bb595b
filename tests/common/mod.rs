//! Shared test utilities
//!
//! Scripted stand-ins for every capability the turn coordinator drives, plus
//! a harness that wires them to a running coordinator.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clarion::session::{Collaborators, TurnCoordinator, TurnSettings};
use clarion::voice::{
    Corrector, PcmBuffer, PcmFormat, PlaybackDevice, RecognitionError, RecognitionEvent,
    RecognitionEventKind, RecognitionSender, Recognizer, SessionId, SynthesizedAudio,
    Synthesizer, VoiceProfile, recognition_channel,
};
use clarion::{CoordinatorHandle, Error, Notice, Result};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Headerless 16-bit mono PCM of a constant tone
#[must_use]
pub fn tone_pcm(frames: usize) -> Vec<u8> {
    std::iter::repeat_n(8000_i16, frames)
        .flat_map(i16::to_le_bytes)
        .collect()
}

/// Calls observed by [`MockRecognizer`]
#[derive(Debug, Default)]
pub struct RecognizerLog {
    pub starts: Vec<SessionId>,
    pub stops: usize,
    pub aborts: usize,
}

/// Recognizer that only records calls; events are injected by the test
pub struct MockRecognizer {
    log: Arc<Mutex<RecognizerLog>>,
    fail_start: Option<RecognitionError>,
}

impl Recognizer for MockRecognizer {
    fn start(&mut self, session: SessionId) -> std::result::Result<(), RecognitionError> {
        if let Some(error) = &self.fail_start {
            return Err(error.clone());
        }
        self.log.lock().unwrap().starts.push(session);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().aborts += 1;
    }
}

/// How [`MockCorrector`] answers
#[derive(Debug, Clone)]
pub enum CorrectorReply {
    /// Capitalize the first letter and add a full stop
    Tidy,
    Fixed(String),
    Fail,
    /// Never answer
    Stall,
}

pub struct MockCorrector {
    reply: Mutex<CorrectorReply>,
    hold: AtomicBool,
    release: Notify,
    pub calls: Mutex<Vec<String>>,
}

impl MockCorrector {
    fn new() -> Self {
        Self {
            reply: Mutex::new(CorrectorReply::Tidy),
            hold: AtomicBool::new(false),
            release: Notify::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_with(&self, reply: CorrectorReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Block corrections until [`Self::release`]
    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Expected tidy form of a transcript
#[must_use]
pub fn tidy(text: &str) -> String {
    let mut chars = text.chars();
    let first = chars.next().map(|c| c.to_uppercase().collect::<String>()).unwrap_or_default();
    format!("{first}{}.", chars.as_str())
}

#[async_trait]
impl Corrector for MockCorrector {
    async fn correct(&self, text: &str) -> Result<String> {
        self.calls.lock().unwrap().push(text.to_string());

        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            CorrectorReply::Tidy => Ok(tidy(text)),
            CorrectorReply::Fixed(text) => Ok(text),
            CorrectorReply::Fail => Err(Error::Correction("service unavailable".to_string())),
            CorrectorReply::Stall => std::future::pending().await,
        }
    }
}

/// What [`MockSynthesizer`] returns
#[derive(Debug, Clone)]
pub enum SynthOutput {
    Audio(Vec<u8>),
    Nothing,
    Fail,
}

pub struct MockSynthesizer {
    output: Mutex<SynthOutput>,
    pub calls: Mutex<Vec<(String, VoiceProfile)>>,
}

impl MockSynthesizer {
    fn new() -> Self {
        Self {
            output: Mutex::new(SynthOutput::Audio(tone_pcm(2400))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_with(&self, output: SynthOutput) {
        *self.output.lock().unwrap() = output;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<Option<SynthesizedAudio>> {
        self.calls.lock().unwrap().push((text.to_string(), *profile));

        let output = self.output.lock().unwrap().clone();
        match output {
            SynthOutput::Audio(data) => Ok(Some(SynthesizedAudio {
                data,
                format: PcmFormat::default(),
            })),
            SynthOutput::Nothing => Ok(None),
            SynthOutput::Fail => Err(Error::Tts("quota exceeded".to_string())),
        }
    }
}

/// Playback device that finishes instantly unless held
pub struct MockPlayback {
    hold: AtomicBool,
    fail: AtomicBool,
    release: Notify,
    stops: AtomicUsize,
    /// Frames and gain of every play request
    pub plays: Mutex<Vec<(usize, f32)>>,
}

impl MockPlayback {
    fn new() -> Self {
        Self {
            hold: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            release: Notify::new(),
            stops: AtomicUsize::new(0),
            plays: Mutex::new(Vec::new()),
        }
    }

    /// Keep playing until [`Self::finish`] or `stop`
    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackDevice for MockPlayback {
    async fn play(&self, buffer: PcmBuffer, gain: f32) -> Result<()> {
        self.plays.lock().unwrap().push((buffer.frames(), gain));

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Audio("output stream failed".to_string()));
        }

        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.release.notify_waiters();
    }
}

/// A running coordinator wired to mocks
pub struct Harness {
    pub handle: CoordinatorHandle,
    pub notices: mpsc::UnboundedReceiver<Notice>,
    pub events: RecognitionSender,
    pub recognizer: Arc<Mutex<RecognizerLog>>,
    pub corrector: Arc<MockCorrector>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub playback: Arc<MockPlayback>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn start() -> Self {
        Self::build(TurnSettings::default(), None)
    }

    pub fn with_settings(settings: TurnSettings) -> Self {
        Self::build(settings, None)
    }

    /// Recognizer whose `start` always fails with `error`
    pub fn failing_start(error: RecognitionError) -> Self {
        Self::build(TurnSettings::default(), Some(error))
    }

    fn build(settings: TurnSettings, fail_start: Option<RecognitionError>) -> Self {
        let recognizer = Arc::new(Mutex::new(RecognizerLog::default()));
        let corrector = Arc::new(MockCorrector::new());
        let synthesizer = Arc::new(MockSynthesizer::new());
        let playback = Arc::new(MockPlayback::new());
        let (events, recognition_events) = recognition_channel();

        let collaborators = Collaborators {
            recognizer: Box::new(MockRecognizer {
                log: Arc::clone(&recognizer),
                fail_start,
            }),
            recognition_events,
            corrector: corrector.clone(),
            synthesizer: synthesizer.clone(),
            playback: playback.clone(),
        };

        let (coordinator, notices) = TurnCoordinator::new(collaborators, settings);
        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run());

        Self {
            handle,
            notices,
            events,
            recognizer,
            corrector,
            synthesizer,
            playback,
            task,
        }
    }

    /// Activate and wait until listening
    pub async fn activate(&self) {
        self.handle.activate().unwrap();
        settle().await;
    }

    /// Most recently started recognition session
    pub fn session(&self) -> SessionId {
        *self
            .recognizer
            .lock()
            .unwrap()
            .starts
            .last()
            .expect("no recognition session started")
    }

    pub fn start_count(&self) -> usize {
        self.recognizer.lock().unwrap().starts.len()
    }

    pub fn abort_count(&self) -> usize {
        self.recognizer.lock().unwrap().aborts
    }

    pub fn emit(&self, session: SessionId, kind: RecognitionEventKind) {
        self.events
            .send(RecognitionEvent::new(session, kind))
            .unwrap();
    }

    /// Deliver a final transcript on the current session
    pub fn say(&self, text: &str) {
        self.emit(
            self.session(),
            RecognitionEventKind::Result {
                text: text.to_string(),
                is_final: true,
            },
        );
    }

    /// End the current session as the platform would
    pub fn end_session(&self) {
        self.emit(self.session(), RecognitionEventKind::Ended);
    }

    /// Drain notices received so far
    pub fn take_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }
}
