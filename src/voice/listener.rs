//! Microphone-backed speech recognizer
//!
//! Each session runs on its own thread: capture from the default input
//! device, segment utterances by energy, transcribe each through the STT
//! provider, and report results. `cpal` streams are not `Send`, so the
//! capture stream is created and dropped on that thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;

use super::capture::{AudioCapture, SAMPLE_RATE};
use super::pcm::samples_to_wav;
use super::recognition::{
    RecognitionError, RecognitionEvent, RecognitionEventKind, RecognitionOptions,
    RecognitionSender, Recognizer, SessionId,
};
use super::segmenter::{SegmenterState, UtteranceSegmenter};
use super::stt::SpeechToText;
use crate::Error;

/// How often the session thread drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// New speech required between interim transcriptions (1.5s at 16kHz)
const INTERIM_STEP_SAMPLES: usize = 24_000;

/// Default silence before a session gives up with `NoSpeech`
pub const DEFAULT_NO_SPEECH_TIMEOUT: Duration = Duration::from_secs(8);

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const ABORTED: u8 = 2;

struct ActiveSession {
    id: SessionId,
    control: Arc<AtomicU8>,
}

/// Recognizer that listens on the default microphone
pub struct MicRecognizer {
    options: RecognitionOptions,
    stt: Arc<SpeechToText>,
    events: RecognitionSender,
    no_speech_timeout: Duration,
    active: Option<ActiveSession>,
}

impl MicRecognizer {
    #[must_use]
    pub fn new(options: RecognitionOptions, stt: SpeechToText, events: RecognitionSender) -> Self {
        if options.interim_results {
            tracing::debug!("interim results enabled, partial utterances will be transcribed");
        }

        Self {
            options,
            stt: Arc::new(stt),
            events,
            no_speech_timeout: DEFAULT_NO_SPEECH_TIMEOUT,
            active: None,
        }
    }

    /// Override the silence timeout
    #[must_use]
    pub const fn with_no_speech_timeout(mut self, timeout: Duration) -> Self {
        self.no_speech_timeout = timeout;
        self
    }

    fn signal(&mut self, control: u8) {
        if let Some(active) = self.active.take() {
            active.control.store(control, Ordering::SeqCst);
            tracing::debug!(session = %active.id, control, "recognition session signalled");
        }
    }
}

impl Recognizer for MicRecognizer {
    fn start(&mut self, session: SessionId) -> Result<(), RecognitionError> {
        // One session at a time
        self.signal(ABORTED);

        let runtime = Handle::try_current()
            .map_err(|e| RecognitionError::Unsupported(format!("no async runtime: {e}")))?;

        let control = Arc::new(AtomicU8::new(RUNNING));
        let worker = SessionWorker {
            session,
            options: self.options.clone(),
            stt: Arc::clone(&self.stt),
            events: self.events.clone(),
            control: Arc::clone(&control),
            runtime,
            no_speech_timeout: self.no_speech_timeout,
        };

        // Detached: the thread exits on its own once signalled
        std::thread::Builder::new()
            .name(format!("clarion-{session}"))
            .spawn(move || worker.run())
            .map_err(|e| {
                RecognitionError::Unsupported(format!("cannot spawn capture thread: {e}"))
            })?;

        tracing::debug!(%session, "recognition session started");
        self.active = Some(ActiveSession {
            id: session,
            control,
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.signal(STOPPING);
    }

    fn abort(&mut self) {
        self.signal(ABORTED);
    }
}

impl Drop for MicRecognizer {
    fn drop(&mut self) {
        self.signal(ABORTED);
    }
}

struct SessionWorker {
    session: SessionId,
    options: RecognitionOptions,
    stt: Arc<SpeechToText>,
    events: RecognitionSender,
    control: Arc<AtomicU8>,
    runtime: Handle,
    no_speech_timeout: Duration,
}

impl SessionWorker {
    fn run(self) {
        if let Err(e) = self.listen() {
            tracing::debug!(session = %self.session, error = %e, "recognition session failed");
            self.emit(RecognitionEventKind::Error(e));
        }
        self.emit(RecognitionEventKind::Ended);
    }

    fn emit(&self, kind: RecognitionEventKind) {
        // Receiver gone means the coordinator shut down
        let _ = self.events.send(RecognitionEvent::new(self.session, kind));
    }

    fn control(&self) -> u8 {
        self.control.load(Ordering::SeqCst)
    }

    fn listen(&self) -> Result<(), RecognitionError> {
        let capture = AudioCapture::open().map_err(|e| classify_capture_error(&e))?;
        self.emit(RecognitionEventKind::Started);

        let mut segmenter = UtteranceSegmenter::new();
        let mut interim_mark = 0usize;

        loop {
            std::thread::sleep(POLL_INTERVAL);

            match self.control() {
                ABORTED => return Ok(()),
                STOPPING => {
                    if let Some(utterance) = segmenter.flush(&capture.drain()) {
                        let text = self.transcribe(&utterance)?;
                        self.emit_final(text);
                    }
                    return Ok(());
                }
                _ => {}
            }

            if capture.is_faulted() {
                return Err(RecognitionError::Device("input stream failed".to_string()));
            }

            let samples = capture.drain();
            if samples.is_empty() {
                continue;
            }

            if segmenter.process(&samples) {
                let utterance = segmenter.take_utterance();
                interim_mark = 0;

                let text = self.transcribe(&utterance)?;
                if self.control() == ABORTED {
                    return Ok(());
                }
                if self.emit_final(text) && !self.options.continuous {
                    return Ok(());
                }
                continue;
            }

            if self.options.interim_results && segmenter.has_speech() {
                let buffered = segmenter.speech_buffer().len();
                if buffered >= interim_mark + INTERIM_STEP_SAMPLES {
                    interim_mark = buffered;
                    match self.transcribe(segmenter.speech_buffer()) {
                        Ok(text) if !text.is_empty() => self.emit(RecognitionEventKind::Result {
                            text,
                            is_final: false,
                        }),
                        Ok(_) => {}
                        Err(e) => tracing::debug!(error = %e, "interim transcription failed"),
                    }
                }
            }

            if segmenter.state() == SegmenterState::Idle
                && segmenter.idle_duration() >= self.no_speech_timeout
            {
                return Err(RecognitionError::NoSpeech);
            }
        }
    }

    /// Emit a final result; returns false when the transcript was empty
    fn emit_final(&self, text: String) -> bool {
        if text.trim().is_empty() {
            tracing::debug!(session = %self.session, "empty transcript dropped");
            return false;
        }

        self.emit(RecognitionEventKind::Result {
            text,
            is_final: true,
        });
        true
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, RecognitionError> {
        let wav = samples_to_wav(samples, SAMPLE_RATE)
            .map_err(|e| RecognitionError::Device(e.to_string()))?;

        self.runtime
            .block_on(self.stt.transcribe(&wav))
            .map_err(|e| RecognitionError::Network(e.to_string()))
    }
}

/// Map a capture failure to the recognition error taxonomy
fn classify_capture_error(error: &Error) -> RecognitionError {
    let message = error.to_string();
    let lower = message.to_lowercase();

    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        RecognitionError::NotAllowed(message)
    } else if lower.contains("no input device") {
        RecognitionError::Unsupported(message)
    } else {
        RecognitionError::Device(message)
    }
}
