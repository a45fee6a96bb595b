//! Voice I/O
//!
//! Microphone capture and recognition, transcript correction, speech
//! synthesis, PCM decoding and playback. The turn coordinator in
//! [`crate::session`] only sees the traits exported here.

mod capture;
mod correction;
mod listener;
mod pcm;
mod playback;
mod profile;
mod recognition;
mod segmenter;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE};
pub use correction::{
    Corrector, DEFAULT_CORRECTION_TIMEOUT, DEFAULT_MIN_CHARS, LlmCorrector, clarify,
};
pub use listener::{DEFAULT_NO_SPEECH_TIMEOUT, MicRecognizer};
pub use pcm::{DEFAULT_SAMPLE_RATE, PcmBuffer, PcmFormat, decode_pcm16, samples_to_wav};
pub use playback::{AudioPlayback, PlaybackDevice};
pub use profile::{DEFAULT_GAIN, VoiceGender, VoicePreset, VoiceProfile};
pub use recognition::{
    RecognitionError, RecognitionEvent, RecognitionEventKind, RecognitionOptions,
    RecognitionReceiver, RecognitionSender, Recognizer, SessionId, recognition_channel,
};
pub use segmenter::{SegmenterState, UtteranceSegmenter, calculate_energy};
pub use stt::{SpeechToText, SttProvider};
pub use tts::{SynthesizedAudio, Synthesizer, TextToSpeech, TtsProvider};
