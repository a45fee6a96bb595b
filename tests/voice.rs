//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use clarion::voice::{
    PcmBuffer, PcmFormat, SAMPLE_RATE, SegmenterState, UtteranceSegmenter, VoicePreset,
    VoiceProfile, decode_pcm16, samples_to_wav,
};

mod common;
use common::tone_pcm;

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_segmenter_starts_idle() {
    let segmenter = UtteranceSegmenter::new();
    assert_eq!(segmenter.state(), SegmenterState::Idle);
    assert!(!segmenter.has_speech());
    assert!(segmenter.speech_buffer().is_empty());
}

#[test]
fn test_silence_keeps_segmenter_idle() {
    let mut segmenter = UtteranceSegmenter::new();

    assert!(!segmenter.process(&generate_silence(0.5)));
    assert_eq!(segmenter.state(), SegmenterState::Idle);
    assert_eq!(segmenter.idle_duration().as_millis(), 500);
}

#[test]
fn test_utterance_completes_after_silence() {
    let mut segmenter = UtteranceSegmenter::new();

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    assert!(!segmenter.process(&speech));
    assert_eq!(segmenter.state(), SegmenterState::Speaking);
    assert!(segmenter.has_speech());

    // A short pause is not the end of the utterance
    assert!(!segmenter.process(&generate_silence(0.6)));
    assert!(!segmenter.is_complete());

    assert!(segmenter.process(&generate_silence(0.2)));
    assert!(segmenter.is_complete());
}

#[test]
fn test_speech_buffer_accumulation() {
    let mut segmenter = UtteranceSegmenter::new();

    let chunk1 = generate_sine_samples(440.0, 0.1, 0.3);
    segmenter.process(&chunk1);

    let chunk2 = generate_sine_samples(440.0, 0.1, 0.3);
    segmenter.process(&chunk2);

    assert_eq!(segmenter.speech_buffer().len(), chunk1.len() + chunk2.len());
}

#[test]
fn test_take_utterance_resets() {
    let mut segmenter = UtteranceSegmenter::new();

    let speech = generate_sine_samples(440.0, 0.4, 0.3);
    segmenter.process(&speech);

    let taken = segmenter.take_utterance();
    assert_eq!(taken.len(), speech.len());

    assert!(segmenter.speech_buffer().is_empty());
    assert_eq!(segmenter.state(), SegmenterState::Idle);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV header is 44 bytes
    assert!(wav_data.len() > 44);
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
}

#[test]
fn test_decode_wav_uses_header_format() {
    let samples = generate_sine_samples(440.0, 0.25, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // The header wins over the assumed layout
    let buffer = decode_pcm16(&wav_data, PcmFormat::default()).unwrap();
    assert_eq!(buffer.sample_rate(), SAMPLE_RATE);
    assert_eq!(buffer.channels(), 1);
    assert_eq!(buffer.frames(), samples.len());
    assert_eq!(buffer.duration().as_millis(), 250);
}

#[test]
fn test_decode_raw_pcm() {
    let buffer = decode_pcm16(&tone_pcm(24_000), PcmFormat::default()).unwrap();

    assert_eq!(buffer.sample_rate(), 24_000);
    assert_eq!(buffer.frames(), 24_000);
    assert_eq!(buffer.duration().as_secs(), 1);
    assert!((buffer.samples()[0] - 8000.0 / 32768.0).abs() < 1e-6);
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(decode_pcm16(&[], PcmFormat::default()).is_err());
    assert!(decode_pcm16(&[1, 2, 3], PcmFormat::default()).is_err());
    assert!(decode_pcm16(b"RIFF not really a wav", PcmFormat::default()).is_err());
}

#[test]
fn test_decode_stereo_drops_partial_frame() {
    let format = PcmFormat {
        sample_rate: 24_000,
        channels: 2,
    };
    let buffer = decode_pcm16(&tone_pcm(5), format).unwrap();

    assert_eq!(buffer.channels(), 2);
    assert_eq!(buffer.frames(), 2);
    assert_eq!(buffer.samples().len(), 4);
}

#[test]
fn test_profile_gain_scales_buffer() {
    let profile = VoiceProfile::new(VoicePreset::Masculine, 0.5).unwrap();
    let mut buffer = PcmBuffer::new(vec![0.8, -0.4], 24_000, 1).unwrap();

    buffer.apply_gain(profile.gain());

    assert_eq!(buffer.samples(), &[0.4, -0.2]);
}
