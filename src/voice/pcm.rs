//! Linear PCM: decoding synthesized speech, encoding captured speech

use std::io::Cursor;

use crate::{Error, Result};

/// Default sample rate of synthesized speech
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Layout of raw 16-bit PCM data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
        }
    }
}

/// Decoded, playable audio (interleaved f32 samples)
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl PcmBuffer {
    /// Wrap already-decoded interleaved samples
    ///
    /// # Errors
    ///
    /// Returns error if the format is degenerate
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::Decode(format!(
                "invalid pcm format: {sample_rate} Hz, {channels} channels"
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration
    #[must_use]
    pub fn duration(&self) -> std::time::Duration {
        let frames = self.frames() as u64;
        std::time::Duration::from_millis(frames * 1000 / u64::from(self.sample_rate))
    }

    /// Scale every sample by `gain`, clamped to `[0.0, 1.0]`
    pub fn apply_gain(&mut self, gain: f32) {
        let gain = if gain.is_nan() { 0.0 } else { gain.clamp(0.0, 1.0) };
        if (gain - 1.0).abs() < f32::EPSILON {
            return;
        }

        for sample in &mut self.samples {
            *sample *= gain;
        }
    }
}

/// Decode 16-bit signed PCM
///
/// Data starting with a RIFF/WAVE header is read with its own sample rate and
/// channel count; anything else is treated as headerless little-endian PCM in
/// `format`.
///
/// # Errors
///
/// Returns error if the data is empty, truncated, or not 16-bit
pub fn decode_pcm16(data: &[u8], format: PcmFormat) -> Result<PcmBuffer> {
    if data.is_empty() {
        return Err(Error::Decode("empty audio data".to_string()));
    }

    if data.starts_with(b"RIFF") {
        return decode_wav(data);
    }

    if data.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "pcm16 data has odd length {}",
            data.len()
        )));
    }

    let samples: Vec<f32> = data
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    let channels = usize::from(format.channels.max(1));
    if samples.len() % channels != 0 {
        tracing::warn!(
            samples = samples.len(),
            channels,
            "pcm data ends mid-frame, dropping partial frame"
        );
    }
    let whole = samples.len() - samples.len() % channels;
    let mut samples = samples;
    samples.truncate(whole);

    PcmBuffer::new(samples, format.sample_rate, format.channels)
}

fn decode_wav(data: &[u8]) -> Result<PcmBuffer> {
    let reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| Error::Decode(format!("invalid wav header: {e}")))?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(Error::Decode(format!(
            "unsupported wav encoding: {} bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(|v| f32::from(v) / 32768.0))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| Error::Decode(format!("wav decode error: {e}")))?;

    tracing::trace!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "decoded wav audio"
    );

    PcmBuffer::new(samples, spec.sample_rate, spec.channels)
}

/// Encode mono f32 samples as a 16-bit WAV file for upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(value)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    Ok(cursor.into_inner())
}
