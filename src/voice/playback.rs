//! Audio playback to speakers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::pcm::PcmBuffer;
use crate::{Error, Result};

/// An output device that plays one buffer at a time
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Play `buffer` at `gain`, resolving when playback ends
    ///
    /// # Errors
    ///
    /// Returns error if the output device fails
    async fn play(&self, buffer: PcmBuffer, gain: f32) -> Result<()>;

    /// Interrupt any playback in progress
    fn stop(&self);
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    stop_requested: Arc<AtomicBool>,
}

impl AudioPlayback {
    /// Check that an output device is available
    ///
    /// # Errors
    ///
    /// Returns error if no output device exists
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self {
            stop_requested: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl PlaybackDevice for AudioPlayback {
    async fn play(&self, mut buffer: PcmBuffer, gain: f32) -> Result<()> {
        buffer.apply_gain(gain);
        self.stop_requested.store(false, Ordering::SeqCst);

        let stop = Arc::clone(&self.stop_requested);
        // cpal streams are not Send; build and drive the stream on a blocking thread
        tokio::task::spawn_blocking(move || play_blocking(&buffer, &stop))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

/// Find an output config at the buffer's rate: its own channel count first,
/// then mono, then stereo
fn output_config(device: &cpal::Device, buffer: &PcmBuffer) -> Result<StreamConfig> {
    let rate = SampleRate(buffer.sample_rate());
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
    };

    let supported = supports(buffer.channels())
        .or_else(|| supports(1))
        .or_else(|| supports(2))
        .ok_or_else(|| {
            Error::Audio(format!(
                "no output config for {} Hz audio",
                buffer.sample_rate()
            ))
        })?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Play samples in a blocking manner
fn play_blocking(buffer: &PcmBuffer, stop: &Arc<AtomicBool>) -> Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = output_config(&device, buffer)?;
    let out_channels = usize::from(config.channels);
    let src_channels = usize::from(buffer.channels());

    let samples = Arc::new(buffer.samples().to_vec());
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        let failed = Arc::clone(&failed);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = position.lock() else {
                        return;
                    };

                    for frame in data.chunks_mut(out_channels) {
                        let start = *pos * src_channels;
                        let Some(source) = samples.get(start..start + src_channels) else {
                            finished.store(true, Ordering::SeqCst);
                            frame.fill(0.0);
                            continue;
                        };

                        map_frame(source, frame);
                        *pos += 1;
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    failed.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll for completion with timeout
    let started = Instant::now();
    let timeout = buffer.duration() + Duration::from_millis(500);

    while !finished.load(Ordering::SeqCst) {
        if stop.load(Ordering::SeqCst) {
            tracing::debug!("playback interrupted");
            return Ok(());
        }
        if failed.load(Ordering::SeqCst) {
            return Err(Error::Audio("output stream failed".to_string()));
        }
        if started.elapsed() > timeout {
            tracing::warn!("playback did not finish in time");
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    tracing::debug!(frames = buffer.frames(), "playback complete");

    Ok(())
}

/// Copy one source frame into one output frame, mixing channels as needed
#[allow(clippy::cast_precision_loss)]
fn map_frame(source: &[f32], out: &mut [f32]) {
    if source.len() == out.len() {
        out.copy_from_slice(source);
        return;
    }

    let mono = source.iter().sum::<f32>() / source.len() as f32;
    out.fill(mono);
}
