//! Microphone input for one recognition session
//!
//! An [`AudioCapture`] is opened when a session starts and dropped when it
//! ends; the device is released with it. Samples pile up in a shared buffer
//! until the session thread drains them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture rate expected by the segmenter and the STT providers (16kHz)
pub const SAMPLE_RATE: u32 = 16000;

/// A live mono input stream on the default microphone
///
/// The `cpal` stream is not `Send`, so open, drain and drop it on the same
/// thread.
pub struct AudioCapture {
    pending: Arc<Mutex<Vec<f32>>>,
    faulted: Arc<AtomicBool>,
    _stream: Stream,
}

impl AudioCapture {
    /// Open the default microphone and start recording
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device, it has no 16kHz mono mode,
    /// or the stream cannot be started
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;
        let config = mono_config(&device)?;

        let pending = Arc::new(Mutex::new(Vec::new()));
        let faulted = Arc::new(AtomicBool::new(false));
        let sink = Arc::clone(&pending);
        let fault = Arc::clone(&faulted);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pending) = sink.lock() {
                        pending.extend_from_slice(data);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "microphone stream error");
                    fault.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "microphone open"
        );

        Ok(Self {
            pending,
            faulted,
            _stream: stream,
        })
    }

    /// Take the samples recorded since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }

    /// Whether the device reported an error; the session should end
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        tracing::debug!("microphone closed");
    }
}

/// Find a mono configuration that supports [`SAMPLE_RATE`]
fn mono_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(SAMPLE_RATE);

    device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio("microphone has no 16kHz mono mode".to_string()))
}
