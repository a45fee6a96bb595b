//! Playback followed by an echo cooldown
//!
//! The microphone must not re-open while the room still rings with the
//! assistant's own voice, or it transcribes itself and loops. Every
//! successful playback is followed by a fixed silence before the sequencer
//! reports completion.

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::voice::{PcmBuffer, PlaybackDevice};

/// Default silence after playback
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(800);

/// Shortest cooldown accepted
pub const MIN_COOLDOWN: Duration = Duration::from_millis(800);

/// Plays one buffer, then waits out the cooldown
#[derive(Clone)]
pub struct PlaybackSequencer {
    device: Arc<dyn PlaybackDevice>,
    cooldown: Duration,
}

impl PlaybackSequencer {
    /// Create a sequencer; cooldowns under [`MIN_COOLDOWN`] are raised to it
    #[must_use]
    pub fn new(device: Arc<dyn PlaybackDevice>, cooldown: Duration) -> Self {
        let cooldown = if cooldown < MIN_COOLDOWN {
            tracing::warn!(
                requested_ms = cooldown.as_millis(),
                min_ms = MIN_COOLDOWN.as_millis(),
                "cooldown too short, using minimum"
            );
            MIN_COOLDOWN
        } else {
            cooldown
        };

        Self { device, cooldown }
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Play `buffer` once at `gain`, then wait out the cooldown
    ///
    /// # Errors
    ///
    /// Returns the device error if playback fails; no cooldown is applied then
    pub async fn play_once(&self, buffer: PcmBuffer, gain: f32) -> Result<()> {
        self.device.play(buffer, gain).await?;

        tracing::debug!(cooldown_ms = self.cooldown.as_millis(), "playback ended, cooling down");
        tokio::time::sleep(self.cooldown).await;
        Ok(())
    }

    /// Interrupt playback in progress
    pub fn stop(&self) {
        self.device.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Recording {
        gains: Mutex<Vec<f32>>,
    }

    #[async_trait]
    impl PlaybackDevice for Recording {
        async fn play(&self, _buffer: PcmBuffer, gain: f32) -> Result<()> {
            self.gains.lock().unwrap().push(gain);
            Ok(())
        }

        fn stop(&self) {}
    }

    #[test]
    fn short_cooldown_is_raised() {
        let device = Arc::new(Recording::default());
        let sequencer = PlaybackSequencer::new(device.clone(), Duration::from_millis(100));
        assert_eq!(sequencer.cooldown(), MIN_COOLDOWN);

        let longer = PlaybackSequencer::new(device, Duration::from_millis(1000));
        assert_eq!(longer.cooldown(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_cooldown_after_playback() {
        let device = Arc::new(Recording::default());
        let sequencer = PlaybackSequencer::new(device.clone(), DEFAULT_COOLDOWN);
        let buffer = PcmBuffer::new(vec![0.1; 240], 24_000, 1).unwrap();

        let started = tokio::time::Instant::now();
        sequencer.play_once(buffer, 0.5).await.unwrap();

        assert!(started.elapsed() >= DEFAULT_COOLDOWN);
        assert_eq!(device.gains.lock().unwrap().as_slice(), &[0.5]);
    }
}
