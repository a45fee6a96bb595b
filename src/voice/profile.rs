//! Voice profiles for synthesized output
//!
//! Pitch and rate come in fixed presets rather than free parameters; only the
//! output gain is adjustable per profile.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default output gain
pub const DEFAULT_GAIN: f32 = 1.0;

/// Speaker gender reported to synthesis providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Female,
    Male,
}

/// Supported voice presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePreset {
    /// Brighter female voice, slightly raised pitch
    #[default]
    Feminine,
    /// Deeper male voice, slightly slower delivery
    Masculine,
}

impl VoicePreset {
    /// All presets, in toggle order
    pub const ALL: [Self; 2] = [Self::Feminine, Self::Masculine];

    /// Provider voice identifier (Google Cloud voice name)
    #[must_use]
    pub const fn voice_id(self) -> &'static str {
        match self {
            Self::Feminine => "en-US-Neural2-F",
            Self::Masculine => "en-US-Neural2-D",
        }
    }

    #[must_use]
    pub const fn gender(self) -> VoiceGender {
        match self {
            Self::Feminine => VoiceGender::Female,
            Self::Masculine => VoiceGender::Male,
        }
    }

    /// Pitch offset in semitones
    #[must_use]
    pub const fn pitch(self) -> f32 {
        match self {
            Self::Feminine => 2.0,
            Self::Masculine => -2.5,
        }
    }

    /// Speaking-rate multiplier
    #[must_use]
    pub const fn rate(self) -> f32 {
        match self {
            Self::Feminine => 1.05,
            Self::Masculine => 0.95,
        }
    }

    /// The preset after this one, wrapping around
    #[must_use]
    pub fn next(self) -> Self {
        let pos = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feminine => write!(f, "feminine"),
            Self::Masculine => write!(f, "masculine"),
        }
    }
}

impl std::str::FromStr for VoicePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "feminine" | "female" | "f" => Ok(Self::Feminine),
            "masculine" | "male" | "m" => Ok(Self::Masculine),
            other => Err(Error::Config(format!("unknown voice preset: {other}"))),
        }
    }
}

/// Voice selection plus output gain
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceProfile {
    preset: VoicePreset,
    gain: f32,
}

impl VoiceProfile {
    /// Create a profile
    ///
    /// # Errors
    ///
    /// Returns error if `gain` is outside `[0.0, 1.0]`
    pub fn new(preset: VoicePreset, gain: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&gain) {
            return Err(Error::Config(format!(
                "output gain must be between 0.0 and 1.0, got {gain}"
            )));
        }

        Ok(Self { preset, gain })
    }

    #[must_use]
    pub const fn preset(&self) -> VoicePreset {
        self.preset
    }

    #[must_use]
    pub const fn gain(&self) -> f32 {
        self.gain
    }

    #[must_use]
    pub const fn voice_id(&self) -> &'static str {
        self.preset.voice_id()
    }

    #[must_use]
    pub const fn pitch(&self) -> f32 {
        self.preset.pitch()
    }

    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.preset.rate()
    }

    /// Same gain, different preset
    #[must_use]
    pub const fn with_preset(self, preset: VoicePreset) -> Self {
        Self { preset, ..self }
    }
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            preset: VoicePreset::default(),
            gain: DEFAULT_GAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_bounds() {
        assert!(VoiceProfile::new(VoicePreset::Feminine, 0.0).is_ok());
        assert!(VoiceProfile::new(VoicePreset::Feminine, 1.0).is_ok());
        assert!(VoiceProfile::new(VoicePreset::Feminine, 1.01).is_err());
        assert!(VoiceProfile::new(VoicePreset::Masculine, -0.1).is_err());
        assert!(VoiceProfile::new(VoicePreset::Masculine, f32::NAN).is_err());
    }

    #[test]
    fn presets_toggle() {
        assert_eq!(VoicePreset::Feminine.next(), VoicePreset::Masculine);
        assert_eq!(VoicePreset::Masculine.next(), VoicePreset::Feminine);
    }

    #[test]
    fn presets_are_distinct() {
        let f = VoicePreset::Feminine;
        let m = VoicePreset::Masculine;
        assert_ne!(f.voice_id(), m.voice_id());
        assert!(f.pitch() > m.pitch());
        assert_eq!(f.gender(), VoiceGender::Female);
        assert_eq!(m.gender(), VoiceGender::Male);
    }

    #[test]
    fn preset_parsing() {
        assert_eq!("Female".parse::<VoicePreset>().unwrap(), VoicePreset::Feminine);
        assert_eq!(" masculine ".parse::<VoicePreset>().unwrap(), VoicePreset::Masculine);
        assert!("robot".parse::<VoicePreset>().is_err());
    }

    #[test]
    fn with_preset_keeps_gain() {
        let profile = VoiceProfile::new(VoicePreset::Feminine, 0.4).unwrap();
        let switched = profile.with_preset(VoicePreset::Masculine);
        assert_eq!(switched.preset(), VoicePreset::Masculine);
        assert!((switched.gain() - 0.4).abs() < f32::EPSILON);
    }
}
