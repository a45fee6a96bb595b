//! Text-to-speech (TTS) synthesis

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::pcm::PcmFormat;
use super::profile::{VoiceGender, VoiceProfile};
use crate::{Error, Result};

/// Raw synthesized audio, not yet decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// 16-bit PCM, optionally wrapped in a WAV header
    pub data: Vec<u8>,
    /// Layout to assume when `data` carries no header
    pub format: PcmFormat,
}

/// Converts text to speech audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the given voice
    ///
    /// Returns `Ok(None)` when the provider produced no audio.
    ///
    /// # Errors
    ///
    /// Returns error if the synthesis request fails
    async fn synthesize(&self, text: &str, profile: &VoiceProfile)
    -> Result<Option<SynthesizedAudio>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    /// Google Cloud Text-to-Speech (honours pitch and rate)
    #[default]
    Google,
    /// `OpenAI` speech endpoint (honours rate only)
    OpenAI,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gcp" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech through an HTTP provider
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    locale: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using Google Cloud Text-to-Speech
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_google(api_key: String, locale: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Google API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: String::new(),
            locale,
            provider: TtsProvider::Google,
        })
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            locale: "en-US".to_string(),
            provider: TtsProvider::OpenAI,
        })
    }

    /// Synthesize using Google Cloud Text-to-Speech
    async fn synthesize_google(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<Option<SynthesizedAudio>> {
        let request = google_request(text, profile, &self.locale);

        let response = self
            .client
            .post("https://texttospeech.googleapis.com/v1/text:synthesize")
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
        }

        let body = response.text().await?;
        parse_google_response(&body)
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<Option<SynthesizedAudio>> {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: openai_voice(profile.preset().gender()),
            speed: profile.rate(),
            response_format: "pcm",
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Ok(None);
        }

        Ok(Some(SynthesizedAudio {
            data: audio.to_vec(),
            format: PcmFormat::default(),
        }))
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<Option<SynthesizedAudio>> {
        tracing::debug!(
            provider = ?self.provider,
            voice = profile.voice_id(),
            chars = text.len(),
            "synthesizing speech"
        );

        match self.provider {
            TtsProvider::Google => self.synthesize_google(text, profile).await,
            TtsProvider::OpenAI => self.synthesize_openai(text, profile).await,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest<'a> {
    input: GoogleInput<'a>,
    voice: GoogleVoice<'a>,
    audio_config: GoogleAudioConfig,
}

#[derive(Serialize)]
struct GoogleInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVoice<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAudioConfig {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
    pitch: f32,
    speaking_rate: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    audio_content: Option<String>,
}

fn google_request<'a>(
    text: &'a str,
    profile: &'a VoiceProfile,
    locale: &'a str,
) -> GoogleRequest<'a> {
    GoogleRequest {
        input: GoogleInput { text },
        voice: GoogleVoice {
            language_code: locale,
            name: profile.voice_id(),
            ssml_gender: match profile.preset().gender() {
                VoiceGender::Female => "FEMALE",
                VoiceGender::Male => "MALE",
            },
        },
        audio_config: GoogleAudioConfig {
            audio_encoding: "LINEAR16",
            sample_rate_hertz: PcmFormat::default().sample_rate,
            pitch: profile.pitch(),
            speaking_rate: profile.rate(),
        },
    }
}

/// Decode the base64 `audioContent` of a Google response
fn parse_google_response(body: &str) -> Result<Option<SynthesizedAudio>> {
    let response: GoogleResponse = serde_json::from_str(body)?;

    let Some(content) = response.audio_content.filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let data = base64::engine::general_purpose::STANDARD.decode(content.as_bytes())?;
    if data.is_empty() {
        return Ok(None);
    }

    Ok(Some(SynthesizedAudio {
        data,
        format: PcmFormat::default(),
    }))
}

const fn openai_voice(gender: VoiceGender) -> &'static str {
    match gender {
        VoiceGender::Female => "nova",
        VoiceGender::Male => "onyx",
    }
}
