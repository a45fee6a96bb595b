//! Transcript clarification through a language model

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Transcripts shorter than this are spoken back unchanged
pub const DEFAULT_MIN_CHARS: usize = 3;

/// Default time allowed for a correction call
pub const DEFAULT_CORRECTION_TIMEOUT: Duration = Duration::from_secs(10);

const SYSTEM_PROMPT: &str = "You repair speech-recognition transcripts. \
Fix misheard words, grammar and punctuation while keeping the speaker's meaning \
and wording wherever possible. Reply with the corrected sentence only, no quotes \
or commentary.";

/// Turns a raw transcript into clearer text
#[async_trait]
pub trait Corrector: Send + Sync {
    /// Correct `text`
    ///
    /// # Errors
    ///
    /// Returns error if the correction service fails or returns nothing
    async fn correct(&self, text: &str) -> Result<String>;
}

/// Clarify `text`, falling back to it unchanged on any failure
///
/// Never fails: short input skips the call, and errors, timeouts, and empty
/// responses all yield the original transcript.
pub async fn clarify(
    corrector: &dyn Corrector,
    text: &str,
    min_chars: usize,
    timeout: Duration,
) -> String {
    if text.trim().chars().count() < min_chars {
        tracing::debug!(text, "transcript too short, skipping correction");
        return text.to_string();
    }

    match tokio::time::timeout(timeout, corrector.correct(text)).await {
        Ok(Ok(corrected)) if !corrected.trim().is_empty() => corrected.trim().to_string(),
        Ok(Ok(_)) => {
            tracing::warn!("correction returned empty text, using original");
            text.to_string()
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "correction failed, using original");
            text.to_string()
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis(),
                "correction timed out, using original"
            );
            text.to_string()
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Corrector backed by an OpenAI-compatible chat completions endpoint
pub struct LlmCorrector {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmCorrector {
    /// Create a new corrector
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for transcript correction".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl Corrector for LlmCorrector {
    async fn correct(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Correction(format!("chat API error {status}: {body}")));
        }

        let body = response.text().await?;
        let corrected = parse_chat_reply(&body)?;
        tracing::debug!(original = text, corrected = %corrected, "transcript corrected");
        Ok(corrected)
    }
}

fn parse_chat_reply(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().trim_matches('"').trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Correction("empty completion".to_string()))
}
