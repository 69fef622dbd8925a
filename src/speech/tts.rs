//! Text-to-speech (TTS) client

use async_trait::async_trait;

use super::Synthesizer;
use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Posts SSML to the synthesis endpoint
pub struct TtsClient {
    client: reqwest::Client,
    url: String,
    appkey: String,
    token: String,
    voice: String,
    emotion_intensity: f32,
    format: String,
    sample_rate: u32,
}

#[derive(serde::Serialize)]
struct TtsRequest<'a> {
    appkey: &'a str,
    token: &'a str,
    text: &'a str,
    format: &'a str,
    sample_rate: u32,
    voice: &'a str,
}

impl TtsClient {
    /// Create a client from the speech configuration
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.tts_url.clone(),
            appkey: config.appkey.clone(),
            token: config.token.clone(),
            voice: config.voice.clone(),
            emotion_intensity: config.emotion_intensity,
            format: config.format.clone(),
            sample_rate: config.sample_rate,
        }
    }

    /// Synthesize, surfacing the failure reason
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, or a
    /// response that is not `audio/*`
    pub async fn try_synthesize(&self, text: &str, emotion: &str) -> Result<Vec<u8>> {
        let ssml = build_ssml(&self.voice, text, emotion, self.emotion_intensity);
        tracing::debug!(chars = text.len(), emotion, "starting synthesis");

        let request = TtsRequest {
            appkey: &self.appkey,
            token: &self.token,
            text: &ssml,
            format: &self.format,
            sample_rate: self.sample_rate,
            voice: &self.voice,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() || !content_type.starts_with("audio/") {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!(
                "TTS error {status} ({content_type}): {body}"
            )));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), content_type, "synthesis complete");
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TtsClient {
    async fn synthesize(&self, text: String, emotion: String) -> Option<Vec<u8>> {
        match self.try_synthesize(&text, &emotion).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                tracing::warn!(error = %e, "synthesis unavailable");
                None
            }
        }
    }
}

/// Wrap `text` in SSML carrying voice and emotion
///
/// The emotion element is omitted when no category is given.
#[must_use]
pub fn build_ssml(voice: &str, text: &str, emotion: &str, intensity: f32) -> String {
    let voice = escape(voice);
    let text = escape(text);
    if emotion.is_empty() {
        return format!(r#"<speak voice="{voice}">{text}</speak>"#);
    }
    let emotion = escape(emotion);
    format!(
        r#"<speak voice="{voice}"><emotion category="{emotion}" intensity="{intensity:.1}">{text}</emotion></speak>"#
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
