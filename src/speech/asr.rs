//! Speech-to-text (ASR) client

use async_trait::async_trait;

use super::Transcriber;
use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Response body of the transcription endpoint
#[derive(serde::Deserialize)]
struct AsrResponse {
    result: String,
}

/// Posts raw audio to the transcription endpoint
pub struct AsrClient {
    client: reqwest::Client,
    url: String,
    appkey: String,
    token: String,
    format: String,
    sample_rate: u32,
}

impl AsrClient {
    /// Create a client from the speech configuration
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.asr_url.clone(),
            appkey: config.appkey.clone(),
            token: config.token.clone(),
            format: config.format.clone(),
            sample_rate: config.sample_rate,
        }
    }

    /// Transcribe audio, surfacing the failure reason
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, or an
    /// unparseable body
    pub async fn try_transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let sample_rate = self.sample_rate.to_string();
        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("appkey", self.appkey.as_str()),
                ("token", self.token.as_str()),
                ("format", self.format.as_str()),
                ("sample_rate", sample_rate.as_str()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("ASR error {status}: {body}")));
        }

        let body = response.text().await?;
        let parsed: AsrResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Stt(format!("malformed ASR response: {e}")))?;

        tracing::info!(transcript = %parsed.result, "transcription complete");
        Ok(parsed.result)
    }
}

#[async_trait]
impl Transcriber for AsrClient {
    async fn transcribe(&self, audio: Vec<u8>) -> Option<String> {
        match self.try_transcribe(audio).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "transcription unavailable");
                None
            }
        }
    }
}
