//! Speech service clients
//!
//! Transcription (ASR) and synthesis (TTS) are one-shot HTTP calls. Failures
//! are logged and collapse to `None`: a turn without a transcript or without
//! audio carries on as text.

mod asr;
mod tts;

use async_trait::async_trait;

pub use asr::AsrClient;
pub use tts::{TtsClient, build_ssml};

/// Turns recorded audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV bytes; `None` when the service gave no usable result
    async fn transcribe(&self, audio: Vec<u8>) -> Option<String>;
}

/// Turns reply text into audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with an emotion category; `None` on any failure
    async fn synthesize(&self, text: String, emotion: String) -> Option<Vec<u8>>;
}
