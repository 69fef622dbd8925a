//! Companion - realtime conversational session engine for virtual characters
//!
//! This library provides the client side of a voice chat with an animated
//! character:
//! - Voice capture, playback and WAV encoding
//! - A persistent WebSocket session to the dialogue service
//! - Speech recognition and synthesis clients
//! - Turn-taking with barge-in and idle animation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Presenter  │  Chat log  │  CLI           │
//! └────────────────────┬────────────────────────────────┘
//!                      │  EventBus / OrchestratorHandle
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Orchestrator                        │
//! │   Conversation  │  Ambient rotation  │  Playback    │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼───────────┐     ┌───────────▼────────────┐
//! │  Channel (WebSocket) │     │    ASR  │  TTS (HTTP)  │
//! └──────────────────────┘     └────────────────────────┘
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod presenter;
pub mod protocol;
pub mod session;
pub mod speech;
pub mod transport;
pub mod voice;

pub use bus::{BusEvent, EventBus, SubscriptionId, Topic};
pub use config::Config;
pub use error::{Error, Result};
pub use presenter::{ConsolePresenter, Presenter};
pub use protocol::{ActionCue, Envelope, ReplyPayload, Utterance};
pub use session::{Orchestrator, OrchestratorHandle, Services};
pub use speech::{AsrClient, Synthesizer, Transcriber, TtsClient};
pub use transport::{Channel, ChannelEvent, ConnectionState, Connector, WsConnector};
pub use voice::{AudioBuffer, AudioCapture, AudioSink, Speaker};
