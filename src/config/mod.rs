//! Configuration management for the companion client
//!
//! Precedence is env > TOML file > default, field by field.

pub mod file;

use std::path::Path;

use file::ConfigFile;

use crate::protocol::AuthPayload;
use crate::transport::DEFAULT_MAX_MESSAGE_SIZE;
use crate::{Error, Result};

const DEFAULT_SERVER_URL: &str = "ws://localhost:3002";
const DEFAULT_ASR_URL: &str = "https://nls-gateway-cn-shanghai.aliyuncs.com/stream/v1/asr";
const DEFAULT_TTS_URL: &str = "https://nls-gateway-cn-shanghai.aliyuncs.com/stream/v1/tts";
const DEFAULT_VOICE: &str = "zhibei_emo";

/// Companion client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Dialogue service connection
    pub server: ServerConfig,

    /// Session credentials and identity
    pub auth: AuthConfig,

    /// Speech services
    pub speech: SpeechConfig,

    /// Idle animation rotation and presentation
    pub ambient: AmbientConfig,
}

/// Dialogue service connection
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket URL
    pub url: String,

    /// Largest inbound message accepted, in bytes
    pub max_message_size: usize,
}

/// Credentials and identity sent in the `auth` envelope
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub appkey: String,
    pub token: String,
    pub version_id: String,
    pub user_id: String,
    pub username: String,
    pub character_id: String,
}

impl AuthConfig {
    /// Wire payload for the `auth` envelope
    #[must_use]
    pub fn payload(&self) -> AuthPayload {
        AuthPayload {
            appkey: self.appkey.clone(),
            token: self.token.clone(),
            version_id: self.version_id.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            character_id: self.character_id.clone(),
        }
    }
}

/// ASR/TTS endpoints and voice parameters
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Transcription endpoint
    pub asr_url: String,

    /// Synthesis endpoint
    pub tts_url: String,

    /// Speech service application key
    pub appkey: String,

    /// Speech service access token
    pub token: String,

    /// TTS voice identifier
    pub voice: String,

    /// Emotion intensity passed in the SSML
    pub emotion_intensity: f32,

    /// Audio container requested from both services
    pub format: String,

    /// Sample rate requested from both services
    pub sample_rate: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            asr_url: DEFAULT_ASR_URL.to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
            appkey: String::new(),
            token: String::new(),
            voice: DEFAULT_VOICE.to_string(),
            emotion_intensity: 1.0,
            format: "wav".to_string(),
            sample_rate: crate::voice::SAMPLE_RATE,
        }
    }
}

/// Idle animation pools and presentation tuning
#[derive(Debug, Clone)]
pub struct AmbientConfig {
    /// Barely-moving idle cues
    pub quiet: Vec<String>,

    /// Small gesture cues
    pub micro: Vec<String>,

    /// Large movement cues
    pub active: Vec<String>,

    /// Relative pick weights for quiet, micro, active
    pub weights: [f32; 3],

    /// Brightness while no session is connected
    pub dim_brightness: f32,

    /// Simulated action length for the console presenter
    pub action_duration_ms: u64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        let cues = |names: &[&str]| names.iter().map(ToString::to_string).collect();
        Self {
            quiet: cues(&["idle_6", "idle_7"]),
            micro: cues(&["idle_1", "idle_2", "idle_3", "idle_4", "idle_5"]),
            active: cues(&["idle_8", "idle_9", "idle_10"]),
            weights: [0.70, 0.25, 0.05],
            dim_brightness: 0.6,
            action_duration_ms: 4000,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the default config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration using an explicit config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_sources(file::load_config_file_at(path), |key| {
            std::env::var(key).ok()
        })
    }

    /// Merge a parsed file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server = ServerConfig {
            url: env("COMPANION_SERVER_URL")
                .or(fc.server.url)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            max_message_size: fc.server.max_message_size.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE),
        };

        let auth = AuthConfig {
            appkey: env("COMPANION_APPKEY").or(fc.auth.appkey).unwrap_or_default(),
            token: env("COMPANION_TOKEN").or(fc.auth.token).unwrap_or_default(),
            version_id: env("COMPANION_VERSION_ID")
                .or(fc.auth.version_id)
                .unwrap_or_default(),
            user_id: env("COMPANION_USER_ID").or(fc.auth.user_id).unwrap_or_default(),
            username: env("COMPANION_USERNAME")
                .or(fc.auth.username)
                .unwrap_or_default(),
            character_id: env("COMPANION_CHARACTER_ID")
                .or(fc.auth.character_id)
                .unwrap_or_default(),
        };

        let defaults = SpeechConfig::default();
        let speech = SpeechConfig {
            asr_url: env("COMPANION_ASR_URL")
                .or(fc.speech.asr_url)
                .unwrap_or(defaults.asr_url),
            tts_url: env("COMPANION_TTS_URL")
                .or(fc.speech.tts_url)
                .unwrap_or(defaults.tts_url),
            appkey: env("COMPANION_SPEECH_APPKEY")
                .or(fc.speech.appkey)
                .unwrap_or_default(),
            token: env("COMPANION_SPEECH_TOKEN")
                .or(fc.speech.token)
                .unwrap_or_default(),
            voice: env("COMPANION_TTS_VOICE")
                .or(fc.speech.voice)
                .unwrap_or(defaults.voice),
            emotion_intensity: fc
                .speech
                .emotion_intensity
                .unwrap_or(defaults.emotion_intensity),
            format: fc.speech.format.unwrap_or(defaults.format),
            sample_rate: fc.speech.sample_rate.unwrap_or(defaults.sample_rate),
        };

        let defaults = AmbientConfig::default();
        let ambient = AmbientConfig {
            quiet: fc.ambient.quiet.unwrap_or(defaults.quiet),
            micro: fc.ambient.micro.unwrap_or(defaults.micro),
            active: fc.ambient.active.unwrap_or(defaults.active),
            weights: [
                fc.ambient.quiet_weight.unwrap_or(defaults.weights[0]),
                fc.ambient.micro_weight.unwrap_or(defaults.weights[1]),
                fc.ambient.active_weight.unwrap_or(defaults.weights[2]),
            ],
            dim_brightness: fc.ambient.dim_brightness.unwrap_or(defaults.dim_brightness),
            action_duration_ms: fc
                .ambient
                .action_duration_ms
                .unwrap_or(defaults.action_duration_ms),
        };

        let config = Self {
            server,
            auth,
            speech,
            ambient,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the session engine relies on
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.url)
            .map_err(|e| Error::Config(format!("invalid server url {:?}: {e}", self.server.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "server url must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        let ambient = &self.ambient;
        if ambient.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config("ambient weights must be non-negative".to_string()));
        }
        let usable: f32 = [&ambient.quiet, &ambient.micro, &ambient.active]
            .iter()
            .zip(ambient.weights)
            .filter(|(pool, _)| !pool.is_empty())
            .map(|(_, w)| w)
            .sum();
        if usable <= 0.0 {
            return Err(Error::Config(
                "at least one non-empty ambient pool needs a positive weight".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&ambient.dim_brightness) {
            return Err(Error::Config("dim_brightness must be within [0, 1]".to_string()));
        }
        if self.server.max_message_size == 0 {
            return Err(Error::Config("max_message_size must be positive".to_string()));
        }

        Ok(())
    }
}
