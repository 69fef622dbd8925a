//! TOML configuration file loading
//!
//! Supports `~/.config/companion/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Dialogue service connection
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Session credentials and identity
    #[serde(default)]
    pub auth: AuthFileConfig,

    /// ASR/TTS endpoints and voice
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Idle animation rotation
    #[serde(default)]
    pub ambient: AmbientFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// WebSocket URL (e.g. "ws://localhost:3002")
    pub url: Option<String>,

    /// Largest inbound message accepted, in bytes
    pub max_message_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthFileConfig {
    pub appkey: Option<String>,
    pub token: Option<String>,
    pub version_id: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub character_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    pub asr_url: Option<String>,
    pub tts_url: Option<String>,
    pub appkey: Option<String>,
    pub token: Option<String>,
    /// TTS voice identifier (e.g. "zhibei_emo")
    pub voice: Option<String>,
    pub emotion_intensity: Option<f32>,
    pub format: Option<String>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AmbientFileConfig {
    pub quiet: Option<Vec<String>>,
    pub micro: Option<Vec<String>>,
    pub active: Option<Vec<String>>,
    pub quiet_weight: Option<f32>,
    pub micro_weight: Option<f32>,
    pub active_weight: Option<f32>,
    /// Brightness while no session is connected
    pub dim_brightness: Option<f32>,
    /// How long the console presenter pretends an action lasts
    pub action_duration_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_at(&path))
}

/// Load the TOML config file at `path`, falling back to defaults
pub fn load_config_file_at(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/companion/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "companion").map(|d| d.config_dir().join("config.toml"))
}
