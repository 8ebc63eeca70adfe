//! Application configuration
//!
//! Stored as TOML in the platform config directory. A missing file means
//! defaults; `PHANTOM_WORDS_CONFIG` points at an alternative file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_HTTP_PORT, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::error::{Error, Result};
use crate::playback::Locale;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "PHANTOM_WORDS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language of status messages
    pub locale: Locale,
    pub ui: UiConfig,
    pub audio: AudioConfig,
}

/// Web UI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub bind_address: String,
    pub http_port: u16,
    /// Directory served at `/`, if any
    pub static_dir: Option<PathBuf>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            static_dir: None,
        }
    }
}

/// Where rendered audio goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// Sound card through cpal
    #[default]
    Cpal,
    /// Nowhere; for headless hosts
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name, default device when unset
    pub output_device: Option<String>,
    pub backend: AudioBackend,
    pub max_payload_bytes: usize,
    pub max_delay_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            backend: AudioBackend::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl AppConfig {
    /// Config file location: `$PHANTOM_WORDS_CONFIG`, else the platform config dir
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "phantom-words")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                let config = Self::load(path)?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Some(path) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}
