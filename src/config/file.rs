//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon-cast/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Slack connection settings
    #[serde(default, skip_serializing_if = "SlackFileConfig::is_empty")]
    pub slack: SlackFileConfig,

    /// Speech settings
    #[serde(default, skip_serializing_if = "SpeechFileConfig::is_empty")]
    pub speech: SpeechFileConfig,

    /// Device discovery settings
    #[serde(default, skip_serializing_if = "DiscoveryFileConfig::is_empty")]
    pub discovery: DiscoveryFileConfig,

    /// Reaction emoji names
    #[serde(default, skip_serializing_if = "MarkersFileConfig::is_empty")]
    pub markers: MarkersFileConfig,
}

/// Slack configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SlackFileConfig {
    /// Bot token (xoxb-...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// RTM keep-alive ping interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,
}

impl SlackFileConfig {
    const fn is_empty(&self) -> bool {
        self.token.is_none() && self.ping_interval_secs.is_none()
    }
}

/// Speech configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SpeechFileConfig {
    /// Language code (e.g. "ja", "en-US")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Per-device speak timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Text-to-speech endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_url: Option<String>,
}

impl SpeechFileConfig {
    const fn is_empty(&self) -> bool {
        self.language.is_none() && self.timeout_secs.is_none() && self.tts_url.is_none()
    }
}

/// Discovery configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DiscoveryFileConfig {
    /// Browse window per discovery run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl DiscoveryFileConfig {
    const fn is_empty(&self) -> bool {
        self.timeout_ms.is_none()
    }
}

/// Marker emoji configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MarkersFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl MarkersFileConfig {
    const fn is_empty(&self) -> bool {
        self.warning.is_none() && self.success.is_none() && self.failure.is_none()
    }
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> ConfigFile {
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

/// Serialize and write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn write_config_file(path: &Path, config: &ConfigFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// Return the config file path: `~/.config/omni/beacon-cast/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon-cast")
            .join("config.toml")
    })
}
