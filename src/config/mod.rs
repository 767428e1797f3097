//! Configuration management for beacon-cast
//!
//! Precedence: environment > TOML file > defaults. The language also
//! accepts a command-line override that beats everything else.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::channels::SlackOptions;
use crate::devices::cast::CastOptions;
use crate::feedback::MarkerSet;
use crate::{Error, Result};

use self::file::ConfigFile;

/// Environment variables holding the Slack token, in lookup order
pub const TOKEN_ENV_VARS: &[&str] = &["SLACK_BOT_TOKEN", "API_TOKEN_FOR_SLACK"];

/// Default speech language
pub const DEFAULT_LANGUAGE: &str = "ja";

/// Default mDNS browse window
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_millis(3000);

/// beacon-cast configuration
#[derive(Debug)]
pub struct Config {
    /// Slack bot token, required only to run the relay
    pub slack_token: Option<SecretString>,

    /// Language code for every `speak` call
    pub language: String,

    /// Browse window per discovery run
    pub discovery_window: Duration,

    /// Cast device settings
    pub cast: CastOptions,

    /// Reaction emoji names
    pub markers: MarkerSet,

    /// Slack adapter settings
    pub slack: SlackOptions,
}

impl Config {
    /// Load configuration from the environment and the config file
    #[must_use]
    pub fn load(language: Option<&str>) -> Self {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok(), language)
    }

    /// Take the Slack token out of the configuration
    ///
    /// # Errors
    ///
    /// Returns error if no Slack token is configured
    pub fn take_slack_token(&mut self) -> Result<SecretString> {
        self.slack_token.take().ok_or_else(|| {
            Error::Config(format!(
                "Slack token not set: export {} or run `beacon-cast setup`",
                TOKEN_ENV_VARS.join(" or ")
            ))
        })
    }

    /// Build configuration from a parsed file and an environment lookup
    pub fn from_sources<F>(fc: ConfigFile, env: F, language: Option<&str>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Slack token (env > toml)
        let slack_token = TOKEN_ENV_VARS
            .iter()
            .find_map(|key| env(*key))
            .or(fc.slack.token.filter(|t| !t.trim().is_empty()))
            .map(SecretString::from);

        // Language (cli > env > toml > default)
        let language = language
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .or_else(|| env("BEACON_CAST_LANG"))
            .or(fc.speech.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        // Discovery window (env > toml > default)
        let discovery_window = env("BEACON_CAST_DISCOVERY_MS")
            .and_then(|s| s.parse().ok())
            .or(fc.discovery.timeout_ms)
            .map_or(DEFAULT_DISCOVERY_WINDOW, Duration::from_millis);

        let cast_defaults = CastOptions::default();
        let cast = CastOptions {
            tts_url: fc.speech.tts_url.unwrap_or(cast_defaults.tts_url),
            timeout: fc
                .speech
                .timeout_secs
                .map_or(cast_defaults.timeout, Duration::from_secs),
        };

        let marker_defaults = MarkerSet::default();
        let markers = MarkerSet {
            warning: fc.markers.warning.unwrap_or(marker_defaults.warning),
            success: fc.markers.success.unwrap_or(marker_defaults.success),
            failure: fc.markers.failure.unwrap_or(marker_defaults.failure),
        };

        let slack_defaults = SlackOptions::default();
        let slack = SlackOptions {
            ping_interval: fc
                .slack
                .ping_interval_secs
                .filter(|s| *s > 0)
                .map_or(slack_defaults.ping_interval, Duration::from_secs),
            ..slack_defaults
        };

        Self {
            slack_token,
            language,
            discovery_window,
            cast,
            markers,
            slack,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::file::{DiscoveryFileConfig, MarkersFileConfig, SlackFileConfig, SpeechFileConfig};
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_token_is_config_error() {
        let mut config = Config::from_sources(ConfigFile::default(), env_of(&[]), None);
        let err = config.take_slack_token().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("SLACK_BOT_TOKEN"));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let config =
            Config::from_sources(ConfigFile::default(), env_of(&[("SLACK_BOT_TOKEN", "  ")]), None);
        assert!(config.slack_token.is_none());
    }

    #[test]
    fn token_is_taken_once() {
        let mut config =
            Config::from_sources(ConfigFile::default(), env_of(&[("SLACK_BOT_TOKEN", "x")]), None);
        assert!(config.take_slack_token().is_ok());
        assert!(config.take_slack_token().is_err());
    }

    #[test]
    fn defaults_with_legacy_token_var() {
        let config = Config::from_sources(
            ConfigFile::default(),
            env_of(&[("API_TOKEN_FOR_SLACK", "xoxb-legacy")]),
            None,
        );

        assert_eq!(config.slack_token.unwrap().expose_secret(), "xoxb-legacy");
        assert_eq!(config.language, "ja");
        assert_eq!(config.discovery_window, Duration::from_secs(3));
        assert_eq!(config.markers, MarkerSet::default());
        assert_eq!(config.cast.timeout, Duration::from_secs(15));
        assert_eq!(config.slack.ping_interval, Duration::from_secs(30));
    }

    #[test]
    fn env_beats_file() {
        let fc = ConfigFile {
            slack: SlackFileConfig {
                token: Some("xoxb-file".to_string()),
                ping_interval_secs: None,
            },
            speech: SpeechFileConfig {
                language: Some("fr".to_string()),
                ..SpeechFileConfig::default()
            },
            discovery: DiscoveryFileConfig {
                timeout_ms: Some(1000),
            },
            ..ConfigFile::default()
        };
        let env = env_of(&[
            ("SLACK_BOT_TOKEN", "xoxb-env"),
            ("BEACON_CAST_LANG", "de"),
            ("BEACON_CAST_DISCOVERY_MS", "2500"),
        ]);

        let config = Config::from_sources(fc, env, None);
        assert_eq!(config.slack_token.unwrap().expose_secret(), "xoxb-env");
        assert_eq!(config.language, "de");
        assert_eq!(config.discovery_window, Duration::from_millis(2500));
    }

    #[test]
    fn cli_language_beats_env() {
        let env = env_of(&[("SLACK_BOT_TOKEN", "x"), ("BEACON_CAST_LANG", "de")]);
        let config = Config::from_sources(ConfigFile::default(), env, Some("en-US"));
        assert_eq!(config.language, "en-US");
    }

    #[test]
    fn file_values_apply() {
        let fc = ConfigFile {
            slack: SlackFileConfig {
                token: Some("xoxb-file".to_string()),
                ping_interval_secs: Some(10),
            },
            speech: SpeechFileConfig {
                language: Some("fr".to_string()),
                timeout_secs: Some(5),
                tts_url: Some("https://tts.example/speak".to_string()),
            },
            markers: MarkersFileConfig {
                failure: Some("x".to_string()),
                ..MarkersFileConfig::default()
            },
            ..ConfigFile::default()
        };

        let config = Config::from_sources(fc, env_of(&[]), None);
        assert_eq!(config.slack_token.as_ref().unwrap().expose_secret(), "xoxb-file");
        assert_eq!(config.language, "fr");
        assert_eq!(config.cast.timeout, Duration::from_secs(5));
        assert_eq!(config.cast.tts_url, "https://tts.example/speak");
        assert_eq!(config.markers.failure, "x");
        assert_eq!(config.markers.success, "sound");
        assert_eq!(config.slack.ping_interval, Duration::from_secs(10));
    }

    #[test]
    fn dotenv_file_supplies_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_TOKEN_FOR_SLACK=xoxb-dotenv\nBEACON_CAST_LANG=en\n").unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .map(std::result::Result::unwrap)
            .collect();
        let mut config =
            Config::from_sources(ConfigFile::default(), |key| vars.get(key).cloned(), None);

        assert_eq!(config.take_slack_token().unwrap().expose_secret(), "xoxb-dotenv");
        assert_eq!(config.language, "en");
    }

    #[test]
    fn invalid_discovery_env_falls_back() {
        let env = env_of(&[("SLACK_BOT_TOKEN", "x"), ("BEACON_CAST_DISCOVERY_MS", "soon")]);
        let config = Config::from_sources(ConfigFile::default(), env, None);
        assert_eq!(config.discovery_window, DEFAULT_DISCOVERY_WINDOW);
    }
}
