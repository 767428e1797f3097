//! Google Cast speakers
//!
//! Speaking works by pointing the device's default media receiver at a
//! text-to-speech audio URL. Each `speak` call opens its own connection, so
//! a device whose address changed simply fails until the next discovery.

mod connection;
pub mod discovery;
pub mod proto;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio_native_tls::TlsConnector;
use url::Url;

pub use connection::{CastConnection, tls_connector};
pub use discovery::CastDiscovery;

use crate::devices::Speaker;
use crate::{Error, Result};

/// Default Media Receiver application id
pub const DEFAULT_MEDIA_RECEIVER: &str = "CC1AD845";

/// Google Translate text-to-speech endpoint
pub const DEFAULT_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Settings shared by every Cast device
#[derive(Debug, Clone)]
pub struct CastOptions {
    /// Text-to-speech endpoint the device fetches audio from
    pub tts_url: String,
    /// Upper bound for one `speak` call, connection included
    pub timeout: Duration,
}

impl Default for CastOptions {
    fn default() -> Self {
        Self {
            tts_url: DEFAULT_TTS_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Build the audio URL for `text` spoken in `language`
///
/// # Errors
///
/// Returns error if `base` is not a valid URL
pub fn tts_url(base: &str, text: &str, language: &str) -> Result<Url> {
    Url::parse_with_params(
        base,
        &[
            ("ie", "UTF-8"),
            ("q", text),
            ("tl", language),
            ("client", "tw-ob"),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid TTS URL {base}: {e}")))
}

/// A Cast device found on the network
pub struct CastDevice {
    name: String,
    address: SocketAddr,
    options: CastOptions,
    tls: TlsConnector,
}

impl CastDevice {
    /// Create a device handle
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized
    pub fn new(name: String, address: SocketAddr, options: CastOptions) -> Result<Self> {
        Ok(Self::with_connector(name, address, options, tls_connector()?))
    }

    /// Create a device handle sharing an existing TLS connector
    #[must_use]
    pub const fn with_connector(
        name: String,
        address: SocketAddr,
        options: CastOptions,
        tls: TlsConnector,
    ) -> Self {
        Self {
            name,
            address,
            options,
            tls,
        }
    }

    async fn play(&self, url: &Url) -> Result<()> {
        let mut conn = CastConnection::open(self.address, &self.tls).await?;
        let app = conn.launch(DEFAULT_MEDIA_RECEIVER).await?;
        conn.load(&app, url.as_str(), "audio/mp3").await?;
        conn.close().await;
        Ok(())
    }
}

#[async_trait]
impl Speaker for CastDevice {
    fn address(&self) -> SocketAddr {
        self.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(&self, text: &str, language: &str) -> Result<()> {
        let url = tts_url(&self.options.tts_url, text, language)?;

        tokio::time::timeout(self.options.timeout, self.play(&url))
            .await
            .map_err(|_| {
                Error::Device(format!(
                    "{} did not respond within {}s",
                    self.name,
                    self.options.timeout.as_secs()
                ))
            })??;

        tracing::debug!(device = %self.name, address = %self.address, "media loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tts_url() {
        let url = tts_url(DEFAULT_TTS_URL, "こんにちは 世界", "ja").unwrap();
        assert_eq!(url.host_str(), Some("translate.google.com"));
        assert_eq!(url.path(), "/translate_tts");

        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            params,
            [
                ("ie".to_string(), "UTF-8".to_string()),
                ("q".to_string(), "こんにちは 世界".to_string()),
                ("tl".to_string(), "ja".to_string()),
                ("client".to_string(), "tw-ob".to_string()),
            ]
        );
    }

    #[test]
    fn escapes_query_characters() {
        let url = tts_url(DEFAULT_TTS_URL, "a&b=c", "en").unwrap();
        assert!(url.as_str().contains("q=a%26b%3Dc"));
    }

    #[test]
    fn empty_text_still_builds() {
        let url = tts_url(DEFAULT_TTS_URL, "", "en").unwrap();
        assert!(url.as_str().contains("q=&"));
    }

    #[test]
    fn rejects_invalid_base() {
        assert!(tts_url("not a url", "hi", "en").is_err());
    }

    #[tokio::test]
    async fn unreachable_device_fails_within_timeout() {
        let options = CastOptions {
            timeout: Duration::from_millis(500),
            ..CastOptions::default()
        };
        // TEST-NET-1, never routable
        let device =
            CastDevice::new("ghost".to_string(), "192.0.2.1:8009".parse().unwrap(), options)
                .unwrap();

        let start = tokio::time::Instant::now();
        assert!(device.speak("hello", "en").await.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
