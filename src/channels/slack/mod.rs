//! Slack channel adapter
//!
//! Receives events over the RTM `WebSocket` API and posts reactions through
//! the Web API. The RTM connection is owned by a background task that
//! reconnects with backoff and forwards events on an mpsc channel.

mod rtm;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::retry::{RetryPolicy, is_recoverable, parse_retry_after};
use super::{Channel, ChannelEvent, SessionIdentity};
use crate::{Error, Result};

const SLACK_API_URL: &str = "https://slack.com/api";

/// Reactions are a tier 3 method (50+ requests per minute)
const WEB_API_REQUESTS_PER_MINUTE: u32 = 50;

/// Error codes meaning the token will never work
const AUTH_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "no_permission",
];

/// Slack adapter settings
#[derive(Debug, Clone)]
pub struct SlackOptions {
    /// Web API base URL
    pub api_url: String,
    /// Interval between RTM keep-alive pings
    pub ping_interval: Duration,
    /// Backoff for Web API retries and RTM reconnects
    pub retry: RetryPolicy,
    /// Capacity of the event channel
    pub event_buffer: usize,
}

impl Default for SlackOptions {
    fn default() -> Self {
        Self {
            api_url: SLACK_API_URL.to_string(),
            ping_interval: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            event_buffer: 100,
        }
    }
}

/// Slack channel adapter
pub struct SlackChannel {
    api: SlackApi,
    options: SlackOptions,
    event_tx: Option<mpsc::Sender<ChannelEvent>>,
    manager: Option<JoinHandle<()>>,
}

impl SlackChannel {
    /// Create the adapter and the receiver its events arrive on
    ///
    /// # Arguments
    ///
    /// * `bot_token` - Slack bot OAuth token (xoxb-...)
    /// * `options` - Adapter settings
    #[must_use]
    pub fn with_receiver(
        bot_token: SecretString,
        options: SlackOptions,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (tx, rx) = mpsc::channel(options.event_buffer.max(1));
        let channel = Self {
            api: SlackApi::new(bot_token, &options),
            options,
            event_tx: Some(tx),
            manager: None,
        };
        (channel, rx)
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn connect(&mut self) -> Result<()> {
        let events = self
            .event_tx
            .take()
            .ok_or_else(|| Error::Channel("Slack connection manager already started".to_string()))?;

        let manager = rtm::RtmManager::new(
            self.api.clone(),
            events,
            self.options.ping_interval,
            self.options.retry.clone(),
        );
        self.manager = Some(tokio::spawn(manager.run()));

        tracing::info!("Slack connection manager started");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(manager) = self.manager.take() {
            manager.abort();
        }
        tracing::info!("Slack channel disconnected");
        Ok(())
    }

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        let name = emoji.trim_matches(':');
        let request = ReactionRequest {
            channel: channel_id,
            timestamp: message_id,
            name,
        };

        let reply: SlackResponse<serde_json::Value> =
            self.api.post("reactions.add", &request).await?;

        // A marker that is already there counts as posted
        let accepted = reply.ok || reply.error.as_deref() == Some("already_reacted");
        if !accepted {
            return Err(Error::Channel(format!(
                "Slack reactions.add rejected {name} on {channel_id}/{message_id}: {}",
                reply.error.as_deref().unwrap_or("unknown error")
            )));
        }

        tracing::debug!(channel = %channel_id, message_id, emoji = name, "Slack reaction added");
        Ok(())
    }
}

/// Slack API response wrapper
#[derive(Debug, Deserialize)]
struct SlackResponse<T> {
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    data: Option<T>,
}

/// Reaction add request
#[derive(Debug, Serialize)]
struct ReactionRequest<'a> {
    channel: &'a str,
    timestamp: &'a str,
    name: &'a str,
}

/// `rtm.connect` response
#[derive(Debug, Deserialize)]
struct RtmConnectResponse {
    url: String,
    #[serde(rename = "self")]
    me: RtmSelf,
    team: Option<RtmTeam>,
}

#[derive(Debug, Deserialize)]
struct RtmSelf {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RtmTeam {
    domain: Option<String>,
}

/// Shared Slack Web API client
#[derive(Clone)]
struct SlackApi {
    client: reqwest::Client,
    token: Arc<SecretString>,
    base_url: String,
    retry: RetryPolicy,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl SlackApi {
    fn new(token: SecretString, options: &SlackOptions) -> Self {
        let rpm = NonZeroU32::new(WEB_API_REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN);
        Self {
            client: reqwest::Client::new(),
            token: Arc::new(token),
            base_url: options.api_url.trim_end_matches('/').to_string(),
            retry: options.retry.clone(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(rpm))),
        }
    }

    /// Call a Web API method, retrying transient failures
    ///
    /// An `ok: false` body is returned to the caller once retries are exhausted
    /// or the error is not transient.
    async fn post<B, T>(&self, method: &str, body: &B) -> Result<SlackResponse<T>>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);
        let mut attempt = 0;

        loop {
            self.limiter.until_ready().await;

            let response = self
                .client
                .post(&url)
                .bearer_auth(self.token.expose_secret())
                .json(body)
                .send()
                .await
                .map_err(|e| Error::Channel(format!("Slack {method} request failed: {e}")))?;

            let status = response.status().as_u16();
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );

            let parsed = if response.status().is_success() {
                let result: SlackResponse<T> = response
                    .json()
                    .await
                    .map_err(|e| Error::Channel(format!("Slack {method} parse error: {e}")))?;
                Some(result)
            } else {
                None
            };

            let error_code = parsed.as_ref().and_then(|r| r.error.as_deref());
            let failed = parsed.as_ref().is_none_or(|r| !r.ok);

            if failed && is_recoverable(status, error_code) && self.retry.allows(attempt) {
                let delay = self.retry.delay(attempt, retry_after);
                tracing::warn!(
                    method,
                    status,
                    error = ?error_code,
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Slack API call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return parsed.ok_or_else(|| {
                Error::Channel(format!("Slack {method} failed with HTTP status {status}"))
            });
        }
    }

    /// Open an RTM session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the token is rejected, [`Error::Channel`]
    /// for any other failure
    async fn rtm_connect(&self) -> Result<(String, SessionIdentity)> {
        let response: SlackResponse<RtmConnectResponse> =
            self.post("rtm.connect", &serde_json::json!({})).await?;

        if !response.ok {
            let code = response.error.unwrap_or_default();
            if AUTH_ERRORS.contains(&code.as_str()) {
                return Err(Error::Auth(code));
            }
            return Err(Error::Channel(format!("Slack rtm.connect failed: {code}")));
        }

        let data = response
            .data
            .ok_or_else(|| Error::Channel("Slack rtm.connect returned no session".to_string()))?;

        tracing::info!(
            user_id = %data.me.id,
            name = %data.me.name,
            team = ?data.team.as_ref().and_then(|t| t.domain.as_deref()),
            "Slack RTM session opened"
        );

        Ok((
            data.url,
            SessionIdentity {
                user_id: data.me.id,
                name: data.me.name,
            },
        ))
    }
}
