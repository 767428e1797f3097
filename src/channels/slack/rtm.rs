//! RTM connection manager
//!
//! Owns the `WebSocket` session: opens it via `rtm.connect`, forwards
//! message events, keeps it alive with pings and reconnects with backoff.
//! Stops for good when the token is rejected or the event receiver is
//! dropped.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::SlackApi;
use crate::channels::retry::RetryPolicy;
use crate::channels::{ChannelEvent, IncomingMessage};
use crate::{Error, Result};

/// Message subtypes that describe changes to other messages
const IGNORED_SUBTYPES: &[&str] = &["message_changed", "message_deleted", "message_replied"];

/// Why a session ended without an error
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Connection dropped or server asked us to reconnect
    Reconnect(String),
    /// Nobody is listening for events anymore
    ReceiverClosed,
}

/// RTM frame
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RtmEvent {
    Hello,
    Goodbye,
    Message(RtmMessage),
    Error { error: RtmError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RtmMessage {
    channel: Option<String>,
    ts: Option<String>,
    user: Option<String>,
    text: Option<String>,
    subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RtmError {
    code: Option<i64>,
    msg: Option<String>,
}

/// Parse a text frame; replies and unknown payloads become [`RtmEvent::Other`]
fn parse_event(text: &str) -> RtmEvent {
    serde_json::from_str(text).unwrap_or(RtmEvent::Other)
}

/// Convert an RTM message to an [`IncomingMessage`], dropping edits,
/// deletions and the bot's own messages
fn to_incoming(msg: RtmMessage, self_id: &str) -> Option<IncomingMessage> {
    if msg
        .subtype
        .as_deref()
        .is_some_and(|s| IGNORED_SUBTYPES.contains(&s))
    {
        return None;
    }

    if msg.user.as_deref() == Some(self_id) {
        return None;
    }

    Some(IncomingMessage {
        channel_id: msg.channel?,
        ts: msg.ts?,
        sender_id: msg.user,
        text: msg.text.unwrap_or_default(),
    })
}

/// Background task driving the RTM connection
pub(super) struct RtmManager {
    api: SlackApi,
    events: mpsc::Sender<ChannelEvent>,
    ping_interval: Duration,
    retry: RetryPolicy,
}

impl RtmManager {
    pub(super) const fn new(
        api: SlackApi,
        events: mpsc::Sender<ChannelEvent>,
        ping_interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            events,
            ping_interval,
            retry,
        }
    }

    /// Run sessions until auth fails or the receiver goes away
    pub(super) async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            match self.session().await {
                Ok(SessionEnd::ReceiverClosed) => {
                    tracing::debug!("event receiver dropped, stopping RTM manager");
                    return;
                }
                Ok(SessionEnd::Reconnect(reason)) => {
                    failures = 0;
                    tracing::info!(%reason, "Slack RTM disconnected");
                    if !self.emit(ChannelEvent::Disconnected(reason)).await {
                        return;
                    }
                }
                Err(Error::Auth(code)) => {
                    tracing::error!(%code, "Slack rejected the token");
                    let _ = self.emit(ChannelEvent::InvalidAuth(code)).await;
                    return;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(error = %e, attempt = failures, "Slack RTM connection failed");
                    let event = ChannelEvent::ConnectionError {
                        attempt: failures,
                        error: e.to_string(),
                    };
                    if !self.emit(event).await {
                        return;
                    }
                }
            }

            let delay = self.retry.delay(failures, None);
            tracing::debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.events.closed() => return,
            }
        }
    }

    /// Send an event; `false` if the receiver is gone
    async fn emit(&self, event: ChannelEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// One connected session, from `rtm.connect` until the socket ends
    async fn session(&self) -> Result<SessionEnd> {
        let (url, identity) = self.api.rtm_connect().await?;
        let (ws, _response) = connect_async(url.as_str()).await?;
        let (mut writer, mut reader) = ws.split();

        let self_id = identity.user_id.clone();
        if !self.emit(ChannelEvent::Connected(identity)).await {
            return Ok(SessionEnd::ReceiverClosed);
        }

        let mut ping = tokio::time::interval(self.ping_interval);
        // Skip the first immediate tick
        ping.tick().await;

        let mut last_seen = Instant::now();
        let mut next_id: u64 = 1;

        loop {
            tokio::select! {
                frame = reader.next() => {
                    last_seen = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => match parse_event(&text) {
                            RtmEvent::Hello => tracing::debug!("Slack RTM hello"),
                            RtmEvent::Goodbye => {
                                return Ok(SessionEnd::Reconnect("server sent goodbye".to_string()));
                            }
                            RtmEvent::Message(msg) => {
                                if let Some(incoming) = to_incoming(msg, &self_id) {
                                    if !self.emit(ChannelEvent::Message(incoming)).await {
                                        return Ok(SessionEnd::ReceiverClosed);
                                    }
                                }
                            }
                            RtmEvent::Error { error } => {
                                tracing::warn!(code = ?error.code, msg = ?error.msg, "Slack RTM error event");
                            }
                            RtmEvent::Other => tracing::trace!("ignoring RTM frame"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.as_ref().map_or(1000, |f| u16::from(f.code));
                            return Ok(SessionEnd::Reconnect(format!("socket closed with code {code}")));
                        }
                        Some(Ok(_)) => {
                            // Ping/pong handled by tungstenite; binary skipped
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Reconnect("stream ended".to_string())),
                    }
                }
                _ = ping.tick() => {
                    if last_seen.elapsed() > self.ping_interval * 2 {
                        return Ok(SessionEnd::Reconnect("keep-alive timed out".to_string()));
                    }
                    let payload = serde_json::json!({ "id": next_id, "type": "ping" });
                    writer.send(Message::Text(payload.to_string().into())).await?;
                    next_id += 1;
                }
                () = self.events.closed() => return Ok(SessionEnd::ReceiverClosed),
            }
        }
    }
}
