//! Per-message handling
//!
//! A matched message is dispatched to the current fleet. If any device
//! fails, a warning marker is posted, the fleet is re-discovered and the
//! command is dispatched exactly once more. Success gets a success marker;
//! errors are returned to the caller, which owns failure reporting.

use std::sync::Arc;

use crate::channels::{Channel, IncomingMessage, SessionIdentity};
use crate::devices::{Discovery, Fleet};
use crate::dispatch::dispatch;
use crate::feedback::{Marker, MarkerSet, Reporter};
use crate::{Result, addressing};

/// State carried between events
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Confirmed bot identity, `None` until the first connection
    pub identity: Option<SessionIdentity>,
    /// Devices from the last discovery run
    pub fleet: Fleet,
}

/// What happened to a message that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not addressed to the bot
    Ignored,
    /// Every device spoke the command
    Delivered {
        /// Whether the fleet had to be refreshed first
        retried: bool,
    },
}

/// Result of [`Relay::handle_message`]
#[derive(Debug)]
pub struct Handled {
    /// Session to use for the next event (fleet may have been refreshed)
    pub session: Session,
    /// Outcome, or the error that ended handling
    pub outcome: Result<Outcome>,
}

/// Routes addressed messages to the speaker fleet
pub struct Relay {
    discovery: Arc<dyn Discovery>,
    markers: MarkerSet,
    language: String,
}

impl Relay {
    /// Create a relay speaking in `language`
    #[must_use]
    pub fn new(discovery: Arc<dyn Discovery>, markers: MarkerSet, language: impl Into<String>) -> Self {
        Self {
            discovery,
            markers,
            language: language.into(),
        }
    }

    /// Language code passed to every `speak` call
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Marker emoji names
    #[must_use]
    pub const fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Run a discovery pass
    ///
    /// # Errors
    ///
    /// Returns error if discovery fails
    pub async fn discover(&self) -> Result<Fleet> {
        self.discovery.discover().await
    }

    /// Handle one message event
    ///
    /// Messages arriving before the identity is known are ignored.
    pub async fn handle_message(
        &self,
        channel: &dyn Channel,
        mut session: Session,
        message: &IncomingMessage,
    ) -> Handled {
        let Some(identity) = session.identity.as_ref() else {
            tracing::debug!(ts = %message.ts, "message before connection confirmed, ignoring");
            return Handled {
                session,
                outcome: Ok(Outcome::Ignored),
            };
        };

        let Some(body) = addressing::extract_body(&message.text, identity) else {
            return Handled {
                session,
                outcome: Ok(Outcome::Ignored),
            };
        };

        tracing::info!(
            channel = %message.channel_id,
            ts = %message.ts,
            sender = ?message.sender_id,
            body,
            devices = session.fleet.len(),
            "speaking command"
        );

        let outcome = self.deliver(channel, &mut session.fleet, message, body).await;
        Handled { session, outcome }
    }

    async fn deliver(
        &self,
        channel: &dyn Channel,
        fleet: &mut Fleet,
        message: &IncomingMessage,
        body: &str,
    ) -> Result<Outcome> {
        let reporter = Reporter::new(channel, &self.markers);

        let retried = match dispatch(body, fleet, &self.language).await {
            Ok(report) => {
                tracing::debug!(devices = report.attempted(), "first attempt succeeded");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "first attempt failed, refreshing devices");
                reporter.mark(message, Marker::Warning).await?;

                *fleet = self.discovery.discover().await?;
                tracing::info!(devices = fleet.len(), "retrying with refreshed devices");

                let report = dispatch(body, fleet, &self.language).await?;
                tracing::debug!(devices = report.attempted(), "second attempt succeeded");
                true
            }
        };

        reporter.mark(message, Marker::Success).await?;
        Ok(Outcome::Delivered { retried })
    }
}
