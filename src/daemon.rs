//! Daemon - the main relay service
//!
//! Consumes channel events in arrival order, one at a time. Connection
//! events refresh the identity and the fleet; message events go through the
//! [`Relay`]. Only an authentication failure stops the loop with an error.

use tokio::sync::mpsc;

use crate::channels::{Channel, ChannelEvent, IncomingMessage};
use crate::devices::Fleet;
use crate::feedback::{Marker, Reporter};
use crate::relay::{Outcome, Relay, Session};
use crate::{Error, Result};

/// The relay daemon
pub struct Daemon {
    channel: Box<dyn Channel>,
    events: mpsc::Receiver<ChannelEvent>,
    relay: Relay,
}

impl Daemon {
    /// Create a daemon over a channel and the receiver paired with it
    #[must_use]
    pub fn new(channel: Box<dyn Channel>, events: mpsc::Receiver<ChannelEvent>, relay: Relay) -> Self {
        Self {
            channel,
            events,
            relay,
        }
    }

    /// Connect and process events until Ctrl-C, stream end or auth failure
    ///
    /// # Errors
    ///
    /// Returns error if the channel cannot start or rejects the credentials
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_until(shutdown_rx).await
    }

    /// Like [`Daemon::run`], stopping when `shutdown_rx` yields or closes
    ///
    /// # Errors
    ///
    /// Returns error if the channel cannot start or rejects the credentials
    pub async fn run_until(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        tracing::info!(
            channel = self.channel.name(),
            language = self.relay.language(),
            "daemon starting"
        );

        self.channel.connect().await?;
        let result = self.event_loop(&mut shutdown_rx).await;

        if let Err(e) = self.channel.disconnect().await {
            tracing::warn!(error = %e, "channel disconnect failed");
        }
        tracing::info!("daemon stopped");
        result
    }

    async fn event_loop(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        let mut session = Session::default();

        loop {
            let event = tokio::select! {
                event = self.events.recv() => event,
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    return Ok(());
                }
            };

            let Some(event) = event else {
                tracing::info!("event stream ended");
                return Ok(());
            };

            session = self.handle_event(session, event).await?;
        }
    }

    async fn handle_event(&self, mut session: Session, event: ChannelEvent) -> Result<Session> {
        match event {
            ChannelEvent::Connected(identity) => {
                tracing::info!(user_id = %identity.user_id, name = %identity.name, "connected");
                session.identity = Some(identity);
                session.fleet = match self.relay.discover().await {
                    Ok(fleet) => fleet,
                    Err(e) => {
                        tracing::error!(error = %e, "initial discovery failed, no devices known");
                        Fleet::empty()
                    }
                };
            }
            ChannelEvent::Message(message) => {
                tracing::info!(
                    channel = %message.channel_id,
                    ts = %message.ts,
                    sender = ?message.sender_id,
                    text = %message.text,
                    "message received"
                );
                let handled = self
                    .relay
                    .handle_message(self.channel.as_ref(), session, &message)
                    .await;
                session = handled.session;

                match handled.outcome {
                    Ok(Outcome::Ignored) => {}
                    Ok(Outcome::Delivered { retried }) => {
                        tracing::info!(ts = %message.ts, retried, "command delivered");
                    }
                    Err(e) => self.report_failure(&message, &e).await,
                }
            }
            ChannelEvent::InvalidAuth(code) => {
                tracing::error!(%code, "invalid authentication, stopping");
                return Err(Error::Auth(code));
            }
            ChannelEvent::Disconnected(reason) => {
                tracing::debug!(%reason, "channel disconnected");
            }
            ChannelEvent::ConnectionError { attempt, error } => {
                tracing::debug!(attempt, %error, "channel connection error");
            }
        }

        Ok(session)
    }

    async fn report_failure(&self, message: &IncomingMessage, error: &Error) {
        tracing::error!(
            channel = %message.channel_id,
            ts = %message.ts,
            error = %error,
            "failed to handle message"
        );

        let reporter = Reporter::new(self.channel.as_ref(), self.relay.markers());
        if let Err(e) = reporter.mark(message, Marker::Failure).await {
            tracing::error!(error = %e, "failed to post failure marker");
        }
    }
}
