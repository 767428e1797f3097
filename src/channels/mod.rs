//! Chat channel adapters
//!
//! A channel delivers a stream of [`ChannelEvent`]s over an mpsc receiver
//! created together with the adapter, and accepts reactions on messages.

pub mod retry;
mod slack;

use async_trait::async_trait;

pub use slack::{SlackChannel, SlackOptions};

use crate::Result;

/// The bot's own identity on the chat platform
///
/// Only known once the platform has confirmed the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Platform-assigned user id (e.g. `U0123ABCD`)
    pub user_id: String,
    /// Bot user name
    pub name: String,
}

/// A message from a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Channel identifier
    pub channel_id: String,

    /// Message timestamp, the message's stable reference
    pub ts: String,

    /// Sender identifier (absent for some bot/integration messages)
    pub sender_id: Option<String>,

    /// Raw message text
    pub text: String,
}

/// Event delivered by a channel's connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Connection established and identity confirmed
    Connected(SessionIdentity),
    /// A message was posted in a channel the bot can see
    Message(IncomingMessage),
    /// The platform rejected the credentials; the connection manager has stopped
    InvalidAuth(String),
    /// The connection dropped; a reconnect will follow
    Disconnected(String),
    /// A connection attempt failed; a retry will follow
    ConnectionError {
        /// Consecutive failed attempts so far
        attempt: u32,
        /// Failure description
        error: String,
    },
}

/// Trait for chat channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Start the connection manager
    async fn connect(&mut self) -> Result<()>;

    /// Stop the connection manager
    async fn disconnect(&mut self) -> Result<()>;

    /// Add a reaction to a message
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()>;
}
