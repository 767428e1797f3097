//! beacon-cast - make Cast speakers say what is posted in Slack
//!
//! This library provides the core functionality for the relay:
//! - Slack RTM channel adapter with reconnects and reactions
//! - Google Cast device discovery (mDNS) and text-to-speech playback
//! - Mention parsing, concurrent dispatch and status markers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Slack (RTM + Web API)                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ ChannelEvent
//! ┌────────────────────▼────────────────────────────────┐
//! │                 beacon-cast                          │
//! │   Daemon  │  Relay  │  Dispatch  │  Feedback         │
//! └────────────────────┬────────────────────────────────┘
//!                      │ speak(text, language)
//! ┌────────────────────▼────────────────────────────────┐
//! │         Cast speakers (found via mDNS)               │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod addressing;
pub mod channels;
pub mod config;
pub mod daemon;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod relay;
pub mod setup;

pub use channels::{Channel, ChannelEvent, IncomingMessage, SessionIdentity};
pub use config::Config;
pub use daemon::Daemon;
pub use devices::{Discovery, Fleet, Speaker};
pub use dispatch::{DispatchError, DispatchReport};
pub use error::{Error, Result};
pub use feedback::{Marker, MarkerSet};
pub use relay::{Outcome, Relay, Session};
