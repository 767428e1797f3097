//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use beacon_cast::{
    Channel, Discovery, Error, Fleet, IncomingMessage, Result, SessionIdentity, Speaker,
};
use tokio::sync::Mutex;

/// A reaction posted through [`MockChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub channel_id: String,
    pub message_id: String,
    pub emoji: String,
}

/// Mock channel recording reactions
#[derive(Clone, Default)]
pub struct MockChannel {
    pub reactions: Arc<Mutex<Vec<Reaction>>>,
    /// Emoji names the channel refuses to post
    pub rejected: Arc<Mutex<Vec<String>>>,
    pub connected: Arc<AtomicBool>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `add_reaction` fail for `emoji`
    pub async fn reject(&self, emoji: &str) {
        self.rejected.lock().await.push(emoji.to_string());
    }

    pub async fn emojis(&self) -> Vec<String> {
        self.reactions
            .lock()
            .await
            .iter()
            .map(|r| r.emoji.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        if self.rejected.lock().await.iter().any(|e| e == emoji) {
            return Err(Error::Channel(format!("reaction {emoji} rejected")));
        }
        self.reactions.lock().await.push(Reaction {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }
}

/// Mock speaker counting calls
pub struct MockSpeaker {
    name: String,
    address: SocketAddr,
    fail: bool,
    pub calls: AtomicUsize,
    pub spoken: Mutex<Vec<(String, String)>>,
}

impl MockSpeaker {
    pub fn healthy(name: &str, last_octet: u8) -> Arc<Self> {
        Self::build(name, last_octet, false)
    }

    pub fn broken(name: &str, last_octet: u8) -> Arc<Self> {
        Self::build(name, last_octet, true)
    }

    fn build(name: &str, last_octet: u8, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            address: SocketAddr::from(([192, 168, 1, last_octet], 8009)),
            fail,
            calls: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Speaker for MockSpeaker {
    fn address(&self) -> SocketAddr {
        self.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(&self, text: &str, language: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.spoken
            .lock()
            .await
            .push((text.to_string(), language.to_string()));
        if self.fail {
            Err(Error::Device(format!("{} unreachable", self.name)))
        } else {
            Ok(())
        }
    }
}

/// Build a fleet from mock speakers
pub fn fleet_of(speakers: &[Arc<MockSpeaker>]) -> Fleet {
    speakers
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn Speaker>)
        .collect()
}

/// Mock discovery returning scripted results, then empty fleets
#[derive(Default)]
pub struct MockDiscovery {
    script: Mutex<VecDeque<Result<Fleet>>>,
    pub calls: AtomicUsize,
}

impl MockDiscovery {
    pub fn new(script: Vec<Result<Fleet>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn discover(&self) -> Result<Fleet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Fleet::empty()))
    }
}

pub fn identity() -> SessionIdentity {
    SessionIdentity {
        user_id: "U1".to_string(),
        name: "home".to_string(),
    }
}

pub fn message(text: &str) -> IncomingMessage {
    IncomingMessage {
        channel_id: "C1".to_string(),
        ts: "1700000000.000100".to_string(),
        sender_id: Some("U2".to_string()),
        text: text.to_string(),
    }
}
