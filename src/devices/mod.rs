//! Speaker devices and the fleet registry
//!
//! A [`Fleet`] is an immutable snapshot of the devices found by the last
//! discovery run. Refreshing replaces the snapshot; dispatch rounds hold a
//! reference to the snapshot they started with.

pub mod cast;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

pub use cast::{CastDevice, CastDiscovery};

use crate::Result;

/// A network-attached device that can speak text aloud
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Network address the device was discovered at
    fn address(&self) -> SocketAddr;

    /// Human-readable device name
    fn name(&self) -> &str;

    /// Speak `text` in `language` (BCP-47 style code, e.g. "ja", "en-US")
    async fn speak(&self, text: &str, language: &str) -> Result<()>;
}

/// Finds the currently reachable speakers
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Run a discovery pass and return a fresh fleet
    async fn discover(&self) -> Result<Fleet>;
}

/// Ordered, immutable snapshot of discovered devices
#[derive(Clone, Default)]
pub struct Fleet {
    devices: Arc<[Arc<dyn Speaker>]>,
}

impl Fleet {
    /// Create a fleet from discovered devices
    #[must_use]
    pub fn new(devices: Vec<Arc<dyn Speaker>>) -> Self {
        Self {
            devices: devices.into(),
        }
    }

    /// Create an empty fleet
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the fleet has no devices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate over the devices in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Speaker>> {
        self.devices.iter()
    }
}

impl fmt::Debug for Fleet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.devices
                    .iter()
                    .map(|d| format!("{}@{}", d.name(), d.address())),
            )
            .finish()
    }
}

impl FromIterator<Arc<dyn Speaker>> for Fleet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Speaker>>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}
