//! Concurrent fan-out of a spoken command to every device in a fleet
//!
//! A dispatch round issues `speak` to all devices at once and waits for every
//! call to finish. A failing device never cancels its siblings. The round
//! succeeds only when every device succeeded.

use std::fmt;
use std::net::SocketAddr;

use futures::future::join_all;
use thiserror::Error;

use crate::devices::Fleet;

/// Result of one device's `speak` call within a round
#[derive(Debug)]
pub struct DeviceOutcome {
    /// Device name
    pub device: String,
    /// Device address at dispatch time
    pub address: SocketAddr,
    /// Error message if the call failed
    pub error: Option<String>,
}

impl DeviceOutcome {
    /// Whether this device spoke successfully
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// All device outcomes of a successful round
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// One entry per device, in fleet order
    pub outcomes: Vec<DeviceOutcome>,
}

impl DispatchReport {
    /// Number of devices the command was sent to
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// A dispatch round where at least one device failed
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Some or all devices failed
    #[error("{} of {} device(s) failed: {}", failed_count(.outcomes), .outcomes.len(), FailureList(.outcomes))]
    Failed {
        /// Every device outcome, in fleet order
        outcomes: Vec<DeviceOutcome>,
    },
}

impl DispatchError {
    /// Outcomes of the devices that failed
    pub fn failures(&self) -> impl Iterator<Item = &DeviceOutcome> {
        let Self::Failed { outcomes } = self;
        outcomes.iter().filter(|o| !o.is_ok())
    }
}

fn failed_count(outcomes: &[DeviceOutcome]) -> usize {
    outcomes.iter().filter(|o| !o.is_ok()).count()
}

/// Display helper listing `name@addr: error` for each failure
struct FailureList<'a>(&'a [DeviceOutcome]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for outcome in self.0 {
            if let Some(err) = &outcome.error {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}@{}: {err}", outcome.device, outcome.address)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Speak `body` on every device of `fleet` concurrently
///
/// An empty fleet succeeds without any device calls.
///
/// # Errors
///
/// Returns [`DispatchError::Failed`] with all outcomes if any device failed
pub async fn dispatch(
    body: &str,
    fleet: &Fleet,
    language: &str,
) -> Result<DispatchReport, DispatchError> {
    let calls = fleet.iter().map(|device| async move {
        tracing::info!(
            address = %device.address(),
            device = device.name(),
            "attempting to make device speak"
        );

        let result = device.speak(body, language).await;
        if let Err(ref e) = result {
            tracing::debug!(device = device.name(), error = %e, "device speak failed");
        }

        DeviceOutcome {
            device: device.name().to_string(),
            address: device.address(),
            error: result.err().map(|e| e.to_string()),
        }
    });

    let outcomes = join_all(calls).await;

    if outcomes.iter().all(DeviceOutcome::is_ok) {
        Ok(DispatchReport { outcomes })
    } else {
        Err(DispatchError::Failed { outcomes })
    }
}
