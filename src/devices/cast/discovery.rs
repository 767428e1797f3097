//! Cast device discovery using mDNS/DNS-SD
//!
//! Browses for `_googlecast._tcp.local.` services for a fixed window and
//! turns every resolved service into a [`CastDevice`].
//!
//! TXT records used:
//! - `fn`: Friendly device name (falls back to the instance name)

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio_native_tls::TlsConnector;

use super::connection::tls_connector;
use super::{CastDevice, CastOptions};
use crate::devices::{Discovery, Fleet, Speaker};
use crate::{Error, Result};

/// mDNS service type for Cast devices
pub const SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// A resolved Cast service
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedService {
    fullname: String,
    name: String,
    address: SocketAddr,
}

impl ResolvedService {
    fn from_info(info: &ServiceInfo) -> Option<Self> {
        let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
        Self::from_parts(
            info.get_fullname(),
            info.get_property_val_str("fn"),
            &addresses,
            info.get_port(),
        )
    }

    /// Prefer the lowest IPv4 address so repeated runs pick the same one
    fn from_parts(
        fullname: &str,
        friendly_name: Option<&str>,
        addresses: &[IpAddr],
        port: u16,
    ) -> Option<Self> {
        let ip = addresses
            .iter()
            .copied()
            .filter(IpAddr::is_ipv4)
            .min()
            .or_else(|| addresses.iter().copied().min())?;

        let instance = fullname
            .strip_suffix(SERVICE_TYPE)
            .map_or(fullname, |s| s.trim_end_matches('.'));

        let name = friendly_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(instance)
            .to_string();

        Some(Self {
            fullname: fullname.to_string(),
            name,
            address: SocketAddr::new(ip, port),
        })
    }
}

/// Discovers Cast devices on the local network
pub struct CastDiscovery {
    window: Duration,
    options: CastOptions,
    tls: TlsConnector,
}

impl CastDiscovery {
    /// Create a discovery that browses for `window` per run
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend for device connections cannot be initialized
    pub fn new(window: Duration, options: CastOptions) -> Result<Self> {
        Ok(Self {
            window,
            options,
            tls: tls_connector()?,
        })
    }

    /// Browse mDNS and collect resolved services, keyed by full service name
    async fn browse(&self) -> Result<BTreeMap<String, ResolvedService>> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| Error::Discovery(format!("failed to create mDNS daemon: {e}")))?;

        let receiver = daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| Error::Discovery(format!("failed to browse {SERVICE_TYPE}: {e}")))?;

        let deadline = tokio::time::Instant::now() + self.window;
        let mut found = BTreeMap::new();

        loop {
            match tokio::time::timeout_at(deadline, receiver.recv_async()).await {
                Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                    match ResolvedService::from_info(&info) {
                        Some(service) => {
                            tracing::debug!(
                                device = %service.name,
                                address = %service.address,
                                "cast device resolved"
                            );
                            found.insert(service.fullname.clone(), service);
                        }
                        None => {
                            tracing::debug!(service = info.get_fullname(), "cast service without address");
                        }
                    }
                }
                Ok(Ok(event)) => tracing::trace!(?event, "mDNS event"),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "mDNS browse channel closed early");
                    break;
                }
                Err(_elapsed) => break,
            }
        }

        if let Err(e) = daemon.stop_browse(SERVICE_TYPE) {
            tracing::trace!(error = %e, "mDNS stop_browse failed");
        }
        if let Err(e) = daemon.shutdown() {
            tracing::trace!(error = %e, "mDNS daemon shutdown error (expected on normal exit)");
        }

        Ok(found)
    }
}

#[async_trait]
impl Discovery for CastDiscovery {
    async fn discover(&self) -> Result<Fleet> {
        let found = self.browse().await?;

        let mut services: Vec<ResolvedService> = found.into_values().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.address.cmp(&b.address)));

        let fleet: Fleet = services
            .into_iter()
            .map(|s| {
                Arc::new(CastDevice::with_connector(
                    s.name,
                    s.address,
                    self.options.clone(),
                    self.tls.clone(),
                )) as Arc<dyn Speaker>
            })
            .collect();

        tracing::info!(devices = fleet.len(), ?fleet, "cast discovery finished");
        Ok(fleet)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv6Addr;

    use super::*;

    #[test]
    fn test_service_type_format() {
        assert!(SERVICE_TYPE.ends_with(".local."));
        assert!(SERVICE_TYPE.starts_with('_'));
        assert!(SERVICE_TYPE.contains("._tcp."));
    }

    #[test]
    fn friendly_name_from_txt_record() {
        let service = ResolvedService::from_parts(
            "Google-Home-abc123._googlecast._tcp.local.",
            Some("Living Room"),
            &["192.168.1.20".parse().unwrap()],
            8009,
        )
        .unwrap();

        assert_eq!(service.name, "Living Room");
        assert_eq!(service.address, "192.168.1.20:8009".parse().unwrap());
    }

    #[test]
    fn falls_back_to_instance_name() {
        let service = ResolvedService::from_parts(
            "Google-Home-abc123._googlecast._tcp.local.",
            Some("  "),
            &["192.168.1.20".parse().unwrap()],
            8009,
        )
        .unwrap();

        assert_eq!(service.name, "Google-Home-abc123");
    }

    #[test]
    fn prefers_lowest_ipv4_address() {
        let addresses: Vec<IpAddr> = vec![
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            "192.168.1.30".parse().unwrap(),
            "192.168.1.21".parse().unwrap(),
        ];
        let service =
            ResolvedService::from_parts("x._googlecast._tcp.local.", None, &addresses, 8009)
                .unwrap();
        assert_eq!(service.address, "192.168.1.21:8009".parse().unwrap());
    }

    #[test]
    fn ipv6_only_is_accepted() {
        let service = ResolvedService::from_parts(
            "x._googlecast._tcp.local.",
            None,
            &[IpAddr::V6(Ipv6Addr::LOCALHOST)],
            8009,
        )
        .unwrap();
        assert!(service.address.is_ipv6());
    }

    #[test]
    fn no_address_is_skipped() {
        assert!(ResolvedService::from_parts("x._googlecast._tcp.local.", None, &[], 8009).is_none());
    }

    #[test]
    fn resolves_from_service_info() {
        let mut properties = HashMap::new();
        properties.insert("fn".to_string(), "Kitchen".to_string());
        properties.insert("md".to_string(), "Google Home Mini".to_string());

        let info = ServiceInfo::new(
            SERVICE_TYPE,
            "Google-Home-Mini-1",
            "kitchen.local.",
            "192.168.1.40",
            8009,
            properties,
        )
        .unwrap();

        let service = ResolvedService::from_info(&info).unwrap();
        assert_eq!(service.fullname, "Google-Home-Mini-1._googlecast._tcp.local.");
        assert_eq!(service.name, "Kitchen");
        assert_eq!(service.address, "192.168.1.40:8009".parse().unwrap());
    }
}
