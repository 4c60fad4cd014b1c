//! Service browsing over mDNS/DNS-SD.

use std::net::IpAddr;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::DiscoveryError;
use crate::types::Candidate;

/// Source of service advertisements for a discovery session.
pub trait ServiceBrowser: Send {
    /// Starts browsing; candidates arrive on the returned channel.
    fn start(&mut self) -> Result<mpsc::Receiver<Candidate>, DiscoveryError>;

    /// Stops browsing. Idempotent.
    fn stop(&mut self);
}

/// Browses one DNS-SD service type on the local network.
pub struct MdnsBrowser {
    service_type: String,
    daemon: Option<ServiceDaemon>,
    cancel: CancellationToken,
}

impl MdnsBrowser {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            daemon: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl ServiceBrowser for MdnsBrowser {
    fn start(&mut self) -> Result<mpsc::Receiver<Candidate>, DiscoveryError> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Mdns(format!("failed to create mDNS daemon: {e}")))?;
        let receiver = daemon
            .browse(&self.service_type)
            .map_err(|e| DiscoveryError::Mdns(format!("failed to browse mDNS: {e}")))?;
        debug!(service_type = %self.service_type, "browsing");

        let (tx, rx) = mpsc::channel(16);
        let cancel = self.cancel.clone();
        let service_type = self.service_type.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    // recv is blocking; poll it off the runtime.
                    result = tokio::task::spawn_blocking({
                        let rx = receiver.clone();
                        move || rx.recv_timeout(Duration::from_millis(500))
                    }) => {
                        let Ok(Ok(event)) = result else { continue };
                        if let Some(candidate) = process_event(&service_type, &event)
                            && tx.send(candidate).await.is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });

        self.daemon = Some(daemon);
        Ok(rx)
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(daemon) = self.daemon.take()
            && let Err(e) = daemon.shutdown()
        {
            warn!(error = %e, "mDNS daemon shutdown failed");
        }
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turns a resolved service into a candidate. Other events are ignored.
pub(crate) fn process_event(service_type: &str, event: &ServiceEvent) -> Option<Candidate> {
    let ServiceEvent::ServiceResolved(info) = event else {
        return None;
    };
    let candidate = candidate_from(service_type, info);
    trace!(%candidate, "service resolved");
    Some(candidate)
}

fn candidate_from(service_type: &str, info: &ServiceInfo) -> Candidate {
    let fullname = info.get_fullname();
    let name = fullname
        .strip_suffix(service_type)
        .and_then(|n| n.strip_suffix('.'))
        .unwrap_or(fullname)
        .to_string();

    // Loopback and link-local addresses are useless to other hosts.
    let mut ips: Vec<IpAddr> = info
        .get_addresses()
        .iter()
        .copied()
        .filter(|ip| match ip {
            IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local(),
            IpAddr::V6(_) => false,
        })
        .collect();
    ips.sort();

    Candidate {
        name,
        host: info.get_hostname().to_string(),
        port: info.get_port(),
        ips,
    }
}
