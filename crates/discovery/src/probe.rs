//! Candidate identification.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use hearthlink_devices::{Accessory, DeviceError, ReceiverProxy, ReceiverSettings, YamahaClient};

use crate::aggregator::{DiscoveryAggregator, DiscoveryConfig};
use crate::browser::MdnsBrowser;
use crate::types::{Candidate, RECEIVER_PORT, SERVICE_TYPE};

/// Why a candidate was discarded.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("unsupported device: {0}")]
    Unsupported(String),
}

pub type ProbeFuture<T> = Pin<Box<dyn Future<Output = Result<T, ProbeError>> + Send + 'static>>;

/// Confirms whether a candidate is a supported device.
pub trait Prober<T>: Send + Sync {
    /// Cheap shape filter applied before probing.
    fn accepts(&self, _candidate: &Candidate) -> bool {
        true
    }

    /// Identification request; its own timeout bounds it.
    fn probe(&self, candidate: Candidate) -> ProbeFuture<T>;
}

/// Identifies Yamaha receivers through their `System/Config` query.
pub struct ReceiverProber {
    http: reqwest::Client,
    settings: ReceiverSettings,
    /// Overrides where the control API is reached; candidates are still
    /// filtered on the advertised port.
    control_port: Option<u16>,
}

impl ReceiverProber {
    pub fn new(http: reqwest::Client, settings: ReceiverSettings) -> Self {
        Self {
            http,
            settings,
            control_port: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = Some(port);
        self
    }
}

impl Prober<Accessory> for ReceiverProber {
    fn accepts(&self, candidate: &Candidate) -> bool {
        // The control API is only served on the default HTTP port.
        candidate.port == RECEIVER_PORT
    }

    fn probe(&self, candidate: Candidate) -> ProbeFuture<Accessory> {
        let http = self.http.clone();
        let settings = self.settings.clone();
        let control_port = self.control_port;
        Box::pin(async move {
            let host = candidate.address();
            let mut client = YamahaClient::new(http, &host);
            if let Some(port) = control_port {
                client = client.with_base_url(format!("http://{host}:{port}"));
            }
            let system = client.system_config().await?;
            info!(
                model = %system.model_name,
                system_id = %system.system_id,
                name = %candidate.name,
                "found Yamaha receiver"
            );
            let proxy = ReceiverProxy::new(candidate.name, host, client, system, settings);
            Ok(Accessory::Receiver(proxy))
        })
    }
}

/// Browses the local network for receivers and returns those confirmed.
pub async fn discover_receivers(
    http: reqwest::Client,
    settings: ReceiverSettings,
    config: DiscoveryConfig,
    cancel: CancellationToken,
) -> Vec<Accessory> {
    info!(
        target_count = config.target_count,
        deadline_secs = config.deadline.as_secs(),
        "discovering receivers"
    );
    let aggregator = DiscoveryAggregator::new(
        Box::new(MdnsBrowser::new(SERVICE_TYPE)),
        Arc::new(ReceiverProber::new(http, settings)),
        config,
    );
    let found = aggregator.discover(cancel).await;
    info!(count = found.len(), "receiver discovery finished");
    found
}
