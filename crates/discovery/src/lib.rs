//! Device discovery for the gateway.
//!
//! Two sources feed the host: the hub's device catalog (fetched once over
//! HTTP) and AV receivers found by a time- and count-bounded mDNS browse.

pub mod aggregator;
pub mod browser;
pub mod catalog;
pub mod probe;
pub mod types;

// Re-export primary types.
pub use aggregator::{DiscoveryAggregator, DiscoveryConfig, DiscoverySession, Phase};
pub use browser::{MdnsBrowser, ServiceBrowser};
pub use catalog::{CatalogPlatform, build_accessories};
pub use probe::{ProbeError, Prober, ReceiverProber, discover_receivers};
pub use types::{CHECK_INTERVAL, Candidate, RECEIVER_PORT, SERVICE_TYPE};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
