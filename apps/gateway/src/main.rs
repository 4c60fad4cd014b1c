//! Hearthlink gateway entry point.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hearthlink_devices::Accessory;
use hearthlink_discovery::{CatalogPlatform, discover_receivers};
use hearthlink_hub_connection::{DeviceRegistry, HubConnection};

use crate::config::{CONFIG_ENV, GatewayConfig, config_path};

/// Per-request timeout for receiver probes and the catalog fetch.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting hearthlink gateway"
    );

    let path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = GatewayConfig::load(&path)?;

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let cancel = CancellationToken::new();
    let registry = Arc::new(DeviceRegistry::new());

    // Receiver browsing runs for up to its deadline; start it first.
    let receivers = config.receiver.as_ref().map(|section| {
        tokio::spawn(discover_receivers(
            http.clone(),
            section.settings(),
            section.discovery(),
            cancel.child_token(),
        ))
    });

    // Accessories must outlive the registry's weak references.
    let mut accessories: Vec<Accessory> = Vec::new();

    let hub = match &config.hub {
        Some(section) => {
            info!(name = %section.name, host = %section.host, port = section.port, "using hub");
            let hub = HubConnection::tcp(section.settings(), registry.clone());
            tokio::spawn(log_status(hub.watch_status()));
            if let Err(e) = hub.connect().await {
                warn!(error = %e, "initial hub connect failed, retrying after heartbeat timeout");
            }

            let platform =
                CatalogPlatform::new(http.clone(), &section.protocol, &section.host, section.http_port);
            let found = platform.accessories(&hub).await;
            info!(count = found.len(), "hub accessories ready");
            adopt(&mut accessories, found);
            Some(hub)
        }
        None => None,
    };

    if let Some(task) = receivers {
        tokio::select! {
            result = task => match result {
                Ok(found) => adopt(&mut accessories, found),
                Err(e) => warn!(error = %e, "receiver discovery task failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                return shutdown(hub).await;
            }
        }
    }

    info!(count = accessories.len(), "gateway running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    shutdown(hub).await
}

/// Logs each accessory and follows its change notifications.
fn adopt(accessories: &mut Vec<Accessory>, found: Vec<Accessory>) {
    for accessory in found {
        let info = accessory.info();
        info!(
            kind = accessory.kind(),
            name = accessory.name(),
            manufacturer = %info.manufacturer,
            model = %info.model,
            serial = %info.serial_number,
            "accessory"
        );
        tokio::spawn(log_changes(accessory.name().to_string(), accessory.subscribe()));
        accessories.push(accessory);
    }
}

async fn log_changes(
    name: String,
    mut changes: tokio::sync::broadcast::Receiver<hearthlink_devices::DeviceChange>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => info!(accessory = %name, ?change, "accessory changed"),
            Err(RecvError::Lagged(missed)) => warn!(accessory = %name, missed, "change log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn log_status(
    mut status: tokio::sync::watch::Receiver<hearthlink_hub_connection::ConnectionStatus>,
) {
    let mut last = status.borrow_and_update().state;
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        if current.state != last {
            info!(state = ?current.state, epoch = current.epoch, "hub connection");
            last = current.state;
        }
    }
}

async fn shutdown(hub: Option<HubConnection>) -> anyhow::Result<()> {
    info!("shutting down");
    if let Some(hub) = hub {
        hub.shutdown().await;
    }
    Ok(())
}
