//! Hub catalog platform: turns the hub's device list into proxies.

use tracing::{debug, error, info, warn};

use hearthlink_devices::{Accessory, SensorProxy, SensorReadings, SwitchProxy};
use hearthlink_hub_connection::{CommandQueue, DeviceRegistry, HubConnection};
use hearthlink_protocol::constants::CATALOG_PATH;
use hearthlink_protocol::{DeviceCatalog, DeviceId, ProtocolKind};

use crate::DiscoveryError;

/// Fetches the catalog from the hub's HTTP interface.
pub struct CatalogPlatform {
    http: reqwest::Client,
    url: String,
}

impl CatalogPlatform {
    pub fn new(http: reqwest::Client, protocol: &str, host: &str, http_port: u16) -> Self {
        Self {
            http,
            url: format!("{protocol}://{host}:{http_port}{CATALOG_PATH}"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Retrieves and decodes the catalog document.
    pub async fn fetch(&self) -> Result<DeviceCatalog, DiscoveryError> {
        debug!(url = %self.url, "fetching device catalog");
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Builds proxies for every supported catalog device.
    ///
    /// A failed fetch yields an empty list; the error is only logged.
    pub async fn accessories(&self, hub: &HubConnection) -> Vec<Accessory> {
        match self.fetch().await {
            Ok(catalog) => build_accessories(&catalog, &hub.commands(), hub.registry()),
            Err(e) => {
                error!(url = %self.url, error = %e, "failed to load device catalog");
                Vec::new()
            }
        }
    }
}

/// Creates one proxy per GUI entry, in presentation order.
///
/// Each proxy registers itself with `registry`. The first protocol with a
/// known device family wins; devices with none are skipped.
pub fn build_accessories(
    catalog: &DeviceCatalog,
    commands: &CommandQueue,
    registry: &DeviceRegistry,
) -> Vec<Accessory> {
    let mut accessories = Vec::new();

    for (key, gui) in catalog.entries() {
        let Some(device) = catalog.device(key) else {
            warn!(device = key, "GUI entry without device definition");
            continue;
        };

        let supported = device
            .protocol
            .iter()
            .find_map(|p| ProtocolKind::from_protocol(p).map(|kind| (p.as_str(), kind)));
        let Some((protocol, kind)) = supported else {
            info!(device = key, protocols = ?device.protocol, "unsupported protocol, skipping");
            continue;
        };

        let id = DeviceId::new(key);
        let accessory = match kind {
            ProtocolKind::Switch => Accessory::Switch(SwitchProxy::new(
                id,
                gui.name.clone(),
                protocol,
                device.state() == Some("on"),
                commands.clone(),
                registry,
            )),
            ProtocolKind::TemperatureHumiditySensor => Accessory::Sensor(SensorProxy::new(
                id,
                gui.name.clone(),
                protocol,
                SensorReadings {
                    temperature: device.number("temperature"),
                    humidity: device.number("humidity"),
                },
                registry,
            )),
            ProtocolKind::Receiver => {
                info!(device = key, protocol, "receivers are found by browsing, skipping");
                continue;
            }
        };
        debug!(device = key, name = %gui.name, %kind, "catalog device");
        accessories.push(accessory);
    }

    accessories
}
