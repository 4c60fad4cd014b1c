//! Temperature / humidity sensor proxy for hub devices.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::trace;

use hearthlink_hub_connection::{DeviceRegistry, UpdateListener};
use hearthlink_protocol::{DeviceId, Values, number_field};

use crate::accessory::{AccessoryInfo, DeviceChange, change_channel};

const MANUFACTURER: &str = "pilight";
const MODEL: &str = "Thermostat Rev-2";
const SERIAL: &str = "BIVAB-TEMP-2";

/// Latest readings; each is `None` until first reported.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReadings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

pub struct SensorProxy {
    id: DeviceId,
    name: String,
    protocol: String,
    readings: Mutex<SensorReadings>,
    changes: broadcast::Sender<DeviceChange>,
}

impl SensorProxy {
    /// Creates the proxy and registers it for hub updates.
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        protocol: impl Into<String>,
        initial: SensorReadings,
        registry: &DeviceRegistry,
    ) -> Arc<Self> {
        let proxy = Arc::new(Self {
            id,
            name: name.into(),
            protocol: protocol.into(),
            readings: Mutex::new(initial),
            changes: change_channel(),
        });
        registry.register_arc(proxy.id.clone(), &proxy);
        proxy
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn info(&self) -> AccessoryInfo {
        AccessoryInfo::new(MANUFACTURER, MODEL, SERIAL)
    }

    pub fn readings(&self) -> SensorReadings {
        self.readings.lock().map(|r| *r).unwrap_or_default()
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.readings().temperature
    }

    pub fn current_humidity(&self) -> Option<f64> {
        self.readings().humidity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

/// Stores `next` into `slot`; yields the value only if it differs.
fn merge(slot: &mut Option<f64>, next: Option<f64>) -> Option<f64> {
    let next = next?;
    if *slot == Some(next) {
        return None;
    }
    *slot = Some(next);
    Some(next)
}

impl UpdateListener for SensorProxy {
    fn update(&self, values: &Values) {
        let (temperature, humidity) = match self.readings.lock() {
            Ok(mut r) => (
                merge(&mut r.temperature, number_field(values, "temperature")),
                merge(&mut r.humidity, number_field(values, "humidity")),
            ),
            Err(_) => return,
        };

        if let Some(t) = temperature {
            trace!(device = %self.id, temperature = t, "temperature changed");
            let _ = self.changes.send(DeviceChange::Temperature(t));
        }
        if let Some(h) = humidity {
            trace!(device = %self.id, humidity = h, "humidity changed");
            let _ = self.changes.send(DeviceChange::Humidity(h));
        }
    }
}
