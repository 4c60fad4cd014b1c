//! Host-facing accessory model shared by all proxies.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::receiver::ReceiverProxy;
use crate::sensor::SensorProxy;
use crate::switch::SwitchProxy;

/// Buffered changes per subscriber before it starts lagging.
pub(crate) const CHANGE_CAPACITY: usize = 32;

/// Static identification shown by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

impl AccessoryInfo {
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            serial_number: serial_number.into(),
        }
    }
}

/// A characteristic value that changed outside the host's control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceChange {
    Power(bool),
    Temperature(f64),
    Humidity(f64),
    /// Volume as a percentage of the configured range.
    Volume(u8),
}

/// Creates the notification channel every proxy carries.
pub(crate) fn change_channel() -> broadcast::Sender<DeviceChange> {
    broadcast::channel(CHANGE_CAPACITY).0
}

/// One proxy handed to the host.
#[derive(Clone)]
pub enum Accessory {
    Switch(Arc<SwitchProxy>),
    Sensor(Arc<SensorProxy>),
    Receiver(Arc<ReceiverProxy>),
}

impl Accessory {
    pub fn name(&self) -> &str {
        match self {
            Accessory::Switch(s) => s.name(),
            Accessory::Sensor(s) => s.name(),
            Accessory::Receiver(r) => r.name(),
        }
    }

    pub fn info(&self) -> AccessoryInfo {
        match self {
            Accessory::Switch(s) => s.info(),
            Accessory::Sensor(s) => s.info(),
            Accessory::Receiver(r) => r.info(),
        }
    }

    /// Change notifications for this accessory.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        match self {
            Accessory::Switch(s) => s.subscribe(),
            Accessory::Sensor(s) => s.subscribe(),
            Accessory::Receiver(r) => r.subscribe(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Accessory::Switch(_) => "switch",
            Accessory::Sensor(_) => "sensor",
            Accessory::Receiver(_) => "receiver",
        }
    }
}

impl std::fmt::Debug for Accessory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessory")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
