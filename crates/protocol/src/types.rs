use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Hub-assigned device identifier.
///
/// The hub names devices with strings but older configurations use bare
/// integers; both decode to the same textual key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Int(n) => Self(n.to_string()),
        })
    }
}

/// Desired or reported state of a switchable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn is_on(self) -> bool {
        self == SwitchState::On
    }
}

impl From<bool> for SwitchState {
    fn from(on: bool) -> Self {
        if on { SwitchState::On } else { SwitchState::Off }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::On => write!(f, "on"),
            SwitchState::Off => write!(f, "off"),
        }
    }
}

/// Device families the gateway knows how to bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Switch,
    TemperatureHumiditySensor,
    Receiver,
}

impl ProtocolKind {
    /// Maps a hub protocol name to the device family that handles it.
    ///
    /// Returns `None` for protocols without a proxy (labels, arping,
    /// sunrise/sunset, datetime, ...).
    pub fn from_protocol(protocol: &str) -> Option<Self> {
        match protocol {
            "brennenstuhl" | "elro_800_switch" => Some(ProtocolKind::Switch),
            "openweathermap" => Some(ProtocolKind::TemperatureHumiditySensor),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Switch => write!(f, "switch"),
            ProtocolKind::TemperatureHumiditySensor => write!(f, "temperature/humidity sensor"),
            ProtocolKind::Receiver => write!(f, "receiver"),
        }
    }
}
