//! Device catalog served by the hub's HTTP interface.
//!
//! ```json
//! {
//!   "gui":     { "lamp": { "name": "Living Room Lamp", "order": 1 } },
//!   "devices": { "lamp": { "protocol": ["elro_800_switch"], "state": "off" } }
//! }
//! ```

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::envelope::Values;

/// Presentation entry for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuiEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(flatten)]
    pub extra: Values,
}

/// Declared protocols and last known state of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDevice {
    #[serde(default)]
    pub protocol: Vec<String>,
    #[serde(flatten)]
    pub fields: Values,
}

impl CatalogDevice {
    /// Textual `state` field (`"on"`/`"off"` for switches).
    pub fn state(&self) -> Option<&str> {
        self.fields.get("state").and_then(|v| v.as_str())
    }

    /// Numeric field, accepting both JSON numbers and numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        number_field(&self.fields, key)
    }
}

/// Reads a numeric field that may be encoded as a number or a string.
///
/// `NaN` and infinities are treated as absent.
pub fn number_field(values: &Values, key: &str) -> Option<f64> {
    let value = match values.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// The full catalog document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCatalog {
    /// Kept in document order.
    #[serde(default)]
    pub gui: IndexMap<String, GuiEntry>,
    #[serde(default)]
    pub devices: BTreeMap<String, CatalogDevice>,
}

impl DeviceCatalog {
    /// GUI entries in presentation order.
    ///
    /// Entries with an explicit `order` come first; ties and unordered
    /// entries keep the hub's document order.
    pub fn entries(&self) -> Vec<(&str, &GuiEntry)> {
        let mut entries: Vec<(&str, &GuiEntry)> =
            self.gui.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by_key(|(_, gui)| gui.order.unwrap_or(i64::MAX));
        entries
    }

    pub fn device(&self, key: &str) -> Option<&CatalogDevice> {
        self.devices.get(key)
    }
}
