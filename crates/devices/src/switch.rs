//! Switch / outlet proxy for hub devices.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use hearthlink_hub_connection::{CommandQueue, DeviceRegistry, UpdateListener, WriteOutcome};
use hearthlink_protocol::{DeviceId, HubCommand, SwitchState, Values};

use crate::accessory::{AccessoryInfo, DeviceChange, change_channel};
use crate::error::DeviceError;

const MANUFACTURER: &str = "pilight";
const MODEL: &str = "Outlet Rev-2";
const SERIAL: &str = "BIVAB-PO-1";

/// Cached on/off state of one hub switch.
pub struct SwitchProxy {
    id: DeviceId,
    name: String,
    protocol: String,
    commands: CommandQueue,
    power: Mutex<bool>,
    changes: broadcast::Sender<DeviceChange>,
}

impl SwitchProxy {
    /// Creates the proxy and registers it for hub updates.
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        protocol: impl Into<String>,
        initial: bool,
        commands: CommandQueue,
        registry: &DeviceRegistry,
    ) -> Arc<Self> {
        let proxy = Arc::new(Self {
            id,
            name: name.into(),
            protocol: protocol.into(),
            commands,
            power: Mutex::new(initial),
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

    /// Cached state; never touches the network.
    pub fn power_state(&self) -> bool {
        self.power.lock().map(|p| *p).unwrap_or(false)
    }

    /// Sends a control command and caches the new state once it is written.
    ///
    /// The hub does not confirm commands; `Ok` means the bytes reached the
    /// transport.
    pub async fn set_power_state(&self, on: bool) -> Result<(), DeviceError> {
        let state = SwitchState::from(on);
        info!(device = %self.id, name = %self.name, %state, "switching");

        let receipt = self.commands.push(HubCommand::control(self.id.clone(), state));
        match receipt.written().await {
            WriteOutcome::Written => {
                if let Ok(mut power) = self.power.lock() {
                    *power = on;
                }
                Ok(())
            }
            WriteOutcome::Dropped(reason) => {
                warn!(device = %self.id, %reason, "switch command not delivered");
                Err(DeviceError::Delivery(reason))
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

impl UpdateListener for SwitchProxy {
    fn update(&self, values: &Values) {
        let on = match values.get("state").and_then(|v| v.as_str()) {
            Some("on") => true,
            Some("off") => false,
            Some(other) => {
                debug!(device = %self.id, state = other, "ignoring unknown switch state");
                return;
            }
            None => return,
        };

        let changed = match self.power.lock() {
            Ok(mut power) if *power != on => {
                *power = on;
                true
            }
            _ => false,
        };
        if changed {
            debug!(device = %self.id, on, "switch changed");
            let _ = self.changes.send(DeviceChange::Power(on));
        }
    }
}
