//! AV receiver proxy: power switch plus a percentage volume control.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::accessory::{AccessoryInfo, DeviceChange, change_channel};
use crate::error::DeviceError;
use crate::yamaha::{SystemConfig, YamahaClient};

const MANUFACTURER: &str = "Yamaha";

/// Input that needs an explicit play command after selection.
const AIRPLAY_INPUT: &str = "AirPlay";

/// Usable volume window in dB, mapped onto 0..=100 %.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRange {
    pub min: f64,
    pub max: f64,
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self {
            min: -50.0,
            max: -20.0,
        }
    }
}

impl VolumeRange {
    fn gap(&self) -> f64 {
        self.max - self.min
    }

    /// Receiver level in dB to a clamped, rounded percentage.
    ///
    /// An empty or inverted range reports 0 %.
    pub fn to_percent(&self, db: f64) -> u8 {
        let gap = self.gap();
        if gap <= 0.0 || !db.is_finite() {
            return 0;
        }
        let p = 100.0 * ((db - self.min) / gap);
        p.clamp(0.0, 100.0).round() as u8
    }

    /// Percentage to receiver units (tenths of a dB).
    pub fn to_tenths(&self, percent: u8) -> i32 {
        let v = (f64::from(percent) / 100.0) * self.gap() + self.min;
        (v * 10.0).round() as i32
    }
}

/// Receiver behaviour taken from the gateway configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverSettings {
    /// Volume in dB applied when switching on.
    pub play_volume: Option<f64>,
    pub volume: VolumeRange,
    /// Input selected when switching on.
    pub set_main_input_to: Option<String>,
}

pub struct ReceiverProxy {
    name: String,
    host: String,
    client: YamahaClient,
    system: SystemConfig,
    settings: ReceiverSettings,
    changes: broadcast::Sender<DeviceChange>,
}

impl ReceiverProxy {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        client: YamahaClient,
        system: SystemConfig,
        settings: ReceiverSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            host: host.into(),
            client,
            system,
            settings,
            changes: change_channel(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the audio service exposed next to the power switch.
    pub fn speakers_name(&self) -> String {
        format!("{} Speakers", self.name)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn system(&self) -> &SystemConfig {
        &self.system
    }

    pub fn info(&self) -> AccessoryInfo {
        AccessoryInfo::new(
            MANUFACTURER,
            self.system.model_name.clone(),
            self.system.system_id.clone(),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }

    /// Queries the receiver; unlike hub devices there is no cached state.
    pub async fn power_state(&self) -> Result<bool, DeviceError> {
        self.client.is_on().await
    }

    /// Turning on runs the play sequence; turning off puts the receiver in standby.
    pub async fn set_power_state(&self, on: bool) -> Result<(), DeviceError> {
        info!(receiver = %self.name, on, "setting receiver power");
        if on {
            self.play().await?;
        } else {
            self.client.power_off().await?;
        }
        let _ = self.changes.send(DeviceChange::Power(on));
        Ok(())
    }

    async fn play(&self) -> Result<(), DeviceError> {
        self.client.power_on().await?;
        if let Some(db) = self.settings.play_volume {
            self.client.set_volume_to((db * 10.0).round() as i32).await?;
        }
        if let Some(input) = &self.settings.set_main_input_to {
            self.client.set_main_input_to(input).await?;
            if input == AIRPLAY_INPUT {
                self.client.airplay_play().await?;
            }
        }
        Ok(())
    }

    /// Current volume as a percentage of the configured range.
    pub async fn volume(&self) -> Result<u8, DeviceError> {
        let status = self.client.basic_status().await?;
        let percent = self.settings.volume.to_percent(status.volume_db());
        debug!(receiver = %self.name, percent, "volume");
        Ok(percent)
    }

    pub async fn set_volume(&self, percent: u8) -> Result<(), DeviceError> {
        let percent = percent.min(100);
        let tenths = self.settings.volume.to_tenths(percent);
        debug!(receiver = %self.name, percent, tenths, "setting volume");
        self.client.set_volume_to(tenths).await?;
        let _ = self.changes.send(DeviceChange::Volume(percent));
        Ok(())
    }
}
