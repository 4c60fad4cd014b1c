//! Hub wire frames.
//!
//! Outbound traffic is one JSON object per line plus the bare `HEART`
//! keepalive. Inbound traffic is line-delimited as well: either the bare
//! `BEAT` acknowledgement or a JSON object whose `origin` tells what it is.

use serde::{Deserialize, Serialize};

use crate::constants::{HEARTBEAT_ACK, HEARTBEAT_TOKEN, ORIGIN_UPDATE};
use crate::types::{DeviceId, SwitchState};

/// Free-form state values attached to an update push.
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Errors produced while decoding an inbound record.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("empty record")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Options sent with the identify handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyOptions {
    pub config: u8,
}

/// Target and desired state of a control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCode {
    pub device: DeviceId,
    pub state: SwitchState,
}

/// Commands the gateway sends to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HubCommand {
    Identify { options: IdentifyOptions },
    Control { code: ControlCode },
}

impl HubCommand {
    /// The handshake sent right after the socket opens.
    pub fn identify() -> Self {
        HubCommand::Identify {
            options: IdentifyOptions { config: 1 },
        }
    }

    pub fn control(device: DeviceId, state: SwitchState) -> Self {
        HubCommand::Control {
            code: ControlCode { device, state },
        }
    }

    /// Serialises the command as one newline-terminated record.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// The keepalive record as written on the wire.
pub fn heartbeat_record() -> String {
    format!("{HEARTBEAT_TOKEN}\n")
}

/// Device state push from the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFrame {
    pub devices: Vec<DeviceId>,
    pub values: Values,
}

/// A decoded inbound record.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Keepalive acknowledgement.
    Heartbeat,
    /// State change for one or more devices.
    Update(UpdateFrame),
    /// Any other structured record (config dumps, identify replies, ...).
    Other { origin: Option<String> },
}

#[derive(Deserialize)]
struct RawInbound {
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    devices: Option<Vec<DeviceId>>,
    #[serde(default)]
    values: Option<Values>,
}

/// Decodes a single inbound record.
///
/// The heartbeat token is recognised before any JSON parsing is attempted.
pub fn parse_record(record: &str) -> Result<InboundFrame, FrameError> {
    let record = record.trim();
    if record.is_empty() {
        return Err(FrameError::Empty);
    }
    if record == HEARTBEAT_ACK {
        return Ok(InboundFrame::Heartbeat);
    }

    let raw: RawInbound = serde_json::from_str(record)?;
    if raw.origin.as_deref() != Some(ORIGIN_UPDATE) {
        return Ok(InboundFrame::Other { origin: raw.origin });
    }

    let devices = raw
        .devices
        .ok_or_else(|| FrameError::Malformed("update without devices".into()))?;
    Ok(InboundFrame::Update(UpdateFrame {
        devices,
        values: raw.values.unwrap_or_default(),
    }))
}
