//! Public types for the hub connection.

use std::time::Duration;

use hearthlink_protocol::constants::{
    CONNECT_TIMEOUT, HEARTBEAT_PERIOD, HEARTBEAT_TIMEOUT, SEND_INTERVAL, WRITE_TIMEOUT,
};
use tokio::time::Instant;

/// Lifecycle of the single logical hub session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Socket open in progress.
    Connecting,
    /// Socket open and identify sent.
    Connected,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self` within one attempt epoch.
    ///
    /// `Connected -> Connecting` is never legal: a new attempt always passes
    /// through `Disconnected` first.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}

/// Snapshot published on every state change or heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Incremented on every connect attempt.
    pub epoch: u64,
    pub last_heartbeat: Option<Instant>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            last_heartbeat: None,
        }
    }
}

/// Where the hub lives and how the session is paced.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub host: String,
    pub port: u16,
    /// One queued command is written per interval.
    pub send_interval: Duration,
    /// How often `HEART` is written.
    pub heartbeat_period: Duration,
    /// Silence window after which the session is rebuilt.
    pub heartbeat_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bound on a single record write; expiry marks the attempt disconnected.
    pub write_timeout: Duration,
}

impl HubSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            send_interval: SEND_INTERVAL,
            heartbeat_period: HEARTBEAT_PERIOD,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
        }
    }

    /// `host:port` for the socket connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Why a queued command never reached the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("hub not connected")]
    NotConnected,

    #[error("connection was reset before the command was sent")]
    ConnectionReset,

    #[error("transport write failed: {0}")]
    Transport(String),

    #[error("command could not be encoded: {0}")]
    Encode(String),

    #[error("hub connection shut down")]
    Shutdown,
}

/// Result of handing a command to the transport.
///
/// The hub never acknowledges commands, so `Written` only means the bytes
/// were accepted by the socket. It says nothing about the hub acting on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Dropped(DropReason),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}
