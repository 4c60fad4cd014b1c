use std::time::Duration;

/// Keepalive token written to the hub.
pub const HEARTBEAT_TOKEN: &str = "HEART";

/// Token the hub answers a keepalive with.
pub const HEARTBEAT_ACK: &str = "BEAT";

/// Origin marker of inbound device state pushes.
pub const ORIGIN_UPDATE: &str = "update";

/// How often a keepalive is written to the hub.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

/// Inactivity window after which the connection is considered dead.
///
/// Every `BEAT` pushes the deadline forward. When it expires the socket is
/// torn down and a fresh connection is opened.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(150);

/// Cadence of the outbound command drain (one command per tick).
pub const SEND_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for opening the hub socket.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for writing one record; a hub that stops reading must not
/// stall the session forever.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted length of one inbound record (1 MB).
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Path of the catalog document on the hub's HTTP server.
pub const CATALOG_PATH: &str = "/config";
