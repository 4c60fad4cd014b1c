//! Persistent line-oriented connection to the home-automation hub.
//!
//! Provides the paced command queue, the identify handshake, heartbeat
//! liveness with reconnect, and the device registry that routes inbound
//! state pushes to proxies.

mod codec;
pub mod manager;
mod pumps;
pub mod queue;
pub(crate) mod reconnection;
pub mod registry;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::HubConnection;
pub use queue::{CommandQueue, Pending, QueuedCommand};
pub use registry::{DeviceRegistry, UpdateListener};
pub use transport::{BoxedStream, Connector, HubError, HubStream, TcpConnector};
pub use types::{ConnectionState, ConnectionStatus, DropReason, HubSettings, WriteOutcome};
