pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{
    ControlCode, FrameError, HubCommand, IdentifyOptions, InboundFrame, UpdateFrame, Values,
    heartbeat_record, parse_record,
};
pub use messages::{CatalogDevice, DeviceCatalog, GuiEntry, number_field};
pub use types::{DeviceId, ProtocolKind, SwitchState};
