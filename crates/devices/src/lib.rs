//! Device proxies exposed to the host bridge.
//!
//! Hub devices (switches, sensors) are driven by pushes from the hub
//! connection; the AV receiver is queried over its HTTP control API.

pub mod accessory;
pub mod error;
pub mod receiver;
pub mod sensor;
pub mod switch;
pub mod yamaha;

pub use accessory::{Accessory, AccessoryInfo, DeviceChange};
pub use error::DeviceError;
pub use receiver::{ReceiverProxy, ReceiverSettings, VolumeRange};
pub use sensor::{SensorProxy, SensorReadings};
pub use switch::SwitchProxy;
pub use yamaha::{BasicStatus, SystemConfig, YamahaClient};
