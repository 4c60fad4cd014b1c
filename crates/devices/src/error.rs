//! Error types for device operations.

use hearthlink_hub_connection::DropReason;

/// Errors returned to the host from device getters and setters.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("command not delivered: {0}")]
    Delivery(DropReason),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("receiver error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("receiver rejected request (RC={0})")]
    Rejected(String),

    #[error("missing element <{0}> in receiver response")]
    MissingElement(&'static str),

    #[error("invalid value for <{element}>: {value}")]
    InvalidValue { element: &'static str, value: String },
}
