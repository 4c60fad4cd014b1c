//! Background tasks driving the hub session.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
