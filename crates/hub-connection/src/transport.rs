//! Stream transport to the hub.
//!
//! The connection only needs "something that reads and writes bytes"; the
//! [`Connector`] seam lets the socket be swapped for an in-memory pipe.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Errors from the hub connection.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hub operation timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,
}

/// Byte stream usable as a hub transport.
pub trait HubStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> HubStream for T {}

pub type BoxedStream = Box<dyn HubStream>;

/// Opens a fresh transport to the hub.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send + '_>>;
}

/// Plain TCP connector.
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send + '_>> {
        Box::pin(async move {
            let stream = TcpStream::connect(&self.addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}
