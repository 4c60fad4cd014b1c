//! In-memory transport for connection tests.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use crate::transport::{BoxedStream, Connector};

const PIPE_CAPACITY: usize = 64 * 1024;

/// Hands out prepared duplex pipes and records open/close order.
#[derive(Default)]
pub(crate) struct PipeConnector {
    pending: Mutex<VecDeque<DuplexStream>>,
    log: Arc<Mutex<Vec<String>>>,
    attempts: AtomicUsize,
}

impl PipeConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a pipe for the next connect and returns the hub side of it.
    pub(crate) fn add_pipe(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        self.pending.lock().unwrap().push_back(client);
        server
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Connector for PipeConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send + '_>> {
        Box::pin(async move {
            let id = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let pipe = self.pending.lock().unwrap().pop_front();
            match pipe {
                Some(inner) => {
                    self.log.lock().unwrap().push(format!("open {id}"));
                    Ok(Box::new(Tracked {
                        inner,
                        id,
                        log: self.log.clone(),
                    }) as BoxedStream)
                }
                None => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "no pipe")),
            }
        })
    }
}

/// Duplex end that logs `close N` when released.
struct Tracked {
    inner: DuplexStream,
    id: usize,
    log: Arc<Mutex<Vec<String>>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("close {}", self.id));
        }
    }
}

impl AsyncRead for Tracked {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tracked {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
