//! Read pump: splits the inbound byte stream into records and routes them.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hearthlink_protocol::constants::MAX_RECORD_SIZE;
use hearthlink_protocol::{FrameError, InboundFrame, parse_record};

use crate::codec::{Record, RecordCodec};
use crate::manager::Shared;
use crate::registry::DeviceRegistry;
use crate::types::ConnectionState;

/// What one inbound record turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordKind {
    Heartbeat,
    Update { delivered: usize },
    Ignored,
    Invalid,
}

/// Reads records until the stream ends, fails or the session is cancelled.
///
/// Bad records never end the session; only transport errors do. End of
/// stream marks the attempt `Disconnected` but leaves the liveness
/// watchdog armed, so the session is rebuilt once the timeout passes.
pub(crate) async fn read_pump<R>(
    read: R,
    shared: Arc<Shared>,
    epoch: u64,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut records = FramedRead::new(read, RecordCodec::new(MAX_RECORD_SIZE));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            record = records.next() => match record {
                Some(Ok(Record::Line(record))) => {
                    if handle_record(&record, &shared.registry) == RecordKind::Heartbeat {
                        shared.on_heartbeat();
                    }
                }
                Some(Ok(Record::Oversized)) => {
                    warn!(epoch, limit = MAX_RECORD_SIZE, "skipping oversized record");
                }
                Some(Err(e)) => {
                    warn!(epoch, error = %e, "hub read error");
                    break;
                }
                None => {
                    debug!(epoch, "hub closed the connection");
                    break;
                }
            }
        }
    }

    shared.set_state(epoch, ConnectionState::Disconnected);
}

/// Classifies a record and delivers device updates to the registry.
///
/// Malformed records are logged and skipped; they never end the session.
pub(crate) fn handle_record(record: &str, registry: &DeviceRegistry) -> RecordKind {
    match parse_record(record) {
        Ok(InboundFrame::Heartbeat) => RecordKind::Heartbeat,
        Ok(InboundFrame::Update(update)) => {
            let delivered = registry.dispatch(&update.devices, &update.values);
            trace!(devices = update.devices.len(), delivered, "update from hub");
            RecordKind::Update { delivered }
        }
        Ok(InboundFrame::Other { origin }) => {
            trace!(?origin, "ignoring record");
            RecordKind::Ignored
        }
        Err(FrameError::Empty) => RecordKind::Ignored,
        Err(e) => {
            warn!(error = %e, record = preview(record), "skipping malformed record");
            RecordKind::Invalid
        }
    }
}

fn preview(record: &str) -> &str {
    match record.char_indices().nth(120) {
        Some((idx, _)) => &record[..idx],
        None => record,
    }
}
