//! Heartbeat pump: writes `HEART` once per heartbeat period.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use hearthlink_protocol::heartbeat_record;

use crate::manager::Shared;

/// Writes a heartbeat every `heartbeat_period` until cancelled.
///
/// Only the inbound `BEAT` resets liveness; a failed write here is logged
/// and left to the watchdog.
pub(crate) async fn heartbeat_pump(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(shared.settings.heartbeat_period);
    interval.tick().await; // Skip immediate first tick.
    let record = heartbeat_record();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let mut guard = shared.writer.lock().await;
                let Some(writer) = guard.as_mut() else {
                    break;
                };
                match shared.write_bounded(writer, &record).await {
                    Ok(()) => trace!("heartbeat sent"),
                    Err(reason) => warn!(%reason, "failed to write heartbeat"),
                }
            }
        }
    }
}
