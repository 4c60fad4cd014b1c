//! Send pump: drains the command queue, one command per tick.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::manager::Shared;
use crate::types::{DropReason, WriteOutcome};

/// Runs for the lifetime of the connection, across reconnects.
///
/// A command popped while no session is up is completed with
/// `Dropped(NotConnected)` rather than put back.
pub(crate) async fn send_pump(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.settings.send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(command) = shared.queue.pop() else {
            continue;
        };
        let outcome = shared.write_payload(command.payload()).await;
        match &outcome {
            WriteOutcome::Written => debug!(payload = command.payload().trim_end(), "sent hub command"),
            WriteOutcome::Dropped(reason) => warn!(%reason, "hub command dropped"),
        }
        command.complete(outcome);
    }

    shared.queue.drop_all(DropReason::Shutdown);
}
