//! Session setup, teardown and the liveness watchdog.
//!
//! There is no backoff: the only retry trigger is the watchdog deadline,
//! armed on every connect attempt and pushed forward by each `BEAT`.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use hearthlink_protocol::HubCommand;

use crate::manager::{Session, Shared, write_record};
use crate::pumps::ping::heartbeat_pump;
use crate::pumps::read::read_pump;
use crate::transport::HubError;
use crate::types::{ConnectionState, DropReason};

/// Replaces the current session with a fresh one.
///
/// The previous transport is closed and its queued commands dropped before
/// the new transport is opened. Identify is written straight to the new
/// transport so nothing queued earlier can precede it.
pub(crate) async fn open_session(shared: &Arc<Shared>) -> Result<(), HubError> {
    let _guard = shared.connect_lock.lock().await;
    if shared.shutdown.is_cancelled() {
        return Err(HubError::Closed);
    }

    teardown(shared, DropReason::ConnectionReset).await;

    let epoch = shared.begin_attempt();
    shared.arm_liveness();
    let addr = shared.settings.address();
    info!(epoch, %addr, "connecting to hub");

    let connect = tokio::time::timeout(shared.settings.connect_timeout, shared.connector.connect());
    let stream = match connect.await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(epoch, %addr, error = %e, "hub connect failed");
            shared.set_state(epoch, ConnectionState::Disconnected);
            return Err(e.into());
        }
        Err(_) => {
            warn!(epoch, %addr, "hub connect timed out");
            shared.set_state(epoch, ConnectionState::Disconnected);
            return Err(HubError::Timeout);
        }
    };

    let (read, mut write) = tokio::io::split(stream);
    let handshake = match HubCommand::identify().encode() {
        Ok(record) => {
            let send = write_record(&mut write, &record);
            match tokio::time::timeout(shared.settings.write_timeout, send).await {
                Ok(result) => result.map_err(HubError::from),
                Err(_) => Err(HubError::Timeout),
            }
        }
        Err(e) => Err(HubError::from(e)),
    };
    if let Err(e) = handshake {
        warn!(epoch, error = %e, "identify failed");
        shared.set_state(epoch, ConnectionState::Disconnected);
        return Err(e);
    }

    *shared.writer.lock().await = Some(write);
    shared.set_state(epoch, ConnectionState::Connected);

    let cancel = shared.shutdown.child_token();
    let read_handle = tokio::spawn(read_pump(read, shared.clone(), epoch, cancel.clone()));
    let ping_handle = tokio::spawn(heartbeat_pump(shared.clone(), cancel.clone()));
    *shared.session.lock().await = Some(Session {
        cancel,
        read_handle,
        ping_handle,
    });

    info!(epoch, %addr, "connected to hub");
    Ok(())
}

/// Closes the current transport, if any, and drops every queued command.
///
/// Session tasks are stopped before the writer lock is taken, so a pump
/// blocked on the transport cannot hold teardown up past one write timeout.
pub(crate) async fn teardown(shared: &Shared, reason: DropReason) {
    let epoch = shared.epoch();
    shared.set_state(epoch, ConnectionState::Disconnected);

    let dropped = shared.queue.drop_all(reason);
    if dropped > 0 {
        warn!(dropped, "discarded queued hub commands");
    }

    let session = shared.session.lock().await.take();
    if let Some(Session {
        cancel,
        read_handle,
        ping_handle,
    }) = session
    {
        cancel.cancel();
        read_handle.abort();
        ping_handle.abort();
        let _ = read_handle.await;
        let _ = ping_handle.await;
    }

    // The transport is only released once both halves are gone.
    let writer = shared.writer.lock().await.take();
    if let Some(mut writer) = writer {
        match tokio::time::timeout(shared.settings.write_timeout, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "hub transport shutdown"),
            Err(_) => debug!("hub transport shutdown timed out"),
        }
        drop(writer);
        debug!(epoch, "hub transport closed");
    }
}

/// Rebuilds the session whenever the liveness deadline passes.
pub(crate) async fn liveness_watchdog(shared: Arc<Shared>) {
    let mut deadline_rx = shared.liveness.subscribe();

    loop {
        let deadline = *deadline_rx.borrow_and_update();
        let Some(deadline) = deadline else {
            tokio::select! {
                _ = shared.shutdown.cancelled() => break,
                changed = deadline_rx.changed() => if changed.is_err() { break },
            }
            continue;
        };

        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            changed = deadline_rx.changed() => if changed.is_err() { break },
            () = tokio::time::sleep_until(deadline) => {
                warn!(
                    timeout_secs = shared.settings.heartbeat_timeout.as_secs(),
                    "no heartbeat from hub, reconnecting"
                );
                if let Err(e) = open_session(&shared).await {
                    warn!(error = %e, "hub reconnect failed");
                }
            }
        }
    }
}
