//! Hub connection: one logical session over a replaceable transport.
//!
//! Owns the command queue drain, the per-session read and heartbeat pumps
//! and the liveness watchdog that rebuilds the session when the hub goes
//! quiet.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use hearthlink_protocol::HubCommand;

use crate::queue::{CommandQueue, Pending};
use crate::reconnection::{liveness_watchdog, open_session, teardown};
use crate::registry::DeviceRegistry;
use crate::transport::{BoxedStream, Connector, HubError, TcpConnector};
use crate::types::{ConnectionState, ConnectionStatus, DropReason, HubSettings, WriteOutcome};

pub(crate) type Writer = WriteHalf<BoxedStream>;

/// Tasks belonging to one connected transport.
pub(crate) struct Session {
    pub(crate) cancel: CancellationToken,
    pub(crate) read_handle: JoinHandle<()>,
    pub(crate) ping_handle: JoinHandle<()>,
}

/// State shared between the public handle and the background tasks.
pub(crate) struct Shared {
    pub(crate) settings: HubSettings,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) queue: CommandQueue,
    pub(crate) registry: Arc<DeviceRegistry>,
    pub(crate) status: watch::Sender<ConnectionStatus>,
    /// Deadline of the liveness watchdog; `None` while disarmed.
    pub(crate) liveness: watch::Sender<Option<Instant>>,
    pub(crate) writer: Mutex<Option<Writer>>,
    pub(crate) session: Mutex<Option<Session>>,
    /// Serialises connect attempts from the caller and the watchdog.
    pub(crate) connect_lock: Mutex<()>,
    pub(crate) shutdown: CancellationToken,
}

impl Shared {
    pub(crate) fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.status.borrow().epoch
    }

    /// Opens a new attempt epoch and moves to `Connecting`.
    pub(crate) fn begin_attempt(&self) -> u64 {
        let mut epoch = 0;
        self.status.send_modify(|s| {
            s.epoch += 1;
            s.state = ConnectionState::Connecting;
            epoch = s.epoch;
        });
        epoch
    }

    /// Applies a transition if it belongs to the current epoch and is legal.
    pub(crate) fn set_state(&self, epoch: u64, next: ConnectionState) -> bool {
        self.status.send_if_modified(|s| {
            if s.epoch != epoch || !s.state.can_transition_to(next) {
                trace!(epoch, current = ?s.state, ?next, "ignoring state transition");
                return false;
            }
            s.state = next;
            true
        })
    }

    pub(crate) fn arm_liveness(&self) {
        self.liveness
            .send_replace(Some(Instant::now() + self.settings.heartbeat_timeout));
    }

    pub(crate) fn disarm_liveness(&self) {
        self.liveness.send_replace(None);
    }

    /// Records a `BEAT` and pushes the liveness deadline forward.
    pub(crate) fn on_heartbeat(&self) {
        let now = Instant::now();
        self.status.send_modify(|s| s.last_heartbeat = Some(now));
        self.arm_liveness();
        debug!("heartbeat from hub");
    }

    /// Writes one record to the current transport, if connected.
    pub(crate) async fn write_payload(&self, payload: &str) -> WriteOutcome {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return WriteOutcome::Dropped(DropReason::NotConnected);
        };
        if self.state() != ConnectionState::Connected {
            return WriteOutcome::Dropped(DropReason::NotConnected);
        }
        match self.write_bounded(writer, payload).await {
            Ok(()) => WriteOutcome::Written,
            Err(reason) => WriteOutcome::Dropped(reason),
        }
    }

    /// Writes a record within `write_timeout`.
    ///
    /// On expiry the stream may hold half a record, so the attempt is marked
    /// `Disconnected` and left to the watchdog.
    pub(crate) async fn write_bounded(
        &self,
        writer: &mut Writer,
        record: &str,
    ) -> Result<(), DropReason> {
        let epoch = self.epoch();
        match tokio::time::timeout(self.settings.write_timeout, write_record(writer, record)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DropReason::Transport(e.to_string())),
            Err(_) => {
                warn!(
                    epoch,
                    timeout_secs = self.settings.write_timeout.as_secs(),
                    "hub write stalled, marking disconnected"
                );
                self.set_state(epoch, ConnectionState::Disconnected);
                Err(DropReason::Transport("write timed out".into()))
            }
        }
    }
}

/// Writes a complete record and flushes it.
pub(crate) async fn write_record<W>(writer: &mut W, record: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(record.as_bytes()).await?;
    writer.flush().await
}

/// Persistent connection to the home-automation hub.
///
/// Must be created inside a tokio runtime: the send pump and the liveness
/// watchdog are spawned immediately and live until [`shutdown`](Self::shutdown)
/// or drop.
pub struct HubConnection {
    shared: Arc<Shared>,
    send_handle: JoinHandle<()>,
    watchdog_handle: JoinHandle<()>,
}

impl HubConnection {
    pub fn new(
        settings: HubSettings,
        connector: Arc<dyn Connector>,
        registry: Arc<DeviceRegistry>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (liveness, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            settings,
            connector,
            queue: CommandQueue::new(),
            registry,
            status,
            liveness,
            writer: Mutex::new(None),
            session: Mutex::new(None),
            connect_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        });

        let send_handle = tokio::spawn(crate::pumps::write::send_pump(shared.clone()));
        let watchdog_handle = tokio::spawn(liveness_watchdog(shared.clone()));

        Self {
            shared,
            send_handle,
            watchdog_handle,
        }
    }

    /// Connection over plain TCP to `settings.host:settings.port`.
    pub fn tcp(settings: HubSettings, registry: Arc<DeviceRegistry>) -> Self {
        let connector = Arc::new(TcpConnector::new(settings.address()));
        Self::new(settings, connector, registry)
    }

    /// Opens the transport and sends the identify handshake.
    ///
    /// A failure leaves the connection `Disconnected`; the liveness
    /// watchdog retries once the heartbeat timeout elapses.
    pub async fn connect(&self) -> Result<(), HubError> {
        open_session(&self.shared).await
    }

    /// Enqueues a command. Never blocks.
    pub fn send(&self, command: HubCommand) -> Pending {
        self.shared.queue.push(command)
    }

    /// Handle to the outbound queue, for proxies that issue commands.
    pub fn commands(&self) -> CommandQueue {
        self.shared.queue.clone()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.shared.registry
    }

    pub fn settings(&self) -> &HubSettings {
        &self.shared.settings
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Subscribes to status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Stops all background work, closes the transport and drops queued commands.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.disarm_liveness();
        let _guard = self.shared.connect_lock.lock().await;
        teardown(&self.shared, DropReason::Shutdown).await;
        info!("hub connection shut down");
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        self.send_handle.abort();
        self.watchdog_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::StreamExt;
    use hearthlink_protocol::constants::MAX_RECORD_SIZE;
    use hearthlink_protocol::{DeviceId, SwitchState, Values};
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use tokio_util::codec::{FramedRead, LinesCodec};

    use crate::registry::UpdateListener;
    use crate::testing::PipeConnector;

    struct Forward {
        tx: mpsc::UnboundedSender<Values>,
    }

    impl UpdateListener for Forward {
        fn update(&self, values: &Values) {
            let _ = self.tx.send(values.clone());
        }
    }

    fn settings() -> HubSettings {
        HubSettings::new("hub.test", 5000)
    }

    fn hub(connector: &Arc<PipeConnector>) -> HubConnection {
        HubConnection::new(settings(), connector.clone(), Arc::new(DeviceRegistry::new()))
    }

    async fn next_line(lines: &mut FramedRead<tokio::io::DuplexStream, LinesCodec>) -> String {
        lines.next().await.expect("line").expect("valid line")
    }

    #[tokio::test]
    async fn connect_sends_identify_first() {
        let connector = PipeConnector::new();
        let server = connector.add_pipe();
        let hub = hub(&connector);

        hub.connect().await.unwrap();
        assert_eq!(hub.state(), ConnectionState::Connected);
        assert_eq!(hub.status().epoch, 1);

        let mut lines = FramedRead::new(server, LinesCodec::new());
        let first: serde_json::Value = serde_json::from_str(&next_line(&mut lines).await).unwrap();
        assert_eq!(
            first,
            serde_json::json!({"action": "identify", "options": {"config": 1}})
        );
    }

    #[tokio::test]
    async fn connect_failure_leaves_disconnected() {
        let connector = PipeConnector::new();
        let hub = hub(&connector);

        assert!(hub.connect().await.is_err());
        assert_eq!(hub.state(), ConnectionState::Disconnected);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_written_in_submission_order() {
        let connector = PipeConnector::new();
        let server = connector.add_pipe();
        let hub = hub(&connector);
        hub.connect().await.unwrap();

        let receipts: Vec<Pending> = ["c1", "c2", "c3"]
            .into_iter()
            .map(|id| hub.send(HubCommand::control(DeviceId::new(id), SwitchState::On)))
            .collect();

        let mut lines = FramedRead::new(server, LinesCodec::new());
        let _identify = next_line(&mut lines).await;
        let mut devices = Vec::new();
        for _ in 0..3 {
            let v: serde_json::Value = serde_json::from_str(&next_line(&mut lines).await).unwrap();
            devices.push(v["code"]["device"].as_str().unwrap().to_string());
        }
        assert_eq!(devices, vec!["c1", "c2", "c3"]);

        for receipt in receipts {
            assert_eq!(receipt.written().await, WriteOutcome::Written);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_paced_one_per_interval() {
        let connector = PipeConnector::new();
        let server = connector.add_pipe();
        let hub = hub(&connector);
        hub.connect().await.unwrap();

        let mut lines = FramedRead::new(server, LinesCodec::new());
        let _identify = next_line(&mut lines).await;

        let start = Instant::now();
        let _a = hub.send(HubCommand::control("a".into(), SwitchState::On));
        let _b = hub.send(HubCommand::control("b".into(), SwitchState::On));
        next_line(&mut lines).await;
        next_line(&mut lines).await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn update_frames_reach_registered_proxy() {
        let connector = PipeConnector::new();
        let mut server = connector.add_pipe();
        let registry = Arc::new(DeviceRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let proxy = Arc::new(Forward { tx });
        registry.register_arc(DeviceId::new("lamp"), &proxy);

        let hub = HubConnection::new(settings(), connector.clone(), registry);
        hub.connect().await.unwrap();

        server.write_all(b"{broken\n").await.unwrap();
        server
            .write_all(b"{\"origin\":\"update\",\"devices\":[\"ghost\"],\"values\":{\"state\":\"off\"}}\n")
            .await
            .unwrap();
        server
            .write_all(b"{\"origin\":\"update\",\"devices\":[\"lamp\"],\"values\":{\"state\":\"on\"}}\n")
            .await
            .unwrap();

        let values = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("update delivered")
            .unwrap();
        assert_eq!(values["state"], "on");
        assert_eq!(hub.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn undecodable_records_do_not_end_the_session() {
        let connector = PipeConnector::new();
        let mut server = connector.add_pipe();
        let registry = Arc::new(DeviceRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let proxy = Arc::new(Forward { tx });
        registry.register_arc(DeviceId::new("lamp"), &proxy);

        let hub = HubConnection::new(settings(), connector.clone(), registry);
        hub.connect().await.unwrap();

        server.write_all(b"\xff\xfe garbage\n").await.unwrap();
        let mut oversized = vec![b'x'; MAX_RECORD_SIZE + 16];
        oversized.push(b'\n');
        server.write_all(&oversized).await.unwrap();
        server
            .write_all(b"{\"origin\":\"update\",\"devices\":[\"lamp\"],\"values\":{\"state\":\"off\"}}\n")
            .await
            .unwrap();

        let values = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("update delivered after bad records")
            .unwrap();
        assert_eq!(values["state"], "off");
        assert_eq!(hub.state(), ConnectionState::Connected);
        assert_eq!(hub.status().epoch, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_written_periodically() {
        let connector = PipeConnector::new();
        let server = connector.add_pipe();
        let hub = hub(&connector);
        hub.connect().await.unwrap();

        let mut lines = FramedRead::new(server, LinesCodec::new());
        let _identify = next_line(&mut lines).await;
        let start = Instant::now();
        assert_eq!(next_line(&mut lines).await, "HEART");
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_is_dropped() {
        let connector = PipeConnector::new();
        let hub = hub(&connector);

        let receipt = hub.send(HubCommand::control("lamp".into(), SwitchState::Off));
        assert_eq!(
            receipt.written().await,
            WriteOutcome::Dropped(DropReason::NotConnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_drops_commands_of_previous_session() {
        let connector = PipeConnector::new();
        let _s1 = connector.add_pipe();
        let _s2 = connector.add_pipe();
        let hub = hub(&connector);
        hub.connect().await.unwrap();

        let receipt = hub.send(HubCommand::control("lamp".into(), SwitchState::On));
        hub.connect().await.unwrap();

        assert_eq!(
            receipt.written().await,
            WriteOutcome::Dropped(DropReason::ConnectionReset)
        );
        assert_eq!(hub.status().epoch, 2);
        assert_eq!(connector.log(), vec!["open 1", "close 1", "open 2"]);
    }

    #[tokio::test]
    async fn peer_close_marks_disconnected() {
        let connector = PipeConnector::new();
        let server = connector.add_pipe();
        let hub = hub(&connector);
        hub.connect().await.unwrap();
        let mut status = hub.watch_status();

        drop(server);
        tokio::time::timeout(Duration::from_secs(2), async {
            while status.borrow_and_update().state != ConnectionState::Disconnected {
                status.changed().await.unwrap();
            }
        })
        .await
        .expect("disconnect observed");
    }

    #[tokio::test]
    async fn shutdown_closes_transport() {
        let connector = PipeConnector::new();
        let server = connector.add_pipe();
        let hub = hub(&connector);
        hub.connect().await.unwrap();

        hub.shutdown().await;
        assert_eq!(hub.state(), ConnectionState::Disconnected);

        let mut lines = FramedRead::new(server, LinesCodec::new());
        let _identify = next_line(&mut lines).await;
        assert!(lines.next().await.is_none());
        assert!(hub.connect().await.is_err());
    }
}
