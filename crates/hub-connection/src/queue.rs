//! Outbound command queue.
//!
//! Callers enqueue without blocking; the send pump drains one command per
//! tick in submission order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{trace, warn};

use hearthlink_protocol::HubCommand;

use crate::types::{DropReason, WriteOutcome};

/// A command waiting for its turn on the wire.
#[derive(Debug)]
pub struct QueuedCommand {
    command: HubCommand,
    payload: String,
    completion: Option<oneshot::Sender<WriteOutcome>>,
}

impl QueuedCommand {
    pub fn command(&self) -> &HubCommand {
        &self.command
    }

    /// Serialised record, newline included.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Reports the write result to whoever enqueued the command.
    pub fn complete(self, outcome: WriteOutcome) {
        if let Some(tx) = self.completion {
            let _ = tx.send(outcome);
        }
    }
}

/// Receipt returned by [`CommandQueue::push`].
///
/// Holding one means the command was enqueued; [`Pending::written`]
/// resolves once the send pump has attempted the write.
#[derive(Debug)]
pub struct Pending {
    rx: oneshot::Receiver<WriteOutcome>,
}

impl Pending {
    pub async fn written(self) -> WriteOutcome {
        self.rx
            .await
            .unwrap_or(WriteOutcome::Dropped(DropReason::Shutdown))
    }
}

/// FIFO of outbound commands. Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<QueuedCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a command and returns a receipt for its write outcome.
    pub fn push(&self, command: HubCommand) -> Pending {
        let (tx, rx) = oneshot::channel();
        self.enqueue(command, Some(tx));
        Pending { rx }
    }

    /// Enqueues a command nobody waits on.
    pub fn push_detached(&self, command: HubCommand) {
        self.enqueue(command, None);
    }

    fn enqueue(&self, command: HubCommand, completion: Option<oneshot::Sender<WriteOutcome>>) {
        let payload = match command.encode() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to encode hub command");
                if let Some(tx) = completion {
                    let _ = tx.send(WriteOutcome::Dropped(DropReason::Encode(e.to_string())));
                }
                return;
            }
        };
        trace!(payload = payload.trim_end(), "queued hub command");
        let queued = QueuedCommand {
            command,
            payload,
            completion,
        };
        if let Ok(mut q) = self.inner.lock() {
            q.push_back(queued);
        }
    }

    /// Takes the oldest command.
    pub fn pop(&self) -> Option<QueuedCommand> {
        self.inner.lock().ok()?.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completes every queued command with `Dropped(reason)`.
    ///
    /// Returns how many commands were discarded.
    pub fn drop_all(&self, reason: DropReason) -> usize {
        let drained: Vec<QueuedCommand> = match self.inner.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => return 0,
        };
        let count = drained.len();
        for cmd in drained {
            cmd.complete(WriteOutcome::Dropped(reason.clone()));
        }
        count
    }
}
