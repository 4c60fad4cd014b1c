//! Time- and count-bounded discovery.
//!
//! A [`DiscoverySession`] is the pure state machine; [`DiscoveryAggregator`]
//! drives one with a browser, a prober and a periodic check.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::browser::ServiceBrowser;
use crate::probe::Prober;
use crate::types::CHECK_INTERVAL;

/// Lifecycle of a discovery session. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Browsing,
    /// Completion decided; browse being stopped.
    Completing,
    /// Result delivered.
    Done,
}

/// Bounds of one discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Stop early once this many devices were confirmed.
    pub target_count: usize,
    /// Stop once the accumulated check time exceeds this.
    pub deadline: Duration,
    pub check_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_count: 100,
            deadline: Duration::from_secs(30),
            check_interval: CHECK_INTERVAL,
        }
    }
}

type Completion<T> = Box<dyn FnOnce(Vec<T>) + Send>;

/// Accumulates confirmed devices and delivers them exactly once.
pub struct DiscoverySession<T> {
    phase: Phase,
    found: Vec<T>,
    target_count: usize,
    deadline: Duration,
    elapsed: Duration,
    on_complete: Option<Completion<T>>,
}

impl<T> DiscoverySession<T> {
    pub fn new(config: &DiscoveryConfig, on_complete: impl FnOnce(Vec<T>) + Send + 'static) -> Self {
        Self {
            phase: Phase::Idle,
            found: Vec::new(),
            target_count: config.target_count,
            deadline: config.deadline,
            elapsed: Duration::ZERO,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn found(&self) -> &[T] {
        &self.found
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// `Idle -> Browsing`; resets the elapsed accumulator.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Browsing;
        self.elapsed = Duration::ZERO;
        true
    }

    /// Appends a confirmed device. Discarded unless browsing.
    pub fn push(&mut self, item: T) -> bool {
        if self.phase != Phase::Browsing {
            trace!(phase = ?self.phase, "discarding late discovery result");
            return false;
        }
        self.found.push(item);
        true
    }

    /// Periodic check. Returns `true` when it moved the session to `Completing`.
    ///
    /// The target is compared against the configured expected count as
    /// is; when fewer devices exist the full deadline is always waited.
    pub fn check(&mut self, period: Duration) -> bool {
        if self.phase != Phase::Browsing {
            return false;
        }
        self.elapsed += period;
        if self.found.len() >= self.target_count || self.elapsed > self.deadline {
            debug!(
                found = self.found.len(),
                elapsed_secs = self.elapsed.as_secs(),
                "discovery complete"
            );
            self.phase = Phase::Completing;
            return true;
        }
        false
    }

    /// Ends browsing early with whatever was found so far.
    pub fn cancel(&mut self) -> bool {
        if self.phase > Phase::Browsing {
            return false;
        }
        self.phase = Phase::Completing;
        true
    }

    /// `Completing -> Done`: hands the result to the completion callback.
    ///
    /// Returns the number of delivered devices, or `None` if the session was
    /// not completing (already done, or never finished).
    pub fn finish(&mut self) -> Option<usize> {
        if self.phase != Phase::Completing {
            return None;
        }
        self.phase = Phase::Done;
        let found = std::mem::take(&mut self.found);
        let count = found.len();
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(found);
        }
        Some(count)
    }
}

/// Browses, probes and aggregates candidates into one result list.
pub struct DiscoveryAggregator<T> {
    browser: Box<dyn ServiceBrowser>,
    prober: Arc<dyn Prober<T>>,
    config: DiscoveryConfig,
}

impl<T: Send + 'static> DiscoveryAggregator<T> {
    pub fn new(
        browser: Box<dyn ServiceBrowser>,
        prober: Arc<dyn Prober<T>>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            browser,
            prober,
            config,
        }
    }

    /// Runs discovery to completion and invokes `on_complete` exactly once.
    ///
    /// Completion happens on the first periodic check that sees the target
    /// reached or the deadline exceeded, or immediately on cancellation.
    /// Probe failures discard the candidate silently.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        on_complete: impl FnOnce(Vec<T>) + Send + 'static,
    ) {
        let mut session = DiscoverySession::new(&self.config, on_complete);
        session.start();

        let mut events = match self.browser.start() {
            Ok(events) => Some(events),
            Err(e) => {
                // Nothing can be found, but the deadline still applies.
                error!(error = %e, "failed to start browse");
                None
            }
        };

        let mut probes = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.tick().await; // Skip immediate first tick.

        while session.phase() == Phase::Browsing {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(found = session.found().len(), "discovery cancelled");
                    session.cancel();
                }

                _ = ticker.tick() => {
                    session.check(self.config.check_interval);
                }

                candidate = recv(&mut events) => match candidate {
                    Some(candidate) if self.prober.accepts(&candidate) => {
                        debug!(%candidate, "probing candidate");
                        probes.spawn(self.prober.probe(candidate));
                    }
                    Some(candidate) => trace!(%candidate, "skipping candidate"),
                    None => {
                        debug!("browse ended");
                        events = None;
                    }
                },

                Some(result) = probes.join_next(), if !probes.is_empty() => match result {
                    Ok(Ok(item)) => {
                        session.push(item);
                    }
                    Ok(Err(e)) => debug!(error = %e, "candidate discarded"),
                    Err(e) => warn!(error = %e, "probe task failed"),
                },
            }
        }

        self.browser.stop();
        probes.abort_all();
        if let Some(count) = session.finish() {
            info!(count, "discovery finished");
        }
    }

    /// Runs discovery and returns the result instead of calling back.
    pub async fn discover(self, cancel: CancellationToken) -> Vec<T> {
        let (tx, rx) = oneshot::channel();
        self.run(cancel, move |found| {
            let _ = tx.send(found);
        })
        .await;
        rx.await.unwrap_or_default()
    }
}

/// Next candidate, or pending forever once the browse is gone.
async fn recv<C>(events: &mut Option<tokio::sync::mpsc::Receiver<C>>) -> Option<C> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
