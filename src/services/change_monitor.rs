//! Periodic watchdog that reapplies entries whose windows changed

use crate::models::WindowHandle;
use crate::services::layout_engine::{LayoutEngine, ReapplyOutcome};
use crate::UltrawideError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Default time between two polls of the live window set
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const REQUEST_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why an entry needs to be reapplied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReapplyReason {
    /// The set of matching windows differs from the recorded one
    MembershipChanged {
        added: BTreeSet<WindowHandle>,
        removed: BTreeSet<WindowHandle>,
    },
    /// Owned windows no longer have the entry's geometry or titlebar
    Drift { windows: BTreeSet<WindowHandle> },
}

/// Message from the poller to the reapply worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReapplyRequest {
    pub entry: String,
    pub reason: ReapplyReason,
}

/// Handle to a running monitor. Dropping it stops the monitor at the next tick.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    poller: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal both tasks to stop without waiting for them
    pub fn request_stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Stop the monitor and wait until no reapply is in flight
    pub async fn stop(self) {
        self.request_stop();
        if let Err(err) = self.poller.await {
            warn!("Change monitor poller ended abnormally: {}", err);
        }
        if let Err(err) = self.worker.await {
            warn!("Change monitor worker ended abnormally: {}", err);
        }
        info!("Change monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.poller.is_finished() && !*self.stop.borrow()
    }
}

/// Auto-reapply loop.
///
/// A poller task wakes on a fixed interval, asks the engine for entries whose
/// matching windows changed and hands them to a worker task over a channel.
/// The worker reapplies one entry at a time through the engine, which
/// serializes the reapply against manual apply and reset.
pub struct ChangeMonitor;

impl ChangeMonitor {
    pub fn start(engine: Weak<LayoutEngine>, config: MonitorConfig) -> MonitorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);

        let poller = tokio::spawn(Self::poll(
            engine.clone(),
            config.poll_interval,
            stop_rx.clone(),
            request_tx,
        ));
        let worker = tokio::spawn(Self::work(engine, stop_rx, request_rx));

        info!(
            "Change monitor started (interval {:?})",
            config.poll_interval
        );

        MonitorHandle {
            stop: stop_tx,
            poller,
            worker,
        }
    }

    async fn poll(
        engine: Weak<LayoutEngine>,
        period: Duration,
        mut stop: watch::Receiver<bool>,
        requests: mpsc::Sender<ReapplyRequest>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if *stop.borrow() {
                break;
            }
            let Some(engine) = engine.upgrade() else {
                break;
            };

            match engine.detect_changes().await {
                Ok(changes) => {
                    trace!("Poll found {} entr(ies) to reapply", changes.len());
                    for request in changes {
                        match requests.try_send(request) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(request)) => {
                                debug!("Reapply queue full, '{}' waits for the next poll", request.entry);
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => return,
                        }
                    }
                }
                Err(err) => warn!("Change detection failed: {}", err),
            }
        }

        debug!("Change monitor poller exiting");
    }

    async fn work(
        engine: Weak<LayoutEngine>,
        stop: watch::Receiver<bool>,
        mut requests: mpsc::Receiver<ReapplyRequest>,
    ) {
        let mut stop = stop;
        loop {
            let request = tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            };

            if *stop.borrow() {
                break;
            }
            let Some(engine) = engine.upgrade() else {
                break;
            };

            match engine.reapply_entry(&request.entry).await {
                Ok(ReapplyOutcome::Reapplied(result)) => info!(
                    "Reapplied '{}' ({:?}): {} window(s) owned",
                    request.entry,
                    request.reason,
                    result.succeeded_handles().len()
                ),
                Ok(outcome) => debug!("Reapply of '{}' skipped: {:?}", request.entry, outcome),
                Err(err) => match err.downcast_ref::<UltrawideError>() {
                    Some(UltrawideError::ConcurrentMutationRejected(_)) => {
                        debug!("Apply or reset in progress, skipping reapply of '{}'", request.entry)
                    }
                    _ => warn!("Reapply of '{}' failed: {}", request.entry, err),
                },
            }
        }

        debug!("Change monitor worker exiting");
    }
}
