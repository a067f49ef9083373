use crate::models::{
    ApplyOperation, ApplyResult, ConfigEntry, FailureReason, OperationOutcome, OperationStatus,
    WindowApplyOutcome, WindowHandle, WindowInfo, WindowSnapshot,
};
use crate::services::title_matcher::MatchReport;
use crate::services::window_operator::WindowOperator;
use crate::UltrawideError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default pause between consecutive operations on one window
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Tuning for apply passes
#[derive(Debug, Clone)]
pub struct ApplierConfig {
    /// Pause between operations so the window can process the previous change
    pub settle_delay: Duration,
    /// Restore and raise each window before applying its plan
    pub bring_to_front: bool,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            bring_to_front: true,
        }
    }
}

/// Telemetry for apply passes
#[derive(Debug, Default, Clone)]
pub struct ApplierMetrics {
    pub windows_applied: u64,
    pub windows_failed: u64,
    pub operations_succeeded: u64,
    pub operations_failed: u64,
    pub timeouts: u64,
}

/// Outcome of applying every matched entry of a configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationApplyReport {
    pub configuration: String,
    pub results: Vec<ApplyResult>,
    pub unmatched: Vec<String>,
}

impl ConfigurationApplyReport {
    /// Entry name to the handles that succeeded on every fatal-class operation
    pub fn mapping(&self) -> BTreeMap<String, BTreeSet<WindowHandle>> {
        self.results
            .iter()
            .map(|result| {
                (
                    result.entry.clone(),
                    result.succeeded_handles().into_iter().collect(),
                )
            })
            .filter(|(_, handles): &(String, BTreeSet<WindowHandle>)| !handles.is_empty())
            .collect()
    }

    /// Entry name to the handles that were attempted and failed
    pub fn rejected(&self) -> BTreeMap<String, BTreeSet<WindowHandle>> {
        self.results
            .iter()
            .map(|result| {
                (
                    result.entry.clone(),
                    result.failed_handles().into_iter().collect(),
                )
            })
            .filter(|(_, handles): &(String, BTreeSet<WindowHandle>)| !handles.is_empty())
            .collect()
    }

    /// Pre-apply state of every window that ended up owned
    pub fn snapshots(&self) -> Vec<(WindowHandle, WindowSnapshot)> {
        self.results
            .iter()
            .flat_map(|result| result.windows.iter())
            .filter(|window| window.succeeded())
            .filter_map(|window| window.original.map(|snapshot| (window.handle, snapshot)))
            .collect()
    }

    pub fn failed_windows(&self) -> usize {
        self.results
            .iter()
            .map(|result| result.failed_handles().len())
            .sum()
    }
}

/// Executes entry plans against matched windows.
///
/// Windows are processed independently: a failed operation aborts the rest of
/// that window's plan and nothing else.
pub struct ConfigApplier {
    operator: Arc<WindowOperator>,
    config: ApplierConfig,
    metrics: Arc<RwLock<ApplierMetrics>>,
}

impl ConfigApplier {
    pub fn new(operator: Arc<WindowOperator>, config: ApplierConfig) -> Self {
        Self {
            operator,
            config,
            metrics: Arc::new(RwLock::new(ApplierMetrics::default())),
        }
    }

    pub async fn metrics(&self) -> ApplierMetrics {
        self.metrics.read().await.clone()
    }

    /// Apply one entry to each of `windows`, in order
    pub async fn apply(&self, entry: &ConfigEntry, windows: &[WindowInfo]) -> ApplyResult {
        let plan = entry.execution_plan();
        debug!(
            "Applying '{}' to {} window(s) with plan {:?}",
            entry.name,
            windows.len(),
            plan
        );

        let mut outcomes = Vec::with_capacity(windows.len());
        for window in windows {
            let span = info_span!("apply_window", entry = %entry.name, handle = %window.handle);
            let outcome = self
                .apply_to_window(entry, &plan, window)
                .instrument(span)
                .await;
            outcomes.push(outcome);
        }

        ApplyResult {
            entry: entry.name.clone(),
            windows: outcomes,
        }
    }

    /// Apply every matched entry of a configuration
    pub async fn apply_configuration(
        &self,
        configuration: &str,
        report: &MatchReport,
    ) -> ConfigurationApplyReport {
        let mut results = Vec::with_capacity(report.matched.len());
        for entry_match in &report.matched {
            results.push(self.apply(&entry_match.entry, &entry_match.windows).await);
        }

        let report = ConfigurationApplyReport {
            configuration: configuration.to_string(),
            results,
            unmatched: report.unmatched.clone(),
        };

        info!(
            "Applied configuration '{}': {} window(s) owned, {} failed, {} entr(ies) unmatched",
            configuration,
            report.mapping().values().map(BTreeSet::len).sum::<usize>(),
            report.failed_windows(),
            report.unmatched.len()
        );
        report
    }

    /// Put a window back to the state captured before it was first managed
    pub async fn restore(
        &self,
        handle: WindowHandle,
        snapshot: WindowSnapshot,
    ) -> std::result::Result<(), FailureReason> {
        self.operator
            .run(handle, move |system| system.set_titlebar(handle, snapshot.has_titlebar))
            .await?;
        self.operator
            .run(handle, move |system| system.set_frame(handle, snapshot.frame))
            .await?;
        self.operator
            .run(handle, move |system| system.set_topmost(handle, snapshot.is_topmost))
            .await?;
        debug!("Restored {} to {}", handle, snapshot.frame);
        Ok(())
    }

    async fn apply_to_window(
        &self,
        entry: &ConfigEntry,
        plan: &[ApplyOperation],
        window: &WindowInfo,
    ) -> WindowApplyOutcome {
        let handle = window.handle;

        if self.config.bring_to_front {
            if let Err(reason) = self
                .operator
                .run(handle, move |system| system.bring_to_front(handle))
                .await
            {
                debug!("Could not bring {} to front: {}", handle, reason);
            }
        }

        let mut operations = Vec::with_capacity(plan.len());
        let mut aborted = false;

        for (index, operation) in plan.iter().copied().enumerate() {
            if aborted {
                operations.push(OperationOutcome {
                    operation,
                    status: OperationStatus::Aborted,
                });
                continue;
            }

            let status = match self.execute(entry, operation, window).await {
                Ok(()) => OperationStatus::Succeeded,
                Err(reason) if operation == ApplyOperation::ProcessPriority => {
                    warn!(
                        "Could not raise priority of process {} ('{}'): {}",
                        window.process_id, window.title, reason
                    );
                    OperationStatus::FailedNonFatal(reason)
                }
                Err(reason) => {
                    warn!(
                        "{}",
                        UltrawideError::OperationFailed {
                            handle,
                            operation,
                            reason: reason.clone(),
                        }
                    );
                    aborted = true;
                    OperationStatus::Failed(reason)
                }
            };
            self.record_status(&status).await;
            operations.push(OperationOutcome { operation, status });

            if !aborted && index + 1 < plan.len() && !self.config.settle_delay.is_zero() {
                tokio::time::sleep(self.config.settle_delay).await;
            }
        }

        let outcome = WindowApplyOutcome {
            handle,
            title: window.title.clone(),
            operations,
            original: Some(WindowSnapshot::from(window)),
        };

        let mut metrics = self.metrics.write().await;
        if outcome.succeeded() {
            metrics.windows_applied += 1;
        } else {
            metrics.windows_failed += 1;
        }

        outcome
    }

    async fn execute(
        &self,
        entry: &ConfigEntry,
        operation: ApplyOperation,
        window: &WindowInfo,
    ) -> std::result::Result<(), FailureReason> {
        let handle = window.handle;
        match operation {
            ApplyOperation::Titlebar => {
                let enabled = entry.titlebar;
                self.operator
                    .run(handle, move |system| system.set_titlebar(handle, enabled))
                    .await
            }
            ApplyOperation::Position => {
                let position = entry.position;
                self.operator
                    .run(handle, move |system| system.set_position(handle, position))
                    .await
            }
            ApplyOperation::Size => {
                let size = entry.size;
                self.operator
                    .run(handle, move |system| system.set_size(handle, size))
                    .await
            }
            ApplyOperation::Aot => {
                let topmost = entry.always_on_top;
                self.operator
                    .run(handle, move |system| system.set_topmost(handle, topmost))
                    .await
            }
            ApplyOperation::ProcessPriority => {
                let process_id = window.process_id;
                self.operator
                    .run_detached(move |system| system.raise_process_priority(process_id))
                    .await
            }
        }
    }

    async fn record_status(&self, status: &OperationStatus) {
        let mut metrics = self.metrics.write().await;
        match status {
            OperationStatus::Succeeded => metrics.operations_succeeded += 1,
            OperationStatus::Failed(reason) | OperationStatus::FailedNonFatal(reason) => {
                metrics.operations_failed += 1;
                if *reason == FailureReason::TimedOut {
                    metrics.timeouts += 1;
                }
            }
            OperationStatus::Aborted => {}
        }
    }
}
