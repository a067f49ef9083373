use crate::models::config_entry::ApplyOperation;
use crate::models::window::{WindowHandle, WindowSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a single operation on a single window failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The window closed between matching and the operation
    StaleHandle,
    /// The window is not processing messages
    Unresponsive,
    /// The OS call did not finish within the operation timeout
    TimedOut,
    /// The OS call returned an error
    Platform(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::StaleHandle => f.write_str("window closed"),
            FailureReason::Unresponsive => f.write_str("window is not responding"),
            FailureReason::TimedOut => f.write_str("operation timed out"),
            FailureReason::Platform(message) => f.write_str(message),
        }
    }
}

/// Result of one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OperationStatus {
    Succeeded,
    Failed(FailureReason),
    /// Failed, but the operation is best-effort (process priority) and the window still counts as applied
    FailedNonFatal(FailureReason),
    /// Not attempted because an earlier operation on the same window failed
    Aborted,
}

impl OperationStatus {
    pub fn is_fatal_failure(&self) -> bool {
        matches!(self, OperationStatus::Failed(_) | OperationStatus::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: ApplyOperation,
    pub status: OperationStatus,
}

/// Per-window record of an apply pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowApplyOutcome {
    pub handle: WindowHandle,
    pub title: String,
    pub operations: Vec<OperationOutcome>,
    /// State of the window before this pass touched it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<WindowSnapshot>,
}

impl WindowApplyOutcome {
    /// True when every attempted operation succeeded (best-effort failures excepted)
    pub fn succeeded(&self) -> bool {
        !self
            .operations
            .iter()
            .any(|outcome| outcome.status.is_fatal_failure())
    }

    pub fn first_failure(&self) -> Option<(&ApplyOperation, &FailureReason)> {
        self.operations.iter().find_map(|outcome| match &outcome.status {
            OperationStatus::Failed(reason) => Some((&outcome.operation, reason)),
            _ => None,
        })
    }

    /// Order in which operations were executed or planned
    pub fn executed_order(&self) -> Vec<ApplyOperation> {
        self.operations.iter().map(|outcome| outcome.operation).collect()
    }
}

/// Result of applying one entry to its matched windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub entry: String,
    pub windows: Vec<WindowApplyOutcome>,
}

impl ApplyResult {
    pub fn succeeded_handles(&self) -> Vec<WindowHandle> {
        self.windows
            .iter()
            .filter(|window| window.succeeded())
            .map(|window| window.handle)
            .collect()
    }

    pub fn failed_handles(&self) -> Vec<WindowHandle> {
        self.windows
            .iter()
            .filter(|window| !window.succeeded())
            .map(|window| window.handle)
            .collect()
    }

    pub fn outcome_for(&self, handle: WindowHandle) -> Option<&WindowApplyOutcome> {
        self.windows.iter().find(|window| window.handle == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(statuses: Vec<(ApplyOperation, OperationStatus)>) -> WindowApplyOutcome {
        WindowApplyOutcome {
            handle: WindowHandle(1),
            title: "Test".into(),
            operations: statuses
                .into_iter()
                .map(|(operation, status)| OperationOutcome { operation, status })
                .collect(),
            original: None,
        }
    }

    #[test]
    fn non_fatal_priority_failure_still_counts_as_success() {
        let window = outcome(vec![
            (ApplyOperation::Position, OperationStatus::Succeeded),
            (
                ApplyOperation::ProcessPriority,
                OperationStatus::FailedNonFatal(FailureReason::Platform("access denied".into())),
            ),
        ]);
        assert!(window.succeeded());
        assert!(window.first_failure().is_none());
    }

    #[test]
    fn aborted_operations_mark_window_failed() {
        let window = outcome(vec![
            (
                ApplyOperation::Titlebar,
                OperationStatus::Failed(FailureReason::StaleHandle),
            ),
            (ApplyOperation::Position, OperationStatus::Aborted),
        ]);
        assert!(!window.succeeded());
        assert_eq!(
            window.first_failure(),
            Some((&ApplyOperation::Titlebar, &FailureReason::StaleHandle))
        );
    }
}
