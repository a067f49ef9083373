//! Always-on-top toggle limited to the windows of the applied configuration

use crate::models::{FailureReason, WindowHandle};
use crate::platform::WindowSystem;
use crate::services::applied_state::AppliedConfigTracker;
use crate::services::window_operator::WindowOperator;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// New topmost state of one window after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AotChange {
    pub handle: WindowHandle,
    pub topmost: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AotToggleOutcome {
    /// No configuration is applied, nothing was touched
    NothingApplied,
    Toggled {
        changes: Vec<AotChange>,
        failures: Vec<(WindowHandle, FailureReason)>,
    },
}

/// Flips topmost on every owned window and on nothing else
pub struct ScopedAotToggle {
    tracker: Arc<AppliedConfigTracker>,
    operator: Arc<WindowOperator>,
    system: Arc<dyn WindowSystem>,
}

impl ScopedAotToggle {
    pub fn new(
        tracker: Arc<AppliedConfigTracker>,
        operator: Arc<WindowOperator>,
        system: Arc<dyn WindowSystem>,
    ) -> Self {
        Self {
            tracker,
            operator,
            system,
        }
    }

    pub async fn toggle_aot(&self) -> Result<AotToggleOutcome> {
        let owned = self.tracker.owned_windows().await;
        if owned.is_empty() {
            debug!("AOT toggle ignored: no configuration applied");
            return Ok(AotToggleOutcome::NothingApplied);
        }

        let mut changes = Vec::with_capacity(owned.len());
        let mut failures = Vec::new();

        for handle in owned {
            // read and write in one job so the inverse is taken from the live state
            let result = self
                .operator
                .run(handle, move |system| {
                    let topmost = !system.is_topmost(handle)?;
                    system.set_topmost(handle, topmost)?;
                    Ok(topmost)
                })
                .await;

            match result {
                Ok(topmost) => changes.push(AotChange { handle, topmost }),
                Err(reason) => {
                    warn!("Could not toggle always-on-top for {}: {}", handle, reason);
                    failures.push((handle, reason));
                }
            }
        }

        info!(
            "Toggled always-on-top on {} window(s), {} failed",
            changes.len(),
            failures.len()
        );
        Ok(AotToggleOutcome::Toggled { changes, failures })
    }

    /// Number of owned windows that are currently topmost
    pub async fn topmost_count(&self) -> usize {
        self.tracker
            .owned_windows()
            .await
            .into_iter()
            .filter(|handle| self.system.is_topmost(*handle).unwrap_or(false))
            .count()
    }

    pub async fn aot_status(&self) -> String {
        format_aot_status(self.topmost_count().await)
    }
}

pub fn format_aot_status(count: usize) -> String {
    match count {
        0 => "AOT: None".to_string(),
        1 => "AOT: 1 window".to_string(),
        n => format!("AOT: {} windows", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigEntry, Configuration, Point, Rect, Size, WindowInfo};
    use crate::platform::InMemoryWindowSystem;
    use crate::services::applied_state::Ownership;
    use crate::services::window_operator::DEFAULT_OPERATION_TIMEOUT;
    use std::collections::BTreeSet;

    fn window(handle: isize, title: &str, topmost: bool) -> WindowInfo {
        WindowInfo::new(handle, title, 100, Rect::from_xywh(0, 0, 400, 300).unwrap())
            .with_topmost(topmost)
    }

    async fn toggle_with(owned: &[isize]) -> (Arc<InMemoryWindowSystem>, ScopedAotToggle) {
        let system = Arc::new(InMemoryWindowSystem::new_with(vec![
            window(1, "Game", true),
            window(2, "Chat", false),
            window(3, "Browser", false),
        ]));
        let tracker = Arc::new(AppliedConfigTracker::new());
        if !owned.is_empty() {
            let config = Configuration::new(
                "test",
                vec![ConfigEntry::new("Game", Point::new(0, 0), Size::new(10, 10).unwrap())],
            )
            .unwrap();
            let mut mapping = Ownership::new();
            mapping.insert(
                "Game".into(),
                owned.iter().copied().map(WindowHandle).collect::<BTreeSet<_>>(),
            );
            tracker.record(Arc::new(config), mapping).await.unwrap();
        }

        let operator = Arc::new(WindowOperator::new(system.clone(), DEFAULT_OPERATION_TIMEOUT).unwrap());
        let toggle = ScopedAotToggle::new(tracker, operator, system.clone());
        (system, toggle)
    }

    #[tokio::test]
    async fn nothing_applied_touches_nothing() {
        let (system, toggle) = toggle_with(&[]).await;
        assert_eq!(toggle.toggle_aot().await.unwrap(), AotToggleOutcome::NothingApplied);
        assert!(system.calls().is_empty());
        assert_eq!(toggle.aot_status().await, "AOT: None");
    }

    #[tokio::test]
    async fn flips_only_owned_windows() {
        let (system, toggle) = toggle_with(&[1, 2]).await;
        assert_eq!(toggle.aot_status().await, "AOT: 1 window");

        let outcome = toggle.toggle_aot().await.unwrap();
        assert_eq!(
            outcome,
            AotToggleOutcome::Toggled {
                changes: vec![
                    AotChange { handle: WindowHandle(1), topmost: false },
                    AotChange { handle: WindowHandle(2), topmost: true },
                ],
                failures: vec![],
            }
        );
        assert!(!system.window(WindowHandle(3)).unwrap().is_topmost);
        assert!(system.calls_for(WindowHandle(3)).is_empty());

        toggle.toggle_aot().await.unwrap();
        assert!(system.window(WindowHandle(1)).unwrap().is_topmost);
        assert!(!system.window(WindowHandle(2)).unwrap().is_topmost);
    }

    #[tokio::test]
    async fn closed_window_is_reported_not_fatal() {
        let (system, toggle) = toggle_with(&[1, 2]).await;
        system.close_window(WindowHandle(1));

        match toggle.toggle_aot().await.unwrap() {
            AotToggleOutcome::Toggled { changes, failures } => {
                assert_eq!(changes.len(), 1);
                assert_eq!(failures, vec![(WindowHandle(1), FailureReason::StaleHandle)]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn status_wording() {
        assert_eq!(format_aot_status(0), "AOT: None");
        assert_eq!(format_aot_status(1), "AOT: 1 window");
        assert_eq!(format_aot_status(3), "AOT: 3 windows");
    }
}
