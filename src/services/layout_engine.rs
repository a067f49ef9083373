//! Facade tying matching, applying, tracking and auto-reapply together

use crate::config::layout_config::LayoutConfig;
use crate::config::settings::AppSettings;
use crate::models::{
    ApplyOperation, ApplyResult, ConfigEntry, Configuration, FailureReason, Rect, WindowHandle,
    WindowInfo, WindowSnapshot,
};
use crate::platform::{DisplayProvider, WindowSystem};
use crate::services::aot_toggle::{AotToggleOutcome, ScopedAotToggle};
use crate::services::applied_state::AppliedConfigTracker;
use crate::services::change_monitor::{
    ChangeMonitor, MonitorConfig, MonitorHandle, ReapplyReason, ReapplyRequest,
};
use crate::services::config_applier::{ApplierConfig, ConfigApplier, ConfigurationApplyReport};
use crate::services::layout_generator::{AutoAlignment, LayoutGenerator, DEFAULT_TASKBAR_HEIGHT};
use crate::services::title_matcher::{self, MatchPrecedence, MatchReport, TitleCleaner};
use crate::services::window_enumerator::WindowEnumerator;
use crate::services::window_operator::{WindowOperator, DEFAULT_OPERATION_TIMEOUT};
use crate::{trace_performance, Result, UltrawideError};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

/// Engine tuning, usually derived from [`AppSettings`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub match_precedence: MatchPrecedence,
    pub operation_timeout: Duration,
    pub applier: ApplierConfig,
    pub monitor: MonitorConfig,
    /// Start the change monitor after every successful apply
    pub auto_reapply: bool,
    pub reapply_on_drift: bool,
    pub restore_on_reset: bool,
    pub taskbar_height: i32,
    pub ignored_titles: Vec<String>,
    pub layout: LayoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_precedence: MatchPrecedence::default(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            applier: ApplierConfig::default(),
            monitor: MonitorConfig::default(),
            auto_reapply: false,
            reapply_on_drift: false,
            restore_on_reset: true,
            taskbar_height: DEFAULT_TASKBAR_HEIGHT,
            ignored_titles: Vec::new(),
            layout: LayoutConfig::default(),
        }
    }
}

impl From<&AppSettings> for EngineConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            match_precedence: settings.match_precedence,
            operation_timeout: settings.operation_timeout(),
            applier: ApplierConfig {
                settle_delay: settings.settle_delay(),
                bring_to_front: settings.bring_to_front,
            },
            monitor: MonitorConfig {
                poll_interval: settings.poll_interval(),
            },
            auto_reapply: settings.auto_reapply,
            reapply_on_drift: settings.reapply_on_drift,
            restore_on_reset: settings.restore_on_reset,
            taskbar_height: settings.taskbar_height,
            ignored_titles: settings.ignored_titles.clone(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Windows put back to their captured state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RestoreSummary {
    pub restored: Vec<WindowHandle>,
    pub failures: Vec<(WindowHandle, FailureReason)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    #[serde(flatten)]
    pub report: ConfigurationApplyReport,
    /// Windows owned by the previous configuration that this one dropped
    pub released: RestoreSummary,
    pub auto_reapply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetReport {
    pub configuration: Option<String>,
    pub released_windows: usize,
    pub restore: RestoreSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReapplyOutcome {
    Reapplied(ApplyResult),
    /// The entry's windows already match what is recorded
    Unchanged,
    NothingApplied,
    /// The applied configuration has no entry with that name
    EntryMissing,
}

/// Configuration entry as drawn on a preview canvas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewWindow {
    pub name: String,
    pub frame: Rect,
    pub always_on_top: bool,
    /// Whether a live window currently matches the entry
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,
}

/// Entry point for every layout action.
///
/// Apply, reset and auto-reapply mutate the applied state and are serialized
/// by one mutation lock. Manual callers that find the lock held get
/// [`UltrawideError::ConcurrentMutationRejected`] instead of waiting, and a
/// reapply that finds it held is skipped until the next poll.
pub struct LayoutEngine {
    system: Arc<dyn WindowSystem>,
    displays: Arc<dyn DisplayProvider>,
    enumerator: WindowEnumerator,
    applier: ConfigApplier,
    tracker: Arc<AppliedConfigTracker>,
    toggle: ScopedAotToggle,
    generator: LayoutGenerator,
    cleaner: TitleCleaner,
    mutation_lock: Mutex<()>,
    monitor: Mutex<Option<MonitorHandle>>,
    config: EngineConfig,
}

impl LayoutEngine {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        displays: Arc<dyn DisplayProvider>,
        config: EngineConfig,
    ) -> Result<Arc<Self>> {
        let operator = Arc::new(WindowOperator::new(
            Arc::clone(&system),
            config.operation_timeout,
        )?);
        let tracker = Arc::new(AppliedConfigTracker::new());

        let generator = LayoutGenerator::new(config.taskbar_height)?
            .with_custom_presets(config.layout.presets.iter().cloned())
            .with_overrides(config.layout.overrides.clone());

        let enumerator = WindowEnumerator::new(Arc::clone(&system))
            .with_ignored_titles(config.ignored_titles.iter());

        Ok(Arc::new(Self {
            applier: ConfigApplier::new(Arc::clone(&operator), config.applier.clone()),
            toggle: ScopedAotToggle::new(
                Arc::clone(&tracker),
                Arc::clone(&operator),
                Arc::clone(&system),
            ),
            system,
            displays,
            enumerator,
            tracker,
            generator,
            cleaner: TitleCleaner::new()?,
            mutation_lock: Mutex::new(()),
            monitor: Mutex::new(None),
            config,
        }))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<AppliedConfigTracker> {
        &self.tracker
    }

    pub fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        self.enumerator.list_windows()
    }

    pub fn match_configuration(&self, configuration: &Configuration) -> Result<MatchReport> {
        let windows = self.list_windows()?;
        Ok(title_matcher::match_configuration(
            configuration,
            &windows,
            self.config.match_precedence,
        ))
    }

    /// Apply every entry of `configuration` and make it the applied one
    pub async fn apply_configuration(self: &Arc<Self>, configuration: Configuration) -> Result<ApplyReport> {
        let name = configuration.name.clone();
        let report = {
            let _guard = self
                .mutation_lock
                .try_lock()
                .map_err(|_| UltrawideError::ConcurrentMutationRejected("apply a configuration"))?;

            self.apply_locked(configuration)
                .instrument(info_span!("apply_configuration", configuration = %name))
                .await?
        };

        let auto_reapply = if self.config.auto_reapply {
            self.enable_auto_reapply().await;
            true
        } else {
            self.is_auto_reapply_enabled().await
        };

        Ok(ApplyReport {
            auto_reapply,
            ..report
        })
    }

    async fn apply_locked(&self, configuration: Configuration) -> Result<ApplyReport> {
        configuration.validate()?;
        let matches = self.match_configuration(&configuration)?;
        let report = self
            .applier
            .apply_configuration(&configuration.name, &matches)
            .await;

        let released = self
            .tracker
            .record_apply(
                Arc::new(configuration),
                report.mapping(),
                report.rejected(),
                report.snapshots(),
            )
            .await?;

        Ok(ApplyReport {
            report,
            released: self.restore_released(released).await,
            auto_reapply: false,
        })
    }

    /// Forget the applied configuration and stop auto-reapply.
    ///
    /// A rejected reset leaves the monitor and the applied state untouched.
    /// The monitor is stopped under the mutation lock; its worker only ever
    /// `try_lock`s, so waiting for it here cannot deadlock.
    pub async fn reset(&self) -> Result<ResetReport> {
        let _guard = self
            .mutation_lock
            .try_lock()
            .map_err(|_| UltrawideError::ConcurrentMutationRejected("reset"))?;

        self.disable_auto_reapply().await;

        let previous = self.tracker.reset().await;
        let released_windows = previous.owned_windows().len();
        let configuration = previous.configuration.as_ref().map(|c| c.name.clone());

        let mut snapshots: Vec<(WindowHandle, WindowSnapshot)> =
            previous.snapshots.into_iter().collect();
        snapshots.sort_by_key(|(handle, _)| *handle);
        let restore = self.restore_released(snapshots).await;

        info!(
            "Reset {}: released {} window(s), restored {}",
            configuration.as_deref().unwrap_or("(nothing applied)"),
            released_windows,
            restore.restored.len()
        );

        Ok(ResetReport {
            configuration,
            released_windows,
            restore,
        })
    }

    async fn restore_released(&self, released: Vec<(WindowHandle, WindowSnapshot)>) -> RestoreSummary {
        let mut summary = RestoreSummary::default();
        if !self.config.restore_on_reset {
            return summary;
        }

        for (handle, snapshot) in released {
            if !self.system.is_window(handle) {
                continue;
            }
            match self.applier.restore(handle, snapshot).await {
                Ok(()) => summary.restored.push(handle),
                Err(reason) => {
                    warn!("Could not restore {}: {}", handle, reason);
                    summary.failures.push((handle, reason));
                }
            }
        }

        summary
    }

    /// Reapply one entry of the applied configuration to its current windows.
    ///
    /// The change is re-validated under the mutation lock, so a request that
    /// became stale while queued ends as [`ReapplyOutcome::Unchanged`].
    pub async fn reapply_entry(&self, entry: &str) -> Result<ReapplyOutcome> {
        let _guard = self
            .mutation_lock
            .try_lock()
            .map_err(|_| UltrawideError::ConcurrentMutationRejected("reapply an entry"))?;

        let state = self.tracker.snapshot().await;
        let Some(configuration) = state.configuration.clone() else {
            return Ok(ReapplyOutcome::NothingApplied);
        };
        let Some(config_entry) = configuration.entry(entry).cloned() else {
            return Ok(ReapplyOutcome::EntryMissing);
        };

        let matches = self.match_configuration(&configuration)?;
        let windows = matches
            .for_entry(entry)
            .map(|m| m.windows.clone())
            .unwrap_or_default();

        let owned = state.ownership.get(entry).cloned().unwrap_or_default();
        if self
            .reason_for(&config_entry, &windows, &state.known_for(entry), &owned)
            .is_none()
        {
            debug!("Entry '{}' no longer needs a reapply", entry);
            return Ok(ReapplyOutcome::Unchanged);
        }

        let result = self
            .applier
            .apply(&config_entry, &windows)
            .instrument(info_span!("reapply_entry", entry = %entry))
            .await;

        let owned: BTreeSet<WindowHandle> = result.succeeded_handles().into_iter().collect();
        let rejected: BTreeSet<WindowHandle> = result.failed_handles().into_iter().collect();
        let snapshots = result
            .windows
            .iter()
            .filter(|window| window.succeeded())
            .filter_map(|window| window.original.map(|snapshot| (window.handle, snapshot)))
            .collect();

        let released = self
            .tracker
            .update_entry(entry, owned, rejected, snapshots)
            .await?;
        self.restore_released(released).await;

        Ok(ReapplyOutcome::Reapplied(result))
    }

    /// Entries whose live windows no longer agree with the applied state.
    ///
    /// Read-only: enumerates, matches and compares against the tracker.
    pub async fn detect_changes(&self) -> Result<Vec<ReapplyRequest>> {
        let state = self.tracker.snapshot().await;
        let Some(configuration) = state.configuration.clone() else {
            return Ok(Vec::new());
        };

        let matches = self.match_configuration(&configuration)?;
        let mut requests = Vec::new();

        for entry in &configuration.entries {
            let windows = matches
                .for_entry(&entry.name)
                .map(|m| m.windows.as_slice())
                .unwrap_or_default();
            let owned = state.ownership.get(&entry.name).cloned().unwrap_or_default();

            let known = state.known_for(&entry.name);
            if let Some(reason) = self.reason_for(entry, windows, &known, &owned) {
                requests.push(ReapplyRequest {
                    entry: entry.name.clone(),
                    reason,
                });
            }
        }

        Ok(requests)
    }

    fn reason_for(
        &self,
        entry: &ConfigEntry,
        windows: &[WindowInfo],
        known: &BTreeSet<WindowHandle>,
        owned: &BTreeSet<WindowHandle>,
    ) -> Option<ReapplyReason> {
        let current: BTreeSet<WindowHandle> = windows.iter().map(|window| window.handle).collect();
        if current != *known {
            return Some(ReapplyReason::MembershipChanged {
                added: current.difference(known).copied().collect(),
                removed: known.difference(&current).copied().collect(),
            });
        }

        if !self.config.reapply_on_drift {
            return None;
        }

        let plan = entry.execution_plan();
        let drifted: BTreeSet<WindowHandle> = windows
            .iter()
            .filter(|window| owned.contains(&window.handle))
            .filter(|window| has_drifted(entry, &plan, window))
            .map(|window| window.handle)
            .collect();

        (!drifted.is_empty()).then_some(ReapplyReason::Drift { windows: drifted })
    }

    pub async fn toggle_aot(&self) -> Result<AotToggleOutcome> {
        self.toggle.toggle_aot().await
    }

    pub async fn aot_status(&self) -> String {
        self.toggle.aot_status().await
    }

    pub fn primary_bounds(&self) -> Result<Rect> {
        self.displays.primary_bounds()
    }

    /// Number of auto-align presets available for `count` windows
    pub fn preset_count(&self, count: usize) -> Result<usize> {
        Ok(self.generator.preset_count(count, &self.primary_bounds()?))
    }

    /// Auto-align layout for `count` anonymous windows
    pub fn auto_align(&self, count: usize, preset_index: usize) -> Result<AutoAlignment> {
        let display = self.primary_bounds()?;
        trace_performance!("auto_align", {
            self.generator.generate_slots(count, preset_index, &display)
        })
    }

    /// Auto-align layout for specific windows, with per-title overrides
    pub fn auto_align_titles(&self, titles: &[String], preset_index: usize) -> Result<AutoAlignment> {
        let display = self.primary_bounds()?;
        trace_performance!("auto_align", {
            self.generator
                .generate_for_titles(titles, preset_index, &display)
        })
    }

    /// Turn an alignment for titled windows into an applicable configuration
    pub fn alignment_configuration(&self, name: &str, alignment: &AutoAlignment) -> Result<Configuration> {
        let mut used = HashSet::new();
        let mut entries = Vec::with_capacity(alignment.slots.len());

        for slot in &alignment.slots {
            let Some(title) = slot.title.as_deref() else {
                return Err(UltrawideError::ValidationError(
                    "Alignment slots need window titles to become a configuration".into(),
                )
                .into());
            };

            let cleaned = self.cleaner.clean_window_title(title, true);
            let entry_name = if cleaned.is_empty() || !used.insert(cleaned.to_lowercase()) {
                title.to_string()
            } else {
                cleaned
            };

            entries.push(
                ConfigEntry::new(entry_name, slot.rect.origin, slot.rect.size)
                    .with_always_on_top(slot.always_on_top)
                    .with_titlebar(slot.titlebar),
            );
        }

        Configuration::new(name, entries)
    }

    pub fn preview(&self, configuration: &Configuration) -> Result<Vec<PreviewWindow>> {
        let windows = self.list_windows()?;
        Ok(configuration
            .entries
            .iter()
            .map(|entry| PreviewWindow {
                name: entry.name.clone(),
                frame: Rect::new(entry.position, entry.size),
                always_on_top: entry.always_on_top,
                exists: title_matcher::match_for_screenshot(entry, &windows).is_some(),
                search_title: entry.search_title.clone(),
            })
            .collect())
    }

    pub fn detect_best_configuration<'a>(
        &self,
        configurations: &'a [Configuration],
    ) -> Result<Option<&'a Configuration>> {
        let windows = self.list_windows()?;
        Ok(title_matcher::detect_best_configuration(configurations, &windows))
    }

    /// Build a configuration from the current state of the windows matching `titles`
    pub fn capture(&self, name: &str, titles: &[String]) -> Result<Configuration> {
        let windows = self.list_windows()?;
        let mut entries: Vec<ConfigEntry> = Vec::with_capacity(titles.len());

        for pattern in titles {
            let Some(window) = windows
                .iter()
                .find(|window| title_matcher::title_matches(pattern, &window.title))
            else {
                warn!("{}", UltrawideError::NoMatch(pattern.clone()));
                continue;
            };

            let entry = self.cleaner.capture_entry(window)?;
            if entries.iter().any(|existing| existing.name == entry.name) {
                debug!("'{}' already captured", entry.name);
                continue;
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(UltrawideError::NoMatch(titles.join(", ")).into());
        }

        Configuration::new(name, entries)
    }

    /// Start the change monitor if it is not already running
    pub async fn enable_auto_reapply(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock().await;
        if monitor.as_ref().is_some_and(MonitorHandle::is_running) {
            return;
        }
        *monitor = Some(ChangeMonitor::start(
            Arc::downgrade(self),
            self.config.monitor.clone(),
        ));
    }

    /// Stop the change monitor and wait for an in-flight reapply to finish
    pub async fn disable_auto_reapply(&self) {
        let handle = self.monitor.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub async fn is_auto_reapply_enabled(&self) -> bool {
        self.monitor
            .lock()
            .await
            .as_ref()
            .is_some_and(MonitorHandle::is_running)
    }

    pub async fn shutdown(&self) {
        self.disable_auto_reapply().await;
        debug!("Layout engine shut down");
    }
}

/// Whether a window left the geometry or titlebar state the entry applies.
/// Topmost is not compared, the AOT toggle changes it legitimately.
fn has_drifted(entry: &ConfigEntry, plan: &[ApplyOperation], window: &WindowInfo) -> bool {
    plan.iter().any(|operation| match operation {
        ApplyOperation::Titlebar => window.has_titlebar != entry.titlebar,
        ApplyOperation::Position => window.frame.origin != entry.position,
        ApplyOperation::Size => window.frame.size != entry.size,
        ApplyOperation::Aot | ApplyOperation::ProcessPriority => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, Size};
    use crate::platform::{InMemoryDisplayProvider, InMemoryWindowSystem, SystemCall};

    fn window(handle: isize, title: &str) -> WindowInfo {
        WindowInfo::new(handle, title, handle as u32 + 100, Rect::from_xywh(100, 100, 640, 480).unwrap())
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            applier: ApplierConfig {
                settle_delay: Duration::ZERO,
                bring_to_front: false,
            },
            monitor: MonitorConfig {
                poll_interval: Duration::from_millis(20),
            },
            ..EngineConfig::default()
        }
    }

    fn engine_with(windows: Vec<WindowInfo>, config: EngineConfig) -> (Arc<InMemoryWindowSystem>, Arc<LayoutEngine>) {
        let system = Arc::new(InMemoryWindowSystem::new_with(windows));
        let displays = Arc::new(InMemoryDisplayProvider::new(
            Rect::from_xywh(0, 0, 5120, 1440).unwrap(),
        ));
        let engine = LayoutEngine::new(system.clone(), displays, config).unwrap();
        (system, engine)
    }

    fn entry(name: &str, x: i32) -> ConfigEntry {
        ConfigEntry::new(name, Point::new(x, 0), Size::new(1000, 1400).unwrap())
    }

    #[tokio::test]
    async fn concurrent_apply_is_rejected() {
        let (_system, engine) = engine_with(vec![window(1, "Opera")], fast_config());
        let config = Configuration::new("c", vec![entry("Opera", 0)]).unwrap();

        let guard = engine.mutation_lock.lock().await;
        let err = engine.apply_configuration(config.clone()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UltrawideError>(),
            Some(UltrawideError::ConcurrentMutationRejected(_))
        ));
        assert!(engine.reapply_entry("Opera").await.is_err());
        drop(guard);

        engine.apply_configuration(config).await.unwrap();
        assert_eq!(engine.tracker().owned_windows().await.len(), 1);
    }

    #[tokio::test]
    async fn reset_restores_captured_state() {
        let (system, engine) = engine_with(vec![window(1, "Opera")], fast_config());
        let config = Configuration::new("c", vec![entry("Opera", -7).with_titlebar(false)]).unwrap();

        engine.apply_configuration(config).await.unwrap();
        assert_eq!(system.window(WindowHandle(1)).unwrap().frame.origin, Point::new(-7, 0));

        let report = engine.reset().await.unwrap();
        assert_eq!(report.configuration.as_deref(), Some("c"));
        assert_eq!(report.restore.restored, vec![WindowHandle(1)]);

        let restored = system.window(WindowHandle(1)).unwrap();
        assert_eq!(restored.frame, Rect::from_xywh(100, 100, 640, 480).unwrap());
        assert!(restored.has_titlebar);
    }

    #[tokio::test]
    async fn reset_without_restore_leaves_windows_alone() {
        let config = EngineConfig {
            restore_on_reset: false,
            ..fast_config()
        };
        let (system, engine) = engine_with(vec![window(1, "Opera")], config);
        engine
            .apply_configuration(Configuration::new("c", vec![entry("Opera", 0)]).unwrap())
            .await
            .unwrap();
        system.clear_calls();

        engine.reset().await.unwrap();
        assert!(system.calls().is_empty());
        assert!(engine.tracker().is_empty().await);
    }

    #[tokio::test]
    async fn new_apply_restores_dropped_windows() {
        let (system, engine) = engine_with(vec![window(1, "Opera"), window(2, "Discord")], fast_config());
        engine
            .apply_configuration(
                Configuration::new("first", vec![entry("Opera", 0), entry("Discord", 2000)]).unwrap(),
            )
            .await
            .unwrap();

        let report = engine
            .apply_configuration(Configuration::new("second", vec![entry("Opera", 500)]).unwrap())
            .await
            .unwrap();

        assert_eq!(report.released.restored, vec![WindowHandle(2)]);
        assert_eq!(
            system.window(WindowHandle(2)).unwrap().frame.origin,
            Point::new(100, 100)
        );
    }

    #[tokio::test]
    async fn drift_detection_ignores_topmost() {
        let config = EngineConfig {
            reapply_on_drift: true,
            ..fast_config()
        };
        let (system, engine) = engine_with(vec![window(1, "Opera")], config);
        engine
            .apply_configuration(Configuration::new("c", vec![entry("Opera", 0)]).unwrap())
            .await
            .unwrap();
        assert!(engine.detect_changes().await.unwrap().is_empty());

        engine.toggle_aot().await.unwrap();
        assert!(engine.detect_changes().await.unwrap().is_empty());

        system.set_position(WindowHandle(1), Point::new(40, 40)).unwrap();
        let changes = engine.detect_changes().await.unwrap();
        assert_eq!(
            changes,
            vec![ReapplyRequest {
                entry: "Opera".into(),
                reason: ReapplyReason::Drift {
                    windows: [WindowHandle(1)].into_iter().collect()
                },
            }]
        );

        assert!(matches!(
            engine.reapply_entry("Opera").await.unwrap(),
            ReapplyOutcome::Reapplied(_)
        ));
        assert_eq!(system.window(WindowHandle(1)).unwrap().frame.origin, Point::new(0, 0));
    }

    #[tokio::test]
    async fn reapply_of_unchanged_entry_does_nothing() {
        let (system, engine) = engine_with(vec![window(1, "Opera")], fast_config());
        assert_eq!(
            engine.reapply_entry("Opera").await.unwrap(),
            ReapplyOutcome::NothingApplied
        );

        engine
            .apply_configuration(Configuration::new("c", vec![entry("Opera", 0)]).unwrap())
            .await
            .unwrap();
        system.clear_calls();

        assert_eq!(engine.reapply_entry("Opera").await.unwrap(), ReapplyOutcome::Unchanged);
        assert_eq!(engine.reapply_entry("Missing").await.unwrap(), ReapplyOutcome::EntryMissing);
        assert!(system.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_window_is_not_reported_again() {
        let (system, engine) = engine_with(vec![window(1, "Opera")], fast_config());
        system.fail_operation(WindowHandle(1), ApplyOperation::Size);

        engine
            .apply_configuration(Configuration::new("c", vec![entry("Opera", 0)]).unwrap())
            .await
            .unwrap();

        assert!(engine.tracker().owned_windows().await.is_empty());
        assert!(engine.detect_changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn capture_and_preview() {
        let (_system, engine) = engine_with(
            vec![
                WindowInfo::new(1, "Inbox - Mail", 10, Rect::from_xywh(-40, 0, 1200, 1400).unwrap()),
                window(2, "Discord"),
            ],
            fast_config(),
        );

        let config = engine
            .capture("desk", &["mail".to_string(), "discord".to_string(), "absent".to_string()])
            .unwrap();
        let names: Vec<&str> = config.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Mail", "Discord"]);
        assert_eq!(config.entries[0].position, Point::new(-10, 0));

        let preview = engine.preview(&config).unwrap();
        assert!(preview.iter().all(|window| window.exists));
        assert!(engine.capture("none", &["absent".to_string()]).is_err());
    }

    #[tokio::test]
    async fn alignment_becomes_configuration() {
        let (system, engine) = engine_with(
            vec![window(1, "Game"), window(2, "general - Discord")],
            fast_config(),
        );
        let titles = vec!["Game".to_string(), "general - Discord".to_string()];

        let alignment = engine.auto_align_titles(&titles, 0).unwrap();
        let config = engine.alignment_configuration("aligned", &alignment).unwrap();
        assert_eq!(config.entries[1].name, "Discord");

        engine.apply_configuration(config).await.unwrap();
        assert_eq!(system.window(WindowHandle(1)).unwrap().frame, alignment.slots[0].rect);
        assert_eq!(system.window(WindowHandle(2)).unwrap().frame, alignment.slots[1].rect);
        assert!(system
            .calls_for(WindowHandle(2))
            .contains(&SystemCall::SetPosition(WindowHandle(2), alignment.slots[1].rect.origin)));
    }

    #[tokio::test]
    async fn auto_reapply_follows_settings_and_stops_on_reset() {
        let config = EngineConfig {
            auto_reapply: true,
            ..fast_config()
        };
        let (_system, engine) = engine_with(vec![window(1, "Opera")], config);

        let report = engine
            .apply_configuration(Configuration::new("c", vec![entry("Opera", 0)]).unwrap())
            .await
            .unwrap();
        assert!(report.auto_reapply);
        assert!(engine.is_auto_reapply_enabled().await);

        engine.reset().await.unwrap();
        assert!(!engine.is_auto_reapply_enabled().await);
    }

    #[tokio::test]
    async fn rejected_reset_keeps_monitor_and_state() {
        let (_system, engine) = engine_with(vec![window(1, "Opera")], fast_config());
        engine
            .apply_configuration(Configuration::new("c", vec![entry("Opera", 0)]).unwrap())
            .await
            .unwrap();
        engine.enable_auto_reapply().await;

        let guard = engine.mutation_lock.lock().await;
        let err = engine.reset().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UltrawideError>(),
            Some(UltrawideError::ConcurrentMutationRejected(_))
        ));
        assert!(engine.is_auto_reapply_enabled().await);
        assert!(!engine.tracker().is_empty().await);
        assert_eq!(engine.tracker().owned_windows().await.len(), 1);
        drop(guard);

        let report = engine.reset().await.unwrap();
        assert_eq!(report.configuration.as_deref(), Some("c"));
        assert!(!engine.is_auto_reapply_enabled().await);
        assert!(engine.tracker().is_empty().await);
    }
}
