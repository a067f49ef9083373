//! Ownership record for the currently applied configuration

use crate::models::{ConfigEntry, Configuration, WindowHandle, WindowSnapshot};
use crate::{Result, UltrawideError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Entry name to the window handles it owns
pub type Ownership = BTreeMap<String, BTreeSet<WindowHandle>>;

/// Which windows belong to the applied configuration, and how they looked before
#[derive(Debug, Clone, Default)]
pub struct AppliedConfigState {
    pub configuration: Option<Arc<Configuration>>,
    pub ownership: Ownership,
    /// Handles attempted for an entry that failed; they are not owned but are
    /// not treated as new matches either
    pub rejected: Ownership,
    pub snapshots: HashMap<WindowHandle, WindowSnapshot>,
    pub applied_at: Option<DateTime<Utc>>,
}

impl AppliedConfigState {
    pub fn is_empty(&self) -> bool {
        self.configuration.is_none()
    }

    pub fn owned_windows(&self) -> BTreeSet<WindowHandle> {
        self.ownership.values().flatten().copied().collect()
    }

    /// Handles that are owned by or were rejected for `entry`
    pub fn known_for(&self, entry: &str) -> BTreeSet<WindowHandle> {
        let owned = self.ownership.get(entry).into_iter().flatten();
        let rejected = self.rejected.get(entry).into_iter().flatten();
        owned.chain(rejected).copied().collect()
    }

    fn owner_of(&self, handle: WindowHandle) -> Option<&str> {
        self.ownership
            .iter()
            .find(|(_, handles)| handles.contains(&handle))
            .map(|(name, _)| name.as_str())
    }
}

/// Single-writer owner of [`AppliedConfigState`].
///
/// Readers take a shared lock so they never observe a half-written mapping.
/// Writes are expected to be serialized by the layout engine.
#[derive(Debug, Default)]
pub struct AppliedConfigTracker {
    state: RwLock<AppliedConfigState>,
}

impl AppliedConfigTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the state with a fresh mapping, without snapshots
    pub async fn record(&self, configuration: Arc<Configuration>, mapping: Ownership) -> Result<()> {
        self.record_apply(configuration, mapping, Ownership::new(), Vec::new())
            .await
            .map(|_| ())
    }

    /// Replace the state after an apply pass.
    ///
    /// Snapshots of windows that stay managed are kept from the first time
    /// they were captured. Returns the snapshots of previously owned windows
    /// that the new mapping drops.
    pub async fn record_apply(
        &self,
        configuration: Arc<Configuration>,
        mapping: Ownership,
        rejected: Ownership,
        snapshots: Vec<(WindowHandle, WindowSnapshot)>,
    ) -> Result<Vec<(WindowHandle, WindowSnapshot)>> {
        validate_mapping(&configuration, &mapping)?;

        let mut state = self.state.write().await;
        let mut previous = std::mem::take(&mut state.snapshots);

        let owned: BTreeSet<WindowHandle> = mapping.values().flatten().copied().collect();
        let mut kept = HashMap::with_capacity(owned.len());
        for (handle, snapshot) in snapshots {
            if owned.contains(&handle) {
                let original = previous.remove(&handle).unwrap_or(snapshot);
                kept.insert(handle, original);
            }
        }
        for handle in &owned {
            if let Some(original) = previous.remove(handle) {
                kept.insert(*handle, original);
            }
        }

        debug!(
            "Recorded configuration '{}' owning {} window(s)",
            configuration.name,
            owned.len()
        );

        *state = AppliedConfigState {
            configuration: Some(configuration),
            ownership: mapping,
            rejected,
            snapshots: kept,
            applied_at: Some(Utc::now()),
        };

        Ok(previous.into_iter().collect())
    }

    /// Replace the handles of a single entry after a reapply.
    ///
    /// Handles newly owned here are removed from any other entry so that a
    /// handle is never owned twice. Returns snapshots of handles that are no
    /// longer owned by anything.
    pub async fn update_entry(
        &self,
        entry: &str,
        owned: BTreeSet<WindowHandle>,
        rejected: BTreeSet<WindowHandle>,
        snapshots: Vec<(WindowHandle, WindowSnapshot)>,
    ) -> Result<Vec<(WindowHandle, WindowSnapshot)>> {
        let mut state = self.state.write().await;
        let Some(configuration) = state.configuration.clone() else {
            return Err(UltrawideError::ConfigurationError(
                "No configuration is applied".into(),
            )
            .into());
        };
        if configuration.entry(entry).is_none() {
            return Err(UltrawideError::ConfigurationError(format!(
                "Entry '{}' is not part of configuration '{}'",
                entry, configuration.name
            ))
            .into());
        }

        for (name, handles) in state.ownership.iter_mut() {
            if name != entry {
                handles.retain(|handle| !owned.contains(handle));
            }
        }
        state.ownership.retain(|_, handles| !handles.is_empty());

        let previous = state.ownership.remove(entry).unwrap_or_default();
        if !owned.is_empty() {
            state.ownership.insert(entry.to_string(), owned.clone());
        }
        if rejected.is_empty() {
            state.rejected.remove(entry);
        } else {
            state.rejected.insert(entry.to_string(), rejected);
        }

        for (handle, snapshot) in snapshots {
            if owned.contains(&handle) {
                state.snapshots.entry(handle).or_insert(snapshot);
            }
        }

        let mut released = Vec::new();
        for handle in previous.difference(&owned) {
            if state.owner_of(*handle).is_none() {
                if let Some(snapshot) = state.snapshots.remove(handle) {
                    released.push((*handle, snapshot));
                }
            }
        }

        debug!(
            "Entry '{}' now owns {} window(s), released {}",
            entry,
            owned.len(),
            released.len()
        );
        Ok(released)
    }

    /// Clear the state, returning what was applied
    pub async fn reset(&self) -> AppliedConfigState {
        let mut state = self.state.write().await;
        std::mem::take(&mut *state)
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    pub async fn configuration(&self) -> Option<Arc<Configuration>> {
        self.state.read().await.configuration.clone()
    }

    pub async fn owned_windows(&self) -> BTreeSet<WindowHandle> {
        self.state.read().await.owned_windows()
    }

    pub async fn owned_by(&self, entry: &str) -> BTreeSet<WindowHandle> {
        self.state
            .read()
            .await
            .ownership
            .get(entry)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn entry_for(&self, handle: WindowHandle) -> Option<ConfigEntry> {
        let state = self.state.read().await;
        let name = state.owner_of(handle)?;
        state.configuration.as_ref()?.entry(name).cloned()
    }

    pub async fn snapshot_for(&self, handle: WindowHandle) -> Option<WindowSnapshot> {
        self.state.read().await.snapshots.get(&handle).copied()
    }

    /// Consistent copy of the whole state
    pub async fn snapshot(&self) -> AppliedConfigState {
        self.state.read().await.clone()
    }
}

fn validate_mapping(configuration: &Configuration, mapping: &Ownership) -> Result<()> {
    let mut seen: HashMap<WindowHandle, &str> = HashMap::new();
    for (entry, handles) in mapping {
        if configuration.entry(entry).is_none() {
            return Err(UltrawideError::ValidationError(format!(
                "Entry '{}' is not part of configuration '{}'",
                entry, configuration.name
            ))
            .into());
        }
        for handle in handles {
            if let Some(other) = seen.insert(*handle, entry) {
                return Err(UltrawideError::ValidationError(format!(
                    "Window {} is claimed by both '{}' and '{}'",
                    handle, other, entry
                ))
                .into());
            }
        }
    }
    Ok(())
}
