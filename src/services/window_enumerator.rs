use crate::models::WindowInfo;
use crate::platform::WindowSystem;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Titles of shell and system windows that are never layout targets
pub const DEFAULT_IGNORED_TITLES: [&str; 6] = [
    "ultrawide window positioner",
    "program manager",
    "windows input experience",
    "microsoft text input application",
    "settings",
    "windows shell experience host",
];

/// Read-only view of the live top-level windows.
///
/// Every call performs a fresh query against the window system; nothing is
/// cached, so it is safe to call from any thread at any rate.
#[derive(Clone)]
pub struct WindowEnumerator {
    system: Arc<dyn WindowSystem>,
    ignored_titles: Vec<String>,
}

impl WindowEnumerator {
    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self {
            system,
            ignored_titles: DEFAULT_IGNORED_TITLES
                .iter()
                .map(|title| title.to_string())
                .collect(),
        }
    }

    /// Extend the ignore list with additional full titles (case-insensitive)
    pub fn with_ignored_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for title in titles {
            let title = title.as_ref().trim().to_lowercase();
            if !title.is_empty() && !self.ignored_titles.contains(&title) {
                self.ignored_titles.push(title);
            }
        }
        self
    }

    pub fn is_ignored(&self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return true;
        }
        let folded = title.to_lowercase();
        self.ignored_titles.iter().any(|ignored| *ignored == folded)
    }

    /// Snapshot of all visible, titled, non-ignored windows sorted by title then handle
    pub fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut windows = match self.system.list_windows() {
            Ok(windows) => windows,
            Err(err) => {
                warn!("Window enumeration failed: {}", err);
                return Err(err);
            }
        };

        let total = windows.len();
        windows.retain(|window| !self.is_ignored(&window.title));
        windows.sort_by(|a, b| a.title.cmp(&b.title).then(a.handle.cmp(&b.handle)));

        debug!(
            "Enumerated {} windows ({} filtered)",
            windows.len(),
            total - windows.len()
        );
        Ok(windows)
    }

    pub fn system(&self) -> &Arc<dyn WindowSystem> {
        &self.system
    }
}
