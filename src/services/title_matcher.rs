//! Resolve configuration entries to live windows by title

use crate::models::{ConfigEntry, Configuration, Point, Size, WindowHandle, WindowInfo};
use crate::{Result, UltrawideError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Smallest coordinate a captured window position is clamped to
pub const CAPTURE_MIN_COORDINATE: i32 = -10;
/// Smallest extent a captured window size is clamped to
pub const CAPTURE_MIN_EXTENT: i32 = 250;

/// Case-insensitive contiguous substring test
pub fn title_matches(pattern: &str, title: &str) -> bool {
    title.to_lowercase().contains(&pattern.to_lowercase())
}

/// All windows whose title contains `pattern`, in input order
pub fn match_windows(pattern: &str, windows: &[WindowInfo]) -> Vec<WindowInfo> {
    windows
        .iter()
        .filter(|window| title_matches(pattern, &window.title))
        .cloned()
        .collect()
}

/// Window to capture for an entry's screenshot, using `search_title` when set
pub fn match_for_screenshot(entry: &ConfigEntry, windows: &[WindowInfo]) -> Option<WindowInfo> {
    let pattern = entry.screenshot_pattern();
    windows
        .iter()
        .find(|window| title_matches(pattern, &window.title))
        .cloned()
}

/// Which entry claims a window matched by several patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPrecedence {
    /// Earliest entry in configuration order
    #[default]
    FirstDeclared,
    /// Latest entry in configuration order
    LastDeclared,
    /// Longest pattern, ties broken by configuration order
    MostSpecific,
}

/// Windows claimed by one entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMatch {
    pub entry: ConfigEntry,
    pub windows: Vec<WindowInfo>,
}

impl EntryMatch {
    pub fn handles(&self) -> BTreeSet<WindowHandle> {
        self.windows.iter().map(|window| window.handle).collect()
    }
}

/// Result of matching a whole configuration against the live window set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    /// Entries with at least one window, in configuration order
    pub matched: Vec<EntryMatch>,
    /// Names of entries that matched nothing
    pub unmatched: Vec<String>,
}

impl MatchReport {
    pub fn for_entry(&self, name: &str) -> Option<&EntryMatch> {
        self.matched.iter().find(|m| m.entry.name == name)
    }

    pub fn handles_for(&self, name: &str) -> BTreeSet<WindowHandle> {
        self.for_entry(name)
            .map(EntryMatch::handles)
            .unwrap_or_default()
    }

    pub fn all_handles(&self) -> BTreeSet<WindowHandle> {
        self.matched.iter().flat_map(EntryMatch::handles).collect()
    }
}

fn claiming_entry(
    config: &Configuration,
    title: &str,
    precedence: MatchPrecedence,
) -> Option<usize> {
    let mut candidates = config
        .entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| title_matches(&entry.name, title));

    match precedence {
        MatchPrecedence::FirstDeclared => candidates.next().map(|(index, _)| index),
        MatchPrecedence::LastDeclared => candidates.last().map(|(index, _)| index),
        MatchPrecedence::MostSpecific => candidates
            .fold(None, |best: Option<(usize, usize)>, (index, entry)| {
                let length = entry.name.chars().count();
                match best {
                    Some((_, best_length)) if best_length >= length => best,
                    _ => Some((index, length)),
                }
            })
            .map(|(index, _)| index),
    }
}

/// Assign every window to at most one entry of `config`
pub fn match_configuration(
    config: &Configuration,
    windows: &[WindowInfo],
    precedence: MatchPrecedence,
) -> MatchReport {
    let mut claimed: Vec<Vec<WindowInfo>> = vec![Vec::new(); config.entries.len()];

    for window in windows {
        if let Some(index) = claiming_entry(config, &window.title, precedence) {
            claimed[index].push(window.clone());
        }
    }

    let mut report = MatchReport::default();
    for (entry, windows) in config.entries.iter().zip(claimed) {
        if windows.is_empty() {
            debug!("{}", UltrawideError::NoMatch(entry.name.clone()));
            report.unmatched.push(entry.name.clone());
        } else {
            report.matched.push(EntryMatch {
                entry: entry.clone(),
                windows,
            });
        }
    }

    report
}

/// Pick the configuration that best fits the current windows.
///
/// A configuration whose always-on-top entry matches a live window wins
/// outright (the last such one in listing order). Otherwise the one with the
/// most matching (entry, window) pairs wins, first on ties. With no matches
/// at all the first configuration is returned.
pub fn detect_best_configuration<'a>(
    configs: &'a [Configuration],
    windows: &[WindowInfo],
) -> Option<&'a Configuration> {
    let matches = |entry: &ConfigEntry| {
        windows
            .iter()
            .filter(|window| title_matches(&entry.name, &window.title))
            .count()
    };

    let mut aot_match = None;
    let mut best: Option<(&Configuration, usize)> = None;

    for config in configs {
        if config
            .entries
            .iter()
            .any(|entry| entry.always_on_top && matches(entry) > 0)
        {
            aot_match = Some(config);
        }

        let count: usize = config.entries.iter().map(matches).sum();
        if count > best.map(|(_, c)| c).unwrap_or(0) {
            best = Some((config, count));
        }
    }

    aot_match
        .or(best.map(|(config, _)| config))
        .or_else(|| configs.first())
}

/// Normalizes window titles into display names and config section names
#[derive(Debug, Clone)]
pub struct TitleCleaner {
    non_printable: Regex,
    whitespace: Regex,
    separator: Regex,
    trailing_percent: Regex,
    path_hostile: Regex,
}

impl TitleCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                UltrawideError::ConfigurationError(format!("Invalid title pattern {pattern}: {e}"))
            })
        };

        Ok(Self {
            non_printable: compile(r"[^\x20-\x7E]")?,
            whitespace: compile(r"\s+")?,
            separator: compile(r" [-—–] ")?,
            trailing_percent: compile(r"\s+\d+%$")?,
            path_hostile: compile(r#"[<>:"/\\|?*\[\]]"#)?,
        })
    }

    /// Strip non-printable characters and collapse whitespace, then title-case.
    ///
    /// With `sanitize` the title is reduced to its last ` - ` segment, a
    /// trailing percentage is dropped and characters that cannot appear in a
    /// file name are removed.
    pub fn clean_window_title(&self, title: &str, sanitize: bool) -> String {
        let printable = self.non_printable.replace_all(title, "");
        let collapsed = self.whitespace.replace_all(&printable, " ");
        let mut cleaned = collapsed.trim().to_lowercase();

        if sanitize {
            let last = self
                .separator
                .split(&cleaned)
                .last()
                .unwrap_or_default()
                .trim()
                .to_string();
            let without_percent = self.trailing_percent.replace(&last, "");
            cleaned = self
                .path_hostile
                .replace_all(&without_percent, "")
                .into_owned();
        }

        title_case(&cleaned)
    }

    /// Build an entry that reproduces a live window's current placement
    pub fn capture_entry(&self, window: &WindowInfo) -> Result<ConfigEntry> {
        let name = self.clean_window_title(&window.title, true);
        if name.trim().is_empty() {
            return Err(UltrawideError::ValidationError(format!(
                "Window title '{}' does not yield a usable entry name",
                window.title
            ))
            .into());
        }

        let position = Point::new(
            window.frame.x().max(CAPTURE_MIN_COORDINATE),
            window.frame.y().max(CAPTURE_MIN_COORDINATE),
        );
        let size = Size::new(
            window.frame.width().max(CAPTURE_MIN_EXTENT),
            window.frame.height().max(CAPTURE_MIN_EXTENT),
        )?;

        let mut entry = ConfigEntry::new(name, position, size)
            .with_always_on_top(window.is_topmost)
            .with_titlebar(window.has_titlebar);
        if !title_matches(&entry.name, &window.title) {
            entry = entry.with_search_title(window.title.clone());
        }
        Ok(entry)
    }
}

fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_cased = false;
    for ch in text.chars() {
        if previous_cased {
            result.extend(ch.to_lowercase());
        } else {
            result.extend(ch.to_uppercase());
        }
        previous_cased = ch.is_alphabetic();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rect;

    fn window(handle: isize, title: &str) -> WindowInfo {
        WindowInfo::new(handle, title, 1, Rect::from_xywh(0, 0, 800, 600).unwrap())
    }

    fn entry(name: &str) -> ConfigEntry {
        ConfigEntry::new(name, Point::new(0, 0), Size::new(100, 100).unwrap())
    }

    #[test]
    fn matching_is_case_insensitive_containment() {
        assert!(title_matches("opera", "Opera Browser"));
        assert!(title_matches("DISCORD", "Discord - #general"));
        assert!(title_matches("", "anything"));
        assert!(!title_matches("Opera Browser X", "Opera Browser"));
        assert!(!title_matches("op era", "Opera"));
    }

    #[test]
    fn returns_every_duplicate_instance() {
        let windows = vec![window(1, "Notepad - a.txt"), window(2, "Notepad - b.txt")];
        assert_eq!(match_windows("notepad", &windows).len(), 2);
        assert!(match_windows("Word", &windows).is_empty());
    }

    #[test]
    fn first_declared_entry_claims_shared_windows() {
        let config = Configuration::new("c", vec![entry("Discord"), entry("Disc")]).unwrap();
        let windows = vec![window(1, "Discord - #general")];

        let report = match_configuration(&config, &windows, MatchPrecedence::FirstDeclared);
        assert_eq!(report.matched.len(), 1);
        assert_eq!(report.matched[0].entry.name, "Discord");
        assert_eq!(report.unmatched, vec!["Disc".to_string()]);
    }

    #[test]
    fn precedence_is_overridable() {
        let config =
            Configuration::new("c", vec![entry("Disc"), entry("Discord - #"), entry("Dis")])
                .unwrap();
        let windows = vec![window(7, "Discord - #general")];

        let last = match_configuration(&config, &windows, MatchPrecedence::LastDeclared);
        assert_eq!(last.handles_for("Dis").len(), 1);

        let specific = match_configuration(&config, &windows, MatchPrecedence::MostSpecific);
        assert_eq!(specific.handles_for("Discord - #").len(), 1);
        assert!(specific.handles_for("Disc").is_empty());
    }

    #[test]
    fn screenshot_matching_uses_search_title() {
        let windows = vec![window(1, "League of Legends (TM) Client")];
        let lol = entry("Lol").with_search_title("League of Legends");

        assert!(match_windows(&lol.name, &windows).is_empty());
        assert_eq!(match_for_screenshot(&lol, &windows).unwrap().handle, WindowHandle(1));
    }

    #[test]
    fn aot_configuration_wins_detection() {
        let many = Configuration::new("many", vec![entry("Opera"), entry("Discord")]).unwrap();
        let aot = Configuration::new("aot", vec![entry("Game").with_always_on_top(true)]).unwrap();
        let windows = vec![window(1, "Opera"), window(2, "Discord"), window(3, "Game")];

        let configs = vec![aot.clone(), many.clone()];
        assert_eq!(detect_best_configuration(&configs, &windows).unwrap().name, "aot");

        let windows = vec![window(1, "Opera"), window(2, "Discord")];
        assert_eq!(detect_best_configuration(&configs, &windows).unwrap().name, "many");

        assert_eq!(detect_best_configuration(&configs, &[]).unwrap().name, "aot");
        assert!(detect_best_configuration(&[], &windows).is_none());
    }

    #[test]
    fn cleans_titles() {
        let cleaner = TitleCleaner::new().unwrap();
        assert_eq!(
            cleaner.clean_window_title("  opera\u{200b}   BROWSER ", false),
            "Opera Browser"
        );
        assert_eq!(
            cleaner.clean_window_title("Inbox - Mozilla Thunderbird 45%", true),
            "Mozilla Thunderbird"
        );
        assert_eq!(
            cleaner.clean_window_title("Project - path/to:file?", true),
            "Pathtofile"
        );
    }

    #[test]
    fn capture_clamps_geometry() {
        let cleaner = TitleCleaner::new().unwrap();
        let live = WindowInfo::new(1, "Docs - Notes", 1, Rect::from_xywh(-40, 12, 120, 900).unwrap())
            .with_titlebar(false)
            .with_topmost(true);

        let captured = cleaner.capture_entry(&live).unwrap();
        assert_eq!(captured.name, "Notes");
        assert_eq!(captured.position, Point::new(-10, 12));
        assert_eq!(captured.size, Size::new(250, 900).unwrap());
        assert!(captured.always_on_top);
        assert!(!captured.titlebar);
        assert!(captured.search_title.is_none());
    }
}
