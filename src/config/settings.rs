use crate::services::title_matcher::MatchPrecedence;
use crate::services::window_enumerator::DEFAULT_IGNORED_TITLES;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Application-wide settings stored in `settings/settings.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Start the change monitor after every apply
    pub auto_reapply: bool,
    pub poll_interval_ms: u64,
    /// Also reapply when an owned window moved, resized or changed titlebar
    pub reapply_on_drift: bool,
    /// Put windows back to their pre-apply state on reset
    pub restore_on_reset: bool,
    pub match_precedence: MatchPrecedence,
    pub operation_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub bring_to_front: bool,
    pub taskbar_height: i32,
    /// Chord registered by the hotkey front end for the AOT toggle
    pub hotkey: String,
    pub ignored_titles: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_reapply: false,
            poll_interval_ms: 2000,
            reapply_on_drift: false,
            restore_on_reset: true,
            match_precedence: MatchPrecedence::default(),
            operation_timeout_ms: 1000,
            settle_delay_ms: 100,
            bring_to_front: true,
            taskbar_height: 48,
            hotkey: "ctrl+alt+a".to_string(),
            ignored_titles: DEFAULT_IGNORED_TITLES
                .iter()
                .map(|title| title.to_string())
                .collect(),
        }
    }
}

impl AppSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.poll_interval_ms < 100 {
            return Err(SettingsError::InvalidValue {
                field: "poll_interval_ms",
                message: format!("must be at least 100, got {}", self.poll_interval_ms),
            });
        }

        if self.operation_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue {
                field: "operation_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.settle_delay_ms > 10_000 {
            return Err(SettingsError::InvalidValue {
                field: "settle_delay_ms",
                message: format!("must be at most 10000, got {}", self.settle_delay_ms),
            });
        }

        if !(0..=500).contains(&self.taskbar_height) {
            return Err(SettingsError::InvalidValue {
                field: "taskbar_height",
                message: format!("must be between 0 and 500, got {}", self.taskbar_height),
            });
        }

        if self.hotkey.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                field: "hotkey",
                message: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid setting {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
