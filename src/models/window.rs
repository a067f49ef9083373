use crate::models::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a live top-level OS window.
///
/// Handles are weak references: the window behind a handle may close at any
/// time, so validity has to be re-checked before every operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn raw(self) -> isize {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<isize> for WindowHandle {
    fn from(value: isize) -> Self {
        Self(value)
    }
}

/// Snapshot of a live window as reported by the enumerator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub process_id: u32,
    pub frame: Rect,
    pub has_titlebar: bool,
    pub is_topmost: bool,
    pub is_minimized: bool,
}

impl WindowInfo {
    pub fn new(handle: impl Into<WindowHandle>, title: impl Into<String>, process_id: u32, frame: Rect) -> Self {
        Self {
            handle: handle.into(),
            title: title.into(),
            process_id,
            frame,
            has_titlebar: true,
            is_topmost: false,
            is_minimized: false,
        }
    }

    pub fn with_titlebar(mut self, has_titlebar: bool) -> Self {
        self.has_titlebar = has_titlebar;
        self
    }

    pub fn with_topmost(mut self, is_topmost: bool) -> Self {
        self.is_topmost = is_topmost;
        self
    }

    pub fn with_minimized(mut self, is_minimized: bool) -> Self {
        self.is_minimized = is_minimized;
        self
    }
}

/// State of a window captured before it was first managed, used to put it back on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub frame: Rect,
    pub has_titlebar: bool,
    pub is_topmost: bool,
}

impl From<&WindowInfo> for WindowSnapshot {
    fn from(info: &WindowInfo) -> Self {
        Self {
            frame: info.frame,
            has_titlebar: info.has_titlebar,
            is_topmost: info.is_topmost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_displays_as_hex() {
        assert_eq!(WindowHandle(0x1a2b).to_string(), "0x1a2b");
    }
}
