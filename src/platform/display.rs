use crate::models::Rect;
use crate::{Result, UltrawideError};
use std::sync::RwLock;

/// Abstraction over primary display queries
#[cfg_attr(test, mockall::automock)]
pub trait DisplayProvider: Send + Sync {
    /// Bounds of the primary display in virtual-screen pixels
    fn primary_bounds(&self) -> Result<Rect>;
}

/// Placeholder used on platforms without a native backend
#[derive(Debug, Default)]
pub struct UnsupportedDisplayProvider;

impl DisplayProvider for UnsupportedDisplayProvider {
    fn primary_bounds(&self) -> Result<Rect> {
        Err(UltrawideError::PlatformError(
            "Display queries are only available on Windows".into(),
        )
        .into())
    }
}

/// In-memory display provider for tests and demos
#[derive(Debug)]
pub struct InMemoryDisplayProvider {
    bounds: RwLock<Rect>,
}

impl InMemoryDisplayProvider {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds: RwLock::new(bounds),
        }
    }

    /// Simulate a resolution change
    pub fn set_bounds(&self, bounds: Rect) {
        *self
            .bounds
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = bounds;
    }
}

impl DisplayProvider for InMemoryDisplayProvider {
    fn primary_bounds(&self) -> Result<Rect> {
        Ok(*self
            .bounds
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}
