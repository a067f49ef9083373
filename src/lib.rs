//! Ultrawide - window layout engine for a single primary display
//!
//! Ultrawide matches live top-level windows against named layout
//! configurations, applies geometry, style and priority operations to them in
//! a configurable order, and keeps track of the currently applied
//! configuration so that an always-on-top toggle and an auto-reapply watchdog
//! only ever touch the windows that configuration owns.

pub mod config;
pub mod logging;
pub mod models;
pub mod platform;
pub mod services;

pub use models::*;
pub use services::*;

/// Result type alias for Ultrawide operations
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to Ultrawide operations
#[derive(thiserror::Error, Debug)]
pub enum UltrawideError {
    #[error("No window matches entry '{0}'")]
    NoMatch(String),

    #[error("{operation} failed for window {handle}: {reason}")]
    OperationFailed {
        handle: WindowHandle,
        operation: ApplyOperation,
        reason: FailureReason,
    },

    #[error("Window {0} no longer exists")]
    StaleHandle(WindowHandle),

    #[error("Cannot {0} while another apply, reset or reapply is in progress")]
    ConcurrentMutationRejected(&'static str),

    #[error("Window not found: {0}")]
    WindowNotFound(WindowHandle),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Platform API error: {0}")]
    PlatformError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No auto-align layout available for {0} windows")]
    NoLayoutAvailable(usize),
}
