//! OS windowing boundary for Ultrawide
//!
//! The engine only talks to the operating system through the
//! [`WindowSystem`] and [`DisplayProvider`] capability traits. The Win32
//! implementation is compiled on Windows; everywhere else the unsupported
//! placeholders report a platform error, and tests drive the engine through
//! the in-memory implementations.

pub mod display;
pub mod windowing;
#[cfg(windows)]
pub mod win32;

pub use display::*;
pub use windowing::*;

use std::sync::Arc;

/// Window system backend for the current platform
pub fn system_window_system() -> Arc<dyn WindowSystem> {
    #[cfg(windows)]
    {
        Arc::new(win32::Win32WindowSystem::new())
    }

    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedWindowSystem)
    }
}

/// Display provider for the current platform
pub fn system_display_provider() -> Arc<dyn DisplayProvider> {
    #[cfg(windows)]
    {
        Arc::new(win32::Win32DisplayProvider)
    }

    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedDisplayProvider)
    }
}
