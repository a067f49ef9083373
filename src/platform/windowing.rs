use crate::models::{ApplyOperation, Point, Rect, Size, WindowHandle, WindowInfo};
use crate::{Result, UltrawideError};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

/// Capabilities the layout engine needs from the OS window manager.
///
/// Implementations must be cheap to call repeatedly: every enumeration is a
/// fresh query and nothing is cached between calls.
pub trait WindowSystem: Send + Sync {
    /// Snapshot all visible top-level windows
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Fresh information about one window, `None` once it has closed
    fn window_info(&self, handle: WindowHandle) -> Result<Option<WindowInfo>>;

    /// Whether the handle still refers to a live window
    fn is_window(&self, handle: WindowHandle) -> bool;

    /// Whether the window is processing messages (not hung)
    fn is_responsive(&self, handle: WindowHandle) -> bool;

    /// Add or remove the caption, border and sizing frame
    fn set_titlebar(&self, handle: WindowHandle, enabled: bool) -> Result<()>;

    /// Move the window without changing its size
    fn set_position(&self, handle: WindowHandle, position: Point) -> Result<()>;

    /// Resize the window without moving it
    fn set_size(&self, handle: WindowHandle, size: Size) -> Result<()>;

    /// Move and resize in one call
    fn set_frame(&self, handle: WindowHandle, frame: Rect) -> Result<()>;

    /// Set or clear the topmost z-order flag
    fn set_topmost(&self, handle: WindowHandle, topmost: bool) -> Result<()>;

    fn is_topmost(&self, handle: WindowHandle) -> Result<bool>;

    /// Restore the window if minimized and raise it without making it topmost
    fn bring_to_front(&self, handle: WindowHandle) -> Result<()>;

    /// Raise the owning process to above-normal priority. Never lowers priority.
    fn raise_process_priority(&self, process_id: u32) -> Result<()>;
}

/// Placeholder used on platforms without a native backend
#[derive(Debug, Default)]
pub struct UnsupportedWindowSystem;

impl UnsupportedWindowSystem {
    fn unsupported<T>() -> Result<T> {
        Err(UltrawideError::PlatformError(
            "Window management is only available on Windows".into(),
        )
        .into())
    }
}

impl WindowSystem for UnsupportedWindowSystem {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Self::unsupported()
    }

    fn window_info(&self, _handle: WindowHandle) -> Result<Option<WindowInfo>> {
        Self::unsupported()
    }

    fn is_window(&self, _handle: WindowHandle) -> bool {
        false
    }

    fn is_responsive(&self, _handle: WindowHandle) -> bool {
        false
    }

    fn set_titlebar(&self, _handle: WindowHandle, _enabled: bool) -> Result<()> {
        Self::unsupported()
    }

    fn set_position(&self, _handle: WindowHandle, _position: Point) -> Result<()> {
        Self::unsupported()
    }

    fn set_size(&self, _handle: WindowHandle, _size: Size) -> Result<()> {
        Self::unsupported()
    }

    fn set_frame(&self, _handle: WindowHandle, _frame: Rect) -> Result<()> {
        Self::unsupported()
    }

    fn set_topmost(&self, _handle: WindowHandle, _topmost: bool) -> Result<()> {
        Self::unsupported()
    }

    fn is_topmost(&self, _handle: WindowHandle) -> Result<bool> {
        Self::unsupported()
    }

    fn bring_to_front(&self, _handle: WindowHandle) -> Result<()> {
        Self::unsupported()
    }

    fn raise_process_priority(&self, _process_id: u32) -> Result<()> {
        Self::unsupported()
    }
}

/// Mutating call recorded by [`InMemoryWindowSystem`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCall {
    SetTitlebar(WindowHandle, bool),
    SetPosition(WindowHandle, Point),
    SetSize(WindowHandle, Size),
    SetFrame(WindowHandle, Rect),
    SetTopmost(WindowHandle, bool),
    BringToFront(WindowHandle),
    RaisePriority(u32),
}

impl SystemCall {
    pub fn handle(&self) -> Option<WindowHandle> {
        match self {
            SystemCall::SetTitlebar(handle, _)
            | SystemCall::SetPosition(handle, _)
            | SystemCall::SetSize(handle, _)
            | SystemCall::SetFrame(handle, _)
            | SystemCall::SetTopmost(handle, _)
            | SystemCall::BringToFront(handle) => Some(*handle),
            SystemCall::RaisePriority(_) => None,
        }
    }

    /// Apply operation this call implements, if any
    pub fn operation(&self) -> Option<ApplyOperation> {
        match self {
            SystemCall::SetTitlebar(..) => Some(ApplyOperation::Titlebar),
            SystemCall::SetPosition(..) => Some(ApplyOperation::Position),
            SystemCall::SetSize(..) => Some(ApplyOperation::Size),
            SystemCall::SetTopmost(..) => Some(ApplyOperation::Aot),
            SystemCall::RaisePriority(_) => Some(ApplyOperation::ProcessPriority),
            SystemCall::SetFrame(..) | SystemCall::BringToFront(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    windows: Vec<WindowInfo>,
    unresponsive: HashSet<WindowHandle>,
    failing: HashSet<(WindowHandle, ApplyOperation)>,
    close_on: HashSet<(WindowHandle, ApplyOperation)>,
    delays: HashMap<WindowHandle, Duration>,
    priority_denied: bool,
    raised_processes: HashSet<u32>,
    calls: Vec<SystemCall>,
}

impl InMemoryState {
    fn window_mut(&mut self, handle: WindowHandle) -> Result<&mut WindowInfo> {
        self.windows
            .iter_mut()
            .find(|window| window.handle == handle)
            .ok_or_else(|| UltrawideError::WindowNotFound(handle).into())
    }

    fn check_injected(&mut self, handle: WindowHandle, operation: ApplyOperation) -> Result<()> {
        if self.close_on.remove(&(handle, operation)) {
            self.windows.retain(|window| window.handle != handle);
            return Err(UltrawideError::WindowNotFound(handle).into());
        }

        if self.failing.contains(&(handle, operation)) {
            return Err(UltrawideError::PlatformError(format!(
                "injected {} failure for {}",
                operation, handle
            ))
            .into());
        }

        Ok(())
    }
}

/// In-memory window system used by tests and demos.
///
/// Windows are kept in insertion order, every mutating call is recorded, and
/// failures, hung windows and slow calls can be injected per window.
#[derive(Debug, Default)]
pub struct InMemoryWindowSystem {
    state: RwLock<InMemoryState>,
}

impl InMemoryWindowSystem {
    pub fn new_with(windows: Vec<WindowInfo>) -> Self {
        Self {
            state: RwLock::new(InMemoryState {
                windows,
                ..InMemoryState::default()
            }),
        }
    }

    /// Open a new window (appended to the enumeration order)
    pub fn open_window(&self, window: WindowInfo) {
        let mut state = self.write();
        state.windows.retain(|existing| existing.handle != window.handle);
        state.windows.push(window);
    }

    pub fn close_window(&self, handle: WindowHandle) {
        self.write().windows.retain(|window| window.handle != handle);
    }

    pub fn set_unresponsive(&self, handle: WindowHandle, unresponsive: bool) {
        let mut state = self.write();
        if unresponsive {
            state.unresponsive.insert(handle);
        } else {
            state.unresponsive.remove(&handle);
        }
    }

    /// Make every call implementing `operation` on `handle` fail
    pub fn fail_operation(&self, handle: WindowHandle, operation: ApplyOperation) {
        self.write().failing.insert((handle, operation));
    }

    /// Close the window the next time `operation` is attempted on it
    pub fn close_on(&self, handle: WindowHandle, operation: ApplyOperation) {
        self.write().close_on.insert((handle, operation));
    }

    /// Block every mutating call on `handle` for `delay`
    pub fn set_call_delay(&self, handle: WindowHandle, delay: Duration) {
        self.write().delays.insert(handle, delay);
    }

    pub fn deny_priority(&self, denied: bool) {
        self.write().priority_denied = denied;
    }

    pub fn calls(&self) -> Vec<SystemCall> {
        self.read().calls.clone()
    }

    pub fn calls_for(&self, handle: WindowHandle) -> Vec<SystemCall> {
        self.read()
            .calls
            .iter()
            .filter(|call| call.handle() == Some(handle))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.write().calls.clear();
    }

    pub fn raised_processes(&self) -> HashSet<u32> {
        self.read().raised_processes.clone()
    }

    pub fn window(&self, handle: WindowHandle) -> Option<WindowInfo> {
        self.read()
            .windows
            .iter()
            .find(|window| window.handle == handle)
            .cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn delay_for(&self, handle: WindowHandle) {
        let delay = self.read().delays.get(&handle).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }

    fn mutate(
        &self,
        handle: WindowHandle,
        operation: Option<ApplyOperation>,
        call: SystemCall,
        update: impl FnOnce(&mut WindowInfo),
    ) -> Result<()> {
        self.delay_for(handle);

        let mut state = self.write();
        if let Some(operation) = operation {
            state.check_injected(handle, operation)?;
        }
        let window = state.window_mut(handle)?;
        update(window);
        state.calls.push(call);
        Ok(())
    }
}

impl WindowSystem for InMemoryWindowSystem {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.read().windows.clone())
    }

    fn window_info(&self, handle: WindowHandle) -> Result<Option<WindowInfo>> {
        Ok(self.window(handle))
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        self.read()
            .windows
            .iter()
            .any(|window| window.handle == handle)
    }

    fn is_responsive(&self, handle: WindowHandle) -> bool {
        !self.read().unresponsive.contains(&handle)
    }

    fn set_titlebar(&self, handle: WindowHandle, enabled: bool) -> Result<()> {
        self.mutate(
            handle,
            Some(ApplyOperation::Titlebar),
            SystemCall::SetTitlebar(handle, enabled),
            |window| window.has_titlebar = enabled,
        )
    }

    fn set_position(&self, handle: WindowHandle, position: Point) -> Result<()> {
        self.mutate(
            handle,
            Some(ApplyOperation::Position),
            SystemCall::SetPosition(handle, position),
            |window| window.frame.origin = position,
        )
    }

    fn set_size(&self, handle: WindowHandle, size: Size) -> Result<()> {
        self.mutate(
            handle,
            Some(ApplyOperation::Size),
            SystemCall::SetSize(handle, size),
            |window| window.frame.size = size,
        )
    }

    fn set_frame(&self, handle: WindowHandle, frame: Rect) -> Result<()> {
        self.mutate(handle, None, SystemCall::SetFrame(handle, frame), |window| {
            window.frame = frame
        })
    }

    fn set_topmost(&self, handle: WindowHandle, topmost: bool) -> Result<()> {
        self.mutate(
            handle,
            Some(ApplyOperation::Aot),
            SystemCall::SetTopmost(handle, topmost),
            |window| window.is_topmost = topmost,
        )
    }

    fn is_topmost(&self, handle: WindowHandle) -> Result<bool> {
        self.window(handle)
            .map(|window| window.is_topmost)
            .ok_or_else(|| UltrawideError::WindowNotFound(handle).into())
    }

    fn bring_to_front(&self, handle: WindowHandle) -> Result<()> {
        self.mutate(handle, None, SystemCall::BringToFront(handle), |window| {
            window.is_minimized = false
        })
    }

    fn raise_process_priority(&self, process_id: u32) -> Result<()> {
        let mut state = self.write();
        if state.priority_denied {
            return Err(UltrawideError::PlatformError(format!(
                "access denied raising priority of process {}",
                process_id
            ))
            .into());
        }
        state.raised_processes.insert(process_id);
        state.calls.push(SystemCall::RaisePriority(process_id));
        Ok(())
    }
}
