//! Win32 implementation of the windowing capabilities

use crate::models::{Point, Rect, Size, WindowHandle, WindowInfo};
use crate::platform::{DisplayProvider, WindowSystem};
use crate::{Result, UltrawideError};
use std::ffi::c_void;
use tracing::{debug, trace};
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, SetLastError, BOOL, ERROR_SUCCESS, FALSE, HWND, LPARAM, RECT, TRUE,
    WIN32_ERROR,
};
use windows::Win32::System::Threading::{
    GetPriorityClass, OpenProcess, SetPriorityClass, ABOVE_NORMAL_PRIORITY_CLASS,
    HIGH_PRIORITY_CLASS, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_INFORMATION,
    REALTIME_PRIORITY_CLASS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetSystemMetrics, GetWindowLongPtrW, GetWindowRect,
    GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId, IsHungAppWindow, IsIconic,
    IsWindow, IsWindowVisible, SetForegroundWindow, SetWindowLongPtrW, SetWindowPos, ShowWindow,
    GWL_EXSTYLE, GWL_STYLE, HWND_NOTOPMOST, HWND_TOPMOST, SET_WINDOW_POS_FLAGS, SM_CXSCREEN,
    SM_CYSCREEN, SWP_ASYNCWINDOWPOS, SWP_FRAMECHANGED, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE,
    SWP_NOZORDER, SW_RESTORE, WS_BORDER, WS_CAPTION, WS_EX_TOPMOST, WS_THICKFRAME,
};

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.raw() as *mut c_void)
}

fn platform_error(context: &str, error: windows::core::Error) -> anyhow::Error {
    UltrawideError::PlatformError(format!("{context}: {error}")).into()
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam.0 as *mut Vec<isize>);
    handles.push(hwnd.0 as isize);
    TRUE
}

/// Frame of a window from its `GetWindowRect` result.
///
/// `None` when the window closed after enumeration or has no area.
fn frame_from(handle: WindowHandle, read: windows::core::Result<RECT>) -> Option<Rect> {
    let rect = match read {
        Ok(rect) => rect,
        Err(error) => {
            trace!("{} vanished before its frame was read: {}", handle, error);
            return None;
        }
    };
    // zero-sized helper windows are not layout targets
    Rect::from_xywh(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
    .ok()
}

/// `SetWindowLongPtrW` returns the previous value, so zero only means failure
/// when the thread error code was set.
fn style_write_result(previous: isize, last_error: WIN32_ERROR) -> Result<()> {
    if previous == 0 && last_error != ERROR_SUCCESS {
        return Err(UltrawideError::PlatformError(format!(
            "SetWindowLongPtrW failed with error {}",
            last_error.0
        ))
        .into());
    }
    Ok(())
}

/// Window system backed by user32 calls.
///
/// Mutating calls are issued from the window operator's threads. Geometry
/// changes are posted asynchronously to the window's own thread.
#[derive(Debug, Default)]
pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }

    fn title(hwnd: HWND) -> String {
        unsafe {
            let length = GetWindowTextLengthW(hwnd);
            if length <= 0 {
                return String::new();
            }
            let mut buffer = vec![0u16; length as usize + 1];
            let copied = GetWindowTextW(hwnd, &mut buffer);
            String::from_utf16_lossy(&buffer[..copied.max(0) as usize])
        }
    }

    fn describe(handle: WindowHandle) -> Result<Option<WindowInfo>> {
        let hwnd = hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Ok(None);
            }

            let mut rect = RECT::default();
            let read = GetWindowRect(hwnd, &mut rect).map(|()| rect);
            let Some(frame) = frame_from(handle, read) else {
                return Ok(None);
            };

            let mut process_id = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));

            let style = GetWindowLongPtrW(hwnd, GWL_STYLE) as u32;
            let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as u32;

            Ok(Some(
                WindowInfo::new(handle, Self::title(hwnd), process_id, frame)
                    .with_titlebar(style & WS_CAPTION.0 == WS_CAPTION.0)
                    .with_topmost(ex_style & WS_EX_TOPMOST.0 != 0)
                    .with_minimized(IsIconic(hwnd).as_bool()),
            ))
        }
    }

    fn set_window_pos(
        handle: WindowHandle,
        insert_after: HWND,
        frame: (i32, i32, i32, i32),
        flags: SET_WINDOW_POS_FLAGS,
    ) -> Result<()> {
        let (x, y, width, height) = frame;
        unsafe {
            // posted to the owning thread so a hung window cannot block the operator
            SetWindowPos(
                hwnd(handle),
                insert_after,
                x,
                y,
                width,
                height,
                flags | SWP_ASYNCWINDOWPOS,
            )
            .map_err(|e| platform_error("SetWindowPos", e))
        }
    }
}

impl WindowSystem for Win32WindowSystem {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut handles: Vec<isize> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<isize> as isize),
            )
            .map_err(|e| platform_error("EnumWindows", e))?;
        }

        let mut windows = Vec::with_capacity(handles.len());
        for raw in handles {
            let handle = WindowHandle(raw);
            if !unsafe { IsWindowVisible(hwnd(handle)) }.as_bool() {
                continue;
            }
            if let Some(info) = Self::describe(handle)? {
                windows.push(info);
            }
        }

        debug!("Enumerated {} visible top-level windows", windows.len());
        Ok(windows)
    }

    fn window_info(&self, handle: WindowHandle) -> Result<Option<WindowInfo>> {
        Self::describe(handle)
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindow(hwnd(handle)).as_bool() }
    }

    fn is_responsive(&self, handle: WindowHandle) -> bool {
        unsafe { !IsHungAppWindow(hwnd(handle)).as_bool() }
    }

    fn set_titlebar(&self, handle: WindowHandle, enabled: bool) -> Result<()> {
        let frame_bits = WS_CAPTION.0 | WS_BORDER.0 | WS_THICKFRAME.0;
        unsafe {
            let style = GetWindowLongPtrW(hwnd(handle), GWL_STYLE) as u32;
            let updated = if enabled {
                style | frame_bits
            } else {
                style & !frame_bits
            };
            SetLastError(ERROR_SUCCESS);
            let previous = SetWindowLongPtrW(hwnd(handle), GWL_STYLE, updated as i32 as isize);
            style_write_result(previous, GetLastError())?;
        }

        Self::set_window_pos(
            handle,
            HWND::default(),
            (0, 0, 0, 0),
            SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
        )
    }

    fn set_position(&self, handle: WindowHandle, position: Point) -> Result<()> {
        Self::set_window_pos(
            handle,
            HWND::default(),
            (position.x, position.y, 0, 0),
            SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
        )
    }

    fn set_size(&self, handle: WindowHandle, size: Size) -> Result<()> {
        Self::set_window_pos(
            handle,
            HWND::default(),
            (0, 0, size.width, size.height),
            SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE,
        )
    }

    fn set_frame(&self, handle: WindowHandle, frame: Rect) -> Result<()> {
        Self::set_window_pos(
            handle,
            HWND::default(),
            (frame.x(), frame.y(), frame.width(), frame.height()),
            SWP_NOZORDER | SWP_NOACTIVATE,
        )
    }

    fn set_topmost(&self, handle: WindowHandle, topmost: bool) -> Result<()> {
        let insert_after = if topmost { HWND_TOPMOST } else { HWND_NOTOPMOST };
        Self::set_window_pos(
            handle,
            insert_after,
            (0, 0, 0, 0),
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        )
    }

    fn is_topmost(&self, handle: WindowHandle) -> Result<bool> {
        if !self.is_window(handle) {
            return Err(UltrawideError::WindowNotFound(handle).into());
        }
        let ex_style = unsafe { GetWindowLongPtrW(hwnd(handle), GWL_EXSTYLE) } as u32;
        Ok(ex_style & WS_EX_TOPMOST.0 != 0)
    }

    fn bring_to_front(&self, handle: WindowHandle) -> Result<()> {
        unsafe {
            if IsIconic(hwnd(handle)).as_bool() {
                let _ = ShowWindow(hwnd(handle), SW_RESTORE);
            }
            BringWindowToTop(hwnd(handle)).map_err(|e| platform_error("BringWindowToTop", e))?;
            // Foreground activation is refused when another process owns focus; raising is enough.
            let _ = SetForegroundWindow(hwnd(handle));
        }
        Ok(())
    }

    fn raise_process_priority(&self, process_id: u32) -> Result<()> {
        unsafe {
            let process = OpenProcess(
                PROCESS_SET_INFORMATION | PROCESS_QUERY_LIMITED_INFORMATION,
                FALSE,
                process_id,
            )
            .map_err(|e| platform_error("OpenProcess", e))?;

            let current = GetPriorityClass(process);
            let result = if current == HIGH_PRIORITY_CLASS.0 || current == REALTIME_PRIORITY_CLASS.0 {
                debug!(
                    "Process {} already runs above the requested priority",
                    process_id
                );
                Ok(())
            } else {
                SetPriorityClass(process, ABOVE_NORMAL_PRIORITY_CLASS)
                    .map_err(|e| platform_error("SetPriorityClass", e))
            };

            let _ = CloseHandle(process);
            result
        }
    }
}

/// Primary display bounds from system metrics
#[derive(Debug, Default)]
pub struct Win32DisplayProvider;

impl DisplayProvider for Win32DisplayProvider {
    fn primary_bounds(&self) -> Result<Rect> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        Rect::from_xywh(0, 0, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, E_FAIL};

    #[test]
    fn window_closed_during_enumeration_is_skipped() {
        let handle = WindowHandle(0x42);
        assert_eq!(frame_from(handle, Err(windows::core::Error::from(E_FAIL))), None);

        let empty = RECT {
            left: 10,
            top: 10,
            right: 10,
            bottom: 40,
        };
        assert_eq!(frame_from(handle, Ok(empty)), None);

        let live = RECT {
            left: -7,
            top: 0,
            right: 1713,
            bottom: 1401,
        };
        assert_eq!(
            frame_from(handle, Ok(live)),
            Some(Rect::from_xywh(-7, 0, 1720, 1401).unwrap())
        );
    }

    #[test]
    fn style_write_failure_needs_an_error_code() {
        assert!(style_write_result(0, ERROR_SUCCESS).is_ok());
        assert!(style_write_result(0x14cf0000, ERROR_SUCCESS).is_ok());

        let err = style_write_result(0, ERROR_ACCESS_DENIED).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UltrawideError>(),
            Some(UltrawideError::PlatformError(_))
        ));
    }

    #[test]
    fn enumeration_of_missing_handle_is_empty() {
        assert!(Win32WindowSystem::new().window_info(WindowHandle(0)).unwrap().is_none());
    }
}
