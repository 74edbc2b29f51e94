use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Flags raised by the global hotkey listener and consumed elsewhere:
/// `toggle` by the key controller (F1), `screenshot` by the host binary
/// (F2).
#[derive(Debug, Default)]
pub struct HotkeySignals {
    pub toggle: AtomicBool,
    pub screenshot: AtomicBool,
}

/// Start a background thread listening for the global hotkeys F1 (toggle
/// control) and F2 (request screenshot). Repeats inside `debounce` are
/// ignored.
#[cfg(target_os = "windows")]
pub fn start_hotkey_listener(signals: Arc<HotkeySignals>, debounce: Duration) {
    use std::ffi::c_void;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    use crate::logger;

    type HWND = *mut c_void;
    type BOOL = i32;
    type UINT = u32;
    type WPARAM = usize;
    type LPARAM = isize;
    type DWORD = u32;
    type LONG = i32;

    #[repr(C)]
    struct POINT {
        x: LONG,
        y: LONG,
    }

    #[repr(C)]
    struct MSG {
        hwnd: HWND,
        message: UINT,
        w_param: WPARAM,
        l_param: LPARAM,
        time: DWORD,
        pt: POINT,
    }

    const MOD_NOREPEAT: u32 = 0x4000;
    const VK_F1: u32 = 0x70;
    const VK_F2: u32 = 0x71;
    const WM_HOTKEY: u32 = 0x0312;
    const TOGGLE_ID: i32 = 1;
    const SCREENSHOT_ID: i32 = 2;

    extern "system" {
        fn RegisterHotKey(hwnd: HWND, id: i32, fs_modifiers: UINT, vk: UINT) -> BOOL;
        fn GetMessageW(
            msg: *mut MSG,
            hwnd: HWND,
            msg_filter_min: UINT,
            msg_filter_max: UINT,
        ) -> BOOL;
    }

    std::thread::spawn(move || {
        unsafe {
            let toggle_ok =
                RegisterHotKey(std::ptr::null_mut(), TOGGLE_ID, MOD_NOREPEAT, VK_F1) != 0;
            let shot_ok =
                RegisterHotKey(std::ptr::null_mut(), SCREENSHOT_ID, MOD_NOREPEAT, VK_F2) != 0;
            if !toggle_ok || !shot_ok {
                logger::error_p(
                    "hotkey",
                    "failed to register F1/F2 — another application may have claimed them",
                );
            }
            if !toggle_ok && !shot_ok {
                return;
            }
            logger::info_p("hotkey", "global hotkeys registered (F1 toggle, F2 screenshot)");

            let mut t_last_toggle: Option<Instant> = None;
            let mut t_last_screenshot: Option<Instant> = None;

            let mut msg: MSG = std::mem::zeroed();
            // GetMessageW blocks until a message arrives; returns 0 on WM_QUIT
            while GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) > 0 {
                if msg.message != WM_HOTKEY {
                    continue;
                }
                match msg.w_param as i32 {
                    TOGGLE_ID => {
                        if t_last_toggle.map_or(true, |t| t.elapsed() > debounce) {
                            signals.toggle.store(true, Ordering::Release);
                            t_last_toggle = Some(Instant::now());
                        }
                    }
                    SCREENSHOT_ID => {
                        if t_last_screenshot.map_or(true, |t| t.elapsed() > debounce) {
                            signals.screenshot.store(true, Ordering::Release);
                            t_last_screenshot = Some(Instant::now());
                        }
                    }
                    _ => {}
                }
            }
        }
    });
}

#[cfg(not(target_os = "windows"))]
pub fn start_hotkey_listener(_signals: Arc<HotkeySignals>, _debounce: Duration) {
    // Global hotkeys not supported on this platform
}
