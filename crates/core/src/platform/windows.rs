#![cfg(target_os = "windows")]

use std::ffi::c_void;

use anyhow::{Context, Result};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    CloseHandle, BOOL, GENERIC_READ, GENERIC_WRITE, HANDLE, HWND, LPARAM, WPARAM,
};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_MODE, OPEN_EXISTING,
};
use windows::Win32::System::IO::DeviceIoControl;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    keybd_event, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindowTextW, IsWindowVisible, PostMessageW,
    SendMessageTimeoutW, SetForegroundWindow, SMTO_ABORTIFHUNG, WM_KEYDOWN, WM_KEYUP,
};

use crate::config::{BackendKind, Config};
use crate::logger;

use super::keymap;
use super::{FocusProbe, InputBackend};

/// Build the configured backend, substituting simulated input with a
/// warning when the preferred mechanism is unavailable.
pub fn create_backend(cfg: &Config) -> Box<dyn InputBackend> {
    match cfg.backend {
        BackendKind::Simulated => Box::new(SendInputBackend::new(cfg)),
        BackendKind::LowLevelDirect => {
            logger::info_p("win32", "using low-level scan-code injection");
            Box::new(DirectScanBackend)
        }
        BackendKind::KernelDriver => match InterceptionBackend::open() {
            Ok(backend) => {
                logger::info_p("win32", "interception driver initialized");
                Box::new(backend)
            }
            Err(e) => {
                logger::warn(&format!(
                    "interception driver unavailable ({}), falling back to simulated input",
                    e
                ));
                Box::new(SendInputBackend::new(cfg))
            }
        },
        BackendKind::WindowMessage => Box::new(WindowMessageBackend::new(cfg)),
    }
}

fn visible_windows() -> Vec<(isize, String)> {
    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let windows = &mut *(lparam.0 as *mut Vec<(isize, String)>);

        if !IsWindowVisible(hwnd).as_bool() {
            return BOOL(1);
        }
        let mut title_buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut title_buf);
        if len <= 0 {
            return BOOL(1);
        }
        let title = String::from_utf16_lossy(&title_buf[..len as usize]);
        if title.trim().is_empty() {
            return BOOL(1);
        }
        windows.push((hwnd.0 as isize, title));
        BOOL(1)
    }

    let mut windows: Vec<(isize, String)> = Vec::new();
    unsafe {
        let ptr = LPARAM(&mut windows as *mut Vec<(isize, String)> as isize);
        let _ = EnumWindows(Some(enum_callback), ptr);
    }
    windows
}

/// Resolve the game window once: exact title match first, then substring
/// over all visible top-level windows.
pub fn find_game_window(title: &str) -> Option<isize> {
    let windows = visible_windows();
    if let Some((hwnd, _)) = windows.iter().find(|(_, t)| t.as_str() == title) {
        return Some(*hwnd);
    }
    match windows.into_iter().find(|(_, t)| t.contains(title)) {
        Some((hwnd, t)) => {
            logger::info_p("win32", &format!("found game window by partial match: {}", t));
            Some(hwnd)
        }
        None => {
            logger::warn_p("win32", &format!("no window matching '{}'", title));
            None
        }
    }
}

/// Reports whether the game window is currently foreground, by title
/// substring.
pub struct TitleFocusProbe {
    title: String,
}

impl TitleFocusProbe {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string() }
    }
}

impl FocusProbe for TitleFocusProbe {
    fn is_target_active(&self) -> bool {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return false;
            }
            let mut buf = [0u16; 512];
            let len = GetWindowTextW(hwnd, &mut buf);
            if len <= 0 {
                return false;
            }
            String::from_utf16_lossy(&buf[..len as usize]).contains(&self.title)
        }
    }
}

fn send_vk(vk: u16, up: bool) {
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 0 {
        logger::warn_p("win32", "SendInput delivered no events");
    }
}

fn send_scan(scan: u16, up: bool) {
    let mut flags = KEYEVENTF_SCANCODE;
    if up {
        flags |= KEYEVENTF_KEYUP;
    }
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 0 {
        logger::warn_p("win32", "SendInput delivered no events");
    }
}

/// Default backend: OS-level simulated input via `SendInput` with virtual
/// keys. `auto_focus` brings the game window foreground before each key
/// down, best effort.
pub struct SendInputBackend {
    auto_focus: bool,
    hwnd: Option<isize>,
}

impl SendInputBackend {
    pub fn new(cfg: &Config) -> Self {
        let hwnd = if cfg.auto_focus_window {
            find_game_window(&cfg.game_window_title)
        } else {
            None
        };
        Self { auto_focus: cfg.auto_focus_window, hwnd }
    }

    fn focus_target(&self) {
        // Focus failures are non-fatal; the key event still fires against
        // whichever window holds focus.
        if let Some(hwnd) = self.hwnd {
            unsafe {
                let _ = SetForegroundWindow(HWND(hwnd as *mut c_void));
            }
        }
    }
}

impl InputBackend for SendInputBackend {
    fn key_down(&mut self, key: &str) {
        if self.auto_focus {
            self.focus_target();
        }
        if let Some(vk) = keymap::virtual_key(key) {
            send_vk(vk, false);
        }
    }

    fn key_up(&mut self, key: &str) {
        if let Some(vk) = keymap::virtual_key(key) {
            send_vk(vk, true);
        }
    }
}

/// `SendInput` with hardware scan codes, for targets that ignore
/// virtual-key events.
pub struct DirectScanBackend;

impl InputBackend for DirectScanBackend {
    fn key_down(&mut self, key: &str) {
        if let Some(scan) = keymap::scan_code(key) {
            send_scan(scan, false);
        }
    }

    fn key_up(&mut self, key: &str) {
        if let Some(scan) = keymap::scan_code(key) {
            send_scan(scan, true);
        }
    }
}

// Interception driver interface: first keyboard device, keystrokes
// written as KEYBOARD_INPUT_DATA through its write ioctl.
const INTERCEPTION_DEVICE: &str = r"\\.\interception00";
const IOCTL_WRITE: u32 = 0x0022_2080;
const KEYSTROKE_DOWN: u16 = 0x00;
const KEYSTROKE_UP: u16 = 0x01;

#[repr(C)]
struct KeyboardInputData {
    unit_id: u16,
    make_code: u16,
    flags: u16,
    reserved: u16,
    extra_information: u32,
}

/// Kernel-level injection through the Interception driver. Construction
/// fails when the driver is not installed or the process lacks rights,
/// and the factory falls back to simulated input.
pub struct InterceptionBackend {
    device: isize,
}

impl InterceptionBackend {
    pub fn open() -> Result<Self> {
        let path: Vec<u16> = INTERCEPTION_DEVICE.encode_utf16().chain(Some(0)).collect();
        let handle = unsafe {
            CreateFileW(
                PCWSTR(path.as_ptr()),
                GENERIC_READ.0 | GENERIC_WRITE.0,
                FILE_SHARE_MODE(0),
                None,
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                None,
            )
        }
        .context("opening interception keyboard device")?;
        Ok(Self { device: handle.0 as isize })
    }

    fn send(&self, scan: u16, up: bool) {
        let stroke = KeyboardInputData {
            unit_id: 0,
            make_code: scan,
            flags: if up { KEYSTROKE_UP } else { KEYSTROKE_DOWN },
            reserved: 0,
            extra_information: 0,
        };
        let mut written = 0u32;
        let res = unsafe {
            DeviceIoControl(
                HANDLE(self.device as *mut c_void),
                IOCTL_WRITE,
                Some(&stroke as *const KeyboardInputData as *const c_void),
                std::mem::size_of::<KeyboardInputData>() as u32,
                None,
                0,
                Some(&mut written),
                None,
            )
        };
        if let Err(e) = res {
            logger::warn_p("win32", &format!("interception write failed: {}", e));
        }
    }
}

impl Drop for InterceptionBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(HANDLE(self.device as *mut c_void));
        }
    }
}

impl InputBackend for InterceptionBackend {
    fn key_down(&mut self, key: &str) {
        if let Some(scan) = keymap::scan_code(key) {
            self.send(scan, false);
        }
    }

    fn key_up(&mut self, key: &str) {
        if let Some(scan) = keymap::scan_code(key) {
            self.send(scan, true);
        }
    }
}

/// Posts WM_KEYDOWN/WM_KEYUP straight to the game window, so it works
/// without focus. No-op until a window has been resolved.
pub struct WindowMessageBackend {
    hwnd: Option<isize>,
}

impl WindowMessageBackend {
    pub fn new(cfg: &Config) -> Self {
        let hwnd = find_game_window(&cfg.game_window_title);
        if hwnd.is_none() {
            logger::warn(&format!(
                "window-message backend found no window for '{}', key events will be dropped",
                cfg.game_window_title
            ));
        }
        Self { hwnd }
    }

    fn send(&self, key: &str, up: bool) {
        let Some(hwnd) = self.hwnd else {
            return;
        };
        let Some(vk) = keymap::virtual_key(key) else {
            return;
        };
        deliver_message(hwnd, vk, up);
    }
}

impl InputBackend for WindowMessageBackend {
    fn key_down(&mut self, key: &str) {
        self.send(key, false);
    }

    fn key_up(&mut self, key: &str) {
        self.send(key, true);
    }
}

/// Try delivery strategies in order of compatibility: synchronous send,
/// asynchronous post, then raw hardware injection against the focused
/// window. The first that does not fail wins.
fn deliver_message(hwnd: isize, vk: u16, up: bool) {
    let hwnd = HWND(hwnd as *mut c_void);
    let msg = if up { WM_KEYUP } else { WM_KEYDOWN };
    unsafe {
        let mut result = 0usize;
        let ok = SendMessageTimeoutW(
            hwnd,
            msg,
            WPARAM(vk as usize),
            LPARAM(0),
            SMTO_ABORTIFHUNG,
            50,
            Some(&mut result),
        );
        if ok.0 != 0 {
            return;
        }
        if PostMessageW(hwnd, msg, WPARAM(vk as usize), LPARAM(0)).is_ok() {
            return;
        }
        keybd_event(
            vk as u8,
            0,
            if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
            0,
        );
    }
}
