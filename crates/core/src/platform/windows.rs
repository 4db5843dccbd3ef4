use std::mem::size_of;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use windows::Win32::Foundation::{COLORREF, HWND, POINT, RECT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, CreateSolidBrush, DeleteDC, DeleteObject, FillRect, GetDC,
    GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HBRUSH, HDC,
    HGDIOBJ, SRCCOPY,
};
use windows::Win32::UI::HiDpi::{SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2};
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::{
    DrawIconEx, GetCursorInfo, GetIconInfo, GetSystemMetrics, SetCursorPos, CURSORINFO, CURSORINFO_FLAGS,
    CURSOR_SHOWING, CURSOR_SUPPRESSED, DI_NORMAL, HICON, ICONINFO, SM_CXCURSOR, SM_CXSCREEN, SM_CYSCREEN, WHEEL_DELTA,
};

use super::Platform;
use crate::error::{Error, Result};
use crate::keys::{control_key, Key, KeyCombo, Modifier, NamedKey};
use crate::types::*;

pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        // Physical pixels for both capture and SetCursorPos.
        if unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) }.is_err() {
            warn!(target: "windows", "DPI awareness already set by the host process");
        }
        info!(target: "windows", "using Win32 platform");
        WindowsPlatform
    }
}

/// Screen DC plus a memory DC holding a `w`x`h` bitmap; released on drop.
struct MemSurface {
    screen_dc: HDC,
    mem_dc: HDC,
    bmp: HBITMAP,
    old: HGDIOBJ,
    width: i32,
    height: i32,
}

impl MemSurface {
    unsafe fn new(width: i32, height: i32) -> Result<Self> {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.0.is_null() {
            return Err(Error::Display("GetDC failed (no interactive session?)".into()));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        if mem_dc.0.is_null() {
            let _ = ReleaseDC(HWND::default(), screen_dc);
            return Err(Error::Display("CreateCompatibleDC failed".into()));
        }
        let bmp = CreateCompatibleBitmap(screen_dc, width, height);
        if bmp.0.is_null() {
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(HWND::default(), screen_dc);
            return Err(Error::Display("CreateCompatibleBitmap failed".into()));
        }
        let old = SelectObject(mem_dc, HGDIOBJ(bmp.0));
        Ok(Self { screen_dc, mem_dc, bmp, old, width, height })
    }

    /// Top-down BGRA copy of the bitmap.
    unsafe fn read_bgra(&self) -> Result<Vec<u8>> {
        let mut bmi = BITMAPINFO::default();
        bmi.bmiHeader = BITMAPINFOHEADER {
            biSize: size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: self.width,
            biHeight: -self.height,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        };
        let mut bgra = vec![0u8; self.width as usize * self.height as usize * 4];
        // GetDIBits wants the bitmap deselected
        SelectObject(self.mem_dc, self.old);
        let rows = GetDIBits(
            self.mem_dc,
            self.bmp,
            0,
            self.height as u32,
            Some(bgra.as_mut_ptr() as *mut _),
            &mut bmi,
            DIB_RGB_COLORS,
        );
        SelectObject(self.mem_dc, HGDIOBJ(self.bmp.0));
        if rows == 0 {
            return Err(Error::Display("GetDIBits failed".into()));
        }
        Ok(bgra)
    }
}

impl Drop for MemSurface {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.mem_dc, self.old);
            let _ = DeleteObject(self.bmp);
            let _ = DeleteDC(self.mem_dc);
            let _ = ReleaseDC(HWND::default(), self.screen_dc);
        }
    }
}

/// Draw the cursor over a solid background and read it back.
unsafe fn render_cursor(icon: HICON, size: i32, background: u8) -> Result<Vec<u8>> {
    let surface = MemSurface::new(size, size)?;
    let v = background as u32;
    let brush = CreateSolidBrush(COLORREF(v | (v << 8) | (v << 16)));
    let rect = RECT { left: 0, top: 0, right: size, bottom: size };
    FillRect(surface.mem_dc, &rect, brush);
    let _ = DeleteObject(brush);
    DrawIconEx(surface.mem_dc, 0, 0, icon, size, size, 0, HBRUSH::default(), DI_NORMAL)
        .map_err(|e| Error::Display(format!("DrawIconEx failed: {}", e)))?;
    surface.read_bgra()
}

/// Recover a straight-alpha glyph from renders over black and white:
/// alpha = 255 - (white - black), colour = black / alpha.
fn glyph_from_renders(on_black: &[u8], on_white: &[u8], size: u32, hotspot_x: i32, hotspot_y: i32) -> Glyph {
    let mut data = vec![0u8; on_black.len()];
    for ((out, b), w) in data.chunks_exact_mut(4).zip(on_black.chunks_exact(4)).zip(on_white.chunks_exact(4)) {
        let spread = (w[1] as i32 - b[1] as i32).clamp(0, 255);
        let alpha = (255 - spread) as u32;
        if alpha == 0 {
            continue;
        }
        for c in 0..3 {
            out[c] = ((b[c] as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
        out[3] = alpha as u8;
    }
    Glyph { width: size, height: size, data, hotspot_x, hotspot_y }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(Error::Input(format!("SendInput accepted {} of {} events", sent, inputs.len())));
    }
    Ok(())
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS, data: i32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT { dx: 0, dy: 0, mouseData: data as u32, dwFlags: flags, time: 0, dwExtraInfo: 0 },
        },
    }
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT { wVk: vk, wScan: scan, dwFlags: flags, time: 0, dwExtraInfo: 0 },
        },
    }
}

fn modifier_vk(m: Modifier) -> VIRTUAL_KEY {
    match m {
        Modifier::Ctrl => VK_CONTROL,
        Modifier::Alt => VK_MENU,
        Modifier::Shift => VK_SHIFT,
        Modifier::Meta => VK_LWIN,
    }
}

/// A hidden or suppressed cursor is not drawn into observations.
fn cursor_visible(flags: CURSORINFO_FLAGS, null_handle: bool) -> bool {
    flags == CURSOR_SHOWING && !null_handle
}

fn named_vk(key: NamedKey) -> VIRTUAL_KEY {
    match key {
        NamedKey::Enter => VK_RETURN,
        NamedKey::Tab => VK_TAB,
        NamedKey::Escape => VK_ESCAPE,
        NamedKey::Space => VK_SPACE,
        NamedKey::Backspace => VK_BACK,
        NamedKey::Delete => VK_DELETE,
        NamedKey::Insert => VK_INSERT,
        NamedKey::Home => VK_HOME,
        NamedKey::End => VK_END,
        NamedKey::PageUp => VK_PRIOR,
        NamedKey::PageDown => VK_NEXT,
        NamedKey::Up => VK_UP,
        NamedKey::Down => VK_DOWN,
        NamedKey::Left => VK_LEFT,
        NamedKey::Right => VK_RIGHT,
        NamedKey::F(n) => VIRTUAL_KEY(VK_F1.0 + (n.clamp(1, 12) - 1) as u16),
    }
}

/// Virtual key for a printable char on the active layout, plus whether it needs shift.
fn char_vk(c: char) -> Result<(VIRTUAL_KEY, bool)> {
    let scan = unsafe { VkKeyScanW(c as u16) };
    if scan == -1 {
        return Err(Error::Input(format!("no key for '{}' on this layout", c)));
    }
    Ok((VIRTUAL_KEY((scan as u16) & 0xFF), ((scan as u16) >> 8) & 1 != 0))
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn grab_screen(&mut self) -> Result<Capture> {
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if w <= 0 || h <= 0 {
            return Err(Error::Display(format!("primary display reports {}x{}", w, h)));
        }
        unsafe {
            let surface = MemSurface::new(w, h)?;
            BitBlt(surface.mem_dc, 0, 0, w, h, surface.screen_dc, 0, 0, SRCCOPY)
                .map_err(|e| Error::Display(format!("BitBlt failed: {}", e)))?;
            let mut bgra = surface.read_bgra()?;
            for px in bgra.chunks_exact_mut(4) {
                px[3] = 255;
            }
            Ok(Capture::from_bgra(w as u32, h as u32, bgra))
        }
    }

    fn pointer(&mut self) -> Option<PointerState> {
        let mut info = CURSORINFO { cbSize: size_of::<CURSORINFO>() as u32, ..Default::default() };
        if unsafe { GetCursorInfo(&mut info) }.is_err() {
            warn!(target: "windows", "GetCursorInfo failed, skipping pointer overlay");
            return None;
        }
        if !cursor_visible(info.flags, info.hCursor.0.is_null()) {
            debug!(target: "windows", "cursor hidden, skipping pointer overlay");
            return None;
        }
        let POINT { x, y } = info.ptScreenPos;

        let icon = HICON(info.hCursor.0);
        let glyph = unsafe {
            let mut icon_info = ICONINFO::default();
            let glyph = match GetIconInfo(icon, &mut icon_info) {
                Ok(()) => {
                    let size = GetSystemMetrics(SM_CXCURSOR).max(16);
                    let renders = render_cursor(icon, size, 0).and_then(|b| Ok((b, render_cursor(icon, size, 255)?)));
                    renders.ok().map(|(black, white)| {
                        glyph_from_renders(
                            &black,
                            &white,
                            size as u32,
                            icon_info.xHotspot as i32,
                            icon_info.yHotspot as i32,
                        )
                    })
                }
                Err(_) => None,
            };
            if !icon_info.hbmMask.0.is_null() {
                let _ = DeleteObject(icon_info.hbmMask);
            }
            if !icon_info.hbmColor.0.is_null() {
                let _ = DeleteObject(icon_info.hbmColor);
            }
            glyph
        };
        Some(PointerState { x, y, glyph })
    }

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<()> {
        unsafe { SetCursorPos(x, y) }.map_err(|e| Error::Input(format!("SetCursorPos failed: {}", e)))
    }

    fn click(&mut self) -> Result<()> {
        send(&[mouse_input(MOUSEEVENTF_LEFTDOWN, 0)])?;
        thread::sleep(Duration::from_millis(15));
        send(&[mouse_input(MOUSEEVENTF_LEFTUP, 0)])
    }

    fn scroll(&mut self, notches: i32) -> Result<()> {
        send(&[mouse_input(MOUSEEVENTF_WHEEL, notches * WHEEL_DELTA as i32)])
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        let mut buf = [0u16; 2];
        for ch in text.chars() {
            if let Some(key) = control_key(ch) {
                let vk = named_vk(key);
                send(&[key_input(vk, 0, KEYBD_EVENT_FLAGS(0)), key_input(vk, 0, KEYEVENTF_KEYUP)])?;
                continue;
            }
            for &unit in ch.encode_utf16(&mut buf).iter() {
                send(&[
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
                    key_input(VIRTUAL_KEY(0), unit, KEYBD_EVENT_FLAGS(KEYEVENTF_UNICODE.0 | KEYEVENTF_KEYUP.0)),
                ])?;
            }
        }
        Ok(())
    }

    fn press_keys(&mut self, combo: &KeyCombo) -> Result<()> {
        let (vk, needs_shift) = match combo.key {
            Key::Named(k) => (named_vk(k), false),
            Key::Char(c) => char_vk(c)?,
        };

        let mut held: Vec<VIRTUAL_KEY> = combo.modifiers.iter().map(|&m| modifier_vk(m)).collect();
        if needs_shift && !combo.modifiers.contains(&Modifier::Shift) {
            held.push(VK_SHIFT);
        }

        let mut inputs: Vec<INPUT> = held.iter().map(|&m| key_input(m, 0, KEYBD_EVENT_FLAGS(0))).collect();
        inputs.push(key_input(vk, 0, KEYBD_EVENT_FLAGS(0)));
        inputs.push(key_input(vk, 0, KEYEVENTF_KEYUP));
        inputs.extend(held.iter().rev().map(|&m| key_input(m, 0, KEYEVENTF_KEYUP)));
        send(&inputs)
    }
}
