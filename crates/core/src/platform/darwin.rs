use std::thread;
use std::time::Duration;

use core_foundation::data::CFData;
use core_graphics::display::CGDisplay;
use core_graphics::event::*;
use core_graphics::event_source::*;
use core_graphics::geometry::CGPoint;
use tracing::{info, warn};

use super::Platform;
use crate::error::{Error, Result};
use crate::keys::{control_key, Key, KeyCombo, Modifier, NamedKey};
use crate::types::*;

// macOS virtual key codes (ANSI layout)
fn named_key_code(key: NamedKey) -> CGKeyCode {
    match key {
        NamedKey::Enter => 36,
        NamedKey::Tab => 48,
        NamedKey::Space => 49,
        NamedKey::Backspace => 51,
        NamedKey::Escape => 53,
        NamedKey::Delete => 117,
        NamedKey::Insert => 114,
        NamedKey::Home => 115,
        NamedKey::End => 119,
        NamedKey::PageUp => 116,
        NamedKey::PageDown => 121,
        NamedKey::Left => 123,
        NamedKey::Right => 124,
        NamedKey::Down => 125,
        NamedKey::Up => 126,
        NamedKey::F(n) => [122, 120, 99, 118, 96, 97, 98, 100, 101, 109, 103, 111][(n.clamp(1, 12) - 1) as usize],
    }
}

fn char_key_code(c: char) -> Option<CGKeyCode> {
    let code = match c {
        'a' => 0, 's' => 1, 'd' => 2, 'f' => 3, 'h' => 4, 'g' => 5, 'z' => 6, 'x' => 7,
        'c' => 8, 'v' => 9, 'b' => 11, 'q' => 12, 'w' => 13, 'e' => 14, 'r' => 15,
        'y' => 16, 't' => 17, '1' => 18, '2' => 19, '3' => 20, '4' => 21, '6' => 22,
        '5' => 23, '=' => 24, '9' => 25, '7' => 26, '-' => 27, '8' => 28, '0' => 29,
        ']' => 30, 'o' => 31, 'u' => 32, '[' => 33, 'i' => 34, 'p' => 35, 'l' => 37,
        'j' => 38, '\'' => 39, 'k' => 40, ';' => 41, '\\' => 42, ',' => 43, '/' => 44,
        'n' => 45, 'm' => 46, '.' => 47, '`' => 50,
        _ => return None,
    };
    Some(code)
}

fn modifier_code(m: Modifier) -> (CGKeyCode, CGEventFlags) {
    match m {
        Modifier::Meta => (55, CGEventFlags::CGEventFlagCommand),
        Modifier::Shift => (56, CGEventFlags::CGEventFlagShift),
        Modifier::Alt => (58, CGEventFlags::CGEventFlagAlternate),
        Modifier::Ctrl => (59, CGEventFlags::CGEventFlagControl),
    }
}

fn input_err(what: &str) -> Error {
    Error::Input(format!("failed to create {} event", what))
}

pub struct DarwinPlatform {
    /// Capture pixels per event-space point (2.0 on Retina).
    scale: f64,
}

impl DarwinPlatform {
    pub fn new() -> Self {
        info!(target: "darwin", "using CoreGraphics platform");
        DarwinPlatform { scale: 1.0 }
    }

    fn source() -> Result<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| input_err("event source"))
    }

    fn current_location() -> Result<CGPoint> {
        let event = CGEvent::new(Self::source()?).map_err(|_| input_err("null"))?;
        Ok(event.location())
    }

    fn post_mouse(&self, kind: CGEventType, point: CGPoint) -> Result<()> {
        let event = CGEvent::new_mouse_event(Self::source()?, kind, point, CGMouseButton::Left)
            .map_err(|_| input_err("mouse"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_key(&self, code: CGKeyCode, down: bool, flags: CGEventFlags) -> Result<()> {
        let event = CGEvent::new_keyboard_event(Self::source()?, code, down).map_err(|_| input_err("keyboard"))?;
        event.set_flags(flags);
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_unicode(&self, text: &str, flags: CGEventFlags) -> Result<()> {
        for down in [true, false] {
            let event = CGEvent::new_keyboard_event(Self::source()?, 0, down).map_err(|_| input_err("keyboard"))?;
            event.set_string(text);
            event.set_flags(flags);
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }
}

impl Platform for DarwinPlatform {
    fn name(&self) -> &'static str {
        "darwin"
    }

    fn grab_screen(&mut self) -> Result<Capture> {
        let display = CGDisplay::main();
        let image = display
            .image()
            .ok_or_else(|| Error::Display("CGDisplayCreateImage returned null (screen recording permission?)".into()))?;

        let width = image.width() as u32;
        let height = image.height() as u32;
        if width == 0 || height == 0 {
            return Err(Error::Display("main display reported zero size".into()));
        }
        let bounds = display.bounds();
        if bounds.size.width > 0.0 {
            self.scale = width as f64 / bounds.size.width;
        }

        let pixels: CFData = image.data();
        Ok(Capture {
            data: pixels.bytes().to_vec(),
            width,
            height,
            bytes_per_row: image.bytes_per_row() as u32,
        })
    }

    fn pointer(&mut self) -> Option<PointerState> {
        match Self::current_location() {
            Ok(p) => Some(PointerState {
                x: (p.x * self.scale).round() as i32,
                y: (p.y * self.scale).round() as i32,
                glyph: None,
            }),
            Err(e) => {
                warn!(target: "darwin", "pointer unavailable: {}", e);
                None
            }
        }
    }

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<()> {
        let point = CGPoint::new(x as f64 / self.scale, y as f64 / self.scale);
        self.post_mouse(CGEventType::MouseMoved, point)
    }

    fn click(&mut self) -> Result<()> {
        let point = Self::current_location()?;
        self.post_mouse(CGEventType::LeftMouseDown, point)?;
        thread::sleep(Duration::from_millis(15));
        self.post_mouse(CGEventType::LeftMouseUp, point)
    }

    fn scroll(&mut self, notches: i32) -> Result<()> {
        let event = CGEvent::new_scroll_event(Self::source()?, ScrollEventUnit::LINE, 1, notches, 0, 0)
            .map_err(|_| input_err("scroll"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            if let Some(key) = control_key(ch) {
                let code = named_key_code(key);
                self.post_key(code, true, CGEventFlags::CGEventFlagNull)?;
                self.post_key(code, false, CGEventFlags::CGEventFlagNull)?;
                continue;
            }
            self.post_unicode(ch.encode_utf8(&mut buf), CGEventFlags::CGEventFlagNull)?;
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    fn press_keys(&mut self, combo: &KeyCombo) -> Result<()> {
        let mut flags = CGEventFlags::CGEventFlagNull;
        for &m in &combo.modifiers {
            let (code, flag) = modifier_code(m);
            flags |= flag;
            self.post_key(code, true, flags)?;
        }

        let result = match combo.key {
            Key::Named(k) => {
                let code = named_key_code(k);
                self.post_key(code, true, flags).and_then(|_| self.post_key(code, false, flags))
            }
            Key::Char(c) => match char_key_code(c) {
                Some(code) => self.post_key(code, true, flags).and_then(|_| self.post_key(code, false, flags)),
                None => self.post_unicode(&c.to_string(), flags),
            },
        };

        for &m in combo.modifiers.iter().rev() {
            let (code, flag) = modifier_code(m);
            flags.remove(flag);
            self.post_key(code, false, flags)?;
        }
        result
    }
}
