use std::sync::{Arc, Mutex};

use tracing::info;

use super::Platform;
use crate::error::Result;
use crate::keys::KeyCombo;
use crate::types::*;

/// Input primitive as seen by the stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Move { x: i32, y: i32 },
    Click,
    Scroll(i32),
    Text(String),
    Keys(String),
}

/// Headless platform: a synthetic gradient screen and a recorded input log.
pub struct StubPlatform {
    width: u32,
    height: u32,
    pointer: Option<(i32, i32)>,
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl StubPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pointer: Some((width as i32 / 2, height as i32 / 2)),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate a session that reports no pointer.
    pub fn without_pointer(mut self) -> Self {
        self.pointer = None;
        self
    }

    /// Shared handle on the recorded input, usable after the platform is boxed.
    pub fn events(&self) -> Arc<Mutex<Vec<InputEvent>>> {
        Arc::clone(&self.events)
    }

    fn record(&self, event: InputEvent) {
        info!(target: "stub", "{:?}", event);
        if let Ok(mut log) = self.events.lock() {
            log.push(event);
        }
    }
}

impl Platform for StubPlatform {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn grab_screen(&mut self) -> Result<Capture> {
        let (w, h) = (self.width, self.height);
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x * 255 / w) as u8, (y * 255 / h) as u8, 0x40, 0xFF]);
            }
        }
        Ok(Capture::from_bgra(w, h, data))
    }

    fn pointer(&mut self) -> Option<PointerState> {
        self.pointer.map(|(x, y)| PointerState { x, y, glyph: None })
    }

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<()> {
        if self.pointer.is_some() {
            self.pointer = Some((x, y));
        }
        self.record(InputEvent::Move { x, y });
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.record(InputEvent::Click);
        Ok(())
    }

    fn scroll(&mut self, notches: i32) -> Result<()> {
        self.record(InputEvent::Scroll(notches));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.record(InputEvent::Text(text.to_string()));
        Ok(())
    }

    fn press_keys(&mut self, combo: &KeyCombo) -> Result<()> {
        self.record(InputEvent::Keys(combo.to_string()));
        Ok(())
    }
}
