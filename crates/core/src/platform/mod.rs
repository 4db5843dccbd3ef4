pub mod stub;

#[cfg(target_os = "macos")]
pub mod darwin;

#[cfg(target_os = "windows")]
pub mod windows;

use crate::error::Result;
use crate::keys::KeyCombo;
use crate::types::*;

/// OS-facing display and input primitives. Pixel arguments are in native
/// device pixels of the primary display.
pub trait Platform: Send {
    fn name(&self) -> &'static str;

    /// Read the whole primary display at native resolution.
    fn grab_screen(&mut self) -> Result<Capture>;

    /// Pointer position and glyph. `None` when the session exposes no pointer.
    fn pointer(&mut self) -> Option<PointerState>;

    fn move_pointer(&mut self, x: i32, y: i32) -> Result<()>;

    /// Primary button down + up at the current pointer position.
    fn click(&mut self) -> Result<()>;

    /// Vertical wheel; positive scrolls up, negative scrolls down.
    fn scroll(&mut self, notches: i32) -> Result<()>;

    fn type_text(&mut self, text: &str) -> Result<()>;

    fn press_keys(&mut self, combo: &KeyCombo) -> Result<()>;
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        return Box::new(stub::StubPlatform::default());
    }
    native_platform().unwrap_or_else(|| {
        tracing::warn!(target: "stub", "no native platform for this OS, using stub");
        Box::new(stub::StubPlatform::default())
    })
}

#[cfg(target_os = "windows")]
fn native_platform() -> Option<Box<dyn Platform>> {
    Some(Box::new(windows::WindowsPlatform::new()))
}

#[cfg(target_os = "macos")]
fn native_platform() -> Option<Box<dyn Platform>> {
    Some(Box::new(darwin::DarwinPlatform::new()))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn native_platform() -> Option<Box<dyn Platform>> {
    None
}
