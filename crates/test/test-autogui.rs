//! Moves the real pointer to normalized positions and checks where it landed.
//!
//! This takes over the mouse. Run it by hand: `cargo run -p pilot-test --bin test-autogui`.

use std::thread;
use std::time::Duration;

use libtest_mimic::{Arguments, Failed, Trial};

use pilot_core::capture;
use pilot_core::coords::{normalize_to_pixel, NormalizedPoint};
use pilot_core::platform::create_platform;
use pilot_core::types::ScreenDimensions;

const TOLERANCE: i32 = 2;

fn lands_at(nx: f64, ny: f64) -> Result<(), Failed> {
    let mut platform = create_platform(false);
    let (_, native) = capture::capture(platform.as_mut(), ScreenDimensions::new(64, 36))?;
    let (px, py) = normalize_to_pixel(NormalizedPoint::new(nx, ny), native);

    platform.move_pointer(px, py)?;
    thread::sleep(Duration::from_millis(100));

    let pointer = platform.pointer().ok_or("pointer position unavailable")?;
    if (pointer.x - px).abs() > TOLERANCE || (pointer.y - py).abs() > TOLERANCE {
        return Err(format!("({}, {}) -> wanted ({}, {}), pointer at ({}, {})", nx, ny, px, py, pointer.x, pointer.y).into());
    }
    Ok(())
}

fn main() {
    let args = Arguments::from_args();
    let points = [("top_left", 0.0, 0.0), ("center", 500.0, 500.0), ("bottom_right", 1000.0, 1000.0), ("off_screen", 1500.0, -20.0)];
    let trials = points
        .into_iter()
        .map(|(name, x, y)| Trial::test(format!("pointer_{}", name), move || lands_at(x, y)))
        .collect();
    libtest_mimic::run(&args, trials).exit();
}
