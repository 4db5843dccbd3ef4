use std::time::Instant;

use tracing::{debug, warn};

use crate::codec;
use crate::compositor;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::types::*;

/// One encoded screenshot plus the native size coordinate math must use.
#[derive(Debug, Clone)]
pub struct Observation {
    pub image: CompressedImage,
    pub native: ScreenDimensions,
}

/// Grab the display, scale it to `target` and draw the pointer in.
/// Returns the scaled RGB buffer and the native (pre-scale) size.
pub fn capture(platform: &mut dyn Platform, target: ScreenDimensions) -> Result<(PixelBuffer, ScreenDimensions)> {
    let started = Instant::now();
    let frame = platform.grab_screen()?;
    if frame.width == 0 || frame.height == 0 {
        return Err(Error::Display(format!("{} returned an empty frame", platform.name())));
    }
    let native = frame.dimensions();

    let pointer = platform.pointer();
    if pointer.is_none() {
        warn!(target: "capture", "pointer state unavailable, skipping overlay");
    }

    let pixels = compositor::compose(&frame, pointer.as_ref(), target);
    debug!(
        target: "capture",
        "captured {}x{} -> {}x{} in {:?}",
        native.width,
        native.height,
        pixels.width,
        pixels.height,
        started.elapsed()
    );
    Ok((pixels, native))
}

/// Capture and encode.
pub fn observe(platform: &mut dyn Platform, target: ScreenDimensions) -> Result<Observation> {
    let (pixels, native) = capture(platform, target)?;
    let image = codec::encode(pixels);
    debug!(target: "capture", "encoded {} bytes", image.bytes().len());
    Ok(Observation { image, native })
}
