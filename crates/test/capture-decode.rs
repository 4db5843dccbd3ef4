//! Grab the real display, encode it, and decode it back with a standard PNG reader.
//!
//! Run by hand on a desktop session: `cargo run -p pilot-test --bin capture-decode`.

use libtest_mimic::{Arguments, Failed, Trial};

use pilot_core::capture;
use pilot_core::codec;
use pilot_core::platform::create_platform;
use pilot_core::types::ScreenDimensions;

fn decode_matches(target: ScreenDimensions) -> Result<(), Failed> {
    let mut platform = create_platform(false);
    let (pixels, native) = capture::capture(platform.as_mut(), target)?;
    if native.width == 0 || native.height == 0 {
        return Err(format!("native size {}x{}", native.width, native.height).into());
    }

    let expected = pixels.data.clone();
    let image = codec::encode(pixels);
    let decoded = image::load_from_memory(image.bytes())?.to_rgb8();
    if decoded.dimensions() != (target.width, target.height) {
        return Err(format!("decoded {:?}, wanted {}x{}", decoded.dimensions(), target.width, target.height).into());
    }
    if decoded.as_raw() != &expected {
        return Err("decoded pixels differ from the encoded buffer".into());
    }

    let out = std::env::temp_dir().join(format!("pilot_capture_{}x{}.png", target.width, target.height));
    std::fs::write(&out, image.bytes())?;
    println!("{} ({}x{} native, {} bytes)", out.display(), native.width, native.height, image.bytes().len());
    Ok(())
}

fn main() {
    let args = Arguments::from_args();
    let trials = vec![
        Trial::test("capture_decode_default_size", || decode_matches(ScreenDimensions::new(1536, 864))),
        Trial::test("capture_decode_small", || decode_matches(ScreenDimensions::new(320, 180))),
    ];
    libtest_mimic::run(&args, trials).exit();
}
