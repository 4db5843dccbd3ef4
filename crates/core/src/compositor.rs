use crate::types::{Capture, Glyph, PixelBuffer, PointerState, ScreenDimensions};

/// Scale a native BGRA capture to `target`, drop alpha, and draw the pointer on top.
pub fn compose(capture: &Capture, pointer: Option<&PointerState>, target: ScreenDimensions) -> PixelBuffer {
    let target = ScreenDimensions::new(target.width.max(1), target.height.max(1));
    let mut buf = scale_area(capture, target);
    if let Some(p) = pointer {
        overlay_pointer(&mut buf, p, capture.dimensions());
    }
    buf
}

/// One source index and its normalised weight.
type Tap = (usize, f32);

/// For every destination index, the source indices it covers and by how much.
fn area_taps(src_len: u32, dst_len: u32) -> Vec<Vec<Tap>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|i| {
            let start = i as f64 * scale;
            let end = ((i + 1) as f64 * scale).min(src_len as f64);
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len as usize).max(first + 1);

            let mut taps: Vec<Tap> = (first..last)
                .map(|j| {
                    let lo = start.max(j as f64);
                    let hi = end.min((j + 1) as f64);
                    (j.min(src_len as usize - 1), (hi - lo).max(0.0) as f32)
                })
                .filter(|&(_, w)| w > 0.0)
                .collect();
            if taps.is_empty() {
                taps.push((first.min(src_len as usize - 1), 1.0));
            }
            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            for tap in &mut taps {
                tap.1 /= total;
            }
            taps
        })
        .collect()
}

/// Box-filter resample: every output pixel is the coverage-weighted mean of
/// the source pixels under it. Output is RGB.
pub fn scale_area(capture: &Capture, target: ScreenDimensions) -> PixelBuffer {
    let (sw, sh) = (capture.width.max(1), capture.height.max(1));
    let (tw, th) = (target.width.max(1), target.height.max(1));
    let x_taps = area_taps(sw, tw);
    let y_taps = area_taps(sh, th);
    let bpr = capture.bytes_per_row as usize;

    // Horizontal pass: sh rows of tw RGB samples.
    let mut rows = vec![0f32; sh as usize * tw as usize * 3];
    for y in 0..sh as usize {
        let src_row = &capture.data[y * bpr..];
        let dst_row = &mut rows[y * tw as usize * 3..(y + 1) * tw as usize * 3];
        for (x, taps) in x_taps.iter().enumerate() {
            let (mut r, mut g, mut b) = (0f32, 0f32, 0f32);
            for &(sx, w) in taps {
                let px = &src_row[sx * 4..sx * 4 + 4];
                b += px[0] as f32 * w;
                g += px[1] as f32 * w;
                r += px[2] as f32 * w;
            }
            dst_row[x * 3] = r;
            dst_row[x * 3 + 1] = g;
            dst_row[x * 3 + 2] = b;
        }
    }

    // Vertical pass.
    let stride = tw as usize * 3;
    let mut out = vec![0u8; th as usize * stride];
    for (y, taps) in y_taps.iter().enumerate() {
        let dst_row = &mut out[y * stride..(y + 1) * stride];
        for (i, dst) in dst_row.iter_mut().enumerate() {
            let acc: f32 = taps.iter().map(|&(sy, w)| rows[sy * stride + i] * w).sum();
            *dst = acc.round().clamp(0.0, 255.0) as u8;
        }
    }

    PixelBuffer::new(tw, th, out)
}

/// Alpha-blend the pointer glyph into `buf`, so the glyph's hotspot lands on
/// the pointer position mapped from `native` into buffer space.
pub fn overlay_pointer(buf: &mut PixelBuffer, pointer: &PointerState, native: ScreenDimensions) {
    let glyph = pointer.glyph.as_ref().unwrap_or_else(|| default_arrow());
    let sx = buf.width as f64 / native.width.max(1) as f64;
    let sy = buf.height as f64 / native.height.max(1) as f64;
    let origin_x = (pointer.x as f64 * sx).round() as i64 - glyph.hotspot_x as i64;
    let origin_y = (pointer.y as f64 * sy).round() as i64 - glyph.hotspot_y as i64;

    let stride = buf.stride();
    for gy in 0..glyph.height as i64 {
        let y = origin_y + gy;
        if y < 0 || y >= buf.height as i64 {
            continue;
        }
        for gx in 0..glyph.width as i64 {
            let x = origin_x + gx;
            if x < 0 || x >= buf.width as i64 {
                continue;
            }
            let g = ((gy * glyph.width as i64 + gx) * 4) as usize;
            let alpha = glyph.data[g + 3] as u32;
            if alpha == 0 {
                continue;
            }
            let d = y as usize * stride + x as usize * 3;
            // glyph is BGRA, buffer is RGB
            for (c, src) in [glyph.data[g + 2], glyph.data[g + 1], glyph.data[g]].into_iter().enumerate() {
                let dst = buf.data[d + c] as u32;
                buf.data[d + c] = ((src as u32 * alpha + dst * (255 - alpha) + 127) / 255) as u8;
            }
        }
    }
}

const ARROW: [&str; 19] = [
    "X",
    "XX",
    "X.X",
    "X..X",
    "X...X",
    "X....X",
    "X.....X",
    "X......X",
    "X.......X",
    "X........X",
    "X.....XXXXX",
    "X..X..X",
    "X.X X..X",
    "XX  X..X",
    "X    X..X",
    "     X..X",
    "      X..X",
    "      X..X",
    "       XX",
];

/// Fallback glyph for platforms that report a pointer position but no image.
pub fn default_arrow() -> &'static Glyph {
    use std::sync::OnceLock;
    static ARROW_GLYPH: OnceLock<Glyph> = OnceLock::new();
    ARROW_GLYPH.get_or_init(|| {
        let width = ARROW.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let height = ARROW.len() as u32;
        let mut data = vec![0u8; (width * height * 4) as usize];
        for (y, row) in ARROW.iter().enumerate() {
            for (x, ch) in row.bytes().enumerate() {
                let v = match ch {
                    b'X' => 0u8,
                    b'.' => 255,
                    _ => continue,
                };
                let i = (y * width as usize + x) * 4;
                data[i..i + 4].copy_from_slice(&[v, v, v, 255]);
            }
        }
        Glyph { width, height, data, hotspot_x: 0, hotspot_y: 0 }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, bgra: [u8; 4]) -> Capture {
        let data = bgra.iter().copied().cycle().take((width * height * 4) as usize).collect();
        Capture::from_bgra(width, height, data)
    }

    #[test]
    fn test_identity_scale_is_exact() {
        let mut data = Vec::new();
        for i in 0..(4 * 3) {
            data.extend_from_slice(&[i as u8, (i * 2) as u8, (i * 3) as u8, 255]);
        }
        let cap = Capture::from_bgra(4, 3, data);
        let out = scale_area(&cap, ScreenDimensions::new(4, 3));
        assert_eq!(out.width, 4);
        // first pixel: B=0 G=0 R=0; second: B=1 G=2 R=3 -> RGB 3,2,1
        assert_eq!(&out.data[0..6], &[0, 0, 0, 3, 2, 1]);
    }

    #[test]
    fn test_downscale_averages_area() {
        // 2x1 source: black | white -> 1x1 output is mid grey
        let cap = Capture::from_bgra(2, 1, vec![0, 0, 0, 255, 255, 255, 255, 255]);
        let out = scale_area(&cap, ScreenDimensions::new(1, 1));
        assert_eq!(out.data, vec![128, 128, 128]);
    }

    #[test]
    fn test_fractional_coverage() {
        // 3 -> 2: second output pixel covers half of src[1] and all of src[2]
        let cap = Capture::from_bgra(3, 1, vec![0, 0, 0, 0, 90, 90, 90, 0, 180, 180, 180, 0]);
        let out = scale_area(&cap, ScreenDimensions::new(2, 1));
        // (0*1 + 90*0.5) / 1.5 = 30; (90*0.5 + 180*1) / 1.5 = 150
        assert_eq!(out.data, vec![30, 30, 30, 150, 150, 150]);
    }

    #[test]
    fn test_respects_row_padding() {
        // bytes_per_row larger than width*4
        let cap = Capture {
            data: vec![1, 2, 3, 255, 9, 9, 9, 9, 4, 5, 6, 255, 9, 9, 9, 9],
            width: 1,
            height: 2,
            bytes_per_row: 8,
        };
        let out = scale_area(&cap, ScreenDimensions::new(1, 2));
        assert_eq!(out.data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_upscale_fills_target() {
        let cap = solid(2, 2, [10, 20, 30, 255]);
        let out = scale_area(&cap, ScreenDimensions::new(5, 3));
        assert_eq!(out.data.len(), 5 * 3 * 3);
        assert!(out.data.chunks(3).all(|p| p == [30, 20, 10]));
    }

    #[test]
    fn test_overlay_honours_hotspot() {
        let cap = solid(100, 100, [0, 0, 0, 255]);
        let glyph = Glyph {
            width: 3,
            height: 3,
            data: [255u8, 255, 255, 255].repeat(9),
            hotspot_x: 1,
            hotspot_y: 1,
        };
        let pointer = PointerState { x: 50, y: 20, glyph: Some(glyph) };
        let out = compose(&cap, Some(&pointer), ScreenDimensions::new(50, 50));
        let at = |x: usize, y: usize| &out.data[(y * 50 + x) * 3..(y * 50 + x) * 3 + 3];
        // pointer maps to (25, 10); glyph spans 24..=26, 9..=11
        assert_eq!(at(25, 10), [255, 255, 255]);
        assert_eq!(at(24, 9), [255, 255, 255]);
        assert_eq!(at(26, 11), [255, 255, 255]);
        assert_eq!(at(27, 10), [0, 0, 0]);
        assert_eq!(at(23, 10), [0, 0, 0]);
    }

    #[test]
    fn test_overlay_clips_at_edges() {
        let cap = solid(10, 10, [0, 0, 255, 255]);
        let pointer = PointerState { x: 9, y: 9, glyph: None };
        let out = compose(&cap, Some(&pointer), ScreenDimensions::new(10, 10));
        assert_eq!(out.data.len(), 300);
        let at = |x: usize, y: usize| &out.data[(y * 10 + x) * 3..(y * 10 + x) * 3 + 3];
        // only the arrow tip lands in the frame
        assert_eq!(at(9, 9), [0, 0, 0]);
        for y in 0..10 {
            for x in 0..10 {
                if (x, y) != (9, 9) {
                    assert_eq!(at(x, y), [255, 0, 0], "pixel ({x}, {y}) was drawn over");
                }
            }
        }
        // nothing wrapped onto the opposite edges
        assert!((0..10).all(|i| at(i, 0) == [255, 0, 0] && at(0, i) == [255, 0, 0]));
    }

    #[test]
    fn test_overlay_blends_alpha() {
        let mut buf = PixelBuffer::new(1, 1, vec![0, 0, 0]);
        let glyph = Glyph { width: 1, height: 1, data: vec![255, 255, 255, 128], hotspot_x: 0, hotspot_y: 0 };
        let pointer = PointerState { x: 0, y: 0, glyph: Some(glyph) };
        overlay_pointer(&mut buf, &pointer, ScreenDimensions::new(1, 1));
        assert_eq!(buf.data, vec![128, 128, 128]);
    }

    #[test]
    fn test_no_pointer_leaves_frame_untouched() {
        let cap = solid(4, 4, [7, 8, 9, 255]);
        let out = compose(&cap, None, ScreenDimensions::new(4, 4));
        assert!(out.data.chunks(3).all(|p| p == [9, 8, 7]));
    }

    #[test]
    fn test_default_arrow_shape() {
        let g = default_arrow();
        assert_eq!((g.width, g.height), (11, 19));
        assert_eq!(&g.data[0..4], &[0, 0, 0, 255]);
    }
}
