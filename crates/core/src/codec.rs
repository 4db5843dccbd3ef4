//! PNG encoder for RGB rasters.
//!
//! Output layout: signature, `IHDR`, one or more `IDAT`, `IEND`. Every chunk is
//! `len:u32be | tag:[u8;4] | payload | crc32(tag ++ payload):u32be`.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::types::{CompressedImage, PixelBuffer};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const COMPRESSION_LEVEL: u32 = 6;

/// Upper bound on a single IDAT payload.
const IDAT_MAX_LEN: usize = 1 << 16;

const BIT_DEPTH: u8 = 8;
const COLOR_TYPE_RGB: u8 = 2;
const BYTES_PER_PIXEL: usize = PixelBuffer::CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

const FILTERS: [Filter; 5] = [Filter::None, Filter::Sub, Filter::Up, Filter::Average, Filter::Paeth];

/// Encode an RGB buffer as PNG. The buffer must be at least 1x1.
pub fn encode(pixels: PixelBuffer) -> CompressedImage {
    assert!(
        pixels.width > 0 && pixels.height > 0,
        "cannot encode a zero-area buffer ({}x{})",
        pixels.width,
        pixels.height
    );

    let filtered = filter_scanlines(&pixels);
    let compressed = zlib_compress(&filtered);

    let mut out = Vec::with_capacity(compressed.len() + 64);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &header_payload(pixels.width, pixels.height));
    for part in compressed.chunks(IDAT_MAX_LEN) {
        write_chunk(&mut out, b"IDAT", part);
    }
    write_chunk(&mut out, b"IEND", &[]);

    CompressedImage::new(out, pixels.width, pixels.height)
}

fn header_payload(width: u32, height: u32) -> [u8; 13] {
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&height.to_be_bytes());
    ihdr[8] = BIT_DEPTH;
    ihdr[9] = COLOR_TYPE_RGB;
    ihdr[10] = 0; // deflate
    ihdr[11] = 0; // adaptive filtering
    ihdr[12] = 0; // no interlace
    ihdr
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    let body_start = out.len();
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    let crc = crc32fast::hash(&out[body_start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

fn zlib_compress(raw: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(COMPRESSION_LEVEL));
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .expect("in-memory zlib stream cannot fail")
}

/// Prefix every scanline with the filter byte that minimises the sum of
/// absolute residuals, then the filtered bytes.
fn filter_scanlines(pixels: &PixelBuffer) -> Vec<u8> {
    let stride = pixels.stride();
    let mut out = Vec::with_capacity((stride + 1) * pixels.height as usize);
    let zero_row = vec![0u8; stride];
    let mut scratch = vec![0u8; stride];
    let mut best = vec![0u8; stride];

    for y in 0..pixels.height {
        let cur = pixels.row(y);
        let prev = if y == 0 { &zero_row[..] } else { pixels.row(y - 1) };

        let mut best_filter = Filter::None;
        let mut best_score = u64::MAX;
        for filter in FILTERS {
            apply_filter(filter, cur, prev, &mut scratch);
            let score = residual_score(&scratch);
            if score < best_score {
                best_score = score;
                best_filter = filter;
                best.copy_from_slice(&scratch);
            }
        }

        out.push(best_filter as u8);
        out.extend_from_slice(&best);
    }
    out
}

fn apply_filter(filter: Filter, cur: &[u8], prev: &[u8], out: &mut [u8]) {
    for i in 0..cur.len() {
        let a = if i >= BYTES_PER_PIXEL { cur[i - BYTES_PER_PIXEL] } else { 0 };
        let b = prev[i];
        let c = if i >= BYTES_PER_PIXEL { prev[i - BYTES_PER_PIXEL] } else { 0 };
        let predicted = match filter {
            Filter::None => 0,
            Filter::Sub => a,
            Filter::Up => b,
            Filter::Average => ((a as u16 + b as u16) / 2) as u8,
            Filter::Paeth => paeth(a, b, c),
        };
        out[i] = cur[i].wrapping_sub(predicted);
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

// Residuals are read as signed bytes so small negative deltas score low.
fn residual_score(row: &[u8]) -> u64 {
    row.iter().map(|&v| (v as i8).unsigned_abs() as u64).sum()
}
