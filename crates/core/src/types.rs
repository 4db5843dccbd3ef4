/// Device pixel size of the display that produced the latest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDimensions {
    pub width: u32,
    pub height: u32,
}

impl ScreenDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Raw screenshot pixel data (BGRA), as read from the display
#[derive(Debug, Clone)]
pub struct Capture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl Capture {
    /// Pack a tightly laid out BGRA buffer.
    pub fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { data, width, height, bytes_per_row: width * 4 }
    }

    pub fn dimensions(&self) -> ScreenDimensions {
        ScreenDimensions::new(self.width, self.height)
    }
}

/// Pointer image with straight (non-premultiplied) alpha, BGRA order.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
}

/// Current pointer location in native pixels, plus its glyph when the OS exposes one.
#[derive(Debug, Clone)]
pub struct PointerState {
    pub x: i32,
    pub y: i32,
    pub glyph: Option<Glyph>,
}

/// Tightly packed 8-bit RGB raster, the codec's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * Self::CHANNELS);
        Self { width, height, data }
    }

    pub fn stride(&self) -> usize {
        self.width as usize * Self::CHANNELS
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }
}

/// Encoded PNG bytes together with the raster size they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl CompressedImage {
    pub(crate) fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self { bytes, width, height }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `data:` URL form used when embedding the image into a message.
    pub fn to_data_url(&self) -> String {
        use base64::Engine as _;
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}
