//! Drawable pixel buffer matching the display geometry.

use rgb565::Rgb565;

use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Pack an rgb888 color into the display's native 16 bit layout
/// (red in bits 0-4, green in 5-10, blue in 11-15)
pub fn pack_rgb888(r: u8, g: u8, b: u8) -> u16 {
    u16::from_le_bytes(Rgb565::from_rgb888_components(r, g, b).to_bgr565_le())
}

/// Expand a native pixel back into rgb888 components
pub fn unpack_rgb888(pixel: u16) -> [u8; 3] {
    Rgb565::from_bgr565_le(pixel.to_le_bytes()).to_rgb888_components()
}

/// Index of the first pixel of `row`, computed in `usize` so large surfaces don't wrap
#[inline(always)]
fn row_offset(row: u32, width: u32) -> usize {
    row as usize * width as usize
}

/// Row-major buffer of native pixels. Callers draw into it, and the session
/// reads it when sending a frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Surface({}x{})", self.width, self.height)
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl Surface {
    /// Create a black surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; row_offset(height, width)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    #[inline(always)]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| row_offset(y, self.width) + x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Set a single pixel. Out of bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, pixel: u16) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = pixel;
        }
    }

    pub fn fill(&mut self, pixel: u16) {
        self.pixels.fill(pixel);
    }

    pub fn clear(&mut self) {
        self.fill(0);
    }

    /// Fill a rectangle, clipped to the surface
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, pixel: u16) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for row in y.min(y_end)..y_end {
            let start = row_offset(row, self.width);
            self.pixels[start + x.min(x_end) as usize..start + x_end as usize].fill(pixel);
        }
    }

    /// Borrow `count` whole rows starting at row `start`
    pub fn rows(&self, start: u32, count: u32) -> &[u16] {
        let start = start.min(self.height);
        let end = start.saturating_add(count).min(self.height);
        &self.pixels[row_offset(start, self.width)..row_offset(end, self.width)]
    }
}
