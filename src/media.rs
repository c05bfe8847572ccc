//! Rendering helpers that fill the display surface.

use image::imageops::FilterType;
use image::DynamicImage;
use push2::{pack_rgb888, Surface};

/// Resize an image to fill the surface, flatten its alpha over `background`,
/// and write it as native pixels.
pub fn draw_image(surface: &mut Surface, image: &DynamicImage, background: [u8; 3], nearest: bool) {
    let [br, bg, bb] = background;
    let resized = image
        .resize_to_fill(
            surface.width(),
            surface.height(),
            if nearest {
                FilterType::Nearest
            } else {
                FilterType::Gaussian
            },
        )
        .to_rgba8();

    for (x, y, p) in resized.enumerate_pixels() {
        let [mut r, mut g, mut b, a] = p.0;

        // Mix alpha values against the background
        let a = a as f64 / 255.0;
        let ba = 1. - a;
        r = ((br as f64 * ba) + (r as f64 * a)) as u8;
        g = ((bg as f64 * ba) + (g as f64 * a)) as u8;
        b = ((bb as f64 * ba) + (b as f64 * a)) as u8;

        surface.set(x, y, pack_rgb888(r, g, b));
    }
}

/// Classic color bars over a grey ramp
pub fn draw_pattern(surface: &mut Surface) {
    const BARS: [[u8; 3]; 8] = [
        [255, 255, 255],
        [255, 255, 0],
        [0, 255, 255],
        [0, 255, 0],
        [255, 0, 255],
        [255, 0, 0],
        [0, 0, 255],
        [0, 0, 0],
    ];

    let (width, height) = (surface.width(), surface.height());
    let bar_width = width.div_ceil(BARS.len() as u32);
    let bar_height = height * 3 / 4;
    for (i, [r, g, b]) in BARS.into_iter().enumerate() {
        surface.fill_rect(i as u32 * bar_width, 0, bar_width, bar_height, pack_rgb888(r, g, b));
    }
    for x in 0..width {
        let v = (x * 255 / (width - 1).max(1)) as u8;
        surface.fill_rect(x, bar_height, 1, height - bar_height, pack_rgb888(v, v, v));
    }
}

/// Hex dump lines of 32 bytes, offset prefixed
pub fn hex_dump(bytes: &[u8]) -> impl Iterator<Item = String> + '_ {
    bytes.chunks(32).enumerate().map(|(i, line)| {
        let hex: Vec<_> = line.iter().map(|b| format!("{b:02x}")).collect();
        format!("{:06x}: {}", i * 32, hex.join(" "))
    })
}
