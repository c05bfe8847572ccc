//! Fixed wire layout of a display frame.
//!
//! Every frame is the 16 byte header followed by [`CHUNKS_PER_FRAME`] bulk
//! transfers of [`CHUNK_BYTES`] each. Pixel rows are padded to [`ROW_STRIDE`]
//! bytes and XOR'd with the signal shaping pattern.

use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Sent before the pixel data of every frame
pub const FRAME_HEADER: [u8; 16] = [
    0xff, 0xcc, 0xaa, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Signal shaping pattern, applied by byte position within each 4 byte group
pub const SHAPING_MASK: [u8; 4] = [0xe7, 0xf3, 0xe7, 0xff];

/// Bytes per row on the wire, including padding
pub const ROW_STRIDE: usize = 2048;

/// Rows carried by one bulk transfer
pub const ROWS_PER_CHUNK: usize = 8;

/// Bytes per bulk transfer
pub const CHUNK_BYTES: usize = ROWS_PER_CHUNK * ROW_STRIDE;

/// Bulk transfers per frame, excluding the header
pub const CHUNKS_PER_FRAME: usize = SCREEN_HEIGHT as usize / ROWS_PER_CHUNK;

/// Pixels per chunk
pub const CHUNK_PIXELS: usize = ROWS_PER_CHUNK * SCREEN_WIDTH as usize;

const _: () = assert!(CHUNKS_PER_FRAME * ROWS_PER_CHUNK == SCREEN_HEIGHT as usize);
const _: () = assert!(SCREEN_WIDTH as usize * 2 <= ROW_STRIDE);
