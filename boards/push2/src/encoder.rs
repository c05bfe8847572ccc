//! Pixel to wire conversion.

use push2_core::{DisplayError, Result};

use crate::abi::{ROW_STRIDE, SHAPING_MASK};

fn check_layout(len: usize, row_count: usize, row_width: usize) -> Result<()> {
    if row_count == 0 || row_width == 0 {
        return Err(DisplayError::InvariantViolation("empty chunk layout"));
    }
    if row_width % 2 != 0 {
        return Err(DisplayError::InvariantViolation("row width must be even"));
    }
    if row_width * 2 > ROW_STRIDE {
        return Err(DisplayError::InvariantViolation("row does not fit the row stride"));
    }
    if row_count.checked_mul(row_width) != Some(len) {
        return Err(DisplayError::InvariantViolation(
            "pixel count must equal row count * row width",
        ));
    }
    Ok(())
}

/// Size in bytes of `row_count` padded rows
fn encoded_len(row_count: usize) -> Result<usize> {
    row_count
        .checked_mul(ROW_STRIDE)
        .ok_or(DisplayError::InvariantViolation("encoded chunk size overflows"))
}

/// Encode `row_count` rows of pixels into `dest`, which must be exactly
/// `row_count * ROW_STRIDE` bytes.
///
/// Each pixel pair becomes 4 bytes: both little endian samples, masked with
/// [`SHAPING_MASK`] by position. Row padding is always written as zero.
pub fn encode_chunk_into(
    pixels: &[u16],
    row_count: usize,
    row_width: usize,
    dest: &mut [u8],
) -> Result<()> {
    check_layout(pixels.len(), row_count, row_width)?;
    if dest.len() != encoded_len(row_count)? {
        return Err(DisplayError::InvariantViolation(
            "destination must hold row count * row stride bytes",
        ));
    }

    for (row, out) in pixels.chunks_exact(row_width).zip(dest.chunks_exact_mut(ROW_STRIDE)) {
        let (data, padding) = out.split_at_mut(row_width * 2);
        for (pair, bytes) in row.chunks_exact(2).zip(data.chunks_exact_mut(4)) {
            let [a0, a1] = pair[0].to_le_bytes();
            let [b0, b1] = pair[1].to_le_bytes();
            bytes[0] = a0 ^ SHAPING_MASK[0];
            bytes[1] = a1 ^ SHAPING_MASK[1];
            bytes[2] = b0 ^ SHAPING_MASK[2];
            bytes[3] = b1 ^ SHAPING_MASK[3];
        }
        padding.fill(0);
    }
    Ok(())
}

/// Allocating variant of [`encode_chunk_into`]
pub fn encode_chunk(pixels: &[u16], row_count: usize, row_width: usize) -> Result<Vec<u8>> {
    check_layout(pixels.len(), row_count, row_width)?;
    let mut dest = vec![0u8; encoded_len(row_count)?];
    encode_chunk_into(pixels, row_count, row_width, &mut dest)?;
    Ok(dest)
}

/// Recover pixels from encoded rows, dropping the padding
pub fn unmask_chunk(bytes: &[u8], row_count: usize, row_width: usize) -> Result<Vec<u16>> {
    let len = row_count
        .checked_mul(row_width)
        .ok_or(DisplayError::InvariantViolation("pixel count overflows"))?;
    check_layout(len, row_count, row_width)?;
    if bytes.len() != encoded_len(row_count)? {
        return Err(DisplayError::InvariantViolation(
            "encoded data must hold row count * row stride bytes",
        ));
    }

    let mut pixels = Vec::with_capacity(row_count * row_width);
    for row in bytes.chunks_exact(ROW_STRIDE) {
        for b in row[..row_width * 2].chunks_exact(4) {
            pixels.push(u16::from_le_bytes([b[0] ^ SHAPING_MASK[0], b[1] ^ SHAPING_MASK[1]]));
            pixels.push(u16::from_le_bytes([b[2] ^ SHAPING_MASK[2], b[3] ^ SHAPING_MASK[3]]));
        }
    }
    Ok(pixels)
}
