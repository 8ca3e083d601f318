//! Expanding V8U8 data into a displayable 32-bit buffer.

use crate::mip::MipLevel;

/// Bias added to each signed component to land it in the unsigned range.
const BIAS: i16 = 0x7F;

/// Row stride in bytes of a 32-bit-per-pixel image `width` pixels wide.
pub fn display_stride(width: u32) -> usize {
    (width as usize * 32 + 7) / 8
}

/// Re-bias one signed `(u, v)` pair into a BGRA pixel.
///
/// Blue and alpha are saturated, red carries U and green carries V.
#[inline]
pub fn decode_texel(u: i8, v: i8) -> [u8; 4] {
    let bias = |c: i8| (BIAS + c as i16).clamp(0, 255) as u8;
    [0xFF, bias(v), bias(u), 0xFF]
}

/// Decode a level into a `width * height * 4` byte BGRA buffer, row-major.
///
/// This is a visualisation of the tangent-space data, not a colour-accurate
/// conversion.
pub fn decode_to_display(level: &MipLevel) -> Vec<u8> {
    let mut out = Vec::with_capacity(level.data().len() * 2);
    for pair in level.data().chunks_exact(2) {
        out.extend_from_slice(&decode_texel(pair[0] as i8, pair[1] as i8));
    }
    out
}

/// Swap a BGRA buffer to RGBA in place.
pub fn bgra_to_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}
