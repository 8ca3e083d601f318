//! Decoded pixels on their way to a viewer, and the nearest-sample scaling
//! shared by previews and V8U8 resizes.

use dudv_dds::{bgra_to_rgba, display_stride};

use crate::{Error, Result};

/// 32-bit BGRA pixels ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes per row.
    pub stride: usize,
    pub pixels: Vec<u8>,
}

impl DisplayBuffer {
    pub fn from_bgra(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: display_stride(width),
            pixels,
        }
    }

    /// Build from RGBA8, swapping red and blue.
    pub fn from_rgba(width: u32, height: u32, mut pixels: Vec<u8>) -> Self {
        // The swap is its own inverse.
        bgra_to_rgba(&mut pixels);
        Self::from_bgra(width, height, pixels)
    }

    /// The same pixels in RGBA order.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = self.pixels.clone();
        bgra_to_rgba(&mut rgba);
        rgba
    }

    /// Row `y`, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.pixels.get(start..start + self.stride)
    }

    /// Nearest-sample copy at `width` x `height`.
    pub fn scaled(&self, width: u32, height: u32) -> Result<Self> {
        let pixels = resample_nearest(&self.pixels, self.width, self.height, 4, width, height)?;
        Ok(Self::from_bgra(width, height, pixels))
    }

    /// `scaled` when a size is given, otherwise the buffer as is.
    pub fn fit(self, size: Option<(u32, u32)>) -> Result<Self> {
        match size {
            Some((width, height)) if (width, height) != (self.width, self.height) => {
                self.scaled(width, height)
            }
            _ => Ok(self),
        }
    }
}

/// Nearest-sample resize of a tightly packed `src` holding `src_width` x
/// `src_height` pixels of `bpp` bytes each.
///
/// Destination pixel `(x, y)` copies source `(x * sw / w, y * sh / h)`.
pub(crate) fn resample_nearest(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    bpp: usize,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedConversion(format!(
            "resize to {}x{}",
            width, height
        )));
    }
    let expected = src_width as usize * src_height as usize * bpp;
    if src.len() != expected || expected == 0 {
        return Err(Error::Codec(format!(
            "{} bytes is not a {}x{} buffer of {}-byte pixels",
            src.len(),
            src_width,
            src_height,
            bpp
        )));
    }

    let mut out = Vec::with_capacity(width as usize * height as usize * bpp);
    for y in 0..height as u64 {
        let sy = (y * src_height as u64 / height as u64) as usize;
        for x in 0..width as u64 {
            let sx = (x * src_width as u64 / width as u64) as usize;
            let offset = (sy * src_width as usize + sx) * bpp;
            out.extend_from_slice(&src[offset..offset + bpp]);
        }
    }
    Ok(out)
}
