//! V8U8 mip levels and the pyramid that owns them.

use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;

use crate::{Error, Result};

/// Bytes per V8U8 pixel: one signed U, one signed V.
pub const BYTES_PER_PIXEL: usize = 2;

/// Byte length of a `width` x `height` V8U8 surface.
pub fn level_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Dimensions of mip level `level` for a given base size.
///
/// Each axis halves with floor rounding and never drops below 1.
pub fn level_dimensions(base_width: u32, base_height: u32, level: u32) -> (u32, u32) {
    let halve = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
    (halve(base_width), halve(base_height))
}

/// Number of levels in a full chain for the base size: `floor(log2(min(w, h))) + 1`.
pub fn full_chain_len(width: u32, height: u32) -> usize {
    let min = width.min(height).max(1);
    min.ilog2() as usize + 1
}

/// A single raw V8U8 surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MipLevel {
    /// Wrap a raw buffer. Fails unless it holds exactly `width * height * 2` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = level_size(width, height);
        if data.len() != expected {
            return Err(Error::MipmapSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major `(u, v)` byte pairs.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The signed `(u, v)` pair at `(x, y)`, or `None` outside the level.
    pub fn texel(&self, x: u32, y: u32) -> Option<(i8, i8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some((self.data[offset] as i8, self.data[offset + 1] as i8))
    }
}

/// Ordered mip chain, index 0 being full resolution.
///
/// Never empty: level 0 is always present, and every later level is the
/// floor-halved size of the one before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipPyramid {
    levels: Vec<MipLevel>,
}

impl MipPyramid {
    /// Start a pyramid from its full-resolution level.
    pub fn new(base: MipLevel) -> Self {
        Self { levels: vec![base] }
    }

    /// Build a pyramid from an ordered list of levels, checking the halving chain.
    pub fn from_levels(levels: Vec<MipLevel>) -> Result<Self> {
        let mut iter = levels.into_iter();
        let base = iter.next().ok_or_else(|| {
            Error::InvalidHeader("mip pyramid needs at least one level".into())
        })?;

        let mut pyramid = Self::new(base);
        for level in iter {
            pyramid.push(level)?;
        }
        Ok(pyramid)
    }

    /// Append the next smaller level.
    pub fn push(&mut self, level: MipLevel) -> Result<()> {
        let index = self.levels.len();
        let (w, h) = self.base().dimensions();
        let expected = level_dimensions(w, h, index as u32);
        if level.dimensions() != expected {
            return Err(Error::LevelGeometry {
                level: index,
                expected,
                actual: level.dimensions(),
            });
        }
        self.levels.push(level);
        Ok(())
    }

    pub fn base(&self) -> &MipLevel {
        &self.levels[0]
    }

    /// The smallest level currently held.
    pub fn last(&self) -> &MipLevel {
        &self.levels[self.levels.len() - 1]
    }

    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    pub fn get(&self, index: usize) -> Option<&MipLevel> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Drop every level except the base. Returns how many levels were removed.
    pub fn truncate_to_base(&mut self) -> usize {
        let removed = self.levels.len() - 1;
        self.levels.truncate(1);
        removed
    }

    /// Total payload bytes across all levels.
    pub fn data_size(&self) -> usize {
        self.levels.iter().map(|l| l.data.len()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MipLevel> {
        self.levels.iter()
    }
}

impl<'a> IntoIterator for &'a MipPyramid {
    type Item = &'a MipLevel;
    type IntoIter = std::slice::Iter<'a, MipLevel>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

/// Power-of-two texture size.
///
/// Zero dimensions are bumped to 1 before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let width = width.max(1);
        let height = height.max(1);
        if !width.is_power_of_two() {
            return Err(Error::NotPowerOfTwo {
                axis: "width",
                value: width,
            });
        }
        if !height.is_power_of_two() {
            return Err(Error::NotPowerOfTwo {
                axis: "height",
                value: height,
            });
        }
        Ok(Self { width, height })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Order by pixel count. Different shapes with equal area compare equal.
    pub fn cmp_area(&self, other: &Self) -> std::cmp::Ordering {
        self.area().cmp(&other.area())
    }
}

impl Div<u32> for ImageSize {
    type Output = Self;

    /// Halving past 1 stays at 1, so dividing a power of two can't fail.
    fn div(self, rhs: u32) -> Self {
        Self {
            width: (self.width / rhs).max(1),
            height: (self.height / rhs).max(1),
        }
    }
}

impl Mul<u32> for ImageSize {
    type Output = Result<Self>;

    fn mul(self, rhs: u32) -> Result<Self> {
        Self::new(
            self.width.saturating_mul(rhs),
            self.height.saturating_mul(rhs),
        )
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ImageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidHeader(format!("invalid size string '{}'", s));
        let (w, h) = s.split_once('x').ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    fn level(w: u32, h: u32) -> MipLevel {
        MipLevel::new(vec![0; level_size(w, h)], w, h).unwrap()
    }

    #[test]
    fn test_mip_level_size_check() {
        assert!(MipLevel::new(vec![0; 32], 4, 4).is_ok());

        match MipLevel::new(vec![0; 31], 4, 4) {
            Err(Error::MipmapSizeMismatch { expected, actual }) => {
                assert_eq!(expected, 32);
                assert_eq!(actual, 31);
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_texel_signed() {
        let mip = MipLevel::new(vec![0, 0, 0x7F, 0x80], 2, 1).unwrap();
        assert_eq!(mip.texel(0, 0), Some((0, 0)));
        assert_eq!(mip.texel(1, 0), Some((127, -128)));
        assert_eq!(mip.texel(2, 0), None);
        assert_eq!(mip.texel(0, 1), None);
    }

    #[test]
    fn test_level_dimensions() {
        assert_eq!(level_dimensions(256, 129, 0), (256, 129));
        assert_eq!(level_dimensions(256, 129, 1), (128, 64));
        assert_eq!(level_dimensions(256, 129, 7), (2, 1));
        assert_eq!(level_dimensions(256, 129, 8), (1, 1));
        assert_eq!(level_dimensions(4, 4, 40), (1, 1));
    }

    #[test]
    fn test_full_chain_len() {
        assert_eq!(full_chain_len(64, 64), 7);
        assert_eq!(full_chain_len(256, 129), 8);
        assert_eq!(full_chain_len(1, 1), 1);
        assert_eq!(full_chain_len(0, 8), 1);
    }

    #[test]
    fn test_pyramid_push_checks_geometry() {
        let mut pyramid = MipPyramid::new(level(8, 4));
        pyramid.push(level(4, 2)).unwrap();

        match pyramid.push(level(1, 1)) {
            Err(Error::LevelGeometry { level, expected, actual }) => {
                assert_eq!(level, 2);
                assert_eq!(expected, (2, 1));
                assert_eq!(actual, (1, 1));
            }
            other => panic!("expected geometry error, got {:?}", other),
        }
        assert_eq!(pyramid.len(), 2);
    }

    #[test]
    fn test_pyramid_from_levels() {
        let pyramid = MipPyramid::from_levels(vec![level(4, 4), level(2, 2), level(1, 1)]).unwrap();
        assert_eq!(pyramid.len(), 3);
        assert_eq!(pyramid.data_size(), 32 + 8 + 2);
        assert_eq!(pyramid.last().dimensions(), (1, 1));

        assert!(MipPyramid::from_levels(Vec::new()).is_err());
    }

    #[test]
    fn test_truncate_to_base() {
        let mut pyramid = MipPyramid::from_levels(vec![level(4, 4), level(2, 2)]).unwrap();
        assert_eq!(pyramid.truncate_to_base(), 1);
        assert_eq!(pyramid.len(), 1);
        assert_eq!(pyramid.truncate_to_base(), 0);
        assert_eq!(pyramid.base().dimensions(), (4, 4));
    }

    #[test]
    fn test_image_size_power_of_two() {
        assert!(ImageSize::new(256, 64).is_ok());
        assert!(matches!(
            ImageSize::new(100, 64),
            Err(Error::NotPowerOfTwo { axis: "width", value: 100 })
        ));
        assert!(matches!(
            ImageSize::new(64, 3),
            Err(Error::NotPowerOfTwo { axis: "height", value: 3 })
        ));

        let clamped = ImageSize::new(0, 0).unwrap();
        assert_eq!((clamped.width, clamped.height), (1, 1));
    }

    #[test]
    fn test_image_size_ops() {
        let size = ImageSize::new(8, 2).unwrap();
        assert_eq!(size / 2, ImageSize::new(4, 1).unwrap());
        assert_eq!(size / 4, ImageSize::new(2, 1).unwrap());
        assert_eq!((size * 2).unwrap(), ImageSize::new(16, 4).unwrap());
        assert!((size * 3).is_err());
    }

    #[test]
    fn test_image_size_strings() {
        let size: ImageSize = "512x256".parse().unwrap();
        assert_eq!(size.to_string(), "512x256");

        assert!("512".parse::<ImageSize>().is_err());
        assert!("axb".parse::<ImageSize>().is_err());
        assert!("300x256".parse::<ImageSize>().is_err());
    }

    #[test]
    fn test_image_size_cmp_area() {
        let wide = ImageSize::new(16, 4).unwrap();
        let square = ImageSize::new(8, 8).unwrap();
        let small = ImageSize::new(4, 4).unwrap();

        assert_eq!(wide.cmp_area(&square), Ordering::Equal);
        assert_ne!(wide, square);
        assert_eq!(small.cmp_area(&square), Ordering::Less);
        assert_eq!(square.cmp_area(&small), Ordering::Greater);
    }
}
