//! Mip chain generation by stride-2 decimation.

use crate::mip::{full_chain_len, MipLevel, MipPyramid, BYTES_PER_PIXEL};
use crate::Result;

/// What to do with the mip chain before writing a V8U8 file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MipMapMode {
    /// Generate the missing levels if the chain is incomplete.
    #[default]
    BuildAll,
    /// Drop everything but the base and regenerate.
    Rebuild,
    /// Keep only the base level.
    RemoveAllButOne,
    /// Same truncation as `RemoveAllButOne`; the base is always kept.
    ForceRemove,
    /// Leave the chain as is.
    None,
}

/// Produce the next level of the chain from `src`.
///
/// Output is `(w / 2, h / 2)` where each pixel copies the source pixel at
/// `(2x, 2y)` unchanged. No averaging happens.
pub fn decimate(src: &MipLevel) -> Result<MipLevel> {
    let (w, h) = src.dimensions();
    let (nw, nh) = (w / 2, h / 2);
    let src_stride = w as usize * BYTES_PER_PIXEL;
    let data = src.data();

    let mut out = Vec::with_capacity(nw as usize * nh as usize * BYTES_PER_PIXEL);
    for y in 0..nh as usize {
        let row = &data[2 * y * src_stride..];
        for x in 0..nw as usize {
            let offset = 2 * x * BYTES_PER_PIXEL;
            out.extend_from_slice(&row[offset..offset + BYTES_PER_PIXEL]);
        }
    }

    MipLevel::new(out, nw, nh)
}

/// Extend a pyramid from its smallest level until either dimension reaches 1.
///
/// Returns the number of levels appended.
pub fn append_levels(pyramid: &mut MipPyramid) -> Result<usize> {
    let mut added = 0;
    while pyramid.last().width() > 1 && pyramid.last().height() > 1 {
        let next = decimate(pyramid.last())?;
        pyramid.push(next)?;
        added += 1;
    }
    Ok(added)
}

/// Build a complete pyramid from a full-resolution level.
pub fn build_pyramid(base: MipLevel) -> Result<MipPyramid> {
    let (w, h) = base.dimensions();
    log::debug!("building V8U8 mips from {} x {}", w, h);

    let mut pyramid = MipPyramid::new(base);
    append_levels(&mut pyramid)?;
    Ok(pyramid)
}

/// Apply a [`MipMapMode`] to a pyramid in place.
pub fn apply_mip_mode(pyramid: &mut MipPyramid, mode: MipMapMode) -> Result<()> {
    match mode {
        MipMapMode::BuildAll => {
            let (w, h) = pyramid.base().dimensions();
            if pyramid.len() < full_chain_len(w, h) {
                append_levels(pyramid)?;
            }
        }
        MipMapMode::Rebuild => {
            pyramid.truncate_to_base();
            append_levels(pyramid)?;
        }
        MipMapMode::RemoveAllButOne | MipMapMode::ForceRemove => {
            pyramid.truncate_to_base();
        }
        MipMapMode::None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mip::level_size;

    /// Level whose texel at (x, y) is (x, y) as signed bytes.
    fn coordinate_level(w: u32, h: u32) -> MipLevel {
        let mut data = Vec::with_capacity(level_size(w, h));
        for y in 0..h {
            for x in 0..w {
                data.push(x as u8);
                data.push(y as u8);
            }
        }
        MipLevel::new(data, w, h).unwrap()
    }

    #[test]
    fn test_decimate_samples_even_coordinates() {
        let src = coordinate_level(4, 4);
        let next = decimate(&src).unwrap();

        assert_eq!(next.dimensions(), (2, 2));
        assert_eq!(next.texel(0, 0), Some((0, 0)));
        assert_eq!(next.texel(1, 0), Some((2, 0)));
        assert_eq!(next.texel(0, 1), Some((0, 2)));
        assert_eq!(next.texel(1, 1), Some((2, 2)));
    }

    #[test]
    fn test_decimate_does_not_average() {
        let data = vec![
            10, 20, 100, 100, //
            100, 100, 100, 100,
        ];
        let src = MipLevel::new(data, 2, 2).unwrap();
        let next = decimate(&src).unwrap();
        assert_eq!(next.data(), &[10, 20]);
    }

    #[test]
    fn test_decimate_odd_dimensions() {
        let next = decimate(&coordinate_level(5, 3)).unwrap();
        assert_eq!(next.dimensions(), (2, 1));
        assert_eq!(next.texel(0, 0), Some((0, 0)));
        assert_eq!(next.texel(1, 0), Some((2, 0)));
    }

    #[test]
    fn test_build_square_pyramid() {
        let pyramid = build_pyramid(coordinate_level(64, 64)).unwrap();
        let sizes: Vec<_> = pyramid.iter().map(|l| l.dimensions()).collect();
        assert_eq!(
            sizes,
            vec![(64, 64), (32, 32), (16, 16), (8, 8), (4, 4), (2, 2), (1, 1)]
        );
        assert_eq!(pyramid.len(), full_chain_len(64, 64));
    }

    #[test]
    fn test_build_stops_when_height_reaches_one() {
        let pyramid = build_pyramid(coordinate_level(256, 129)).unwrap();
        let widths: Vec<_> = pyramid.iter().map(|l| l.width()).collect();
        let heights: Vec<_> = pyramid.iter().map(|l| l.height()).collect();

        assert_eq!(widths, vec![256, 128, 64, 32, 16, 8, 4, 2]);
        assert_eq!(heights, vec![129, 64, 32, 16, 8, 4, 2, 1]);
        assert_eq!(pyramid.len(), full_chain_len(256, 129));
    }

    #[test]
    fn test_build_single_pixel_row() {
        let pyramid = build_pyramid(coordinate_level(16, 1)).unwrap();
        assert_eq!(pyramid.len(), 1);
    }

    #[test]
    fn test_deep_level_matches_direct_sampling() {
        let pyramid = build_pyramid(coordinate_level(16, 16)).unwrap();
        let level2 = pyramid.get(2).unwrap();
        assert_eq!(level2.dimensions(), (4, 4));
        assert_eq!(level2.texel(3, 1), Some((12, 4)));
    }

    #[test]
    fn test_append_levels_continues_existing_chain() {
        let base = coordinate_level(8, 8);
        let mut partial = MipPyramid::new(base.clone());
        partial.push(decimate(&base).unwrap()).unwrap();

        assert_eq!(append_levels(&mut partial).unwrap(), 2);
        assert_eq!(partial, build_pyramid(base).unwrap());
    }

    #[test]
    fn test_apply_build_all() {
        let mut pyramid = MipPyramid::new(coordinate_level(8, 8));
        apply_mip_mode(&mut pyramid, MipMapMode::BuildAll).unwrap();
        assert_eq!(pyramid.len(), 4);

        // Already complete: untouched.
        let before = pyramid.clone();
        apply_mip_mode(&mut pyramid, MipMapMode::BuildAll).unwrap();
        assert_eq!(pyramid, before);
    }

    #[test]
    fn test_apply_rebuild_and_remove() {
        let mut pyramid = build_pyramid(coordinate_level(8, 4)).unwrap();
        assert_eq!(pyramid.len(), 3);

        apply_mip_mode(&mut pyramid, MipMapMode::Rebuild).unwrap();
        assert_eq!(pyramid.len(), 3);

        apply_mip_mode(&mut pyramid, MipMapMode::RemoveAllButOne).unwrap();
        assert_eq!(pyramid.len(), 1);

        apply_mip_mode(&mut pyramid, MipMapMode::None).unwrap();
        assert_eq!(pyramid.len(), 1);

        let mut forced = build_pyramid(coordinate_level(8, 4)).unwrap();
        apply_mip_mode(&mut forced, MipMapMode::ForceRemove).unwrap();
        assert_eq!(forced.len(), 1);
        assert_eq!(forced.base().dimensions(), (8, 4));
    }
}
