//! V8U8 normal maps, handled natively instead of through the codec service.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use dudv_dds::{
    apply_mip_mode, decode_to_display, MipLevel, MipMapMode, MipPyramid, V8U8Dds, BYTES_PER_PIXEL,
};

use crate::codec::{CodecGateway, ImageMetadata};
use crate::display::{resample_nearest, DisplayBuffer};
use crate::image::ConvertOutcome;
use crate::settings::{ImageType, SaveOptions, SurfaceFormat};
use crate::{Error, Result};

/// A V8U8 DDS and its mip chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V8U8Image {
    path: Option<PathBuf>,
    dds: V8U8Dds,
}

impl V8U8Image {
    /// Load from a file. The path is kept for reference only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dds = V8U8Dds::open(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            dds,
        })
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self::from_dds(V8U8Dds::read(reader)?))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::from_dds(V8U8Dds::from_bytes(data)?))
    }

    pub fn from_dds(dds: V8U8Dds) -> Self {
        Self { path: None, dds }
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.dds.width
    }

    pub fn height(&self) -> u32 {
        self.dds.height
    }

    pub fn mips(&self) -> usize {
        self.dds.pyramid.len()
    }

    pub fn pyramid(&self) -> &MipPyramid {
        &self.dds.pyramid
    }

    pub fn dds(&self) -> &V8U8Dds {
        &self.dds
    }

    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            width: self.width(),
            height: self.height(),
            bits_per_pixel: (BYTES_PER_PIXEL * 8) as u32,
            channels: 2,
            surface_format: SurfaceFormat::V8U8,
            mip_count: self.mips() as u32,
        }
    }

    /// Decode the top level for display.
    pub fn to_display(&self) -> DisplayBuffer {
        let base = self.dds.pyramid.base();
        DisplayBuffer::from_bgra(base.width(), base.height(), decode_to_display(base))
    }

    /// Generate mips. With `rebuild`, existing levels are discarded first.
    pub fn build_mipmaps(&mut self, rebuild: bool) -> Result<()> {
        let mode = if rebuild {
            MipMapMode::Rebuild
        } else {
            MipMapMode::BuildAll
        };
        apply_mip_mode(&mut self.dds.pyramid, mode)?;
        Ok(())
    }

    /// Keep only the top level. `force` has no extra effect: one level always remains.
    pub fn remove_mipmaps(&mut self, force: bool) -> Result<()> {
        let mode = if force {
            MipMapMode::ForceRemove
        } else {
            MipMapMode::RemoveAllButOne
        };
        apply_mip_mode(&mut self.dds.pyramid, mode)?;
        Ok(())
    }

    /// Nearest-sample resize of the top level. Existing mips are dropped.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let base = self.dds.pyramid.base();
        let (sw, sh) = base.dimensions();
        let data = resample_nearest(base.data(), sw, sh, BYTES_PER_PIXEL, width, height)?;

        self.dds = V8U8Dds::new(MipPyramid::new(MipLevel::new(data, width, height)?));
        Ok(())
    }

    /// Encode as `image_type`. DDS keeps V8U8, anything else goes through the
    /// decoded display buffer.
    pub fn to_bytes(&self, image_type: ImageType, quality: u8) -> Result<Vec<u8>> {
        if image_type == ImageType::Dds {
            return Ok(self.dds.to_bytes()?);
        }
        self.encode_display(CodecGateway::global(), image_type, Some(quality), None)
    }

    /// Decoded top level, scaled to `size` when given.
    pub fn to_display_sized(&self, size: Option<(u32, u32)>) -> Result<DisplayBuffer> {
        self.to_display().fit(size)
    }

    /// Re-encode the decoded top level at `size`. The V8U8 data is not
    /// touched, so a DDS target gets the codec's surface encoding.
    pub fn to_bytes_sized(
        &self,
        image_type: ImageType,
        quality: u8,
        size: Option<(u32, u32)>,
    ) -> Result<Vec<u8>> {
        if size.is_none() {
            return self.to_bytes(image_type, quality);
        }
        self.encode_display(CodecGateway::global(), image_type, Some(quality), size)
    }

    /// Hand the decoded top level to the codec service for encoding.
    fn encode_display(
        &self,
        gateway: &CodecGateway,
        image_type: ImageType,
        jpeg_quality: Option<u8>,
        size: Option<(u32, u32)>,
    ) -> Result<Vec<u8>> {
        let display = self.to_display_sized(size)?;
        if let (ImageType::Jpg, Some(quality)) = (image_type, jpeg_quality) {
            gateway.set_jpeg_quality(quality);
        }
        gateway.encode_display(&display, image_type)
    }

    /// Convert and write to `writer`.
    ///
    /// A DDS target with no surface or a V8U8 surface keeps the mip chain and
    /// applies `opts.mip_mode` first; a mip failure is reported in the outcome
    /// and the save still goes ahead. Any other target re-encodes the decoded
    /// top level and ignores the chain; a DXT or ATI2 surface gets a freshly
    /// generated chain unless `opts.mip_mode` removes mips.
    pub fn convert_and_save<W: Write>(
        &mut self,
        writer: &mut W,
        opts: &SaveOptions,
    ) -> Result<ConvertOutcome> {
        self.convert_and_save_with(writer, opts, apply_mip_mode)
    }

    /// `convert_and_save` with the mip step supplied by the caller.
    pub(crate) fn convert_and_save_with<W, F>(
        &mut self,
        writer: &mut W,
        opts: &SaveOptions,
        adjust_mips: F,
    ) -> Result<ConvertOutcome>
    where
        W: Write,
        F: FnOnce(&mut MipPyramid, MipMapMode) -> dudv_dds::Result<()>,
    {
        if !opts.keeps_v8u8() {
            let gateway = CodecGateway::global();
            if opts.image_type == ImageType::Dds {
                gateway.set_dxt_format(opts.surface);
                gateway.set_dds_mipmaps(opts.builds_dds_mips(self.mips() as u32));
            }
            let quality = opts.set_jpeg_quality.then_some(opts.quality);
            let encoded = self.encode_display(gateway, opts.image_type, quality, None)?;
            writer.write_all(&encoded)?;
            return Ok(ConvertOutcome::complete());
        }

        let mut outcome = ConvertOutcome::complete();
        if let Err(e) = adjust_mips(&mut self.dds.pyramid, opts.mip_mode) {
            log::warn!(
                "mip adjustment {:?} failed, saving {} existing levels: {}",
                opts.mip_mode,
                self.mips(),
                e
            );
            outcome.mip_error = Some(e.into());
        }

        self.dds.write(writer)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use dudv_dds::level_size;

    use super::*;

    fn coordinate_image(w: u32, h: u32) -> V8U8Image {
        let mut data = Vec::with_capacity(level_size(w, h));
        for y in 0..h {
            for x in 0..w {
                data.push(x as u8);
                data.push(y as u8);
            }
        }
        let level = MipLevel::new(data, w, h).unwrap();
        V8U8Image::from_dds(V8U8Dds::new(MipPyramid::new(level)))
    }

    #[test]
    fn test_metadata() {
        let img = coordinate_image(8, 4);
        let meta = img.metadata();
        assert_eq!((meta.width, meta.height), (8, 4));
        assert_eq!(meta.bits_per_pixel, 16);
        assert_eq!(meta.surface_format, SurfaceFormat::V8U8);
        assert_eq!(meta.mip_count, 1);
        assert!(img.path().is_none());
    }

    #[test]
    fn test_build_and_remove_mipmaps() {
        let mut img = coordinate_image(16, 16);
        img.build_mipmaps(false).unwrap();
        assert_eq!(img.mips(), 5);

        img.remove_mipmaps(false).unwrap();
        assert_eq!(img.mips(), 1);

        img.build_mipmaps(true).unwrap();
        assert_eq!(img.mips(), 5);

        img.remove_mipmaps(true).unwrap();
        assert_eq!(img.mips(), 1);
    }

    #[test]
    fn test_to_display() {
        let img = coordinate_image(2, 2);
        let display = img.to_display();
        assert_eq!(display.pixels.len(), 16);
        assert_eq!(display.stride, 8);
        // (u, v) = (1, 1) at pixel (1, 1)
        assert_eq!(&display.pixels[12..16], &[0xFF, 0x80, 0x80, 0xFF]);
    }

    #[test]
    fn test_resize_nearest() {
        let mut img = coordinate_image(4, 4);
        img.build_mipmaps(false).unwrap();

        img.resize(2, 8).unwrap();
        assert_eq!((img.width(), img.height()), (2, 8));
        assert_eq!(img.mips(), 1);

        let base = img.pyramid().base();
        assert_eq!(base.texel(1, 0), Some((2, 0)));
        assert_eq!(base.texel(0, 7), Some((0, 3)));

        assert!(img.resize(0, 2).is_err());
    }

    #[test]
    fn test_convert_to_dds_builds_mips() {
        let mut img = coordinate_image(8, 8);
        let mut out = Vec::new();
        let outcome = img
            .convert_and_save(&mut out, &SaveOptions::new(ImageType::Dds))
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(img.mips(), 4);

        let reloaded = V8U8Image::from_reader(&mut Cursor::new(out)).unwrap();
        assert_eq!(reloaded.pyramid(), img.pyramid());
    }

    #[test]
    fn test_convert_to_dds_without_mips() {
        let mut img = coordinate_image(8, 8);
        img.build_mipmaps(false).unwrap();

        let opts = SaveOptions::new(ImageType::Dds)
            .surface(SurfaceFormat::V8U8)
            .mip_mode(MipMapMode::RemoveAllButOne);
        let mut out = Vec::new();
        img.convert_and_save(&mut out, &opts).unwrap();

        assert_eq!(out.len(), 128 + 8 * 8 * 2);
        assert_eq!(V8U8Image::from_bytes(&out).unwrap().mips(), 1);
    }

    #[test]
    fn test_convert_to_png() {
        let mut img = coordinate_image(4, 4);
        img.build_mipmaps(false).unwrap();

        let mut out = Vec::new();
        let outcome = img
            .convert_and_save(&mut out, &SaveOptions::new(ImageType::Png))
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(&out[1..4], b"PNG");

        // Pyramid isn't touched by a re-encode.
        assert_eq!(img.mips(), 3);
    }

    #[test]
    fn test_failed_mip_step_still_saves() {
        let mut img = coordinate_image(8, 8);
        img.build_mipmaps(false).unwrap();
        let levels = img.mips();

        let mut out = Vec::new();
        let opts = SaveOptions::new(ImageType::Dds).mip_mode(MipMapMode::Rebuild);
        let outcome = img
            .convert_and_save_with(&mut out, &opts, |_, _| {
                Err(dudv_dds::Error::MipmapSizeMismatch {
                    expected: 2,
                    actual: 0,
                })
            })
            .unwrap();

        assert!(outcome.mip_error.is_some());
        assert!(!outcome.is_complete());

        let reloaded = V8U8Image::from_bytes(&out).unwrap();
        assert_eq!(reloaded.mips(), levels);
        assert_eq!(reloaded.pyramid(), img.pyramid());
    }

    #[test]
    fn test_convert_to_dxt5() {
        let mut img = coordinate_image(8, 8);
        let opts = SaveOptions::new(ImageType::Dds)
            .surface(SurfaceFormat::Dxt5)
            .mip_mode(MipMapMode::RemoveAllButOne);
        let mut out = Vec::new();
        assert!(img.convert_and_save(&mut out, &opts).unwrap().is_complete());

        let preview = dudv_dds::DdsPreview::from_bytes(&out).unwrap();
        assert_eq!(preview.format, dudv_dds::FormatKind::Dxt5);
        assert_eq!((preview.width, preview.height), (8, 8));
        assert!(!dudv_dds::is_v8u8_bytes(&out));
        // The V8U8 chain is left alone.
        assert_eq!(img.mips(), 1);
    }

    #[test]
    fn test_sized_display_and_bytes() {
        let img = coordinate_image(4, 4);
        let display = img.to_display_sized(Some((8, 2))).unwrap();
        assert_eq!((display.width, display.height), (8, 2));
        assert_eq!(display.pixels.len(), 8 * 2 * 4);
        assert_eq!(img.to_display_sized(None).unwrap(), img.to_display());
        assert!(img.to_display_sized(Some((0, 4))).is_err());

        let png = img.to_bytes_sized(ImageType::Png, 100, Some((2, 2))).unwrap();
        let decoded = crate::StandardImage::from_bytes(&png).unwrap();
        assert_eq!((decoded.metadata().width, decoded.metadata().height), (2, 2));
        // Source dimensions are unchanged.
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[test]
    fn test_to_bytes_dds_matches_codec() {
        let img = coordinate_image(4, 2);
        assert_eq!(img.to_bytes(ImageType::Dds, 80).unwrap(), img.dds().to_bytes().unwrap());
    }
}
