//! The image type callers work with, dispatching to the V8U8 or codec path.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use dudv_dds::{is_v8u8, is_v8u8_bytes};

use crate::codec::ImageMetadata;
use crate::display::DisplayBuffer;
use crate::settings::{ImageType, SaveOptions, SurfaceFormat};
use crate::standard::StandardImage;
use crate::v8u8::V8U8Image;
use crate::{Error, Result};

/// Result of a conversion that wrote its output.
///
/// `mip_error` is set when the requested mip adjustment failed and the
/// image was saved with the levels it already had.
#[derive(Debug, Default)]
pub struct ConvertOutcome {
    pub mip_error: Option<Error>,
}

impl ConvertOutcome {
    pub fn complete() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.mip_error.is_none()
    }
}

/// A loaded image of either kind.
#[derive(Debug)]
pub enum Image {
    Standard(StandardImage),
    V8U8(V8U8Image),
}

impl Image {
    /// Load a file, picking the V8U8 path when the header says so.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut image = Self::from_bytes(&data)?;
        match &mut image {
            Image::Standard(img) => img.set_path(path.to_path_buf()),
            Image::V8U8(img) => img.set_path(path.to_path_buf()),
        }
        Ok(image)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if is_v8u8_bytes(data) {
            Ok(Image::V8U8(V8U8Image::from_bytes(data)?))
        } else {
            Ok(Image::Standard(StandardImage::from_bytes(data)?))
        }
    }

    /// Load from the current position of a seekable stream.
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        if is_v8u8(reader) {
            return Ok(Image::V8U8(V8U8Image::from_reader(reader)?));
        }

        let start = reader.stream_position()?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        match StandardImage::from_bytes(&data) {
            Ok(img) => Ok(Image::Standard(img)),
            Err(e) => {
                reader.seek(SeekFrom::Start(start))?;
                Err(e)
            }
        }
    }

    pub fn is_v8u8(&self) -> bool {
        matches!(self, Image::V8U8(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Image::Standard(img) => img.path(),
            Image::V8U8(img) => img.path(),
        }
    }

    pub fn metadata(&self) -> ImageMetadata {
        match self {
            Image::Standard(img) => img.metadata().clone(),
            Image::V8U8(img) => img.metadata(),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Image::Standard(img) => img.metadata().width,
            Image::V8U8(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Image::Standard(img) => img.metadata().height,
            Image::V8U8(img) => img.height(),
        }
    }

    pub fn mips(&self) -> usize {
        match self {
            Image::Standard(img) => img.metadata().mip_count as usize,
            Image::V8U8(img) => img.mips(),
        }
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        match self {
            Image::Standard(img) => img.metadata().surface_format,
            Image::V8U8(_) => SurfaceFormat::V8U8,
        }
    }

    /// Top level as 32-bit BGRA.
    pub fn to_display(&self) -> Result<DisplayBuffer> {
        match self {
            Image::Standard(img) => img.to_display(),
            Image::V8U8(img) => Ok(img.to_display()),
        }
    }

    /// Top level as 32-bit BGRA, nearest-sampled to `size` when given.
    pub fn to_display_sized(&self, size: Option<(u32, u32)>) -> Result<DisplayBuffer> {
        match self {
            Image::Standard(img) => img.to_display_sized(size),
            Image::V8U8(img) => img.to_display_sized(size),
        }
    }

    pub fn to_bytes(&self, image_type: ImageType, quality: u8) -> Result<Vec<u8>> {
        match self {
            Image::Standard(img) => img.to_bytes(image_type, quality),
            Image::V8U8(img) => img.to_bytes(image_type, quality),
        }
    }

    /// Encode a copy scaled to `size`; without a size this is `to_bytes`.
    pub fn to_bytes_sized(
        &self,
        image_type: ImageType,
        quality: u8,
        size: Option<(u32, u32)>,
    ) -> Result<Vec<u8>> {
        match self {
            Image::Standard(img) => img.to_bytes_sized(image_type, quality, size),
            Image::V8U8(img) => img.to_bytes_sized(image_type, quality, size),
        }
    }

    pub fn build_mipmaps(&mut self, rebuild: bool) -> Result<()> {
        match self {
            Image::Standard(img) => img.build_mipmaps(rebuild),
            Image::V8U8(img) => img.build_mipmaps(rebuild),
        }
    }

    pub fn remove_mipmaps(&mut self, force: bool) -> Result<()> {
        match self {
            Image::Standard(img) => img.remove_mipmaps(force),
            Image::V8U8(img) => img.remove_mipmaps(force),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        match self {
            Image::Standard(img) => img.resize(width, height),
            Image::V8U8(img) => img.resize(width, height),
        }
    }

    pub fn convert_and_save<W: Write>(
        &mut self,
        writer: &mut W,
        opts: &SaveOptions,
    ) -> Result<ConvertOutcome> {
        match self {
            Image::Standard(img) => img.convert_and_save(writer, opts),
            Image::V8U8(img) => img.convert_and_save(writer, opts),
        }
    }

    /// Convert into a file at `path`, replacing it if present.
    ///
    /// The output is encoded in memory first; a failed conversion leaves any
    /// existing file untouched.
    pub fn convert_and_save_to_path<P: AsRef<Path>>(
        &mut self,
        path: P,
        opts: &SaveOptions,
    ) -> Result<ConvertOutcome> {
        let mut encoded = Vec::new();
        let outcome = self.convert_and_save(&mut encoded, opts)?;
        std::fs::write(path.as_ref(), &encoded)?;
        Ok(outcome)
    }
}
