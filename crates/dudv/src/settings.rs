//! Output formats, surface encodings and codec-wide settings.

use std::fmt;
use std::str::FromStr;

use dudv_dds::{FormatKind, MipMapMode};

use crate::Error;

/// Format names accepted by [`is_valid_format`].
pub const VALID_FORMATS: &[&str] = &[
    "DXT1", "DXT3", "DXT5", "3DC", "ATI2N", "V8U8", "JPG", "PNG", "BMP", "GIF",
];

/// Container format for saved images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ImageType {
    Bmp,
    Jpg,
    Png,
    Gif,
    Dds,
}

impl ImageType {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Bmp => "bmp",
            ImageType::Jpg => "jpg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Dds => "dds",
        }
    }

    /// Guess the type from a file extension, with or without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "bmp" => Some(ImageType::Bmp),
            "jpg" | "jpeg" => Some(ImageType::Jpg),
            "png" => Some(ImageType::Png),
            "gif" => Some(ImageType::Gif),
            "dds" => Some(ImageType::Dds),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::from_extension(s)
            .ok_or_else(|| Error::UnsupportedConversion(format!("unknown image type '{}'", s)))
    }
}

/// Surface encoding inside a DDS container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SurfaceFormat {
    /// Not a DDS surface, or left to the codec.
    #[default]
    None,
    Dxt1,
    Dxt3,
    Dxt5,
    /// 3Dc, also known as ATI2N.
    Ati2,
    V8U8,
    A8R8G8B8,
    R8G8B8,
    G8,
}

impl SurfaceFormat {
    /// Whether this names a DDS surface encoding.
    pub fn is_dds(self) -> bool {
        self != SurfaceFormat::None
    }

    /// Whether the surface is stored in 4x4 blocks.
    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            SurfaceFormat::Dxt1 | SurfaceFormat::Dxt3 | SurfaceFormat::Dxt5 | SurfaceFormat::Ati2
        )
    }
}

impl From<FormatKind> for SurfaceFormat {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Dxt1 => SurfaceFormat::Dxt1,
            FormatKind::Dxt3 => SurfaceFormat::Dxt3,
            FormatKind::Dxt5 => SurfaceFormat::Dxt5,
            FormatKind::Ati2 => SurfaceFormat::Ati2,
            FormatKind::A8R8G8B8 => SurfaceFormat::A8R8G8B8,
            FormatKind::R8G8B8 => SurfaceFormat::R8G8B8,
            FormatKind::V8U8 => SurfaceFormat::V8U8,
            FormatKind::G8 => SurfaceFormat::G8,
            FormatKind::Unknown => SurfaceFormat::None,
        }
    }
}

impl FromStr for SurfaceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(SurfaceFormat::None),
            "DXT1" => Ok(SurfaceFormat::Dxt1),
            "DXT3" => Ok(SurfaceFormat::Dxt3),
            "DXT5" => Ok(SurfaceFormat::Dxt5),
            "3DC" | "ATI2" | "ATI2N" => Ok(SurfaceFormat::Ati2),
            "V8U8" => Ok(SurfaceFormat::V8U8),
            "A8R8G8B8" => Ok(SurfaceFormat::A8R8G8B8),
            "R8G8B8" => Ok(SurfaceFormat::R8G8B8),
            "G8" => Ok(SurfaceFormat::G8),
            _ => Err(Error::UnsupportedConversion(format!(
                "unknown surface format '{}'",
                s
            ))),
        }
    }
}

/// Check a format name against [`VALID_FORMATS`], ignoring case.
pub fn is_valid_format(format: &str) -> bool {
    let upper = format.to_ascii_uppercase();
    VALID_FORMATS.contains(&upper.as_str())
}

/// Extension (with the dot) a file saved in `format` should carry.
///
/// DDS surface formats all map to `.DDS`. Returns `None` for unknown formats.
pub fn extension_for_format(format: &str) -> Option<String> {
    if !is_valid_format(format) {
        return None;
    }

    let upper = format.to_ascii_uppercase();
    if upper.contains("DXT") || upper == "3DC" || upper == "ATI2N" || upper == "V8U8" {
        Some(".DDS".to_string())
    } else if format.starts_with('.') {
        Some(format.to_string())
    } else {
        Some(format!(".{}", format))
    }
}

/// Process-wide codec state.
///
/// Held by the [`CodecGateway`](crate::CodecGateway); never mutate it
/// from more than one place at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecSettings {
    /// JPEG quality, 0-100.
    pub jpeg_quality: u8,
    /// Surface to compress to when saving a DDS.
    pub dxt_format: SurfaceFormat,
    /// Whether loaded DDS files keep their compressed surface format.
    pub keep_dxtc: bool,
    /// Generate a full mip chain when encoding a DDS.
    pub dds_mipmaps: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            dxt_format: SurfaceFormat::Dxt1,
            keep_dxtc: true,
            dds_mipmaps: true,
        }
    }
}

/// Options for [`Image::convert_and_save`](crate::Image::convert_and_save).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub image_type: ImageType,
    pub surface: SurfaceFormat,
    pub mip_mode: MipMapMode,
    pub quality: u8,
    /// Push `quality` into the codec settings before a JPEG save.
    pub set_jpeg_quality: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            image_type: ImageType::Jpg,
            surface: SurfaceFormat::None,
            mip_mode: MipMapMode::BuildAll,
            quality: 80,
            set_jpeg_quality: true,
        }
    }
}

impl SaveOptions {
    pub fn new(image_type: ImageType) -> Self {
        Self {
            image_type,
            ..Default::default()
        }
    }

    pub fn surface(mut self, surface: SurfaceFormat) -> Self {
        self.surface = surface;
        self
    }

    pub fn mip_mode(mut self, mode: MipMapMode) -> Self {
        self.mip_mode = mode;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(100);
        self
    }

    pub fn set_jpeg_quality(mut self, set: bool) -> Self {
        self.set_jpeg_quality = set;
        self
    }

    /// Whether these options ask for a V8U8 DDS rather than a re-encode.
    pub fn keeps_v8u8(&self) -> bool {
        self.image_type == ImageType::Dds
            && matches!(self.surface, SurfaceFormat::None | SurfaceFormat::V8U8)
    }

    /// Whether an encoded DDS should carry a generated mip chain. `None`
    /// follows the source: a chain is rebuilt only if the source had one.
    pub fn builds_dds_mips(&self, source_mips: u32) -> bool {
        match self.mip_mode {
            MipMapMode::BuildAll | MipMapMode::Rebuild => true,
            MipMapMode::RemoveAllButOne | MipMapMode::ForceRemove => false,
            MipMapMode::None => source_mips > 1,
        }
    }
}
