//! Pixel format classification and lightweight header previews.

use std::io::{Read, Seek, SeekFrom};

use crate::header::{read_header, DdsPixelFormat, FourCC, HeaderFlags, PixelFormatFlags};
use crate::{Error, Result};

/// Surface encodings recognised in a DDS pixel format block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FormatKind {
    Dxt1,
    Dxt3,
    Dxt5,
    /// Two-channel 3Dc / BC5.
    Ati2,
    A8R8G8B8,
    R8G8B8,
    /// Signed two-channel bump map.
    V8U8,
    /// 8-bit luminance.
    G8,
    Unknown,
}

impl FormatKind {
    /// Storage size of one pixel, in bits.
    ///
    /// Block-compressed formats report their average rate.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            FormatKind::Dxt1 => 4,
            FormatKind::Dxt3 | FormatKind::Dxt5 | FormatKind::Ati2 => 8,
            FormatKind::V8U8 => 16,
            FormatKind::A8R8G8B8 => 32,
            FormatKind::R8G8B8 => 24,
            FormatKind::G8 | FormatKind::Unknown => 8,
        }
    }

    /// Whether the format is stored in 4x4 blocks.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            FormatKind::Dxt1 | FormatKind::Dxt3 | FormatKind::Dxt5 | FormatKind::Ati2
        )
    }

    /// Size in bytes of a single `width` x `height` surface.
    pub fn surface_size(self, width: u32, height: u32) -> u64 {
        let (w, h) = if self.is_compressed() {
            (width.max(4) as u64, height.max(4) as u64)
        } else {
            (width as u64, height as u64)
        };
        w * h * self.bits_per_pixel() as u64 / 8
    }
}

/// Classify a pixel format block. First matching rule wins.
///
/// fourCC codes are consulted only when the fourCC flag is set, so a V8U8
/// bitmask signature is recognised whatever the fourCC field holds.
pub fn classify(pf: &DdsPixelFormat) -> Result<FormatKind> {
    let flags = pf.pixel_flags();
    let bit_count = pf.rgb_bit_count;
    let (r, g, b, a) = (pf.r_bit_mask, pf.g_bit_mask, pf.b_bit_mask, pf.a_bit_mask);

    if flags.contains(PixelFormatFlags::FOURCC) {
        let four_cc = pf.four_cc;
        return match four_cc {
            FourCC::DXT1 => Ok(FormatKind::Dxt1),
            FourCC::DXT3 => Ok(FormatKind::Dxt3),
            FourCC::DXT5 => Ok(FormatKind::Dxt5),
            FourCC::ATI2 => Ok(FormatKind::Ati2),
            FourCC::DX10 => Err(Error::Dx10Unsupported),
            other => Err(Error::UnknownFourCC(other.0)),
        };
    }

    if flags.contains(PixelFormatFlags::RGB) {
        if r == 0xFF_0000 && g == 0xFF00 && b == 0xFF {
            let alpha = flags.contains(PixelFormatFlags::ALPHAPIXELS);
            if alpha && a == 0xFF00_0000 && bit_count == 32 {
                return Ok(FormatKind::A8R8G8B8);
            }
            if !alpha && bit_count == 24 {
                return Ok(FormatKind::R8G8B8);
            }
        }
    } else if flags.contains(PixelFormatFlags::BUMPDUDV) && bit_count == 16 && r == 0xFF && g == 0xFF00 {
        return Ok(FormatKind::V8U8);
    } else if flags.contains(PixelFormatFlags::LUMINANCE) && bit_count == 8 && r == 0xFF {
        return Ok(FormatKind::G8);
    }

    Err(Error::UnknownPixelFormat {
        flags: flags.bits(),
        bit_count,
    })
}

/// Header summary read without touching any mip data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DdsPreview {
    pub width: u32,
    pub height: u32,
    /// Raw mip count field.
    pub mip_count: u32,
    /// Whether the mip count field is flagged as valid.
    pub has_mips: bool,
    pub format: FormatKind,
}

impl DdsPreview {
    /// Read and classify a DDS header.
    ///
    /// Stricter than a full load on the flags: CAPS, HEIGHT, WIDTH and
    /// PIXELFORMAT must all be declared. DX10 headers are rejected.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = read_header(reader)?;
        let size = header.size;
        if size != crate::DdsHeader::SIZE {
            return Err(Error::InvalidHeader(format!("header size {}", size)));
        }

        let flags = header.header_flags();
        if !flags.contains(HeaderFlags::REQUIRED) {
            return Err(Error::InvalidHeader(format!("flags {:#x}", flags.bits())));
        }

        let format = classify(&header.pixel_format)?;

        Ok(Self {
            width: header.width,
            height: header.height,
            mip_count: header.mipmap_count,
            has_mips: flags.contains(HeaderFlags::MIPMAPCOUNT),
            format,
        })
    }

    /// Read a preview from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(&mut &data[..])
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.format.bits_per_pixel()
    }

    pub fn is_compressed(&self) -> bool {
        self.format.is_compressed()
    }

    /// Size of the top-level surface in bytes.
    pub fn top_level_size(&self) -> u64 {
        self.format.surface_size(self.width, self.height)
    }

    /// Total bytes of a full chain from the top level down to 1x1.
    ///
    /// Each dimension halves on its own until it reaches 1.
    pub fn mip_chain_size(&self) -> u64 {
        let (mut w, mut h) = (self.width.max(1), self.height.max(1));
        let mut total = 0;
        loop {
            total += self.format.surface_size(w, h);
            if w == 1 && h == 1 {
                return total;
            }
            if w != 1 {
                w /= 2;
            }
            if h != 1 {
                h /= 2;
            }
        }
    }
}

/// Check whether a stream holds a V8U8 DDS.
///
/// Only the header is read and the stream position is restored afterwards.
/// Any parse failure reports `false`.
pub fn is_v8u8<R: Read + Seek>(reader: &mut R) -> bool {
    let start = match reader.stream_position() {
        Ok(pos) => pos,
        Err(_) => return false,
    };

    let result = DdsPreview::read(reader);
    if reader.seek(SeekFrom::Start(start)).is_err() {
        return false;
    }

    match result {
        Ok(preview) => preview.format == FormatKind::V8U8,
        Err(e) => {
            log::debug!("not a V8U8 DDS: {}", e);
            false
        }
    }
}

/// Check whether a byte buffer holds a V8U8 DDS.
pub fn is_v8u8_bytes(data: &[u8]) -> bool {
    is_v8u8(&mut std::io::Cursor::new(data))
}
