//! DDS header structures.

use std::io::{self, Read, Write};

use bitflags::bitflags;
use byteorder::{LittleEndian, WriteBytesExt};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::reader::ReadExt;
use crate::{Error, Result, DDS_MAGIC};

bitflags! {
    /// Flags marking which header fields carry valid data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u32 {
        const CAPS = 0x1;
        const HEIGHT = 0x2;
        const WIDTH = 0x4;
        const PITCH = 0x8;
        const PIXELFORMAT = 0x1000;
        const MIPMAPCOUNT = 0x20000;
        const LINEARSIZE = 0x80000;
        const DEPTH = 0x800000;

        /// Fields every readable texture must declare.
        const REQUIRED = Self::CAPS.bits()
            | Self::HEIGHT.bits()
            | Self::WIDTH.bits()
            | Self::PIXELFORMAT.bits();
    }

    /// Surface complexity flags (`dwCaps`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Caps: u32 {
        /// More than one surface is stored.
        const COMPLEX = 0x8;
        const TEXTURE = 0x1000;
        const MIPMAP = 0x400000;
    }

    /// Pixel format flags (`ddspf.dwFlags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PixelFormatFlags: u32 {
        const ALPHAPIXELS = 0x1;
        const ALPHA = 0x2;
        const FOURCC = 0x4;
        const RGB = 0x40;
        const YUV = 0x200;
        const LUMINANCE = 0x20000;
        /// Signed (bump map dU/dV) data described by the bitmasks.
        const BUMPDUDV = 0x80000;
    }
}

/// DDS file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsHeader {
    /// Header size (should be 124).
    pub size: u32,
    /// Header flags.
    pub flags: u32,
    /// Image height.
    pub height: u32,
    /// Image width.
    pub width: u32,
    /// Pitch or linear size.
    pub pitch_or_linear_size: u32,
    /// Depth (for volume textures).
    pub depth: u32,
    /// Number of mipmap levels.
    pub mipmap_count: u32,
    /// Reserved.
    pub reserved1: [u32; 11],
    /// Pixel format.
    pub pixel_format: DdsPixelFormat,
    /// Surface capabilities.
    pub caps: u32,
    /// Surface capabilities 2.
    pub caps2: u32,
    /// Surface capabilities 3.
    pub caps3: u32,
    /// Surface capabilities 4.
    pub caps4: u32,
    /// Reserved.
    pub reserved2: u32,
}

impl DdsHeader {
    /// Expected header size.
    pub const SIZE: u32 = 124;

    /// Build the header written in front of a V8U8 mip chain.
    ///
    /// A `mip_count` of zero describes a texture without a mip chain; the
    /// stored count is clamped to at least one either way.
    pub fn v8u8(mip_count: u32, height: u32, width: u32) -> Self {
        let mut flags = HeaderFlags::REQUIRED;
        let mut caps = Caps::TEXTURE;
        if mip_count != 0 {
            flags |= HeaderFlags::MIPMAPCOUNT;
            caps |= Caps::MIPMAP;
        }

        Self {
            size: Self::SIZE,
            flags: flags.bits(),
            height,
            width,
            pitch_or_linear_size: 0,
            depth: 0,
            mipmap_count: mip_count.max(1),
            reserved1: [0; 11],
            pixel_format: DdsPixelFormat::v8u8(),
            caps: caps.bits(),
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }

    /// Build the header for a block-compressed surface named by `four_cc`.
    ///
    /// `linear_size` is the byte size of the top level. `mip_count` follows
    /// the same convention as [`DdsHeader::v8u8`].
    pub fn block_compressed(
        four_cc: FourCC,
        mip_count: u32,
        height: u32,
        width: u32,
        linear_size: u32,
    ) -> Self {
        let mut flags = HeaderFlags::REQUIRED | HeaderFlags::LINEARSIZE;
        let mut caps = Caps::TEXTURE;
        if mip_count != 0 {
            flags |= HeaderFlags::MIPMAPCOUNT;
            caps |= Caps::MIPMAP;
        }

        Self {
            flags: flags.bits(),
            pitch_or_linear_size: linear_size,
            pixel_format: DdsPixelFormat::four_cc(four_cc),
            caps: caps.bits(),
            ..Self::v8u8(mip_count, height, width)
        }
    }

    /// Header flags as a typed set. Unknown bits are retained.
    pub fn header_flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.flags)
    }

    /// Surface caps as a typed set.
    pub fn surface_caps(&self) -> Caps {
        Caps::from_bits_retain(self.caps)
    }

    /// Check if this is a DX10 extended header.
    pub fn is_dx10(&self) -> bool {
        self.pixel_format.pixel_flags().contains(PixelFormatFlags::FOURCC)
            && self.pixel_format.four_cc == FourCC::DX10
    }

    /// Number of mip levels stored after the header.
    ///
    /// The count field only counts when the header says it is valid.
    pub fn mip_levels(&self) -> u32 {
        if self.header_flags().contains(HeaderFlags::MIPMAPCOUNT) {
            self.mipmap_count.max(1)
        } else {
            1
        }
    }

    /// Check the structure size fields.
    pub fn validate(&self) -> Result<()> {
        let size = self.size;
        if size != Self::SIZE {
            return Err(Error::InvalidHeader(format!(
                "header size {} (expected {})",
                size,
                Self::SIZE
            )));
        }
        let pf_size = self.pixel_format.size;
        if pf_size != DdsPixelFormat::SIZE {
            return Err(Error::InvalidHeader(format!(
                "pixel format size {} (expected {})",
                pf_size,
                DdsPixelFormat::SIZE
            )));
        }
        Ok(())
    }
}

/// DDS pixel format.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsPixelFormat {
    /// Structure size (should be 32).
    pub size: u32,
    /// Pixel format flags.
    pub flags: u32,
    /// Four-character code for compression.
    pub four_cc: FourCC,
    /// Number of bits per pixel (for uncompressed).
    pub rgb_bit_count: u32,
    /// Red bit mask.
    pub r_bit_mask: u32,
    /// Green bit mask.
    pub g_bit_mask: u32,
    /// Blue bit mask.
    pub b_bit_mask: u32,
    /// Alpha bit mask.
    pub a_bit_mask: u32,
}

impl DdsPixelFormat {
    /// Expected structure size.
    pub const SIZE: u32 = 32;

    /// The V8U8 layout: 16 bits, U in the low byte, V in the high byte.
    ///
    /// Identified by bitmasks alone, the fourCC stays zeroed.
    pub fn v8u8() -> Self {
        Self {
            size: Self::SIZE,
            flags: PixelFormatFlags::BUMPDUDV.bits(),
            four_cc: FourCC::NONE,
            rgb_bit_count: 16,
            r_bit_mask: 0x0000_00FF,
            g_bit_mask: 0x0000_FF00,
            b_bit_mask: 0,
            a_bit_mask: 0,
        }
    }

    /// A compressed layout identified only by its fourCC.
    pub fn four_cc(code: FourCC) -> Self {
        Self {
            size: Self::SIZE,
            flags: PixelFormatFlags::FOURCC.bits(),
            four_cc: code,
            rgb_bit_count: 0,
            r_bit_mask: 0,
            g_bit_mask: 0,
            b_bit_mask: 0,
            a_bit_mask: 0,
        }
    }

    /// Pixel format flags as a typed set. Unknown bits are retained.
    pub fn pixel_flags(&self) -> PixelFormatFlags {
        PixelFormatFlags::from_bits_retain(self.flags)
    }
}

/// Four-character code for compression type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// No code present.
    pub const NONE: Self = Self([0; 4]);
    /// DXT1 compression.
    pub const DXT1: Self = Self(*b"DXT1");
    /// DXT3 compression.
    pub const DXT3: Self = Self(*b"DXT3");
    /// DXT5 compression.
    pub const DXT5: Self = Self(*b"DXT5");
    /// ATI2 (3Dc) two-channel compression.
    pub const ATI2: Self = Self(*b"ATI2");
    /// DX10 extended header.
    pub const DX10: Self = Self(*b"DX10");

    /// The code as the little-endian integer stored on disk.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

/// Read the magic and the 124-byte header from a stream.
///
/// Consumes exactly 128 bytes on success.
pub fn read_header<R: Read>(reader: &mut R) -> Result<DdsHeader> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| truncated(e, "magic"))?;
    if &magic != DDS_MAGIC {
        return Err(Error::InvalidMagic(magic));
    }

    reader
        .read_struct::<DdsHeader>()
        .map_err(|e| truncated(e, "header"))
}

/// A stream ending inside the header is a malformed file, not an I/O failure.
fn truncated(e: io::Error, what: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::InvalidHeader(format!("truncated {}", what))
    } else {
        Error::Io(e)
    }
}

/// Write the magic and every header field in declaration order.
///
/// The full 128-byte block is always emitted; reserved words are written as zero.
pub fn write_header<W: Write>(header: &DdsHeader, writer: &mut W) -> Result<()> {
    writer.write_all(DDS_MAGIC)?;

    writer.write_u32::<LittleEndian>(header.size)?;
    writer.write_u32::<LittleEndian>(header.flags)?;
    writer.write_u32::<LittleEndian>(header.height)?;
    writer.write_u32::<LittleEndian>(header.width)?;
    writer.write_u32::<LittleEndian>(header.pitch_or_linear_size)?;
    writer.write_u32::<LittleEndian>(header.depth)?;
    writer.write_u32::<LittleEndian>(header.mipmap_count)?;
    for _ in 0..11 {
        writer.write_u32::<LittleEndian>(0)?;
    }

    let pf = header.pixel_format;
    writer.write_u32::<LittleEndian>(pf.size)?;
    writer.write_u32::<LittleEndian>(pf.flags)?;
    writer.write_all(&pf.four_cc.0)?;
    writer.write_u32::<LittleEndian>(pf.rgb_bit_count)?;
    writer.write_u32::<LittleEndian>(pf.r_bit_mask)?;
    writer.write_u32::<LittleEndian>(pf.g_bit_mask)?;
    writer.write_u32::<LittleEndian>(pf.b_bit_mask)?;
    writer.write_u32::<LittleEndian>(pf.a_bit_mask)?;

    writer.write_u32::<LittleEndian>(header.caps)?;
    writer.write_u32::<LittleEndian>(header.caps2)?;
    writer.write_u32::<LittleEndian>(header.caps3)?;
    writer.write_u32::<LittleEndian>(header.caps4)?;
    writer.write_u32::<LittleEndian>(0)?;

    Ok(())
}
