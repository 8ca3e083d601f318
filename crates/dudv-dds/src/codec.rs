//! Reading and writing complete V8U8 DDS streams.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::format::{classify, FormatKind};
use crate::header::{read_header, write_header, DdsHeader};
use crate::mip::{level_dimensions, MipLevel, MipPyramid};
use crate::reader::ReadExt;
use crate::{Error, Result};

/// A V8U8 texture as stored in a DDS container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V8U8Dds {
    /// Base width from the header.
    pub width: u32,
    /// Base height from the header.
    pub height: u32,
    pub pyramid: MipPyramid,
}

impl V8U8Dds {
    /// Wrap a pyramid, taking the base size from its first level.
    pub fn new(pyramid: MipPyramid) -> Self {
        let (width, height) = pyramid.base().dimensions();
        Self {
            width,
            height,
            pyramid,
        }
    }

    /// Parse a V8U8 DDS from a stream positioned at the magic.
    ///
    /// Levels follow the header back to back, finest first. A stream that
    /// ends before the declared chain is complete is rejected.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = read_header(reader)?;
        header.validate()?;

        if header.is_dx10() {
            return Err(Error::Dx10Unsupported);
        }
        let format = classify(&header.pixel_format)?;
        if format != FormatKind::V8U8 {
            return Err(Error::Unsupported {
                expected: FormatKind::V8U8,
                found: format,
            });
        }

        let (width, height) = (header.width, header.height);
        if width == 0 || height == 0 {
            return Err(Error::InvalidHeader(format!(
                "zero-sized surface {}x{}",
                width, height
            )));
        }

        let mip_count = header.mip_levels();
        let max_levels = width.max(height).ilog2() + 1;
        if mip_count > max_levels {
            return Err(Error::InvalidHeader(format!(
                "{} mip levels declared for a {}x{} surface (at most {})",
                mip_count, width, height, max_levels
            )));
        }

        log::debug!("reading V8U8 {}x{} with {} mip levels", width, height, mip_count);

        let mut levels = Vec::with_capacity(mip_count as usize);
        for i in 0..mip_count {
            let (w, h) = level_dimensions(width, height, i);
            let expected = checked_level_size(w, h)?;

            let data = reader.read_up_to(expected)?;
            if data.len() < expected {
                return Err(Error::CorruptData {
                    level: i as usize,
                    expected,
                    available: data.len(),
                });
            }
            levels.push(MipLevel::new(data, w, h)?);
        }

        Ok(Self {
            width,
            height,
            pyramid: MipPyramid::from_levels(levels)?,
        })
    }

    /// Parse a V8U8 DDS held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(&mut &data[..])
    }

    /// Open and parse a V8U8 DDS file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(&mut BufReader::new(file))
    }

    /// The header describing this texture's current pyramid.
    ///
    /// A single-level pyramid is written without the mip count flag.
    pub fn header(&self) -> DdsHeader {
        let mips = if self.pyramid.len() > 1 {
            self.pyramid.len() as u32
        } else {
            0
        };
        DdsHeader::v8u8(mips, self.height, self.width)
    }

    /// Write the header followed by every level's raw bytes, finest first.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_header(&self.header(), writer)?;
        for level in &self.pyramid {
            writer.write_all(level.data())?;
        }
        Ok(())
    }

    /// Serialize to an in-memory DDS file.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(128 + self.pyramid.data_size());
        self.write(&mut out)?;
        Ok(out)
    }

    /// Write the DDS to a file, replacing it if present.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn checked_level_size(width: u32, height: u32) -> Result<usize> {
    (width as u64)
        .checked_mul(height as u64)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::InvalidHeader(format!("surface {}x{} too large", width, height)))
}
