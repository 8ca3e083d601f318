//! DDS handling for V8U8 bump maps.
//!
//! V8U8 stores two signed bytes per pixel (tangent-space U and V) behind a
//! standard 128-byte DDS header. The pixel format is identified by bitmasks
//! rather than a fourCC, which is why most general purpose loaders skip it.
//!
//! This crate provides:
//! - Header (de)serialization and pixel format classification
//! - A header-only preview used to detect V8U8 before committing to a load
//! - Loading and saving the full mip chain
//! - Decoding to a displayable BGRA buffer
//! - Mip chain generation by stride-2 decimation
//!
//! # Example
//!
//! ```no_run
//! use dudv_dds::{build_pyramid, decode_to_display, V8U8Dds};
//!
//! let mut dds = V8U8Dds::open("normal.dds")?;
//! let base = dds.pyramid.base().clone();
//! dds.pyramid = build_pyramid(base)?;
//! dds.save("normal_mips.dds")?;
//!
//! let bgra = decode_to_display(dds.pyramid.base());
//! assert_eq!(bgra.len(), (dds.width * dds.height * 4) as usize);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod codec;
mod decode;
mod error;
mod format;
mod header;
mod mip;
mod mipgen;
mod reader;

pub use codec::V8U8Dds;
pub use decode::{bgra_to_rgba, decode_texel, decode_to_display, display_stride};
pub use error::{Error, ErrorKind, Result};
pub use format::{classify, is_v8u8, is_v8u8_bytes, DdsPreview, FormatKind};
pub use header::{
    read_header, write_header, Caps, DdsHeader, DdsPixelFormat, FourCC, HeaderFlags,
    PixelFormatFlags,
};
pub use mip::{
    full_chain_len, level_dimensions, level_size, ImageSize, MipLevel, MipPyramid,
    BYTES_PER_PIXEL,
};
pub use mipgen::{append_levels, apply_mip_mode, build_pyramid, decimate, MipMapMode};
pub use reader::ReadExt;

/// DDS file magic bytes ("DDS ").
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
