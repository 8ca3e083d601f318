//! Error types for DDS handling.

use thiserror::Error;

use crate::format::FormatKind;

/// Errors that can occur when working with DDS files.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid DDS magic.
    #[error("invalid DDS magic: expected 'DDS ', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Invalid DDS header.
    #[error("invalid DDS header: {0}")]
    InvalidHeader(String),

    /// DX10 extended headers are not supported.
    #[error("DX10 extended headers are not supported")]
    Dx10Unsupported,

    /// Four-character code that isn't one of the known compressed formats.
    #[error("unknown fourCC {0:?}")]
    UnknownFourCC([u8; 4]),

    /// Pixel format bitmasks don't match any known layout.
    #[error("unsupported pixel format: flags {flags:#x}, {bit_count} bits per pixel")]
    UnknownPixelFormat { flags: u32, bit_count: u32 },

    /// The container holds a known format, just not the one requested.
    #[error("unsupported format: expected {expected:?}, found {found:?}")]
    Unsupported { expected: FormatKind, found: FormatKind },

    /// Stream ended before the declared mip geometry was satisfied.
    #[error("corrupt data: mip level {level} needs {expected} bytes but only {available} remain")]
    CorruptData {
        level: usize,
        expected: usize,
        available: usize,
    },

    /// Mip level buffer doesn't match its dimensions.
    #[error("mipmap size mismatch: expected {expected}, got {actual}")]
    MipmapSizeMismatch { expected: usize, actual: usize },

    /// Mip level dimensions break the halving chain of the pyramid.
    #[error("mip level {level} is {actual:?}, expected {expected:?}")]
    LevelGeometry {
        level: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Image size helper rejected a non power-of-two dimension.
    #[error("invalid {axis} value {value}, must be a power of 2")]
    NotPowerOfTwo { axis: &'static str, value: u32 },
}

/// Broad category of an [`Error`], for callers that only care about the class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad magic or malformed header.
    Format,
    /// DX10, unknown fourCC or bitmask combination, or a format other than the one expected.
    UnsupportedFormat,
    /// Stream shorter than the header's mip geometry requires.
    CorruptData,
    /// Buffer length or level dimensions inconsistent with the geometry.
    SizeMismatch,
    /// Underlying stream failure.
    Io,
}

impl Error {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidMagic(_) | Error::InvalidHeader(_) => ErrorKind::Format,
            Error::Dx10Unsupported
            | Error::UnknownFourCC(_)
            | Error::UnknownPixelFormat { .. }
            | Error::Unsupported { .. } => ErrorKind::UnsupportedFormat,
            Error::CorruptData { .. } => ErrorKind::CorruptData,
            Error::MipmapSizeMismatch { .. }
            | Error::LevelGeometry { .. }
            | Error::NotPowerOfTwo { .. } => ErrorKind::SizeMismatch,
        }
    }
}

/// Result type for DDS operations.
pub type Result<T> = std::result::Result<T, Error>;
