//! Error types for image loading and conversion.

use thiserror::Error;

/// Errors that can occur when loading, converting or saving images.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// V8U8 DDS codec error.
    #[error("{0}")]
    Dds(#[from] dudv_dds::Error),

    /// Error from the image codec backend.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// The handle was never issued or has already been released.
    #[error("invalid image handle {0}")]
    InvalidHandle(u32),

    /// The requested conversion or operation isn't available for this image.
    #[error("unsupported: {0}")]
    UnsupportedConversion(String),

    /// Codec backend failure without a more specific cause.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, Error>;
