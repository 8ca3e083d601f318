//! Image loading and conversion with native V8U8 normal map support.
//!
//! V8U8 DDS files are parsed, mipmapped and written by [`dudv_dds`]; every
//! other format goes through a [`CodecService`] reached via the process-wide
//! [`CodecGateway`].
//!
//! # Example
//!
//! ```no_run
//! use dudv::{Image, ImageType, SaveOptions};
//!
//! let mut image = Image::open("water_ddn.dds")?;
//! println!("{}x{}, {} mips", image.width(), image.height(), image.mips());
//!
//! // Rebuild the mip chain and write it back out as V8U8.
//! let outcome = image.convert_and_save_to_path("water_ddn_mips.dds", &SaveOptions::new(ImageType::Dds))?;
//! assert!(outcome.is_complete());
//!
//! // Or decode the top level to a PNG.
//! image.convert_and_save_to_path("water_ddn.png", &SaveOptions::new(ImageType::Png))?;
//! # Ok::<(), dudv::Error>(())
//! ```

mod codec;
mod display;
mod error;
mod image;
mod settings;
mod standard;
mod v8u8;

pub use codec::{CodecGateway, CodecService, ImageCrateCodec, ImageHandle, ImageMetadata};
pub use display::DisplayBuffer;
pub use error::{Error, Result};
pub use image::{ConvertOutcome, Image};
pub use settings::{
    extension_for_format, is_valid_format, CodecSettings, ImageType, SaveOptions, SurfaceFormat,
    VALID_FORMATS,
};
pub use standard::StandardImage;
pub use v8u8::V8U8Image;

pub use dudv_dds as dds;
pub use dudv_dds::MipMapMode;
