//! The general purpose codec service and the gateway that serializes access to it.
//!
//! Everything that isn't V8U8 is loaded, resized and encoded by a
//! [`CodecService`]. Images only ever see an opaque [`ImageHandle`] into the
//! service's storage, and every call goes through the single process-wide
//! [`CodecGateway`], which also owns the [`CodecSettings`].

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use image_dds::ddsfile::Dds;
use image_dds::{Mipmaps, Quality, SurfaceRgba8};
use parking_lot::Mutex;

use dudv_dds::{write_header, DdsHeader, DdsPreview, FourCC, DDS_MAGIC};

use crate::display::DisplayBuffer;

use crate::settings::{CodecSettings, ImageType, SurfaceFormat};
use crate::{Error, Result};

/// Opaque reference to an image held by a [`CodecService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(u32);

impl ImageHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Properties of a loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub channels: u8,
    pub surface_format: SurfaceFormat,
    pub mip_count: u32,
}

/// Operations the conversion layer needs from a general image codec.
pub trait CodecService: Send {
    /// Decode an encoded file (PNG, JPEG, ...).
    fn load_image(&mut self, data: &[u8], settings: &CodecSettings) -> Result<ImageHandle>;

    /// Take ownership of a raw RGBA8 buffer.
    fn load_pixels(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Result<ImageHandle>;

    /// Encode an image.
    fn save_image(
        &mut self,
        handle: ImageHandle,
        image_type: ImageType,
        settings: &CodecSettings,
    ) -> Result<Vec<u8>>;

    /// Resize in place. Returns false if the backend declined.
    fn resize_image(&mut self, handle: ImageHandle, width: u32, height: u32) -> Result<bool>;

    fn query_metadata(&self, handle: ImageHandle) -> Result<ImageMetadata>;

    /// Copy out the pixels as RGBA8.
    fn pixels(&self, handle: ImageHandle) -> Result<Vec<u8>>;

    /// Free an image. Returns false if the handle was unknown.
    fn delete_image(&mut self, handle: ImageHandle) -> bool;
}

struct Entry {
    image: DynamicImage,
    surface: SurfaceFormat,
    mip_count: u32,
}

/// Block encoding, legacy fourCC and bytes per 4x4 block for a surface format.
fn dds_encoding(surface: SurfaceFormat) -> Result<(image_dds::ImageFormat, FourCC, u32)> {
    match surface {
        SurfaceFormat::Dxt1 => Ok((image_dds::ImageFormat::BC1RgbaUnorm, FourCC::DXT1, 8)),
        SurfaceFormat::Dxt3 => Ok((image_dds::ImageFormat::BC2RgbaUnorm, FourCC::DXT3, 16)),
        SurfaceFormat::Dxt5 => Ok((image_dds::ImageFormat::BC3RgbaUnorm, FourCC::DXT5, 16)),
        SurfaceFormat::Ati2 => Ok((image_dds::ImageFormat::BC5RgUnorm, FourCC::ATI2, 16)),
        other => Err(Error::UnsupportedConversion(format!(
            "encoding {:?} DDS surfaces from decoded pixels",
            other
        ))),
    }
}

/// Compress `image` and write it behind a legacy fourCC header.
fn encode_dds(image: &DynamicImage, settings: &CodecSettings, out: &mut Vec<u8>) -> Result<()> {
    let (format, four_cc, block_bytes) = dds_encoding(settings.dxt_format)?;
    let mipmaps = if settings.dds_mipmaps {
        Mipmaps::GeneratedAutomatic
    } else {
        Mipmaps::Disabled
    };
    let surface = SurfaceRgba8::from_image(&image.to_rgba8())
        .encode(format, Quality::Normal, mipmaps)
        .map_err(|e| dds_error("encoding DDS", e))?;

    let (width, height) = (surface.width, surface.height);
    let linear_size = width.div_ceil(4).max(1) * height.div_ceil(4).max(1) * block_bytes;
    let mip_count = if surface.mipmaps > 1 { surface.mipmaps } else { 0 };
    log::debug!(
        "encoded {}x{} {:?} surface, {} levels",
        width,
        height,
        settings.dxt_format,
        surface.mipmaps
    );

    write_header(
        &DdsHeader::block_compressed(four_cc, mip_count, height, width, linear_size),
        out,
    )?;
    out.extend_from_slice(&surface.data);
    Ok(())
}

fn dds_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Codec(format!("{}: {}", context, e))
}

/// [`CodecService`] backed by the `image` crate.
///
/// Handles index into a map and are never reused.
#[derive(Default)]
pub struct ImageCrateCodec {
    images: HashMap<u32, Entry>,
    next_id: u32,
}

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of images currently held.
    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    fn insert(&mut self, image: DynamicImage, surface: SurfaceFormat, mip_count: u32) -> ImageHandle {
        self.next_id = self.next_id.wrapping_add(1);
        self.images.insert(
            self.next_id,
            Entry {
                image,
                surface,
                mip_count,
            },
        );
        ImageHandle(self.next_id)
    }

    /// Decode the top level of a block-compressed or uncompressed DDS.
    fn load_dds(&mut self, data: &[u8], settings: &CodecSettings) -> Result<ImageHandle> {
        let preview = DdsPreview::from_bytes(data).ok();
        let dds = Dds::read(data).map_err(|e| dds_error("reading DDS", e))?;
        let rgba = image_dds::image_from_dds(&dds, 0).map_err(|e| dds_error("decoding DDS", e))?;

        // The surface is only reported when compressed data is kept.
        let surface = match &preview {
            Some(p) if settings.keep_dxtc => p.format.into(),
            _ => SurfaceFormat::None,
        };
        let mip_count = match &preview {
            Some(p) if p.has_mips => p.mip_count.max(1),
            _ => 1,
        };

        Ok(self.insert(DynamicImage::ImageRgba8(rgba), surface, mip_count))
    }

    fn entry(&self, handle: ImageHandle) -> Result<&Entry> {
        self.images
            .get(&handle.0)
            .ok_or(Error::InvalidHandle(handle.0))
    }
}

impl CodecService for ImageCrateCodec {
    fn load_image(&mut self, data: &[u8], settings: &CodecSettings) -> Result<ImageHandle> {
        if data.starts_with(DDS_MAGIC) {
            return self.load_dds(data, settings);
        }

        let image = image::load_from_memory(data)?;
        Ok(self.insert(image, SurfaceFormat::None, 1))
    }

    fn load_pixels(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Result<ImageHandle> {
        let len = rgba.len();
        let buffer = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            Error::Codec(format!(
                "{} bytes is not a {}x{} RGBA buffer",
                len, width, height
            ))
        })?;
        Ok(self.insert(DynamicImage::ImageRgba8(buffer), SurfaceFormat::None, 1))
    }

    fn save_image(
        &mut self,
        handle: ImageHandle,
        image_type: ImageType,
        settings: &CodecSettings,
    ) -> Result<Vec<u8>> {
        let entry = self.entry(handle)?;
        let mut out = Vec::new();

        match image_type {
            ImageType::Jpg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut out, settings.jpeg_quality);
                encoder.encode_image(&entry.image.to_rgb8())?;
            }
            ImageType::Png => entry.image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?,
            ImageType::Bmp => entry.image.write_to(&mut Cursor::new(&mut out), ImageFormat::Bmp)?,
            ImageType::Gif => entry.image.write_to(&mut Cursor::new(&mut out), ImageFormat::Gif)?,
            ImageType::Dds => encode_dds(&entry.image, settings, &mut out)?,
        }

        Ok(out)
    }

    fn resize_image(&mut self, handle: ImageHandle, width: u32, height: u32) -> Result<bool> {
        if width == 0 || height == 0 {
            return Ok(false);
        }
        let entry = self
            .images
            .get_mut(&handle.0)
            .ok_or(Error::InvalidHandle(handle.0))?;
        entry.image = entry.image.resize_exact(width, height, FilterType::Nearest);
        Ok(true)
    }

    fn query_metadata(&self, handle: ImageHandle) -> Result<ImageMetadata> {
        let entry = self.entry(handle)?;
        let color = entry.image.color();
        Ok(ImageMetadata {
            width: entry.image.width(),
            height: entry.image.height(),
            bits_per_pixel: color.bits_per_pixel() as u32,
            channels: color.channel_count(),
            surface_format: entry.surface,
            mip_count: entry.mip_count,
        })
    }

    fn pixels(&self, handle: ImageHandle) -> Result<Vec<u8>> {
        Ok(self.entry(handle)?.image.to_rgba8().into_raw())
    }

    fn delete_image(&mut self, handle: ImageHandle) -> bool {
        self.images.remove(&handle.0).is_some()
    }
}

struct GatewayState {
    settings: CodecSettings,
    service: Box<dyn CodecService>,
}

/// Serialized access to a [`CodecService`] and its settings.
///
/// The backend's settings are process-wide, so all calls take the same lock.
pub struct CodecGateway {
    state: Mutex<GatewayState>,
}

impl CodecGateway {
    pub fn new(service: Box<dyn CodecService>) -> Self {
        Self {
            state: Mutex::new(GatewayState {
                settings: CodecSettings::default(),
                service,
            }),
        }
    }

    /// The process-wide gateway, backed by [`ImageCrateCodec`].
    pub fn global() -> &'static CodecGateway {
        static GATEWAY: OnceLock<CodecGateway> = OnceLock::new();
        GATEWAY.get_or_init(|| CodecGateway::new(Box::new(ImageCrateCodec::new())))
    }

    /// Run `f` with exclusive access to the service and the current settings.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn CodecService, &CodecSettings) -> T) -> T {
        let mut state = self.state.lock();
        let GatewayState { settings, service } = &mut *state;
        f(service.as_mut(), settings)
    }

    pub fn settings(&self) -> CodecSettings {
        self.state.lock().settings
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut CodecSettings)) {
        f(&mut self.state.lock().settings);
    }

    pub fn set_jpeg_quality(&self, quality: u8) {
        self.update_settings(|s| s.jpeg_quality = quality.min(100));
    }

    pub fn set_dxt_format(&self, format: SurfaceFormat) {
        self.update_settings(|s| s.dxt_format = format);
    }

    pub fn set_keep_dxtc(&self, keep: bool) {
        self.update_settings(|s| s.keep_dxtc = keep);
    }

    pub fn set_dds_mipmaps(&self, build: bool) {
        self.update_settings(|s| s.dds_mipmaps = build);
    }

    pub fn load_image(&self, data: &[u8]) -> Result<ImageHandle> {
        self.with(|codec, settings| codec.load_image(data, settings))
    }

    pub fn load_pixels(&self, width: u32, height: u32, rgba: Vec<u8>) -> Result<ImageHandle> {
        self.with(|codec, _| codec.load_pixels(width, height, rgba))
    }

    pub fn save_image(&self, handle: ImageHandle, image_type: ImageType) -> Result<Vec<u8>> {
        self.with(|codec, settings| codec.save_image(handle, image_type, settings))
    }

    /// Encode decoded pixels through a temporary handle.
    pub fn encode_display(&self, display: &DisplayBuffer, image_type: ImageType) -> Result<Vec<u8>> {
        let rgba = display.to_rgba();
        self.with(|codec, settings| {
            let handle = codec.load_pixels(display.width, display.height, rgba)?;
            let encoded = codec.save_image(handle, image_type, settings);
            codec.delete_image(handle);
            encoded
        })
    }

    pub fn resize_image(&self, handle: ImageHandle, width: u32, height: u32) -> Result<bool> {
        self.with(|codec, _| codec.resize_image(handle, width, height))
    }

    pub fn query_metadata(&self, handle: ImageHandle) -> Result<ImageMetadata> {
        self.with(|codec, _| codec.query_metadata(handle))
    }

    pub fn pixels(&self, handle: ImageHandle) -> Result<Vec<u8>> {
        self.with(|codec, _| codec.pixels(handle))
    }

    pub fn delete_image(&self, handle: ImageHandle) -> bool {
        self.with(|codec, _| codec.delete_image(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| [(i % 256) as u8, 0x40, 0x80, 0xFF])
            .collect()
    }

    #[test]
    fn test_load_pixels_and_query() {
        let mut codec = ImageCrateCodec::new();
        let handle = codec.load_pixels(4, 2, gradient(4, 2)).unwrap();

        let meta = codec.query_metadata(handle).unwrap();
        assert_eq!(meta.width, 4);
        assert_eq!(meta.height, 2);
        assert_eq!(meta.channels, 4);
        assert_eq!(meta.bits_per_pixel, 32);
        assert_eq!(meta.surface_format, SurfaceFormat::None);
        assert_eq!(meta.mip_count, 1);
        assert_eq!(codec.pixels(handle).unwrap(), gradient(4, 2));
    }

    #[test]
    fn test_load_pixels_wrong_length() {
        let mut codec = ImageCrateCodec::new();
        assert!(matches!(
            codec.load_pixels(4, 4, vec![0; 10]),
            Err(Error::Codec(_))
        ));
    }

    #[test]
    fn test_png_roundtrip_through_codec() {
        let mut codec = ImageCrateCodec::new();
        let settings = CodecSettings::default();
        let handle = codec.load_pixels(3, 3, gradient(3, 3)).unwrap();

        let png = codec.save_image(handle, ImageType::Png, &settings).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let reloaded = codec.load_image(&png, &settings).unwrap();
        assert_ne!(reloaded, handle);
        assert_eq!(codec.pixels(reloaded).unwrap(), gradient(3, 3));
    }

    #[test]
    fn test_jpeg_and_bmp_encode() {
        let mut codec = ImageCrateCodec::new();
        let settings = CodecSettings {
            jpeg_quality: 50,
            ..Default::default()
        };
        let handle = codec.load_pixels(8, 8, gradient(8, 8)).unwrap();

        let jpg = codec.save_image(handle, ImageType::Jpg, &settings).unwrap();
        assert_eq!(&jpg[..2], &[0xFF, 0xD8]);

        let bmp = codec.save_image(handle, ImageType::Bmp, &settings).unwrap();
        assert_eq!(&bmp[..2], b"BM");
    }

    #[test]
    fn test_dxt_roundtrip_reports_surface() {
        let mut codec = ImageCrateCodec::new();
        let settings = CodecSettings {
            dxt_format: SurfaceFormat::Dxt5,
            dds_mipmaps: false,
            ..Default::default()
        };
        let handle = codec.load_pixels(8, 8, gradient(8, 8)).unwrap();

        let dds = codec.save_image(handle, ImageType::Dds, &settings).unwrap();
        assert_eq!(&dds[..4], b"DDS ");
        // Four 16-byte blocks after the legacy header.
        assert_eq!(dds.len(), 128 + 64);
        assert_eq!(DdsPreview::from_bytes(&dds).unwrap().format, dudv_dds::FormatKind::Dxt5);

        let reloaded = codec.load_image(&dds, &settings).unwrap();
        let meta = codec.query_metadata(reloaded).unwrap();
        assert_eq!((meta.width, meta.height), (8, 8));
        assert_eq!(meta.surface_format, SurfaceFormat::Dxt5);
        assert_eq!(meta.mip_count, 1);
    }

    #[test]
    fn test_dxt_mipmaps_follow_settings() {
        let mut codec = ImageCrateCodec::new();
        let settings = CodecSettings {
            dxt_format: SurfaceFormat::Dxt1,
            ..Default::default()
        };
        let handle = codec.load_pixels(16, 16, gradient(16, 16)).unwrap();

        let dds = codec.save_image(handle, ImageType::Dds, &settings).unwrap();
        let preview = DdsPreview::from_bytes(&dds).unwrap();
        assert_eq!(preview.format, dudv_dds::FormatKind::Dxt1);
        assert!(preview.mip_count > 1);
    }

    #[test]
    fn test_keep_dxtc_off_drops_surface() {
        let mut codec = ImageCrateCodec::new();
        let settings = CodecSettings {
            dxt_format: SurfaceFormat::Ati2,
            keep_dxtc: false,
            ..Default::default()
        };
        let handle = codec.load_pixels(4, 4, gradient(4, 4)).unwrap();
        let dds = codec.save_image(handle, ImageType::Dds, &settings).unwrap();

        let reloaded = codec.load_image(&dds, &settings).unwrap();
        assert_eq!(
            codec.query_metadata(reloaded).unwrap().surface_format,
            SurfaceFormat::None
        );
    }

    #[test]
    fn test_dds_encode_unsupported_surface() {
        let mut codec = ImageCrateCodec::new();
        let handle = codec.load_pixels(4, 4, gradient(4, 4)).unwrap();
        let settings = CodecSettings {
            dxt_format: SurfaceFormat::V8U8,
            ..Default::default()
        };
        assert!(matches!(
            codec.save_image(handle, ImageType::Dds, &settings),
            Err(Error::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn test_resize() {
        let mut codec = ImageCrateCodec::new();
        let handle = codec.load_pixels(4, 4, gradient(4, 4)).unwrap();

        assert!(codec.resize_image(handle, 2, 8).unwrap());
        let meta = codec.query_metadata(handle).unwrap();
        assert_eq!((meta.width, meta.height), (2, 8));

        assert!(!codec.resize_image(handle, 0, 8).unwrap());
    }

    #[test]
    fn test_delete_twice() {
        let mut codec = ImageCrateCodec::new();
        let handle = codec.load_pixels(1, 1, vec![0; 4]).unwrap();
        assert_eq!(codec.live_images(), 1);

        assert!(codec.delete_image(handle));
        assert!(!codec.delete_image(handle));
        assert_eq!(codec.live_images(), 0);
        assert!(matches!(
            codec.query_metadata(handle),
            Err(Error::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_garbage_fails_to_load() {
        let mut codec = ImageCrateCodec::new();
        assert!(matches!(
            codec.load_image(b"not an image", &CodecSettings::default()),
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn test_gateway_settings() {
        let gateway = CodecGateway::new(Box::new(ImageCrateCodec::new()));
        assert_eq!(gateway.settings(), CodecSettings::default());

        gateway.set_jpeg_quality(120);
        gateway.set_dxt_format(SurfaceFormat::Dxt5);
        gateway.set_keep_dxtc(false);
        gateway.set_dds_mipmaps(false);

        let settings = gateway.settings();
        assert_eq!(settings.jpeg_quality, 100);
        assert_eq!(settings.dxt_format, SurfaceFormat::Dxt5);
        assert!(!settings.keep_dxtc);
        assert!(!settings.dds_mipmaps);
    }

    #[test]
    fn test_gateway_forwards_calls() {
        let gateway = CodecGateway::new(Box::new(ImageCrateCodec::new()));
        let handle = gateway.load_pixels(2, 2, gradient(2, 2)).unwrap();

        assert_eq!(gateway.query_metadata(handle).unwrap().width, 2);
        assert!(gateway.resize_image(handle, 4, 4).unwrap());
        assert_eq!(gateway.pixels(handle).unwrap().len(), 4 * 4 * 4);
        assert!(gateway.delete_image(handle));
        assert!(!gateway.delete_image(handle));
    }

    #[test]
    fn test_gateway_encode_display_frees_handle() {
        let gateway = CodecGateway::new(Box::new(ImageCrateCodec::new()));
        let display = DisplayBuffer::from_bgra(2, 1, vec![1, 2, 3, 255, 4, 5, 6, 255]);

        let png = gateway.encode_display(&display, ImageType::Png).unwrap();
        let handle = gateway.load_image(&png).unwrap();
        assert_eq!(gateway.pixels(handle).unwrap(), display.to_rgba());
        // The temporary handle was the only other one and is gone.
        assert!(!gateway.with(|codec, _| codec.delete_image(ImageHandle(handle.id() - 1))));
    }
}
