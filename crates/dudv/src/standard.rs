//! Images decoded and encoded by the codec service.

use std::path::{Path, PathBuf};

use crate::codec::{CodecGateway, ImageHandle, ImageMetadata};
use crate::display::DisplayBuffer;
use crate::image::ConvertOutcome;
use crate::settings::{ImageType, SaveOptions, SurfaceFormat};
use crate::{Error, Result};

/// An image living in the codec service, referenced by handle.
///
/// The handle is released when the image is dropped.
pub struct StandardImage {
    path: Option<PathBuf>,
    handle: Option<ImageHandle>,
    metadata: ImageMetadata,
    gateway: &'static CodecGateway,
}

impl StandardImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut image = Self::from_bytes(&data)?;
        image.path = Some(path.to_path_buf());
        Ok(image)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::load_with(CodecGateway::global(), data)
    }

    fn load_with(gateway: &'static CodecGateway, data: &[u8]) -> Result<Self> {
        let handle = gateway.load_image(data)?;
        let metadata = match gateway.query_metadata(handle) {
            Ok(metadata) => metadata,
            Err(e) => {
                gateway.delete_image(handle);
                return Err(e);
            }
        };
        log::debug!(
            "loaded {}x{} image as handle {}",
            metadata.width,
            metadata.height,
            handle.id()
        );

        Ok(Self {
            path: None,
            handle: Some(handle),
            metadata,
            gateway,
        })
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The live handle, or `InvalidHandle` once released.
    pub fn handle(&self) -> Result<ImageHandle> {
        self.handle.ok_or(Error::InvalidHandle(0))
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn to_display(&self) -> Result<DisplayBuffer> {
        let rgba = self.gateway.pixels(self.handle()?)?;
        Ok(DisplayBuffer::from_rgba(
            self.metadata.width,
            self.metadata.height,
            rgba,
        ))
    }

    pub fn to_display_sized(&self, size: Option<(u32, u32)>) -> Result<DisplayBuffer> {
        self.to_display()?.fit(size)
    }

    pub fn to_bytes(&self, image_type: ImageType, quality: u8) -> Result<Vec<u8>> {
        self.to_bytes_sized(image_type, quality, None)
    }

    /// Encode, scaling a copy to `size` first when given. The stored image
    /// keeps its dimensions.
    pub fn to_bytes_sized(
        &self,
        image_type: ImageType,
        quality: u8,
        size: Option<(u32, u32)>,
    ) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        if image_type == ImageType::Jpg {
            self.gateway.set_jpeg_quality(quality);
        }
        match size {
            Some(_) => self
                .gateway
                .encode_display(&self.to_display_sized(size)?, image_type),
            None => self.gateway.save_image(handle, image_type),
        }
    }

    /// The codec service stores a single level, so there is nothing to build.
    pub fn build_mipmaps(&mut self, _rebuild: bool) -> Result<()> {
        Err(Error::UnsupportedConversion(
            "mipmap generation for codec-managed images".into(),
        ))
    }

    /// Always succeeds: only the top level is ever held.
    pub fn remove_mipmaps(&mut self, _force: bool) -> Result<()> {
        self.handle()?;
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let handle = self.handle()?;
        if !self.gateway.resize_image(handle, width, height)? {
            return Err(Error::UnsupportedConversion(format!(
                "resize to {}x{}",
                width, height
            )));
        }
        self.metadata = self.gateway.query_metadata(handle)?;
        Ok(())
    }

    /// Encode with the codec service and write the result to `writer`.
    pub fn convert_and_save<W: std::io::Write>(
        &mut self,
        writer: &mut W,
        opts: &SaveOptions,
    ) -> Result<ConvertOutcome> {
        let handle = self.handle()?;
        if opts.set_jpeg_quality && opts.image_type == ImageType::Jpg {
            self.gateway.set_jpeg_quality(opts.quality);
        }
        if opts.image_type == ImageType::Dds {
            if opts.surface == SurfaceFormat::V8U8 {
                return Err(Error::UnsupportedConversion(
                    "V8U8 surfaces from codec-managed images".into(),
                ));
            }
            // Without an explicit surface, a block-compressed source keeps its own.
            let surface = match opts.surface {
                SurfaceFormat::None if self.metadata.surface_format.is_block_compressed() => {
                    self.metadata.surface_format
                }
                surface => surface,
            };
            if surface != SurfaceFormat::None {
                self.gateway.set_dxt_format(surface);
            }
            self.gateway
                .set_dds_mipmaps(opts.builds_dds_mips(self.metadata.mip_count));
        }

        let encoded = self.gateway.save_image(handle, opts.image_type)?;
        writer.write_all(&encoded)?;
        Ok(ConvertOutcome::complete())
    }

    /// Give the handle back to the codec service. Returns false if it was
    /// already released.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => self.gateway.delete_image(handle),
            None => false,
        }
    }
}

impl Drop for StandardImage {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StandardImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardImage")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("metadata", &self.metadata)
            .finish()
    }
}
