//! Raster frame to texture upload on the render thread.

use raster::StagedFrame;
use tracing::debug;

use crate::device::{RenderDevice, TextureFormat, TextureHandle};
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Uploaded {
    raster: TextureHandle,
    overlay: TextureHandle,
    width: u32,
    height: u32,
}

/// Owns the raster and overlay textures the pipeline samples.
///
/// Only the visible scanline window is uploaded. Both textures are recreated
/// when the visible size changes.
#[derive(Debug, Default)]
pub struct TextureUploader {
    current: Option<Uploaded>,
    uploads: u64,
}

impl TextureUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(
        &mut self,
        device: &mut dyn RenderDevice,
        frame: &StagedFrame<'_>,
    ) -> Result<(TextureHandle, TextureHandle), DeviceError> {
        let (width, height) = frame.visible_size();
        let uploaded = match self.current {
            Some(current) if current.width == width && current.height == height => current,
            _ => self.recreate(device, width, height)?,
        };
        device.upload_texture(uploaded.raster, frame.visible_rows())?;
        device.upload_texture(uploaded.overlay, frame.visible_overlay_rows())?;
        self.uploads += 1;
        Ok((uploaded.raster, uploaded.overlay))
    }

    /// Raster and overlay textures from the last upload.
    pub fn textures(&self) -> Option<(TextureHandle, TextureHandle)> {
        self.current.map(|current| (current.raster, current.overlay))
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.current.map(|current| (current.width, current.height))
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        if let Some(current) = self.current.take() {
            device.destroy_texture(current.raster);
            device.destroy_texture(current.overlay);
        }
    }

    fn recreate(
        &mut self,
        device: &mut dyn RenderDevice,
        width: u32,
        height: u32,
    ) -> Result<Uploaded, DeviceError> {
        self.destroy(device);
        let raster = device.create_texture(width, height, TextureFormat::Rgba8)?;
        let overlay = match device.create_texture(width, height, TextureFormat::Rgba8) {
            Ok(overlay) => overlay,
            Err(err) => {
                device.destroy_texture(raster);
                return Err(err);
            }
        };
        debug!(width, height, "recreated raster textures");
        let uploaded = Uploaded {
            raster,
            overlay,
            width,
            height,
        };
        self.current = Some(uploaded);
        Ok(uploaded)
    }
}
