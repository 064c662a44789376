//! GPU textures.

use crate::backend::{TextureDesc, TextureFormat, TextureId};
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};

/// A 2D texture. Deleted on drop.
pub struct Texture<'ctx> {
    context: &'ctx GpuContext,
    id: TextureId,
    desc: TextureDesc,
}

impl<'ctx> Texture<'ctx> {
    /// Allocates an uninitialised texture.
    pub fn new(context: &'ctx GpuContext, desc: TextureDesc) -> RenderResult<Self> {
        let id = context.backend().create_texture(&desc)?;
        log::debug!(
            "created {:?} texture {id:?} ({}x{}, {} samples)",
            desc.format,
            desc.width,
            desc.height,
            desc.samples
        );
        Ok(Self { context, id, desc })
    }

    /// Creates an RGBA8 texture from tightly packed pixels, rows bottom-up.
    pub fn from_rgba8(
        context: &'ctx GpuContext,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::InvalidLength {
                expected,
                actual: pixels.len(),
            });
        }
        let texture = Self::new(
            context,
            TextureDesc {
                width,
                height,
                format: TextureFormat::Rgba8,
                samples: 1,
            },
        )?;
        context.backend().write_texture(texture.id, pixels);
        Ok(texture)
    }

    /// A 1x1 texture of one colour.
    pub fn solid(context: &'ctx GpuContext, rgba: [u8; 4]) -> RenderResult<Self> {
        Self::from_rgba8(context, 1, 1, &rgba)
    }

    #[must_use]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[must_use]
    pub fn desc(&self) -> TextureDesc {
        self.desc
    }

    /// Width and height in texels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }
}

impl Drop for Texture<'_> {
    fn drop(&mut self) {
        log::debug!("deleting texture {:?}", self.id);
        self.context.backend().delete_texture(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareBackend;

    #[test]
    fn test_from_rgba8_checks_length() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        assert!(Texture::from_rgba8(&ctx, 2, 2, &[0; 16]).is_ok());
        assert!(matches!(
            Texture::from_rgba8(&ctx, 2, 2, &[0; 15]),
            Err(RenderError::InvalidLength { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let desc = TextureDesc {
            width: 0,
            height: 4,
            format: TextureFormat::Rgba8,
            samples: 1,
        };
        assert!(matches!(Texture::new(&ctx, desc), Err(RenderError::ResourceCreation(_))));
    }
}
