//! Off-screen render targets.

use std::rc::Rc;

use crate::backend::{ClearValues, FramebufferId, TextureDesc, TextureFormat};
use crate::context::{GpuContext, TargetBinding};
use crate::error::RenderResult;
use crate::texture::Texture;

/// An off-screen colour + depth/stencil target.
///
/// The colour texture is shared (`Rc`) so materials can sample it, e.g. the
/// selection mask feeding the outline pass. A resize replaces both textures;
/// holders of the old colour texture keep a valid but stale image.
pub struct Frame<'ctx> {
    context: &'ctx GpuContext,
    framebuffer: FramebufferId,
    color: Rc<Texture<'ctx>>,
    depth: Texture<'ctx>,
    samples: u32,
}

struct Attachments<'ctx> {
    framebuffer: FramebufferId,
    color: Texture<'ctx>,
    depth: Texture<'ctx>,
}

fn create_attachments(
    context: &GpuContext,
    width: u32,
    height: u32,
    samples: u32,
) -> RenderResult<Attachments<'_>> {
    let color = Texture::new(
        context,
        TextureDesc {
            width,
            height,
            format: TextureFormat::Rgba8,
            samples,
        },
    )?;
    let depth = Texture::new(
        context,
        TextureDesc {
            width,
            height,
            format: TextureFormat::Depth24Stencil8,
            samples,
        },
    )?;
    // On failure the two textures drop here and are released.
    let framebuffer = context
        .backend()
        .create_framebuffer(color.id(), Some(depth.id()))?;
    Ok(Attachments {
        framebuffer,
        color,
        depth,
    })
}

impl<'ctx> Frame<'ctx> {
    /// Creates a single-sampled frame.
    pub fn new(context: &'ctx GpuContext, width: u32, height: u32) -> RenderResult<Self> {
        Self::with_samples(context, width, height, 1)
    }

    /// Creates a frame with `samples` MSAA samples per pixel.
    pub fn with_samples(
        context: &'ctx GpuContext,
        width: u32,
        height: u32,
        samples: u32,
    ) -> RenderResult<Self> {
        let a = create_attachments(context, width.max(1), height.max(1), samples.max(1))?;
        Ok(Self {
            context,
            framebuffer: a.framebuffer,
            color: Rc::new(a.color),
            depth: a.depth,
            samples: samples.max(1),
        })
    }

    /// Width and height in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.color.size()
    }

    #[must_use]
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// The colour attachment, for sampling in a later pass.
    #[must_use]
    pub fn color_texture(&self) -> Rc<Texture<'ctx>> {
        Rc::clone(&self.color)
    }

    #[must_use]
    pub fn depth_texture(&self) -> &Texture<'ctx> {
        &self.depth
    }

    /// Reallocates the attachments when the size changed. Zero dimensions are
    /// clamped to one. Returns whether anything was reallocated.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<bool> {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == (width, height) {
            return Ok(false);
        }
        let a = create_attachments(self.context, width, height, self.samples)?;
        let old = std::mem::replace(&mut self.framebuffer, a.framebuffer);
        self.context.backend().delete_framebuffer(old);
        self.color = Rc::new(a.color);
        self.depth = a.depth;
        log::info!("frame resized to {width}x{height}");
        Ok(true)
    }

    /// Binds the frame as the render target and sets the viewport to cover
    /// it. Whatever was bound before, with its viewport, is rebound when the
    /// scope drops, so scopes nest.
    #[must_use]
    pub fn begin(&self) -> FrameScope<'_, 'ctx> {
        let previous = self.context.binding();
        let (width, height) = self.size();
        self.context.bind_framebuffer(Some(self.framebuffer));
        self.context.set_viewport(0, 0, width, height);
        FrameScope {
            frame: self,
            previous,
        }
    }

    /// Reads one RGBA8 pixel; origin bottom-left. Blocks.
    #[must_use]
    pub fn read_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let px = self.read_pixels(x, y, 1, 1);
        [px[0], px[1], px[2], px[3]]
    }

    /// Reads a block of RGBA8 pixels, rows bottom-up. Blocks.
    ///
    /// The previous target stays bound afterwards.
    #[must_use]
    pub fn read_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let previous = self.context.binding();
        self.context.bind_framebuffer(Some(self.framebuffer));
        let mut pixels = self.context.read_pixels(x, y, width, height);
        self.context.restore_binding(previous);
        pixels.resize(width as usize * height as usize * 4, 0);
        pixels
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        // The attachments drop after this, once nothing references them.
        self.context.backend().delete_framebuffer(self.framebuffer);
    }
}

/// The active binding of a [`Frame`].
pub struct FrameScope<'a, 'ctx> {
    frame: &'a Frame<'ctx>,
    previous: TargetBinding,
}

impl FrameScope<'_, '_> {
    /// Clears colour to `color`, depth to 1 and stencil to 0.
    pub fn clear(&self, color: [f32; 4]) {
        self.frame.context.clear(ClearValues {
            color: Some(color),
            depth: Some(1.0),
            stencil: Some(0),
        });
    }

    /// Clears only the depth and stencil attachments.
    pub fn clear_depth(&self) {
        self.frame.context.clear(ClearValues {
            color: None,
            depth: Some(1.0),
            stencil: Some(0),
        });
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.frame.size()
    }
}

impl Drop for FrameScope<'_, '_> {
    fn drop(&mut self) {
        self.frame.context.restore_binding(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Call, RecordingBackend};
    use crate::software::SoftwareBackend;

    #[test]
    fn test_clear_and_read_back() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let frame = Frame::new(&ctx, 3, 2).unwrap();
        {
            let scope = frame.begin();
            scope.clear([0.0, 0.0, 1.0, 1.0]);
        }
        assert_eq!(frame.read_pixel(2, 1), [0, 0, 255, 255]);
        assert_eq!(frame.read_pixels(0, 0, 3, 2).len(), 24);
    }

    #[test]
    fn test_resize_only_when_changed() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut frame = Frame::new(&ctx, 4, 4).unwrap();
        assert!(!frame.resize(4, 4).unwrap());
        assert!(frame.resize(8, 2).unwrap());
        assert_eq!(frame.size(), (8, 2));
        assert!(!frame.resize(8, 2).unwrap());
        // zero clamps to one instead of failing
        assert!(frame.resize(0, 0).unwrap());
        assert_eq!(frame.size(), (1, 1));
    }

    #[test]
    fn test_scope_rebinds_default_target() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let frame = Frame::new(&ctx, 2, 2).unwrap();
        log.reset();
        drop(frame.begin());
        let calls = log.calls();
        assert!(matches!(calls.first(), Some(Call::BindFramebuffer(Some(_)))));
        assert_eq!(calls.last(), Some(&Call::BindFramebuffer(None)));
    }

    #[test]
    fn test_nested_scope_restores_outer_target() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let outer = Frame::new(&ctx, 4, 4).unwrap();
        let inner = Frame::new(&ctx, 2, 2).unwrap();
        {
            let scope = outer.begin();
            scope.clear([1.0, 0.0, 0.0, 1.0]);
            {
                let nested = inner.begin();
                nested.clear([0.0, 1.0, 0.0, 1.0]);
            }
            let calls = log.calls();
            assert_eq!(
                calls[calls.len() - 2..],
                [
                    Call::BindFramebuffer(Some(outer.framebuffer)),
                    Call::Viewport(0, 0, 4, 4),
                ]
            );
            // Still drawing into the outer frame.
            scope.clear_depth();
            let _ = inner.read_pixel(0, 0);
            scope.clear([0.0, 0.0, 1.0, 1.0]);
        }
        assert_eq!(log.calls().last(), Some(&Call::BindFramebuffer(None)));
        assert_eq!(outer.read_pixel(3, 3), [0, 0, 255, 255]);
        assert_eq!(inner.read_pixel(1, 1), [0, 255, 0, 255]);
    }

    #[test]
    fn test_drop_releases_everything() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        drop(Frame::new(&ctx, 2, 2).unwrap());
        assert_eq!(log.count(|c| matches!(c, Call::DeleteFramebuffer(_))), 1);
        assert_eq!(log.count(|c| matches!(c, Call::DeleteTexture(_))), 2);
    }
}
