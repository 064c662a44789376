//! The raw graphics-API seam.
//!
//! A [`Backend`] is the only thing that talks to the device. It performs every
//! call it is given; redundant-state elimination happens one layer up, in
//! [`GpuContext`](crate::context::GpuContext).

use crate::error::RenderResult;
use crate::shader::ShaderModule;
use crate::state::{
    BlendEquation, BlendFactor, Comparison, Face, PolygonMode, RenderState, Winding,
};

/// Handle to a backend buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Handle to a backend vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);

/// Handle to a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Handle to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle to an off-screen framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Buffer binding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
    Storage,
}

/// Toggleable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    StencilTest,
    CullFace,
    Blend,
    ScissorTest,
    PrimitiveRestart,
    Multisample,
}

impl Capability {
    /// Every capability, in cold-start order.
    pub const ALL: [Capability; 7] = [
        Capability::DepthTest,
        Capability::StencilTest,
        Capability::CullFace,
        Capability::Blend,
        Capability::ScissorTest,
        Capability::PrimitiveRestart,
        Capability::Multisample,
    ];
}

/// One fixed-function state command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange {
    Enable(Capability, bool),
    ColorMask(bool),
    DepthMask(bool),
    DepthFunc(Comparison),
    StencilFunc {
        func: Comparison,
        reference: i32,
        mask: u32,
    },
    StencilMask(u32),
    CullFace(Face),
    FrontFace(Winding),
    BlendFunc {
        src: BlendFactor,
        dst: BlendFactor,
    },
    BlendEquation {
        color: BlendEquation,
        alpha: BlendEquation,
    },
    PolygonMode {
        face: Face,
        mode: PolygonMode,
    },
    LineWidth(f32),
    PointSize(f32),
}

/// The discriminant of a [`StateChange`], used for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Enable(Capability),
    ColorMask,
    DepthMask,
    DepthFunc,
    StencilFunc,
    StencilMask,
    CullFace,
    FrontFace,
    BlendFunc,
    BlendEquation,
    PolygonMode,
    LineWidth,
    PointSize,
}

impl StateKind {
    /// Every state command kind the context tracks.
    #[must_use]
    pub fn all() -> Vec<StateKind> {
        let mut kinds: Vec<StateKind> = Capability::ALL.into_iter().map(StateKind::Enable).collect();
        kinds.extend([
            StateKind::ColorMask,
            StateKind::DepthMask,
            StateKind::DepthFunc,
            StateKind::StencilFunc,
            StateKind::StencilMask,
            StateKind::CullFace,
            StateKind::FrontFace,
            StateKind::BlendFunc,
            StateKind::BlendEquation,
            StateKind::PolygonMode,
            StateKind::LineWidth,
            StateKind::PointSize,
        ]);
        kinds
    }
}

impl StateChange {
    /// The kind of command.
    #[must_use]
    pub fn kind(&self) -> StateKind {
        match self {
            StateChange::Enable(cap, _) => StateKind::Enable(*cap),
            StateChange::ColorMask(_) => StateKind::ColorMask,
            StateChange::DepthMask(_) => StateKind::DepthMask,
            StateChange::DepthFunc(_) => StateKind::DepthFunc,
            StateChange::StencilFunc { .. } => StateKind::StencilFunc,
            StateChange::StencilMask(_) => StateKind::StencilMask,
            StateChange::CullFace(_) => StateKind::CullFace,
            StateChange::FrontFace(_) => StateKind::FrontFace,
            StateChange::BlendFunc { .. } => StateKind::BlendFunc,
            StateChange::BlendEquation { .. } => StateKind::BlendEquation,
            StateChange::PolygonMode { .. } => StateKind::PolygonMode,
            StateChange::LineWidth(_) => StateKind::LineWidth,
            StateChange::PointSize(_) => StateKind::PointSize,
        }
    }

    /// Folds the command into a mirrored state, the way a device would.
    ///
    /// A stencil write mask only records whether writes are on; partial
    /// masks keep the test mask from `StencilFunc`.
    pub fn apply_to(self, s: &mut RenderState) {
        match self {
            StateChange::Enable(cap, on) => match cap {
                Capability::DepthTest => s.depth_test = on,
                Capability::StencilTest => s.stencil_test = on,
                Capability::CullFace => s.cull_face = on,
                Capability::Blend => s.blend = on,
                Capability::ScissorTest => s.scissor_test = on,
                Capability::PrimitiveRestart => s.primitive_restart = on,
                Capability::Multisample => s.multisample = on,
            },
            StateChange::ColorMask(on) => s.color_write = on,
            StateChange::DepthMask(on) => s.depth_write = on,
            StateChange::DepthFunc(func) => s.depth_func = func,
            StateChange::StencilFunc {
                func,
                reference,
                mask,
            } => {
                s.stencil_func = func;
                s.stencil_reference = reference;
                s.stencil_mask = mask;
            }
            StateChange::StencilMask(mask) => s.stencil_write = mask != 0,
            StateChange::CullFace(face) => s.triangle_face = face,
            StateChange::FrontFace(winding) => s.front_face = winding,
            StateChange::BlendFunc { src, dst } => {
                s.blend_src = src;
                s.blend_dst = dst;
            }
            StateChange::BlendEquation { color, alpha } => {
                s.blend_equation_color = color;
                s.blend_equation_alpha = alpha;
            }
            StateChange::PolygonMode { face, mode } => {
                s.polygon_face = face;
                s.polygon_mode = mode;
            }
            StateChange::LineWidth(width) => s.line_width = width,
            StateChange::PointSize(size) => s.point_size = size,
        }
    }
}

/// Pixel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA colour.
    Rgba8,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

/// Texture creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// MSAA sample count; 1 for single-sampled.
    pub samples: u32,
}

/// One vertex attribute binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Number of `f32` components.
    pub components: u32,
    /// Byte offset of the field inside one vertex.
    pub offset: usize,
}

/// Which buffers `clear` touches and with what.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearValues {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<i32>,
}

/// The graphics-API handle.
///
/// All methods run on the render thread. Reads (`read_buffer`,
/// `read_pixels`) block until prior writes are visible.
pub trait Backend {
    /// Short human-readable backend name.
    fn name(&self) -> &str;

    /// Performs one fixed-function state command.
    fn apply(&mut self, change: StateChange);

    /// Allocates `size` zeroed bytes.
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> RenderResult<BufferId>;
    /// Writes `data` at byte `offset`.
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]);
    /// Reads `len` bytes from byte `offset`.
    fn read_buffer(&mut self, buffer: BufferId, offset: usize, len: usize) -> Vec<u8>;
    /// Binds a buffer to the generic binding point of its target. Indexed
    /// slots are unaffected.
    fn bind_buffer_target(&mut self, kind: BufferKind, buffer: BufferId);
    /// Binds a uniform or storage buffer to an indexed slot.
    fn bind_buffer(&mut self, kind: BufferKind, slot: u32, buffer: BufferId);
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Creates a vertex array over a vertex and an index buffer.
    fn create_vertex_array(
        &mut self,
        vertices: BufferId,
        indices: BufferId,
        stride: usize,
    ) -> RenderResult<VertexArrayId>;
    fn vertex_attribute(&mut self, vertex_array: VertexArrayId, attribute: VertexAttribute);
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Compiles and links the given stages. On failure returns the
    /// diagnostic text.
    fn create_program(&mut self, modules: &[ShaderModule]) -> Result<ProgramId, String>;
    fn use_program(&mut self, program: Option<ProgramId>);
    fn delete_program(&mut self, program: ProgramId);

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureId>;
    /// Replaces the full contents of an RGBA8 texture (rows bottom-up).
    fn write_texture(&mut self, texture: TextureId, data: &[u8]);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);
    fn delete_texture(&mut self, texture: TextureId);

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth_stencil: Option<TextureId>,
    ) -> RenderResult<FramebufferId>;
    /// Binds a framebuffer; `None` is the default target.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    /// Clears the bound framebuffer, honouring the colour, depth and stencil
    /// write masks.
    fn clear(&mut self, values: ClearValues);
    /// Indexed triangle-list draw with the bound program.
    fn draw_elements(&mut self, vertex_array: VertexArrayId, index_count: u32, instances: u32);
    /// Reads RGBA8 pixels from the bound framebuffer (origin bottom-left).
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RenderLayer;

    #[test]
    fn test_apply_to_mirrors_layer_changes() {
        let mut state = RenderState::DEFAULT;
        let target = RenderLayer::Transparent.state();
        for change in [
            StateChange::Enable(Capability::Blend, target.blend),
            StateChange::Enable(Capability::CullFace, target.cull_face),
            StateChange::DepthMask(target.depth_write),
            StateChange::BlendFunc {
                src: target.blend_src,
                dst: target.blend_dst,
            },
        ] {
            change.apply_to(&mut state);
        }
        assert_eq!(state.blend, target.blend);
        assert_eq!(state.depth_write, target.depth_write);
        assert_eq!(state.blend_dst, target.blend_dst);
    }

    #[test]
    fn test_stencil_mask_toggles_writes() {
        let mut state = RenderState::DEFAULT;
        StateChange::StencilMask(0).apply_to(&mut state);
        assert!(!state.stencil_write);
        StateChange::StencilMask(0xFF).apply_to(&mut state);
        assert!(state.stencil_write);
        StateChange::StencilFunc {
            func: Comparison::Equal,
            reference: 3,
            mask: 0x0F,
        }
        .apply_to(&mut state);
        assert_eq!(state.stencil_reference, 3);
        assert_eq!(state.stencil_mask, 0x0F);
    }
}
