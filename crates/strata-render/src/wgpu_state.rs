//! Translation of [`RenderState`] bundles into wgpu pipeline descriptors.
//!
//! wgpu bakes fixed-function state into the pipeline object, so a wgpu host
//! builds one pipeline per render layer from these pieces instead of diffing
//! state per draw.

use crate::state::{BlendEquation, BlendFactor, Comparison, Face, PolygonMode, RenderState, Winding};

/// Depth-stencil format used by [`Frame`](crate::frame::Frame) attachments.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

impl From<Comparison> for wgpu::CompareFunction {
    fn from(value: Comparison) -> Self {
        match value {
            Comparison::Never => wgpu::CompareFunction::Never,
            Comparison::Less => wgpu::CompareFunction::Less,
            Comparison::Equal => wgpu::CompareFunction::Equal,
            Comparison::LessOrEqual => wgpu::CompareFunction::LessEqual,
            Comparison::Greater => wgpu::CompareFunction::Greater,
            Comparison::NotEqual => wgpu::CompareFunction::NotEqual,
            Comparison::GreaterOrEqual => wgpu::CompareFunction::GreaterEqual,
            Comparison::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl From<BlendFactor> for wgpu::BlendFactor {
    fn from(value: BlendFactor) -> Self {
        match value {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::DstColor => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        }
    }
}

impl From<BlendEquation> for wgpu::BlendOperation {
    fn from(value: BlendEquation) -> Self {
        match value {
            BlendEquation::Add => wgpu::BlendOperation::Add,
            BlendEquation::Subtract => wgpu::BlendOperation::Subtract,
            BlendEquation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendEquation::Min => wgpu::BlendOperation::Min,
            BlendEquation::Max => wgpu::BlendOperation::Max,
        }
    }
}

/// wgpu culls one face at most; `FrontAndBack` has no equivalent and is
/// handed back as the error.
impl TryFrom<Face> for wgpu::Face {
    type Error = Face;

    fn try_from(value: Face) -> Result<Self, Self::Error> {
        match value {
            Face::Front => Ok(wgpu::Face::Front),
            Face::Back => Ok(wgpu::Face::Back),
            Face::FrontAndBack => Err(value),
        }
    }
}

impl From<Winding> for wgpu::FrontFace {
    fn from(value: Winding) -> Self {
        match value {
            Winding::CounterClockwise => wgpu::FrontFace::Ccw,
            Winding::Clockwise => wgpu::FrontFace::Cw,
        }
    }
}

impl From<PolygonMode> for wgpu::PolygonMode {
    fn from(value: PolygonMode) -> Self {
        match value {
            PolygonMode::Point => wgpu::PolygonMode::Point,
            PolygonMode::Line => wgpu::PolygonMode::Line,
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
        }
    }
}

impl RenderState {
    /// Depth and stencil tests for [`DEPTH_STENCIL_FORMAT`].
    #[must_use]
    pub fn depth_stencil_state(&self) -> wgpu::DepthStencilState {
        let depth_compare = if self.depth_test {
            self.depth_func.into()
        } else {
            wgpu::CompareFunction::Always
        };
        let stencil = if self.stencil_test {
            let pass_op = if self.stencil_write {
                wgpu::StencilOperation::Replace
            } else {
                wgpu::StencilOperation::Keep
            };
            let face = wgpu::StencilFaceState {
                compare: self.stencil_func.into(),
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op,
            };
            wgpu::StencilState {
                front: face,
                back: face,
                read_mask: self.stencil_mask,
                write_mask: if self.stencil_write { self.stencil_mask } else { 0 },
            }
        } else {
            wgpu::StencilState::default()
        };
        wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            depth_write_enabled: self.depth_test && self.depth_write,
            depth_compare,
            stencil,
            bias: wgpu::DepthBiasState::default(),
        }
    }

    /// Colour blending, or `None` when blending is off.
    #[must_use]
    pub fn blend_state(&self) -> Option<wgpu::BlendState> {
        if !self.blend {
            return None;
        }
        let component = |operation: BlendEquation| wgpu::BlendComponent {
            src_factor: self.blend_src.into(),
            dst_factor: self.blend_dst.into(),
            operation: operation.into(),
        };
        Some(wgpu::BlendState {
            color: component(self.blend_equation_color),
            alpha: component(self.blend_equation_alpha),
        })
    }

    /// Triangle-list rasterization with this state's culling and winding.
    ///
    /// Culling both faces cannot be expressed and falls back to no culling.
    #[must_use]
    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        let cull_mode = if self.cull_face {
            match wgpu::Face::try_from(self.triangle_face) {
                Ok(face) => Some(face),
                Err(face) => {
                    log::warn!("wgpu cannot cull {face:?}; culling disabled");
                    None
                }
            }
        } else {
            None
        };
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: self.front_face.into(),
            cull_mode,
            polygon_mode: self.polygon_mode.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn color_writes(&self) -> wgpu::ColorWrites {
        if self.color_write {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        }
    }

    /// Multisampling at `samples` when enabled, single-sampled otherwise.
    #[must_use]
    pub fn multisample_state(&self, samples: u32) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: if self.multisample { samples.max(1) } else { 1 },
            ..Default::default()
        }
    }

    /// The colour target for `format` with this state's blending and mask.
    #[must_use]
    pub fn color_target_state(&self, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: self.blend_state(),
            write_mask: self.color_writes(),
        }
    }
}
