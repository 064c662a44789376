//! Fixed-function render state and the render-layer presets.

/// Comparison used by the depth and stencil tests. A fragment passes when
/// `incoming <op> stored` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl Comparison {
    /// Evaluates the comparison.
    #[must_use]
    pub fn passes<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            Comparison::Never => false,
            Comparison::Less => incoming < stored,
            Comparison::Equal => incoming == stored,
            Comparison::LessOrEqual => incoming <= stored,
            Comparison::Greater => incoming > stored,
            Comparison::NotEqual => incoming != stored,
            Comparison::GreaterOrEqual => incoming >= stored,
            Comparison::Always => true,
        }
    }
}

/// Blending factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blending equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Which triangle faces a face-related setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
    FrontAndBack,
}

/// Winding order of front-facing triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

/// Rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Point,
    Line,
    Fill,
}

/// The complete fixed-function state a pipeline asserts on bind.
///
/// Every field is applied on every bind; nothing is inherited from the
/// previously bound pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RenderState {
    pub color_write: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: Comparison,
    pub stencil_test: bool,
    pub stencil_write: bool,
    pub stencil_func: Comparison,
    pub stencil_reference: i32,
    pub stencil_mask: u32,
    pub cull_face: bool,
    pub triangle_face: Face,
    pub front_face: Winding,
    pub blend: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    pub blend_equation_color: BlendEquation,
    pub blend_equation_alpha: BlendEquation,
    pub scissor_test: bool,
    pub primitive_restart: bool,
    pub polygon_face: Face,
    pub polygon_mode: PolygonMode,
    pub line_width: f32,
    pub point_size: f32,
    pub multisample: bool,
}

impl RenderState {
    /// Baseline every preset starts from.
    pub const DEFAULT: RenderState = RenderState {
        color_write: true,
        depth_test: true,
        depth_write: true,
        depth_func: Comparison::Less,
        stencil_test: false,
        stencil_write: false,
        stencil_func: Comparison::Always,
        stencil_reference: 0,
        stencil_mask: 0xFF,
        cull_face: false,
        triangle_face: Face::Back,
        front_face: Winding::CounterClockwise,
        blend: false,
        blend_src: BlendFactor::One,
        blend_dst: BlendFactor::Zero,
        blend_equation_color: BlendEquation::Add,
        blend_equation_alpha: BlendEquation::Add,
        scissor_test: false,
        primitive_restart: false,
        polygon_face: Face::FrontAndBack,
        polygon_mode: PolygonMode::Fill,
        line_width: 1.0,
        point_size: 1.0,
        multisample: true,
    };
}

impl Default for RenderState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Named state presets selecting how a pipeline interacts with the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderLayer {
    /// Sky and backdrops. Uses `LessOrEqual` so a far-plane backdrop is never
    /// rejected against a cleared depth buffer.
    Background,
    /// Double-sided helper geometry such as grids.
    Geometry,
    /// Solid, back-face culled surfaces.
    #[default]
    Opaque,
    /// Depth-tested, alpha-blended surfaces that do not write depth.
    Transparent,
    /// Screen-space draws: no depth test, alpha-blended.
    Overlay,
}

const BACKGROUND: RenderState = RenderState {
    depth_func: Comparison::LessOrEqual,
    ..RenderState::DEFAULT
};

const GEOMETRY: RenderState = RenderState::DEFAULT;

const OPAQUE: RenderState = RenderState {
    cull_face: true,
    triangle_face: Face::Back,
    ..RenderState::DEFAULT
};

const TRANSPARENT: RenderState = RenderState {
    depth_write: false,
    cull_face: true,
    triangle_face: Face::Back,
    blend: true,
    blend_src: BlendFactor::SrcAlpha,
    blend_dst: BlendFactor::OneMinusSrcAlpha,
    ..RenderState::DEFAULT
};

const OVERLAY: RenderState = RenderState {
    depth_test: false,
    depth_write: false,
    depth_func: Comparison::Always,
    blend: true,
    blend_src: BlendFactor::SrcAlpha,
    blend_dst: BlendFactor::OneMinusSrcAlpha,
    ..RenderState::DEFAULT
};

impl RenderLayer {
    /// All layers in their conventional draw order.
    pub const ALL: [RenderLayer; 5] = [
        RenderLayer::Background,
        RenderLayer::Geometry,
        RenderLayer::Opaque,
        RenderLayer::Transparent,
        RenderLayer::Overlay,
    ];

    /// The state bundle for this layer.
    #[must_use]
    pub const fn state(self) -> RenderState {
        match self {
            RenderLayer::Background => BACKGROUND,
            RenderLayer::Geometry => GEOMETRY,
            RenderLayer::Opaque => OPAQUE,
            RenderLayer::Transparent => TRANSPARENT,
            RenderLayer::Overlay => OVERLAY,
        }
    }
}

impl From<RenderLayer> for RenderState {
    fn from(layer: RenderLayer) -> Self {
        layer.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_table() {
        let rows = [
            (RenderLayer::Background, true, Comparison::LessOrEqual, false, false),
            (RenderLayer::Geometry, true, Comparison::Less, false, false),
            (RenderLayer::Opaque, true, Comparison::Less, true, false),
            (RenderLayer::Transparent, false, Comparison::Less, true, true),
            (RenderLayer::Overlay, false, Comparison::Always, false, true),
        ];
        for (layer, depth_write, depth_func, cull, blend) in rows {
            let s = layer.state();
            assert_eq!(s.depth_write, depth_write, "{layer:?}");
            assert_eq!(s.depth_func, depth_func, "{layer:?}");
            assert_eq!(s.cull_face, cull, "{layer:?}");
            assert_eq!(s.blend, blend, "{layer:?}");
            if cull {
                assert_eq!(s.triangle_face, Face::Back);
            }
            if blend {
                assert_eq!(s.blend_src, BlendFactor::SrcAlpha);
                assert_eq!(s.blend_dst, BlendFactor::OneMinusSrcAlpha);
            }
        }
        assert!(!RenderLayer::Overlay.state().depth_test);
    }

    #[test]
    fn test_layer_state_is_deterministic() {
        for layer in RenderLayer::ALL {
            assert_eq!(layer.state(), layer.state());
            assert_eq!(RenderState::from(layer), layer.state());
        }
    }

    #[test]
    fn test_comparison() {
        assert!(Comparison::Less.passes(0.2, 0.5));
        assert!(!Comparison::Less.passes(0.5, 0.5));
        assert!(Comparison::LessOrEqual.passes(0.5, 0.5));
        assert!(Comparison::Always.passes(9, 0));
        assert!(!Comparison::Never.passes(0, 9));
    }
}
