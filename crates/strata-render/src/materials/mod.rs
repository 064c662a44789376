//! Built-in materials.
//!
//! Each material is a small [`MaterialCore`](crate::material::MaterialCore):
//! a block struct, a property table and one or two GLSL programs from
//! `src/shaders`. The global uniform declarations are prepended to every
//! stage.

mod basic;
mod effects;
mod environment;
mod lit;

use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::shader::{Shader, ShaderBuilder};

pub use basic::{InstancedSolidColor, SolidColor, SolidColorBlock, VertexColor};
pub use effects::{EdgeDetection, EdgeDetectionBlock, Outline, OutlineBlock};
pub use environment::{Grid, GridBlock, Sky, SkyBlock};
pub use lit::{Diffuse, DiffuseBlock, Specular, SpecularBlock};

pub(crate) const GLOBALS: &str = include_str!("../shaders/globals.glsl");

pub(crate) mod source {
    pub const TRANSFORM_VERT: &str = include_str!("../shaders/transform.vert");
    pub const INSTANCED_VERT: &str = include_str!("../shaders/instanced.vert");
    pub const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.vert");
    pub const BACKGROUND_VERT: &str = include_str!("../shaders/background.vert");
    pub const OUTLINE_SHELL_VERT: &str = include_str!("../shaders/outline_shell.vert");

    pub const SOLID_COLOR_FRAG: &str = include_str!("../shaders/solid_color.frag");
    pub const VERTEX_COLOR_FRAG: &str = include_str!("../shaders/vertex_color.frag");
    pub const DIFFUSE_FRAG: &str = include_str!("../shaders/diffuse.frag");
    pub const SPECULAR_FRAG: &str = include_str!("../shaders/specular.frag");
    pub const SKY_FRAG: &str = include_str!("../shaders/sky.frag");
    pub const GRID_FRAG: &str = include_str!("../shaders/grid.frag");
    pub const EDGE_DETECTION_FRAG: &str = include_str!("../shaders/edge_detection.frag");
    pub const OUTLINE_FILL_FRAG: &str = include_str!("../shaders/outline_fill.frag");
    pub const OUTLINE_SHELL_FRAG: &str = include_str!("../shaders/outline_shell.frag");
}

/// Links a vertex/fragment pair with the global declarations prepended.
pub(crate) fn program<'ctx>(
    context: &'ctx GpuContext,
    label: &str,
    vertex: &str,
    fragment: &str,
) -> RenderResult<Shader<'ctx>> {
    ShaderBuilder::new()
        .with_vertex(format!("{GLOBALS}\n{vertex}"))
        .with_fragment(format!("{GLOBALS}\n{fragment}"))
        .with_label(label)
        .build(context)
}
