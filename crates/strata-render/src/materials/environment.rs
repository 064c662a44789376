//! Backdrop and helper-geometry materials.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use strata_core::{Property, PropertyKind, PropertyValue};

use super::{program, source};
use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::material::MaterialCore;
use crate::pipeline::{RenderPass, RenderPipeline};
use crate::state::RenderLayer;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkyBlock {
    pub horizon: [f32; 4],
    pub zenith: [f32; 4],
}

/// Vertical gradient on the far plane. Draw it with
/// [`shapes::fullscreen_triangle`](crate::mesh::shapes::fullscreen_triangle).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sky {
    pub horizon: Vec4,
    pub zenith: Vec4,
}

impl Default for Sky {
    fn default() -> Self {
        Self {
            horizon: Vec4::new(0.75, 0.82, 0.9, 1.0),
            zenith: Vec4::new(0.25, 0.45, 0.8, 1.0),
        }
    }
}

const SKY_PROPERTIES: &[Property<Sky>] = &[
    Property {
        label: "Horizon",
        kind: PropertyKind::Color,
        get: |m| PropertyValue::Color(m.horizon),
        set: |m, v| {
            if let Some(c) = v.as_color() {
                m.horizon = c;
            }
        },
    },
    Property {
        label: "Zenith",
        kind: PropertyKind::Color,
        get: |m| PropertyValue::Color(m.zenith),
        set: |m, v| {
            if let Some(c) = v.as_color() {
                m.zenith = c;
            }
        },
    },
];

impl MaterialCore for Sky {
    type Block = SkyBlock;

    fn label(&self) -> &'static str {
        "Sky"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(context, "sky", source::BACKGROUND_VERT, source::SKY_FRAG)?;
        Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Background)))
    }

    fn block(&self) -> SkyBlock {
        SkyBlock {
            horizon: self.horizon.to_array(),
            zenith: self.zenith.to_array(),
        }
    }

    fn properties() -> &'static [Property<Self>] {
        SKY_PROPERTIES
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GridBlock {
    pub color: [f32; 4],
    /// Cell size, line width.
    pub params: [f32; 4],
}

/// Anti-aliased lines on the world XZ plane, drawn double-sided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub color: Vec4,
    pub cell_size: f32,
    pub line_width: f32,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            color: Vec4::new(0.5, 0.5, 0.5, 1.0),
            cell_size: 1.0,
            line_width: 1.0,
        }
    }
}

const GRID_PROPERTIES: &[Property<Grid>] = &[
    Property {
        label: "Color",
        kind: PropertyKind::Color,
        get: |m| PropertyValue::Color(m.color),
        set: |m, v| {
            if let Some(c) = v.as_color() {
                m.color = c;
            }
        },
    },
    Property {
        label: "Cell Size",
        kind: PropertyKind::Float {
            min: 0.01,
            max: 100.0,
        },
        get: |m| PropertyValue::Float(m.cell_size),
        set: |m, v| {
            if let Some(f) = v.as_float() {
                m.cell_size = f;
            }
        },
    },
    Property {
        label: "Line Width",
        kind: PropertyKind::Float { min: 0.5, max: 8.0 },
        get: |m| PropertyValue::Float(m.line_width),
        set: |m, v| {
            if let Some(f) = v.as_float() {
                m.line_width = f;
            }
        },
    },
];

impl MaterialCore for Grid {
    type Block = GridBlock;

    fn label(&self) -> &'static str {
        "Grid"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(context, "grid", source::TRANSFORM_VERT, source::GRID_FRAG)?;
        Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Geometry)))
    }

    fn block(&self) -> GridBlock {
        GridBlock {
            color: self.color.to_array(),
            params: [self.cell_size, self.line_width, 0.0, 0.0],
        }
    }

    fn properties() -> &'static [Property<Self>] {
        GRID_PROPERTIES
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::camera::Camera;
    use crate::frame::Frame;
    use crate::material::{GlobalParameters, Material};
    use crate::materials::SolidColor;
    use crate::mesh::{shapes, Mesh, Vertex};
    use crate::software::SoftwareBackend;

    #[test]
    fn test_sky_stays_behind_geometry() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let frame = Frame::new(&ctx, 2, 1).unwrap();
        let (fv, fi) = shapes::fullscreen_triangle();
        let fullscreen = Mesh::<Vertex>::with_standard_attributes(&ctx, &fv, &fi).unwrap();
        // Covers the left pixel only.
        let (qv, qi) = shapes::quad(2.0);
        let quad = Mesh::<Vertex>::with_standard_attributes(&ctx, &qv, &qi).unwrap();

        let sky = Material::new(
            &ctx,
            Sky {
                horizon: Vec4::new(0.0, 0.0, 1.0, 1.0),
                zenith: Vec4::new(0.0, 0.0, 1.0, 1.0),
            },
        )
        .unwrap();
        let red = Material::new(&ctx, SolidColor::new(Vec4::new(1.0, 0.0, 0.0, 1.0))).unwrap();

        let camera = Camera::new(2.0);
        let params = GlobalParameters::new(camera);
        {
            let scope = frame.begin();
            scope.clear([0.0; 4]);
            sky.draw(&fullscreen, &params).unwrap();
            let left = params.for_object(Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)));
            red.draw(&quad, &left).unwrap();
            // Drawn again after the quad: depth 1 never beats it.
            sky.draw(&fullscreen, &params).unwrap();
        }
        assert_eq!(frame.read_pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(frame.read_pixel(1, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn test_grid_is_double_sided() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let grid = Material::new(&ctx, Grid::default()).unwrap();
        let state = grid.pass().main().state();
        assert!(!state.cull_face);
        assert_eq!(grid.pass().main().render_layer(), RenderLayer::Geometry);
    }
}
