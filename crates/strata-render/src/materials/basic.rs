//! Unlit materials.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use strata_core::{Property, PropertyKind, PropertyValue};

use super::{program, source};
use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::material::{DrawCall, MaterialCore};
use crate::mesh::{Mesh, VertexLayout};
use crate::pipeline::{RenderPass, RenderPipeline};
use crate::state::RenderLayer;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SolidColorBlock {
    pub color: [f32; 4],
}

/// One flat colour.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidColor {
    pub color: Vec4,
    layer: RenderLayer,
}

impl SolidColor {
    /// An opaque flat colour.
    #[must_use]
    pub fn new(color: Vec4) -> Self {
        Self::with_layer(color, RenderLayer::Opaque)
    }

    /// A flat colour drawn with the preset of `layer`.
    #[must_use]
    pub fn with_layer(color: Vec4, layer: RenderLayer) -> Self {
        Self { color, layer }
    }

    #[must_use]
    pub fn layer(&self) -> RenderLayer {
        self.layer
    }
}

const COLOR_PROPERTIES: &[Property<SolidColor>] = &[Property {
    label: "Color",
    kind: PropertyKind::Color,
    get: |m| PropertyValue::Color(m.color),
    set: |m, v| {
        if let Some(c) = v.as_color() {
            m.color = c;
        }
    },
}];

impl MaterialCore for SolidColor {
    type Block = SolidColorBlock;

    fn label(&self) -> &'static str {
        "Solid Color"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(
            context,
            "solid color",
            source::TRANSFORM_VERT,
            source::SOLID_COLOR_FRAG,
        )?;
        Ok(RenderPass::new(RenderPipeline::new(shader, self.layer)))
    }

    fn block(&self) -> SolidColorBlock {
        SolidColorBlock {
            color: self.color.to_array(),
        }
    }

    fn properties() -> &'static [Property<Self>] {
        COLOR_PROPERTIES
    }
}

/// Interpolated per-vertex colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexColor {
    layer: RenderLayer,
}

impl VertexColor {
    #[must_use]
    pub fn new(layer: RenderLayer) -> Self {
        Self { layer }
    }
}

impl MaterialCore for VertexColor {
    // No parameters; the block keeps slot 8 populated.
    type Block = [f32; 4];

    fn label(&self) -> &'static str {
        "Vertex Color"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(
            context,
            "vertex color",
            source::TRANSFORM_VERT,
            source::VERTEX_COLOR_FRAG,
        )?;
        Ok(RenderPass::new(RenderPipeline::new(shader, self.layer)))
    }

    fn block(&self) -> [f32; 4] {
        [0.0; 4]
    }

    fn properties() -> &'static [Property<Self>] {
        &[]
    }
}

/// A flat colour drawn once per model matrix.
///
/// Instances are uploaded to the storage buffer in pages; see
/// [`Material::set_instance_page_size`](crate::material::Material::set_instance_page_size).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstancedSolidColor {
    pub color: Vec4,
    pub models: Vec<Mat4>,
}

impl InstancedSolidColor {
    #[must_use]
    pub fn new(color: Vec4, models: Vec<Mat4>) -> Self {
        Self { color, models }
    }
}

const INSTANCED_PROPERTIES: &[Property<InstancedSolidColor>] = &[Property {
    label: "Color",
    kind: PropertyKind::Color,
    get: |m| PropertyValue::Color(m.color),
    set: |m, v| {
        if let Some(c) = v.as_color() {
            m.color = c;
        }
    },
}];

impl MaterialCore for InstancedSolidColor {
    type Block = SolidColorBlock;
    const INSTANCED: bool = true;

    fn label(&self) -> &'static str {
        "Instanced Solid Color"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(
            context,
            "instanced solid color",
            source::INSTANCED_VERT,
            source::SOLID_COLOR_FRAG,
        )?;
        Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Opaque)))
    }

    fn block(&self) -> SolidColorBlock {
        SolidColorBlock {
            color: self.color.to_array(),
        }
    }

    fn draw_core<V: VertexLayout>(&self, call: &DrawCall<'_, '_>, mesh: &Mesh<'_, V>) -> RenderResult<()> {
        call.draw_instanced(call.pass().main(), mesh, &self.models)?;
        Ok(())
    }

    fn properties() -> &'static [Property<Self>] {
        INSTANCED_PROPERTIES
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::camera::Camera;
    use crate::frame::Frame;
    use crate::material::{GlobalParameters, Material};
    use crate::mesh::{shapes, Vertex};
    use crate::software::SoftwareBackend;

    #[test]
    fn test_vertex_color_interpolates() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let frame = Frame::new(&ctx, 1, 1).unwrap();
        let (mut vertices, indices) = shapes::fullscreen_triangle();
        for v in &mut vertices {
            v.color = [0.0, 0.0, 1.0, 1.0];
        }
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &vertices, &indices).unwrap();
        let material = Material::new(&ctx, VertexColor::new(RenderLayer::Overlay)).unwrap();
        // Unit orthographic view: the clip-space triangle passes through.
        let mut camera = Camera::orthographic(Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0);
        camera.near = 0.5;
        camera.far = 1.5;
        {
            let scope = frame.begin();
            scope.clear([0.0, 0.0, 0.0, 1.0]);
            material.draw(&mesh, &GlobalParameters::new(camera)).unwrap();
        }
        assert_eq!(frame.read_pixel(0, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn test_instanced_draws_every_model() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let frame = Frame::new(&ctx, 8, 1).unwrap();
        let (v, i) = shapes::quad(0.2);
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let models = (0..4)
            .map(|k| Mat4::from_translation(Vec3::new(-0.875 + 0.5 * k as f32, 0.0, 0.0)))
            .collect();
        let mut material = Material::new(
            &ctx,
            InstancedSolidColor::new(Vec4::new(1.0, 0.0, 0.0, 1.0), models),
        )
        .unwrap();
        material.set_instance_page_size(3);
        let mut params = GlobalParameters::new(Camera::orthographic(Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0));
        params.camera.near = 0.5;
        params.camera.far = 1.5;
        {
            let scope = frame.begin();
            scope.clear([0.0; 4]);
            material.draw(&mesh, &params).unwrap();
        }
        // Instances sit over the even pixels of the 8x1 target.
        let lit: Vec<u8> = (0..8).map(|x| frame.read_pixel(x, 0)[0]).collect();
        assert_eq!(lit, [255, 0, 255, 0, 255, 0, 255, 0]);
    }
}
