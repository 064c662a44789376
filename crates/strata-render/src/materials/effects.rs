//! Selection highlighting.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use strata_core::{OutlineOptions, Property, PropertyKind, PropertyValue};

use super::{program, source};
use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::material::MaterialCore;
use crate::pipeline::{RenderPass, RenderPipeline};
use crate::state::{Face, RenderLayer};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EdgeDetectionBlock {
    pub color: [f32; 4],
    /// Thickness in pixels in `x`.
    pub params: [f32; 4],
}

/// Screen-space outline around the covered texels of a mask.
///
/// Channel 0 holds the mask; any texel with alpha above zero counts as
/// covered. Pixels outside the mask but within `thickness` of it get
/// `color`; everything else is discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDetection {
    pub color: Vec4,
    pub thickness: f32,
}

impl Default for EdgeDetection {
    fn default() -> Self {
        Self::from(&OutlineOptions::default())
    }
}

impl From<&OutlineOptions> for EdgeDetection {
    #[allow(clippy::cast_precision_loss)]
    fn from(options: &OutlineOptions) -> Self {
        Self {
            color: options.color,
            thickness: options.thickness as f32,
        }
    }
}

const EDGE_PROPERTIES: &[Property<EdgeDetection>] = &[
    Property {
        label: "Outline Color",
        kind: PropertyKind::Color,
        get: |m| PropertyValue::Color(m.color),
        set: |m, v| {
            if let Some(c) = v.as_color() {
                m.color = c;
            }
        },
    },
    Property {
        label: "Thickness",
        kind: PropertyKind::Float { min: 1.0, max: 16.0 },
        get: |m| PropertyValue::Float(m.thickness),
        set: |m, v| {
            if let Some(f) = v.as_float() {
                m.thickness = f;
            }
        },
    },
];

impl MaterialCore for EdgeDetection {
    type Block = EdgeDetectionBlock;

    fn label(&self) -> &'static str {
        "Edge Detection"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(
            context,
            "edge detection",
            source::FULLSCREEN_VERT,
            source::EDGE_DETECTION_FRAG,
        )?;
        Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Overlay)))
    }

    fn block(&self) -> EdgeDetectionBlock {
        EdgeDetectionBlock {
            color: self.color.to_array(),
            params: [self.thickness, 0.0, 0.0, 0.0],
        }
    }

    fn properties() -> &'static [Property<Self>] {
        EDGE_PROPERTIES
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct OutlineBlock {
    pub outline_color: [f32; 4],
    /// Shell width in object units in `x`.
    pub params: [f32; 4],
    pub color: [f32; 4],
}

/// Two-pipeline outline: the surface, then a shell pushed out along the
/// normals with front faces culled so only its rim shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub color: Vec4,
    pub outline_color: Vec4,
    pub width: f32,
}

impl Default for Outline {
    fn default() -> Self {
        Self {
            color: Vec4::new(0.8, 0.8, 0.8, 1.0),
            outline_color: Vec4::new(1.0, 0.6, 0.0, 1.0),
            width: 0.02,
        }
    }
}

const OUTLINE_PROPERTIES: &[Property<Outline>] = &[
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
        label: "Outline Color",
        kind: PropertyKind::Color,
        get: |m| PropertyValue::Color(m.outline_color),
        set: |m, v| {
            if let Some(c) = v.as_color() {
                m.outline_color = c;
            }
        },
    },
    Property {
        label: "Outline Width",
        kind: PropertyKind::Float { min: 0.0, max: 1.0 },
        get: |m| PropertyValue::Float(m.width),
        set: |m, v| {
            if let Some(f) = v.as_float() {
                m.width = f;
            }
        },
    },
];

impl MaterialCore for Outline {
    type Block = OutlineBlock;

    fn label(&self) -> &'static str {
        "Outline"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let fill = program(
            context,
            "outline fill",
            source::TRANSFORM_VERT,
            source::OUTLINE_FILL_FRAG,
        )?;
        let shell = program(
            context,
            "outline shell",
            source::OUTLINE_SHELL_VERT,
            source::OUTLINE_SHELL_FRAG,
        )?;
        let mut shell = RenderPipeline::new(shell, RenderLayer::Opaque);
        shell.state_mut().triangle_face = Face::Front;
        Ok(RenderPass::new(RenderPipeline::new(fill, RenderLayer::Opaque)).with(shell))
    }

    fn block(&self) -> OutlineBlock {
        OutlineBlock {
            outline_color: self.outline_color.to_array(),
            params: [self.width, 0.0, 0.0, 0.0],
            color: self.color.to_array(),
        }
    }

    fn properties() -> &'static [Property<Self>] {
        OUTLINE_PROPERTIES
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::camera::Camera;
    use crate::frame::Frame;
    use crate::material::{GlobalParameters, Material};
    use crate::mesh::{shapes, Mesh, Vertex};
    use crate::software::SoftwareBackend;
    use crate::texture::Texture;

    #[test]
    fn test_edge_detection_rings_the_mask() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let frame = Frame::new(&ctx, 5, 1).unwrap();
        // Mask covers the middle texel of five.
        let mut pixels = vec![0u8; 5 * 4];
        pixels[2 * 4..3 * 4].copy_from_slice(&[255, 255, 255, 255]);
        let mask = Texture::from_rgba8(&ctx, 5, 1, &pixels).unwrap();

        let (v, i) = shapes::fullscreen_triangle();
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let mut material = Material::new(
            &ctx,
            EdgeDetection {
                color: Vec4::new(1.0, 1.0, 0.0, 1.0),
                thickness: 1.0,
            },
        )
        .unwrap();
        material.set_channel(0, Rc::new(mask)).unwrap();
        {
            let scope = frame.begin();
            scope.clear([0.0; 4]);
            material.draw(&mesh, &GlobalParameters::default()).unwrap();
        }
        let row: Vec<u8> = (0..5).map(|x| frame.read_pixel(x, 0)[0]).collect();
        assert_eq!(row, [0, 255, 0, 255, 0]);
    }

    #[test]
    fn test_outline_shell_culls_front_faces() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let material = Material::new(&ctx, Outline::default()).unwrap();
        assert_eq!(material.pass().len(), 2);
        let shell = material.pass().pipeline(1).unwrap().state();
        assert!(shell.cull_face);
        assert_eq!(shell.triangle_face, Face::Front);
    }

    #[test]
    fn test_outline_rim_surrounds_fill() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let frame = Frame::new(&ctx, 9, 9).unwrap();
        let (mut v, i) = shapes::cube(1.0);
        // Smooth normals so the shell stays closed at the edges.
        for vertex in &mut v {
            vertex.normal = Vec3::from(vertex.position).normalize().to_array();
        }
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let material = Material::new(
            &ctx,
            Outline {
                color: Vec4::new(1.0, 0.0, 0.0, 1.0),
                outline_color: Vec4::new(0.0, 1.0, 0.0, 1.0),
                width: 0.4,
            },
        )
        .unwrap();
        let mut camera = Camera::orthographic(Vec3::new(0.0, 0.0, 5.0), 1.5, 1.0);
        camera.near = 1.0;
        camera.far = 10.0;
        {
            let scope = frame.begin();
            scope.clear([0.0; 4]);
            material.draw(&mesh, &GlobalParameters::new(camera)).unwrap();
        }
        // Pixel centres sit at -1.5 + (k + 0.5) / 3. The cube spans
        // [-0.5, 0.5] and its shell about [-0.73, 0.73].
        assert_eq!(frame.read_pixel(4, 4), [255, 0, 0, 255]);
        assert_eq!(frame.read_pixel(4, 2), [0, 255, 0, 255]);
        assert_eq!(frame.read_pixel(2, 4), [0, 255, 0, 255]);
        assert_eq!(frame.read_pixel(4, 1), [0, 0, 0, 0]);
        assert_eq!(frame.read_pixel(4, 8), [0, 0, 0, 0]);
    }
}
