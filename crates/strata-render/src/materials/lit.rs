//! Lit surface materials.

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
pub struct DiffuseBlock {
    pub color: [f32; 4],
}

/// Lambert shading of a colour modulated by texture channel 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diffuse {
    pub color: Vec4,
}

impl Default for Diffuse {
    fn default() -> Self {
        Self { color: Vec4::ONE }
    }
}

const DIFFUSE_PROPERTIES: &[Property<Diffuse>] = &[Property {
    label: "Color",
    kind: PropertyKind::Color,
    get: |m| PropertyValue::Color(m.color),
    set: |m, v| {
        if let Some(c) = v.as_color() {
            m.color = c;
        }
    },
}];

impl MaterialCore for Diffuse {
    type Block = DiffuseBlock;

    fn label(&self) -> &'static str {
        "Diffuse"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(context, "diffuse", source::TRANSFORM_VERT, source::DIFFUSE_FRAG)?;
        Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Opaque)))
    }

    fn block(&self) -> DiffuseBlock {
        DiffuseBlock {
            color: self.color.to_array(),
        }
    }

    fn properties() -> &'static [Property<Self>] {
        DIFFUSE_PROPERTIES
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpecularBlock {
    pub color: [f32; 4],
    pub specular_color: [f32; 4],
    /// Shininess in `x`.
    pub params: [f32; 4],
}

/// Blinn-Phong shading lit by the ambient, directional and point lights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Specular {
    pub color: Vec4,
    pub specular_color: Vec4,
    pub shininess: f32,
}

impl Default for Specular {
    fn default() -> Self {
        Self {
            color: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular_color: Vec4::ONE,
            shininess: 32.0,
        }
    }
}

const SPECULAR_PROPERTIES: &[Property<Specular>] = &[
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
        label: "Specular",
        kind: PropertyKind::Color,
        get: |m| PropertyValue::Color(m.specular_color),
        set: |m, v| {
            if let Some(c) = v.as_color() {
                m.specular_color = c;
            }
        },
    },
    Property {
        label: "Shininess",
        kind: PropertyKind::Float {
            min: 1.0,
            max: 256.0,
        },
        get: |m| PropertyValue::Float(m.shininess),
        set: |m, v| {
            if let Some(f) = v.as_float() {
                m.shininess = f;
            }
        },
    },
];

impl MaterialCore for Specular {
    type Block = SpecularBlock;

    fn label(&self) -> &'static str {
        "Specular"
    }

    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
        let shader = program(context, "specular", source::TRANSFORM_VERT, source::SPECULAR_FRAG)?;
        Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Opaque)))
    }

    fn block(&self) -> SpecularBlock {
        SpecularBlock {
            color: self.color.to_array(),
            specular_color: self.specular_color.to_array(),
            params: [self.shininess, 0.0, 0.0, 0.0],
        }
    }

    fn properties() -> &'static [Property<Self>] {
        SPECULAR_PROPERTIES
    }
}
