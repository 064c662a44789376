//! GPU-resident meshes and vertex layouts.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

use crate::backend::{BufferKind, VertexArrayId, VertexAttribute};
use crate::buffer::TypedBuffer;
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};

/// Standard shader input locations.
pub mod attribute {
    pub const POSITION: u32 = 0;
    pub const NORMAL: u32 = 1;
    pub const TANGENT: u32 = 2;
    pub const BITANGENT: u32 = 3;
    pub const COLOR: u32 = 4;
    pub const UV: u32 = 5;
}

/// One named field of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexField {
    pub name: &'static str,
    /// Byte offset inside one vertex.
    pub offset: usize,
    /// Number of `f32` components.
    pub components: u32,
}

/// A vertex type with a declared field table.
///
/// The table is what [`Mesh::vertex_attribute_pointer`] resolves field names
/// against, so a material binds only the inputs its shader reads.
pub trait VertexLayout: Pod {
    const FIELDS: &'static [VertexField];

    /// Looks a field up by name.
    fn field(name: &str) -> Option<&'static VertexField> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
}

/// The standard vertex: position, normal, tangent, bitangent, colour and
/// texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl VertexLayout for Vertex {
    const FIELDS: &'static [VertexField] = &[
        VertexField {
            name: "position",
            offset: offset_of!(Vertex, position),
            components: 3,
        },
        VertexField {
            name: "normal",
            offset: offset_of!(Vertex, normal),
            components: 3,
        },
        VertexField {
            name: "tangent",
            offset: offset_of!(Vertex, tangent),
            components: 3,
        },
        VertexField {
            name: "bitangent",
            offset: offset_of!(Vertex, bitangent),
            components: 3,
        },
        VertexField {
            name: "color",
            offset: offset_of!(Vertex, color),
            components: 4,
        },
        VertexField {
            name: "uv",
            offset: offset_of!(Vertex, uv),
            components: 2,
        },
    ];
}

impl Vertex {
    /// A white vertex at `position` facing +Z.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: [0.0, 0.0, 1.0],
            tangent: [1.0, 0.0, 0.0],
            bitangent: [0.0, 1.0, 0.0],
            color: [1.0; 4],
            uv: [0.0; 2],
        }
    }

    #[must_use]
    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = normal.to_array();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color.to_array();
        self
    }

    #[must_use]
    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = uv.to_array();
        self
    }
}

/// Vertex and index buffers plus the vertex array binding them.
///
/// Uploaded once; `index_count` never changes. Deleted on drop.
pub struct Mesh<'ctx, V: VertexLayout = Vertex> {
    context: &'ctx GpuContext,
    vertex_array: VertexArrayId,
    vertices: TypedBuffer<'ctx, V>,
    indices: TypedBuffer<'ctx, u32>,
}

impl<'ctx, V: VertexLayout> Mesh<'ctx, V> {
    /// Uploads `vertices` and the triangle list `indices`.
    ///
    /// No attribute is bound yet; see [`vertex_attribute_pointer`](Self::vertex_attribute_pointer).
    pub fn new(context: &'ctx GpuContext, vertices: &[V], indices: &[u32]) -> RenderResult<Self> {
        let vertex_buffer = TypedBuffer::from_slice(context, BufferKind::Vertex, vertices)?;
        let index_buffer = TypedBuffer::from_slice(context, BufferKind::Index, indices)?;
        let vertex_array = context.backend().create_vertex_array(
            vertex_buffer.id(),
            index_buffer.id(),
            size_of::<V>(),
        )?;
        log::debug!(
            "created mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );
        Ok(Self {
            context,
            vertex_array,
            vertices: vertex_buffer,
            indices: index_buffer,
        })
    }

    /// Binds the layout field `field` to shader input `location`, reading
    /// `components` floats.
    pub fn vertex_attribute_pointer(
        &self,
        location: u32,
        components: u32,
        field: &str,
    ) -> RenderResult<()> {
        let f = V::field(field).ok_or_else(|| RenderError::UnknownVertexField(field.to_string()))?;
        self.context.backend().vertex_attribute(
            self.vertex_array,
            VertexAttribute {
                location,
                components: components.min(f.components),
                offset: f.offset,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        u32::try_from(self.indices.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Indexed triangle-list draw with the currently bound program.
    pub fn draw(&self) {
        self.draw_instanced(1);
    }

    /// Draws `count` instances; per-instance data comes from a storage
    /// buffer the shader indexes by instance id.
    pub fn draw_instanced(&self, count: u32) {
        if count == 0 {
            return;
        }
        self.context
            .backend()
            .draw_elements(self.vertex_array, self.index_count(), count);
    }
}

impl<'ctx> Mesh<'ctx, Vertex> {
    /// Uploads and binds every standard attribute at its standard location.
    pub fn with_standard_attributes(
        context: &'ctx GpuContext,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> RenderResult<Self> {
        let mesh = Self::new(context, vertices, indices)?;
        for (location, field) in [
            (attribute::POSITION, "position"),
            (attribute::NORMAL, "normal"),
            (attribute::TANGENT, "tangent"),
            (attribute::BITANGENT, "bitangent"),
            (attribute::COLOR, "color"),
            (attribute::UV, "uv"),
        ] {
            let components = Vertex::field(field).map_or(0, |f| f.components);
            mesh.vertex_attribute_pointer(location, components, field)?;
        }
        Ok(mesh)
    }
}

impl<V: VertexLayout> Drop for Mesh<'_, V> {
    fn drop(&mut self) {
        self.context.backend().delete_vertex_array(self.vertex_array);
    }
}

/// Vertex/index data for common shapes.
pub mod shapes {
    use glam::{Vec2, Vec3, Vec4};

    use super::Vertex;

    /// One triangle with counter-clockwise winding as given.
    #[must_use]
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> (Vec<Vertex>, Vec<u32>) {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        let vertices = [a, b, c]
            .into_iter()
            .map(|p| Vertex::new(p).with_normal(normal))
            .collect();
        (vertices, vec![0, 1, 2])
    }

    /// An axis-aligned square of side `size` in the XY plane, facing +Z.
    #[must_use]
    pub fn quad(size: f32) -> (Vec<Vertex>, Vec<u32>) {
        let h = size * 0.5;
        let corners = [
            (Vec3::new(-h, -h, 0.0), Vec2::new(0.0, 0.0)),
            (Vec3::new(h, -h, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(h, h, 0.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(-h, h, 0.0), Vec2::new(0.0, 1.0)),
        ];
        let vertices = corners
            .into_iter()
            .map(|(p, uv)| Vertex::new(p).with_uv(uv))
            .collect();
        (vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// A cube of side `size` centred on the origin, outward-facing normals.
    #[must_use]
    pub fn cube(size: f32) -> (Vec<Vertex>, Vec<u32>) {
        let h = size * 0.5;
        let faces = [
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::Z),
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, up) in faces {
            let right = up.cross(normal);
            let base = u32::try_from(vertices.len()).unwrap_or(0);
            for (u, v) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (normal + right * u + up * v) * h;
                let mut vertex = Vertex::new(p)
                    .with_normal(normal)
                    .with_uv(Vec2::new((u + 1.0) * 0.5, (v + 1.0) * 0.5));
                vertex.tangent = right.to_array();
                vertex.bitangent = up.to_array();
                vertices.push(vertex);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        (vertices, indices)
    }

    /// One clip-space triangle covering the whole viewport.
    #[must_use]
    pub fn fullscreen_triangle() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = [(-1.0, -1.0, 0.0, 0.0), (3.0, -1.0, 2.0, 0.0), (-1.0, 3.0, 0.0, 2.0)]
            .into_iter()
            .map(|(x, y, u, v)| {
                Vertex::new(Vec3::new(x, y, 0.0))
                    .with_uv(Vec2::new(u, v))
                    .with_color(Vec4::ONE)
            })
            .collect();
        (vertices, vec![0, 1, 2])
    }
}
