//! A CPU reference implementation of [`Backend`].
//!
//! `SoftwareBackend` keeps every resource in host memory and rasterizes
//! indexed triangle lists with the same fixed-function semantics a GL-style
//! device applies: depth and stencil tests, face culling, blending and write
//! masks. It runs headless and deterministically, so pixel-level behaviour
//! can be checked without a GPU.
//!
//! Shader code is never executed. Programs pick one of a few built-in
//! routines through a `#pragma reference(...)` line; see [`program`].

mod program;
mod raster;

use std::collections::HashMap;

use glam::{Mat4, Vec4};

use crate::backend::{
    Backend, BufferId, BufferKind, ClearValues, FramebufferId, ProgramId,
    StateChange, TextureDesc, TextureFormat, TextureId, VertexArrayId, VertexAttribute,
};
use crate::error::{RenderError, RenderResult};
use crate::material::{TransformBlock, INSTANCE_STORAGE_SLOT, TRANSFORM_SLOT};
use crate::mesh::attribute;
use crate::shader::ShaderModule;
use crate::state::{PolygonMode, RenderState};

use self::program::ReferenceProgram;
use self::raster::{Surface, Targets, VertexInput, Viewport};

struct SoftBuffer {
    kind: BufferKind,
    data: Vec<u8>,
}

struct SoftVertexArray {
    vertices: BufferId,
    indices: BufferId,
    stride: usize,
    attributes: HashMap<u32, VertexAttribute>,
}

#[derive(Clone, Copy)]
struct SoftFramebuffer {
    color: TextureId,
    depth_stencil: Option<TextureId>,
}

/// Headless CPU rasterizer.
pub struct SoftwareBackend {
    next_id: u32,
    state: RenderState,
    buffers: HashMap<u32, SoftBuffer>,
    vertex_arrays: HashMap<u32, SoftVertexArray>,
    programs: HashMap<u32, ReferenceProgram>,
    textures: HashMap<u32, Surface>,
    framebuffers: HashMap<u32, SoftFramebuffer>,
    default_target: SoftFramebuffer,
    bound_framebuffer: Option<FramebufferId>,
    program: Option<ProgramId>,
    uniform_slots: HashMap<u32, BufferId>,
    storage_slots: HashMap<u32, BufferId>,
    texture_units: HashMap<u32, TextureId>,
    target_bindings: HashMap<BufferKind, BufferId>,
    viewport: Viewport,
    warned_polygon_mode: bool,
}

impl SoftwareBackend {
    /// Creates a backend whose default target is `width` x `height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let mut backend = Self {
            next_id: 1,
            state: RenderState::DEFAULT,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            default_target: SoftFramebuffer {
                color: TextureId(0),
                depth_stencil: None,
            },
            bound_framebuffer: None,
            program: None,
            uniform_slots: HashMap::new(),
            storage_slots: HashMap::new(),
            texture_units: HashMap::new(),
            target_bindings: HashMap::new(),
            viewport: Viewport {
                x: 0,
                y: 0,
                width,
                height,
            },
            warned_polygon_mode: false,
        };
        let color = backend.insert_surface(Surface::new(width, height, TextureFormat::Rgba8));
        let depth = backend.insert_surface(Surface::new(width, height, TextureFormat::Depth24Stencil8));
        backend.default_target = SoftFramebuffer {
            color,
            depth_stencil: Some(depth),
        };
        backend
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_surface(&mut self, surface: Surface) -> TextureId {
        let id = self.allocate_id();
        self.textures.insert(id, surface);
        TextureId(id)
    }

    fn current_target(&self) -> SoftFramebuffer {
        self.bound_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb.0).copied())
            .unwrap_or(self.default_target)
    }

    fn fetch_vertices(&self, vao: &SoftVertexArray) -> Vec<VertexInput> {
        let Some(vertex_buffer) = self.buffers.get(&vao.vertices.0) else {
            return Vec::new();
        };
        if vao.stride == 0 {
            return Vec::new();
        }
        let read = |base: usize, location: u32, default: Vec4| -> Vec4 {
            let Some(attr) = vao.attributes.get(&location) else {
                return default;
            };
            let mut out = default.to_array();
            for (c, slot) in out.iter_mut().enumerate().take(attr.components as usize) {
                let at = base + attr.offset + c * 4;
                if let Some(bytes) = vertex_buffer.data.get(at..at + 4) {
                    *slot = bytemuck::pod_read_unaligned::<f32>(bytes);
                }
            }
            Vec4::from_array(out)
        };
        let count = vertex_buffer.data.len() / vao.stride;
        (0..count)
            .map(|i| {
                let base = i * vao.stride;
                VertexInput {
                    position: read(base, attribute::POSITION, Vec4::W).truncate(),
                    normal: read(base, attribute::NORMAL, Vec4::W).truncate(),
                    color: read(base, attribute::COLOR, Vec4::W),
                    uv: read(base, attribute::UV, Vec4::W).truncate().truncate(),
                }
            })
            .collect()
    }

    fn fetch_indices(&self, vao: &SoftVertexArray, count: u32) -> Vec<u32> {
        self.buffers
            .get(&vao.indices.0)
            .map(|b| {
                b.data
                    .chunks_exact(4)
                    .take(count as usize)
                    .map(bytemuck::pod_read_unaligned::<u32>)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn slot_bytes(&self, slots: &HashMap<u32, BufferId>, slot: u32) -> Option<&[u8]> {
        let id = slots.get(&slot)?;
        self.buffers.get(&id.0).map(|b| b.data.as_slice())
    }

    fn transform_block(&self) -> Option<TransformBlock> {
        let bytes = self.slot_bytes(&self.uniform_slots, TRANSFORM_SLOT)?;
        let size = std::mem::size_of::<TransformBlock>();
        bytes
            .get(..size)
            .map(bytemuck::pod_read_unaligned::<TransformBlock>)
    }

    fn instance_models(&self) -> Vec<Mat4> {
        self.slot_bytes(&self.storage_slots, INSTANCE_STORAGE_SLOT)
            .map(|bytes| {
                bytes
                    .chunks_exact(64)
                    .map(|c| Mat4::from_cols_array(&bytemuck::pod_read_unaligned::<[f32; 16]>(c)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Backend for SoftwareBackend {
    fn name(&self) -> &str {
        "software reference"
    }

    fn apply(&mut self, change: StateChange) {
        if let StateChange::PolygonMode { mode, .. } = change {
            if mode != PolygonMode::Fill && !self.warned_polygon_mode {
                log::warn!("software backend rasterizes {mode:?} polygons as filled triangles");
                self.warned_polygon_mode = true;
            }
        }
        change.apply_to(&mut self.state);
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> RenderResult<BufferId> {
        let id = self.allocate_id();
        self.buffers.insert(
            id,
            SoftBuffer {
                kind,
                data: vec![0; size],
            },
        );
        Ok(BufferId(id))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        let Some(b) = self.buffers.get_mut(&buffer.0) else {
            log::warn!("write to unknown buffer {buffer:?}");
            return;
        };
        match b.data.get_mut(offset..offset + data.len()) {
            Some(dst) => dst.copy_from_slice(data),
            None => log::warn!(
                "{:?} buffer write of {} bytes at {offset} exceeds its {} byte allocation; ignored",
                b.kind,
                data.len(),
                b.data.len()
            ),
        }
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, len: usize) -> Vec<u8> {
        self.buffers
            .get(&buffer.0)
            .and_then(|b| b.data.get(offset..offset + len))
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    fn bind_buffer_target(&mut self, kind: BufferKind, buffer: BufferId) {
        self.target_bindings.insert(kind, buffer);
    }

    fn bind_buffer(&mut self, kind: BufferKind, slot: u32, buffer: BufferId) {
        match kind {
            BufferKind::Uniform => {
                self.uniform_slots.insert(slot, buffer);
            }
            BufferKind::Storage => {
                self.storage_slots.insert(slot, buffer);
            }
            // Vertex and index buffers are reached through their vertex array.
            BufferKind::Vertex | BufferKind::Index => {}
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer.0);
        self.uniform_slots.retain(|_, b| *b != buffer);
        self.storage_slots.retain(|_, b| *b != buffer);
        self.target_bindings.retain(|_, b| *b != buffer);
    }

    fn create_vertex_array(
        &mut self,
        vertices: BufferId,
        indices: BufferId,
        stride: usize,
    ) -> RenderResult<VertexArrayId> {
        if !self.buffers.contains_key(&vertices.0) || !self.buffers.contains_key(&indices.0) {
            return Err(RenderError::ResourceCreation(
                "vertex array over unknown buffers".into(),
            ));
        }
        let id = self.allocate_id();
        self.vertex_arrays.insert(
            id,
            SoftVertexArray {
                vertices,
                indices,
                stride,
                attributes: HashMap::new(),
            },
        );
        Ok(VertexArrayId(id))
    }

    fn vertex_attribute(&mut self, vertex_array: VertexArrayId, attribute: VertexAttribute) {
        if let Some(vao) = self.vertex_arrays.get_mut(&vertex_array.0) {
            vao.attributes.insert(attribute.location, attribute);
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array.0);
    }

    fn create_program(&mut self, modules: &[ShaderModule]) -> Result<ProgramId, String> {
        let program = program::link(modules)?;
        let id = self.allocate_id();
        self.programs.insert(id, program);
        Ok(ProgramId(id))
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.0);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::ResourceCreation(format!(
                "texture of size {}x{}",
                desc.width, desc.height
            )));
        }
        if desc.samples > 1 {
            log::debug!("software backend stores {}x MSAA texture single-sampled", desc.samples);
        }
        Ok(self.insert_surface(Surface::new(desc.width, desc.height, desc.format)))
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) {
        if let Some(surface) = self.textures.get_mut(&texture.0) {
            if surface.color.len() == data.len() {
                surface.color.copy_from_slice(data);
            } else {
                log::warn!(
                    "texture upload of {} bytes does not match {}x{} RGBA8; ignored",
                    data.len(),
                    surface.width,
                    surface.height
                );
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(t) => {
                self.texture_units.insert(unit, t);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture.0);
        self.texture_units.retain(|_, t| *t != texture);
    }

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth_stencil: Option<TextureId>,
    ) -> RenderResult<FramebufferId> {
        let size = |id: TextureId| self.textures.get(&id.0).map(|s| (s.width, s.height, s.format));
        let Some((w, h, TextureFormat::Rgba8)) = size(color) else {
            return Err(RenderError::ResourceCreation(
                "framebuffer colour attachment must be an RGBA8 texture".into(),
            ));
        };
        if let Some(ds) = depth_stencil {
            if size(ds) != Some((w, h, TextureFormat::Depth24Stencil8)) {
                return Err(RenderError::ResourceCreation(
                    "framebuffer depth attachment must be depth-stencil and match the colour size"
                        .into(),
                ));
            }
        }
        let id = self.allocate_id();
        self.framebuffers.insert(
            id,
            SoftFramebuffer {
                color,
                depth_stencil,
            },
        );
        Ok(FramebufferId(id))
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer.0);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
    }

    fn clear(&mut self, values: ClearValues) {
        let target = self.current_target();
        let state = self.state;
        if let (Some(c), true) = (values.color, state.color_write) {
            if let Some(surface) = self.textures.get_mut(&target.color.0) {
                let px = Vec4::from_array(c).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
                let px = px.round().to_array().map(|v| v as u8);
                for texel in surface.color.chunks_exact_mut(4) {
                    texel.copy_from_slice(&px);
                }
            }
        }
        let Some(ds) = target
            .depth_stencil
            .and_then(|id| self.textures.get_mut(&id.0))
        else {
            return;
        };
        if let (Some(d), true) = (values.depth, state.depth_write) {
            ds.depth.fill(d.clamp(0.0, 1.0));
        }
        if let (Some(s), true) = (values.stencil, state.stencil_write) {
            ds.stencil.fill(s as u8);
        }
    }

    fn draw_elements(&mut self, vertex_array: VertexArrayId, index_count: u32, instances: u32) {
        let Some(program) = self.program.and_then(|p| self.programs.get(&p.0)).copied() else {
            log::warn!("draw without a linked program; skipped");
            return;
        };
        if !program.drawable {
            log::warn!("draw with a compute-only program; skipped");
            return;
        }
        let Some(vao) = self.vertex_arrays.get(&vertex_array.0) else {
            log::warn!("draw with unknown vertex array {vertex_array:?}");
            return;
        };
        let vertices = self.fetch_vertices(vao);
        let indices = self.fetch_indices(vao, index_count);
        let triangles = raster::assemble(&indices, self.state.primitive_restart);

        let target = self.current_target();
        let Some(mut color) = self.textures.remove(&target.color.0) else {
            log::warn!("draw into a framebuffer whose colour texture was deleted");
            return;
        };
        let mut depth = target
            .depth_stencil
            .and_then(|id| self.textures.remove(&id.0));

        let instance_models = if matches!(program.vertex, program::VertexMode::Instanced) {
            self.instance_models()
        } else {
            Vec::new()
        };
        let lookup = |slot: u32| self.slot_bytes(&self.uniform_slots, slot);
        let texture = |unit: u32| {
            self.texture_units
                .get(&unit)
                .and_then(|t| self.textures.get(&t.0))
        };
        let uniforms = raster::Uniforms {
            transform: self.transform_block(),
            instances: instance_models,
            lookup: &lookup,
            texture: &texture,
        };
        let mut targets = Targets {
            color: &mut color,
            depth: depth.as_mut(),
        };
        let fragments = raster::draw(
            &program,
            &self.state,
            self.viewport,
            &vertices,
            &triangles,
            instances,
            &uniforms,
            &mut targets,
        );
        log::trace!(
            "software draw: {} triangles x {instances} instances, {fragments} fragments",
            triangles.len()
        );

        self.textures.insert(target.color.0, color);
        if let (Some(id), Some(surface)) = (target.depth_stencil, depth) {
            self.textures.insert(id.0, surface);
        }
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let target = self.current_target();
        let mut out = vec![0; width as usize * height as usize * 4];
        let Some(surface) = self.textures.get(&target.color.0) else {
            return out;
        };
        for row in 0..height {
            for col in 0..width {
                let (sx, sy) = (x + col, y + row);
                if sx >= surface.width || sy >= surface.height {
                    continue;
                }
                let src = (sy as usize * surface.width as usize + sx as usize) * 4;
                let dst = (row as usize * width as usize + col as usize) * 4;
                out[dst..dst + 4].copy_from_slice(&surface.color[src..src + 4]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderStage;

    fn program(backend: &mut SoftwareBackend, vertex: &str, fragment: &str) -> ProgramId {
        backend
            .create_program(&[
                ShaderModule::source(ShaderStage::Vertex, vertex),
                ShaderModule::source(ShaderStage::Fragment, fragment),
            ])
            .unwrap()
    }

    /// A clip-space triangle covering the whole target, with per-vertex colour.
    fn fullscreen(backend: &mut SoftwareBackend, z: f32, color: [f32; 4]) -> VertexArrayId {
        let mut data: Vec<f32> = Vec::new();
        for (x, y) in [(-1.0, -1.0), (3.0, -1.0), (-1.0, 3.0)] {
            data.extend_from_slice(&[x, y, z]);
            data.extend_from_slice(&color);
        }
        let vb = backend.create_buffer(BufferKind::Vertex, data.len() * 4).unwrap();
        backend.write_buffer(vb, 0, bytemuck::cast_slice(&data));
        let ib = backend.create_buffer(BufferKind::Index, 12).unwrap();
        backend.write_buffer(ib, 0, bytemuck::cast_slice(&[0u32, 1, 2]));
        let vao = backend.create_vertex_array(vb, ib, 28).unwrap();
        backend.vertex_attribute(vao, VertexAttribute { location: attribute::POSITION, components: 3, offset: 0 });
        backend.vertex_attribute(vao, VertexAttribute { location: attribute::COLOR, components: 4, offset: 12 });
        vao
    }

    const VS: &str = "#pragma reference(vertex = fullscreen)";
    const FS: &str = "#pragma reference(fragment = vertex_color)";

    #[test]
    fn test_fullscreen_fill() {
        let mut b = SoftwareBackend::new(2, 2);
        let p = program(&mut b, VS, FS);
        let vao = fullscreen(&mut b, 0.0, [0.0, 1.0, 0.0, 1.0]);
        b.use_program(Some(p));
        b.draw_elements(vao, 3, 1);
        assert_eq!(b.read_pixels(0, 0, 2, 2), [0u8, 255, 0, 255].repeat(4));
    }

    #[test]
    fn test_depth_test_rejects_farther() {
        let mut b = SoftwareBackend::new(1, 1);
        let p = program(&mut b, VS, FS);
        let near = fullscreen(&mut b, 0.25, [1.0, 0.0, 0.0, 1.0]);
        let far = fullscreen(&mut b, 0.75, [0.0, 0.0, 1.0, 1.0]);
        b.use_program(Some(p));
        b.draw_elements(near, 3, 1);
        b.draw_elements(far, 3, 1);
        assert_eq!(b.read_pixels(0, 0, 1, 1), vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_clear_honours_color_mask() {
        let mut b = SoftwareBackend::new(1, 1);
        b.clear(ClearValues { color: Some([1.0, 1.0, 1.0, 1.0]), ..Default::default() });
        b.apply(StateChange::ColorMask(false));
        b.clear(ClearValues { color: Some([0.0, 0.0, 0.0, 0.0]), ..Default::default() });
        assert_eq!(b.read_pixels(0, 0, 1, 1), vec![255; 4]);
    }

    #[test]
    fn test_draw_without_program_is_skipped() {
        let mut b = SoftwareBackend::new(1, 1);
        let vao = fullscreen(&mut b, 0.0, [1.0; 4]);
        b.draw_elements(vao, 3, 1);
        assert_eq!(b.read_pixels(0, 0, 1, 1), vec![0; 4]);
    }

    #[test]
    fn test_framebuffer_size_mismatch_rejected() {
        let mut b = SoftwareBackend::new(1, 1);
        let color = b
            .create_texture(&TextureDesc { width: 2, height: 2, format: TextureFormat::Rgba8, samples: 1 })
            .unwrap();
        let depth = b
            .create_texture(&TextureDesc { width: 3, height: 2, format: TextureFormat::Depth24Stencil8, samples: 1 })
            .unwrap();
        assert!(b.create_framebuffer(color, Some(depth)).is_err());
        assert!(b.create_framebuffer(color, None).is_ok());
    }
}
