//! Hardware backend on wgpu.
//!
//! GLSL stages are compiled with naga and linked into one pipeline layout per
//! program: uniform blocks in set 0, storage blocks in set 1, textures in
//! set 2 and samplers in set 3, each at the slot or unit number it is fed
//! from. Fixed-function state is mirrored from the [`StateChange`] stream and
//! baked into render pipelines on first use, cached per program.
//!
//! Every clear and draw is encoded as its own render pass and submitted at
//! once, so queued buffer writes land between draws in call order. Targets
//! use wgpu's top-left origin; the bottom-left coordinates of the
//! [`Backend`] trait are flipped at the viewport and in readback.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]

mod compile;

use std::borrow::Cow;
use std::collections::HashMap;

use pollster::FutureExt as _;

use crate::backend::{
    Backend, BufferId, BufferKind, ClearValues, FramebufferId, ProgramId, StateChange,
    TextureDesc, TextureFormat, TextureId, VertexArrayId, VertexAttribute,
};
use crate::error::{RenderError, RenderResult};
use crate::shader::{ShaderModule, ShaderStage};
use crate::state::{PolygonMode, RenderState};
use crate::wgpu_state::DEPTH_STENCIL_FORMAT;

use self::compile::{CompiledStage, Resource, ResourceKind, GROUP_COUNT};

/// Format of every [`TextureFormat::Rgba8`] texture.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct GpuBuffer {
    kind: BufferKind,
    buffer: wgpu::Buffer,
    /// Host copy, padded to whole words so unaligned writes upload cleanly.
    shadow: Vec<u8>,
}

struct GpuVertexArray {
    vertices: BufferId,
    indices: BufferId,
    stride: u64,
    attributes: Vec<VertexAttribute>,
}

struct GpuTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    /// Single-sampled twin of a multisampled colour texture. Passes resolve
    /// into it; sampling and readback read from it.
    resolve: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl GpuTexture {
    fn readable(&self) -> (&wgpu::Texture, &wgpu::TextureView) {
        match &self.resolve {
            Some((texture, view)) => (texture, view),
            None => (&self.texture, &self.view),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GpuFramebuffer {
    color: TextureId,
    depth_stencil: Option<TextureId>,
}

/// Everything a render pipeline depends on besides the program.
#[derive(Debug, Clone, PartialEq)]
struct PipelineKey {
    state: RenderState,
    stride: u64,
    attributes: Vec<VertexAttribute>,
    samples: u32,
    depth_stencil: bool,
}

struct GraphicsProgram {
    vertex: wgpu::ShaderModule,
    vertex_entry: String,
    fragment: wgpu::ShaderModule,
    fragment_entry: String,
    resources: Vec<Resource>,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    layout: wgpu::PipelineLayout,
    pipelines: Vec<(PipelineKey, wgpu::RenderPipeline)>,
}

enum GpuProgram {
    Graphics(Box<GraphicsProgram>),
    /// Validated but never drawn with.
    Compute,
}

/// A [`Backend`] that drives a wgpu device.
pub struct WgpuBackend {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u32,
    state: RenderState,
    buffers: HashMap<u32, GpuBuffer>,
    vertex_arrays: HashMap<u32, GpuVertexArray>,
    programs: HashMap<u32, GpuProgram>,
    textures: HashMap<u32, GpuTexture>,
    framebuffers: HashMap<u32, GpuFramebuffer>,
    default_target: GpuFramebuffer,
    bound_framebuffer: Option<FramebufferId>,
    program: Option<ProgramId>,
    uniform_slots: HashMap<u32, BufferId>,
    storage_slots: HashMap<u32, BufferId>,
    texture_units: HashMap<u32, TextureId>,
    viewport: Option<(i32, i32, u32, u32)>,
    sampler: wgpu::Sampler,
    /// Sampled through units nothing is bound to.
    white: GpuTexture,
}

fn texture_usage(desc: &TextureDesc) -> wgpu::TextureUsages {
    match (desc.format, desc.samples > 1) {
        (TextureFormat::Rgba8, false) => {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
        }
        _ => wgpu::TextureUsages::RENDER_ATTACHMENT,
    }
}

fn allocate_texture(device: &wgpu::Device, desc: &TextureDesc) -> GpuTexture {
    let create = |samples: u32, usage: wgpu::TextureUsages| {
        let format = match desc.format {
            TextureFormat::Rgba8 => COLOR_FORMAT,
            TextureFormat::Depth24Stencil8 => DEPTH_STENCIL_FORMAT,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("strata texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    };
    let (texture, view) = create(desc.samples, texture_usage(desc));
    let resolve = (desc.format == TextureFormat::Rgba8 && desc.samples > 1).then(|| {
        create(
            1,
            texture_usage(&TextureDesc {
                samples: 1,
                ..*desc
            }),
        )
    });
    GpuTexture {
        desc: *desc,
        texture,
        view,
        resolve,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn layout_entry(resource: &Resource) -> wgpu::BindGroupLayoutEntry {
    let buffer = |ty| wgpu::BindingType::Buffer {
        ty,
        has_dynamic_offset: false,
        min_binding_size: None,
    };
    let ty = match resource.kind {
        ResourceKind::Uniform => buffer(wgpu::BufferBindingType::Uniform),
        ResourceKind::Storage { read_only } => {
            buffer(wgpu::BufferBindingType::Storage { read_only })
        }
        ResourceKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        ResourceKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    };
    wgpu::BindGroupLayoutEntry {
        binding: resource.binding,
        visibility: resource.visibility,
        ty,
        count: None,
    }
}

/// Bytes per staged row for a copy of `width` RGBA8 texels.
fn aligned_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

fn align_down(value: usize) -> usize {
    value & !(wgpu::COPY_BUFFER_ALIGNMENT as usize - 1)
}

fn align_up(value: usize) -> usize {
    value.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize)
}

impl WgpuBackend {
    /// Opens the preferred adapter without a surface. The default target is
    /// an off-screen `width` x `height` colour and depth-stencil pair.
    ///
    /// Blocks; see [`Self::new_headless_async`].
    pub fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        Self::new_headless_async(width, height).block_on()
    }

    pub async fn new_headless_async(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterCreationFailed)?;
        let info = adapter.get_info();
        log::info!("using adapter '{}' ({:?})", info.name, info.backend);

        // Wireframe and point modes are taken when offered; pipelines fall
        // back to filled triangles otherwise.
        let optional = wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::POLYGON_MODE_POINT;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("strata device (headless)"),
                    required_features: adapter.features() & optional,
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        Self::from_device(format!("wgpu ({})", info.name), device, queue, width, height)
    }

    /// Wraps a device the host already owns.
    pub fn from_device(
        name: impl Into<String>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        device.on_uncaptured_error(Box::new(|error| {
            log::error!("wgpu: {error}");
        }));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("strata channel sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let white = allocate_texture(
            &device,
            &TextureDesc {
                width: 1,
                height: 1,
                format: TextureFormat::Rgba8,
                samples: 1,
            },
        );

        let mut backend = Self {
            name: name.into(),
            device,
            queue,
            next_id: 1,
            state: RenderState::DEFAULT,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            default_target: GpuFramebuffer {
                color: TextureId(0),
                depth_stencil: None,
            },
            bound_framebuffer: None,
            program: None,
            uniform_slots: HashMap::new(),
            storage_slots: HashMap::new(),
            texture_units: HashMap::new(),
            viewport: None,
            sampler,
            white,
        };
        backend.upload_texels(&backend.white.texture, 1, 1, &[255; 4]);

        let (width, height) = (width.max(1), height.max(1));
        let color = backend.create_texture(&TextureDesc {
            width,
            height,
            format: TextureFormat::Rgba8,
            samples: 1,
        })?;
        let depth = backend.create_texture(&TextureDesc {
            width,
            height,
            format: TextureFormat::Depth24Stencil8,
            samples: 1,
        })?;
        backend.default_target = GpuFramebuffer {
            color,
            depth_stencil: Some(depth),
        };
        Ok(backend)
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn current_target(&self) -> GpuFramebuffer {
        self.bound_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb.0).copied())
            .unwrap_or(self.default_target)
    }

    fn upload_texels(&self, texture: &wgpu::Texture, width: u32, height: u32, data: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Maps a staging buffer and copies it out. Blocks until the GPU is idle.
    fn map_read(&self, staging: &wgpu::Buffer) -> Option<Vec<u8>> {
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("readback map failed: {e}");
                return None;
            }
            Err(_) => {
                log::error!("readback map callback never ran");
                return None;
            }
        }
        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Some(data)
    }

    fn staging_buffer(&self, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strata readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        })
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn link(
        &self,
        vertex: CompiledStage,
        fragment: CompiledStage,
    ) -> Result<GraphicsProgram, String> {
        let resources = compile::merge(&vertex.resources, &fragment.resources)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("strata vertex stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(vertex.module)),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("strata fragment stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(fragment.module)),
        });
        let bind_group_layouts: Vec<_> = (0..GROUP_COUNT)
            .map(|group| {
                let entries: Vec<_> = resources
                    .iter()
                    .filter(|r| r.group == group)
                    .map(layout_entry)
                    .collect();
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("strata bind group layout"),
                        entries: &entries,
                    })
            })
            .collect();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("strata pipeline layout"),
                bind_group_layouts: &layout_refs,
                push_constant_ranges: &[],
            });
        if let Some(error) = self.device.pop_error_scope().block_on() {
            return Err(format!("link error: {error}"));
        }

        Ok(GraphicsProgram {
            vertex: vertex_module,
            vertex_entry: vertex.entry_point,
            fragment: fragment_module,
            fragment_entry: fragment.entry_point,
            resources,
            bind_group_layouts,
            layout,
            pipelines: Vec::new(),
        })
    }

    /// Finds or builds the pipeline for `key`; returns its cache index.
    fn ensure_pipeline(&mut self, program: ProgramId, key: PipelineKey) -> Option<usize> {
        let features = self.device.features();
        let Some(GpuProgram::Graphics(graphics)) = self.programs.get_mut(&program.0) else {
            log::warn!("draw skipped: program {} cannot draw", program.0);
            return None;
        };
        if let Some(index) = graphics.pipelines.iter().position(|(k, _)| *k == key) {
            return Some(index);
        }

        let mut primitive = key.state.primitive_state();
        let needed = match key.state.polygon_mode {
            PolygonMode::Fill => wgpu::Features::empty(),
            PolygonMode::Line => wgpu::Features::POLYGON_MODE_LINE,
            PolygonMode::Point => wgpu::Features::POLYGON_MODE_POINT,
        };
        if !features.contains(needed) {
            log::warn!(
                "device lacks {:?} polygons; drawing filled",
                key.state.polygon_mode
            );
            primitive.polygon_mode = wgpu::PolygonMode::Fill;
        }
        let attributes: Vec<_> = key
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: vertex_format(a.components),
                offset: a.offset as u64,
                shader_location: a.location,
            })
            .collect();
        // The attachments fix the sample count; a disabled multisample flag
        // has no pipeline equivalent.
        let multisample = RenderState {
            multisample: true,
            ..key.state
        }
        .multisample_state(key.samples);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("strata pipeline"),
                layout: Some(&graphics.layout),
                vertex: wgpu::VertexState {
                    module: &graphics.vertex,
                    entry_point: Some(&graphics.vertex_entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: key.stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive,
                depth_stencil: key
                    .depth_stencil
                    .then(|| key.state.depth_stencil_state()),
                multisample,
                fragment: Some(wgpu::FragmentState {
                    module: &graphics.fragment,
                    entry_point: Some(&graphics.fragment_entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(key.state.color_target_state(COLOR_FORMAT))],
                }),
                multiview: None,
                cache: None,
            });
        if let Some(error) = self.device.pop_error_scope().block_on() {
            log::error!("draw skipped: pipeline creation failed: {error}");
            return None;
        }
        log::debug!(
            "built pipeline {} for program {}",
            graphics.pipelines.len(),
            program.0
        );
        graphics.pipelines.push((key, pipeline));
        Some(graphics.pipelines.len() - 1)
    }

    /// One bind group per set, filled from the current slot and unit
    /// bindings. `None` when a buffer the program reads is not bound.
    fn bind_groups(&self, graphics: &GraphicsProgram) -> Option<Vec<wgpu::BindGroup>> {
        let mut groups = Vec::new();
        for (group, layout) in (0..GROUP_COUNT).zip(&graphics.bind_group_layouts) {
            let mut entries = Vec::new();
            for resource in graphics.resources.iter().filter(|r| r.group == group) {
                let binding = match resource.kind {
                    ResourceKind::Uniform | ResourceKind::Storage { .. } => {
                        let slots = if resource.kind == ResourceKind::Uniform {
                            &self.uniform_slots
                        } else {
                            &self.storage_slots
                        };
                        let Some(buffer) = slots
                            .get(&resource.binding)
                            .and_then(|id| self.buffers.get(&id.0))
                        else {
                            log::warn!(
                                "draw skipped: no buffer bound to {:?} slot {}",
                                resource.kind,
                                resource.binding
                            );
                            return None;
                        };
                        buffer.buffer.as_entire_binding()
                    }
                    ResourceKind::Texture => {
                        let texture = self
                            .texture_units
                            .get(&resource.binding)
                            .and_then(|id| self.textures.get(&id.0))
                            .filter(|t| t.desc.format == TextureFormat::Rgba8)
                            .unwrap_or(&self.white);
                        wgpu::BindingResource::TextureView(texture.readable().1)
                    }
                    ResourceKind::Sampler => wgpu::BindingResource::Sampler(&self.sampler),
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: resource.binding,
                    resource: binding,
                });
            }
            groups.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("strata bind group"),
                layout,
                entries: &entries,
            }));
        }
        Some(groups)
    }

    /// Colour texture size and sample count of a framebuffer.
    fn target_extent(&self, target: GpuFramebuffer) -> Option<(u32, u32, u32)> {
        let color = self.textures.get(&target.color.0)?;
        Some((color.desc.width, color.desc.height, color.desc.samples))
    }

    /// The viewport clipped to the target, in wgpu's top-left coordinates.
    fn viewport_rect(&self, width: u32, height: u32) -> Option<[f32; 4]> {
        let (x, y, w, h) = self.viewport.unwrap_or((0, 0, width, height));
        let (tw, th) = (i64::from(width), i64::from(height));
        let left = i64::from(x).clamp(0, tw);
        let bottom = i64::from(y).clamp(0, th);
        let right = (i64::from(x) + i64::from(w)).clamp(left, tw);
        let top = (i64::from(y) + i64::from(h)).clamp(bottom, th);
        if right == left || top == bottom {
            return None;
        }
        Some([
            left as f32,
            (th - top) as f32,
            (right - left) as f32,
            (top - bottom) as f32,
        ])
    }

    /// Opens a pass on `target`. Attachments with a value in `clear` are
    /// cleared, the rest are loaded.
    fn begin_pass<'e>(
        &'e self,
        encoder: &'e mut wgpu::CommandEncoder,
        target: GpuFramebuffer,
        clear: ClearValues,
    ) -> Option<wgpu::RenderPass<'e>> {
        let Some(color) = self.textures.get(&target.color.0) else {
            log::warn!("render target colour attachment {} is gone", target.color.0);
            return None;
        };
        let depth = match target.depth_stencil {
            Some(id) => Some(self.textures.get(&id.0)?),
            None => None,
        };
        let color_load = match clear.color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(r),
                g: f64::from(g),
                b: f64::from(b),
                a: f64::from(a),
            }),
            None => wgpu::LoadOp::Load,
        };
        let depth_stencil_attachment = depth.map(|d| wgpu::RenderPassDepthStencilAttachment {
            view: &d.view,
            depth_ops: Some(wgpu::Operations {
                load: clear
                    .depth
                    .map_or(wgpu::LoadOp::Load, |v| wgpu::LoadOp::Clear(v.clamp(0.0, 1.0))),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: Some(wgpu::Operations {
                load: clear
                    .stencil
                    .map_or(wgpu::LoadOp::Load, |v| wgpu::LoadOp::Clear((v & 0xFF) as u32)),
                store: wgpu::StoreOp::Store,
            }),
        });
        Some(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("strata pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color.view,
                resolve_target: color.resolve.as_ref().map(|(_, view)| view),
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        }))
    }
}

impl Backend for WgpuBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, change: StateChange) {
        change.apply_to(&mut self.state);
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> RenderResult<BufferId> {
        let padded = align_up(size.max(1));
        if padded as u64 > self.device.limits().max_buffer_size {
            return Err(RenderError::ResourceCreation(format!(
                "{kind:?} buffer of {size} bytes exceeds the device limit"
            )));
        }
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
        } | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strata buffer"),
            size: padded as u64,
            usage,
            mapped_at_creation: false,
        });
        let id = self.allocate_id();
        self.buffers.insert(
            id,
            GpuBuffer {
                kind,
                buffer,
                shadow: vec![0; padded],
            },
        );
        Ok(BufferId(id))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        let Some(b) = self.buffers.get_mut(&buffer.0) else {
            log::warn!("write to unknown buffer {}", buffer.0);
            return;
        };
        let end = offset + data.len();
        if data.is_empty() || end > b.shadow.len() {
            if !data.is_empty() {
                log::warn!(
                    "write of {} bytes at {offset} overruns buffer {}",
                    data.len(),
                    buffer.0
                );
            }
            return;
        }
        b.shadow[offset..end].copy_from_slice(data);
        let (start, stop) = (align_down(offset), align_up(end));
        self.queue
            .write_buffer(&b.buffer, start as u64, &b.shadow[start..stop]);
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, len: usize) -> Vec<u8> {
        let Some(b) = self.buffers.get(&buffer.0) else {
            return Vec::new();
        };
        let end = (offset + len).min(b.shadow.len());
        if offset >= end {
            return Vec::new();
        }
        let (start, stop) = (align_down(offset), align_up(end));
        let staging = self.staging_buffer((stop - start) as u64);
        let mut encoder = self.encoder("strata buffer readback");
        encoder.copy_buffer_to_buffer(&b.buffer, start as u64, &staging, 0, (stop - start) as u64);
        self.queue.submit(Some(encoder.finish()));
        self.map_read(&staging)
            .map(|data| data[offset - start..end - start].to_vec())
            .unwrap_or_default()
    }

    fn bind_buffer_target(&mut self, kind: BufferKind, buffer: BufferId) {
        // Vertex arrays name their buffers, so generic targets carry no state.
        log::trace!("bind {kind:?} target to buffer {}", buffer.0);
    }

    fn bind_buffer(&mut self, kind: BufferKind, slot: u32, buffer: BufferId) {
        match kind {
            BufferKind::Uniform => {
                self.uniform_slots.insert(slot, buffer);
            }
            BufferKind::Storage => {
                self.storage_slots.insert(slot, buffer);
            }
            BufferKind::Vertex | BufferKind::Index => {
                log::warn!("{kind:?} buffers have no indexed slots");
            }
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.remove(&buffer.0) {
            log::trace!("deleted {:?} buffer {}", b.kind, buffer.0);
            b.buffer.destroy();
        }
        self.uniform_slots.retain(|_, id| *id != buffer);
        self.storage_slots.retain(|_, id| *id != buffer);
    }

    fn create_vertex_array(
        &mut self,
        vertices: BufferId,
        indices: BufferId,
        stride: usize,
    ) -> RenderResult<VertexArrayId> {
        let kind_of = |id: BufferId| self.buffers.get(&id.0).map(|b| b.kind);
        if kind_of(vertices) != Some(BufferKind::Vertex)
            || kind_of(indices) != Some(BufferKind::Index)
        {
            return Err(RenderError::ResourceCreation(
                "vertex array needs a vertex and an index buffer".into(),
            ));
        }
        let id = self.allocate_id();
        self.vertex_arrays.insert(
            id,
            GpuVertexArray {
                vertices,
                indices,
                stride: stride as u64,
                attributes: Vec::new(),
            },
        );
        Ok(VertexArrayId(id))
    }

    fn vertex_attribute(&mut self, vertex_array: VertexArrayId, attribute: VertexAttribute) {
        let Some(va) = self.vertex_arrays.get_mut(&vertex_array.0) else {
            log::warn!("attribute on unknown vertex array {}", vertex_array.0);
            return;
        };
        va.attributes.retain(|a| a.location != attribute.location);
        va.attributes.push(attribute);
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array.0);
    }

    fn create_program(&mut self, modules: &[ShaderModule]) -> Result<ProgramId, String> {
        let mut vertex = None;
        let mut fragment = None;
        let mut compute = false;
        for module in modules {
            let compiled = compile::compile(module)?;
            match module.stage {
                ShaderStage::Vertex => vertex = Some(compiled),
                ShaderStage::Fragment => fragment = Some(compiled),
                ShaderStage::Compute => compute = true,
                ShaderStage::Geometry => return Err("wgpu has no geometry stage".into()),
            }
        }
        let program = match (vertex, fragment, compute) {
            (None, None, true) => GpuProgram::Compute,
            (Some(vertex), Some(fragment), false) => {
                GpuProgram::Graphics(Box::new(self.link(vertex, fragment)?))
            }
            (_, _, true) => {
                return Err("compute stage cannot be linked with graphics stages".into());
            }
            (None, _, false) => return Err("link error: missing vertex stage".into()),
            (Some(_), None, false) => return Err("link error: missing fragment stage".into()),
        };
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
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(RenderError::ResourceCreation(format!(
                "texture size {}x{} outside 1..={max}",
                desc.width, desc.height
            )));
        }
        if !matches!(desc.samples, 1 | 4) {
            return Err(RenderError::ResourceCreation(format!(
                "{} samples per pixel; wgpu guarantees only 1 and 4",
                desc.samples
            )));
        }
        let texture = allocate_texture(&self.device, desc);
        let id = self.allocate_id();
        self.textures.insert(id, texture);
        Ok(TextureId(id))
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) {
        let Some(t) = self.textures.get(&texture.0) else {
            log::warn!("write to unknown texture {}", texture.0);
            return;
        };
        let TextureDesc { width, height, format, .. } = t.desc;
        if format != TextureFormat::Rgba8 || data.len() != width as usize * height as usize * 4 {
            log::warn!("texture {} write of {} bytes ignored", texture.0, data.len());
            return;
        }
        // Rows stay bottom-up, so texture coordinate (0, 0) is the first row
        // on both backends.
        self.upload_texels(t.readable().0, width, height, data);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => self.texture_units.insert(unit, id),
            None => self.texture_units.remove(&unit),
        };
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture.0) {
            t.texture.destroy();
            if let Some((resolve, _)) = t.resolve {
                resolve.destroy();
            }
        }
        self.texture_units.retain(|_, id| *id != texture);
    }

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth_stencil: Option<TextureId>,
    ) -> RenderResult<FramebufferId> {
        let Some(c) = self.textures.get(&color.0).filter(|t| t.desc.format == TextureFormat::Rgba8)
        else {
            return Err(RenderError::ResourceCreation(
                "framebuffer colour attachment must be an RGBA8 texture".into(),
            ));
        };
        if let Some(ds) = depth_stencil {
            let matches = self.textures.get(&ds.0).is_some_and(|d| {
                d.desc.format == TextureFormat::Depth24Stencil8
                    && (d.desc.width, d.desc.height, d.desc.samples)
                        == (c.desc.width, c.desc.height, c.desc.samples)
            });
            if !matches {
                return Err(RenderError::ResourceCreation(
                    "framebuffer depth attachment must be depth-stencil and match the colour size"
                        .into(),
                ));
            }
        }
        let id = self.allocate_id();
        self.framebuffers.insert(
            id,
            GpuFramebuffer {
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
        self.viewport = Some((x, y, width, height));
    }

    fn clear(&mut self, values: ClearValues) {
        let values = ClearValues {
            color: values.color.filter(|_| self.state.color_write),
            depth: values.depth.filter(|_| self.state.depth_write),
            stencil: values.stencil.filter(|_| self.state.stencil_write),
        };
        if values == ClearValues::default() {
            return;
        }
        let target = self.current_target();
        let mut encoder = self.encoder("strata clear");
        if self.begin_pass(&mut encoder, target, values).is_none() {
            return;
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn draw_elements(&mut self, vertex_array: VertexArrayId, index_count: u32, instances: u32) {
        let Some(program) = self.program else {
            log::warn!("draw skipped: no program bound");
            return;
        };
        let Some(va) = self.vertex_arrays.get(&vertex_array.0) else {
            log::warn!("draw skipped: unknown vertex array {}", vertex_array.0);
            return;
        };
        let target = self.current_target();
        let Some((width, height, samples)) = self.target_extent(target) else {
            log::warn!("draw skipped: render target is gone");
            return;
        };
        let Some(viewport) = self.viewport_rect(width, height) else {
            return;
        };
        if va.attributes.is_empty() {
            log::warn!("draw skipped: vertex array {} has no attributes", vertex_array.0);
            return;
        }
        let (vertices, indices) = (va.vertices, va.indices);
        let key = PipelineKey {
            // The reference value is set per pass.
            state: RenderState {
                stencil_reference: 0,
                ..self.state
            },
            stride: va.stride,
            attributes: va.attributes.clone(),
            samples,
            depth_stencil: target.depth_stencil.is_some(),
        };
        let Some(index) = self.ensure_pipeline(program, key) else {
            return;
        };

        let Some(GpuProgram::Graphics(graphics)) = self.programs.get(&program.0) else {
            return;
        };
        let Some(bind_groups) = self.bind_groups(graphics) else {
            return;
        };
        let (Some(vb), Some(ib)) = (self.buffers.get(&vertices.0), self.buffers.get(&indices.0))
        else {
            log::warn!("draw skipped: vertex array {} lost a buffer", vertex_array.0);
            return;
        };
        let index_count = index_count.min((ib.shadow.len() / 4) as u32);

        let mut encoder = self.encoder("strata draw");
        {
            let Some(mut pass) = self.begin_pass(&mut encoder, target, ClearValues::default())
            else {
                return;
            };
            let [x, y, w, h] = viewport;
            pass.set_viewport(x, y, w, h, 0.0, 1.0);
            pass.set_pipeline(&graphics.pipelines[index].1);
            for (slot, group) in (0..GROUP_COUNT).zip(&bind_groups) {
                pass.set_bind_group(slot, group, &[]);
            }
            pass.set_stencil_reference((self.state.stencil_reference & 0xFF) as u32);
            pass.set_vertex_buffer(0, vb.buffer.slice(..));
            pass.set_index_buffer(ib.buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..index_count, 0, 0..instances);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let mut out = vec![0u8; width as usize * height as usize * 4];
        let target = self.current_target();
        let Some(color) = self.textures.get(&target.color.0) else {
            return out;
        };
        let (tw, th) = (color.desc.width, color.desc.height);
        let (x0, x1) = (x.min(tw), x.saturating_add(width).min(tw));
        let (y0, y1) = (y.min(th), y.saturating_add(height).min(th));
        if x0 >= x1 || y0 >= y1 {
            return out;
        }
        let (cw, ch) = (x1 - x0, y1 - y0);
        let bytes_per_row = aligned_bytes_per_row(cw);
        let staging = self.staging_buffer(u64::from(bytes_per_row) * u64::from(ch));

        let mut encoder = self.encoder("strata pixel readback");
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: color.readable().0,
                mip_level: 0,
                // Bottom-left region to top-left texel rows.
                origin: wgpu::Origin3d {
                    x: x0,
                    y: th - y1,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(ch),
                },
            },
            wgpu::Extent3d {
                width: cw,
                height: ch,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        let Some(data) = self.map_read(&staging) else {
            return out;
        };

        // Staged row 0 is the topmost; output rows run bottom-up.
        let row_bytes = cw as usize * 4;
        for row in 0..ch {
            let src = &data[(row * bytes_per_row) as usize..][..row_bytes];
            let out_row = (y1 - 1 - row - y) as usize;
            let start = (out_row * width as usize + (x0 - x) as usize) * 4;
            out[start..start + row_bytes].copy_from_slice(src);
        }
        out
    }
}
