//! Materials: a render pass plus the uniforms and textures it draws with.
//!
//! Composition is two levels deep. [`Material`] owns everything every
//! material needs: the global uniform blocks, the texture channels and the
//! material block buffer. The [`MaterialCore`] it wraps supplies the pass,
//! the block contents and the draw itself.
//!
//! Binding contract:
//!
//! | what | where |
//! |---|---|
//! | global blocks | uniform slots `0..8` |
//! | material block | uniform slot [`UNIFORM_BUFFER_BINDING_START`] |
//! | extra material blocks | uniform slots `9..` |
//! | texture channels | units `5..10` |
//! | instance models | storage slot [`INSTANCE_STORAGE_SLOT`] |

mod globals;
mod params;

use std::rc::Rc;

use bytemuck::Pod;
use glam::{Mat4, Vec2, Vec4};
use strata_core::property::{inspect_table, set_property};
use strata_core::{Inspector, Property, PropertyKind, PropertyValue, MAX_INSTANCES_PER_PAGE};

use crate::backend::BufferKind;
use crate::buffer::TypedBuffer;
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::mesh::{Mesh, VertexLayout};
use crate::pipeline::{RenderPass, RenderPipeline};
use crate::texture::Texture;

pub use globals::{
    AmbientBlock, CameraBlock, ChannelSizeBlock, ChannelTilingBlock, DirectionalBlock,
    GlobalUniforms, PointLightBlock, PointLightData, SceneBlock, TransformBlock, AMBIENT_SLOT,
    CAMERA_SLOT, CHANNEL_SIZE_SLOT, CHANNEL_TILING_SLOT, DIRECTIONAL_SLOT, INSTANCE_STORAGE_SLOT,
    MAX_POINT_LIGHTS, MAX_TEXTURE_CHANNELS, POINT_LIGHTS_SLOT, SCENE_SLOT,
    TEXTURE_CHANNEL_UNIT_START, TRANSFORM_SLOT, UNIFORM_BUFFER_BINDING_START,
};
pub use params::{GlobalParameters, SceneData};

/// Column-major model matrix as stored in the instance buffer.
pub type InstanceModel = [[f32; 4]; 4];

/// A texture bound to one material channel.
#[derive(Clone)]
pub struct TextureChannel<'ctx> {
    pub texture: Rc<Texture<'ctx>>,
    pub tiling: Vec2,
    pub offset: Vec2,
}

impl<'ctx> TextureChannel<'ctx> {
    #[must_use]
    pub fn new(texture: Rc<Texture<'ctx>>) -> Self {
        Self {
            texture,
            tiling: Vec2::ONE,
            offset: Vec2::ZERO,
        }
    }
}

/// The material-specific half of a [`Material`].
pub trait MaterialCore: Sized + 'static {
    /// Contents of the material block at slot [`UNIFORM_BUFFER_BINDING_START`].
    type Block: Pod;

    /// Whether the material draws through the instance storage buffer.
    const INSTANCED: bool = false;

    /// Display name.
    fn label(&self) -> &'static str;

    /// Builds the pipelines. Called once, from [`Material::new`].
    fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>>;

    /// Current block contents.
    fn block(&self) -> Self::Block;

    /// Issues the draws. Globals, the material block and the channels are
    /// already bound. The default draws `mesh` once through every pipeline.
    fn draw_core<V: VertexLayout>(&self, call: &DrawCall<'_, '_>, mesh: &Mesh<'_, V>) -> RenderResult<()> {
        call.draw_pass(mesh);
        Ok(())
    }

    /// Editable properties.
    fn properties() -> &'static [Property<Self>];
}

/// What a [`MaterialCore`] may do while drawing.
pub struct DrawCall<'a, 'ctx> {
    context: &'ctx GpuContext,
    pass: &'a RenderPass<'ctx>,
    instances: Option<&'a TypedBuffer<'ctx, InstanceModel>>,
    page_size: usize,
}

impl<'a, 'ctx> DrawCall<'a, 'ctx> {
    #[must_use]
    pub fn pass(&self) -> &'a RenderPass<'ctx> {
        self.pass
    }

    #[must_use]
    pub fn context(&self) -> &'ctx GpuContext {
        self.context
    }

    /// Binds an extra material block.
    ///
    /// Fails with [`RenderError::ReservedBinding`] below
    /// [`UNIFORM_BUFFER_BINDING_START`].
    pub fn bind_uniform_block<T: Pod>(&self, binding: u32, buffer: &TypedBuffer<'_, T>) -> RenderResult<()> {
        if binding < UNIFORM_BUFFER_BINDING_START {
            return Err(RenderError::ReservedBinding {
                slot: binding,
                first_free: UNIFORM_BUFFER_BINDING_START,
            });
        }
        self.pass.main().bind_uniform_block(binding, buffer);
        Ok(())
    }

    /// Draws `mesh` through every pipeline of the pass, in order.
    pub fn draw_pass<V: VertexLayout>(&self, mesh: &Mesh<'_, V>) {
        for pipeline in self.pass.iter() {
            self.draw_with(pipeline, mesh);
        }
    }

    /// Draws `mesh` once through `pipeline`.
    pub fn draw_with<V: VertexLayout>(&self, pipeline: &RenderPipeline<'_>, mesh: &Mesh<'_, V>) {
        pipeline.bind();
        mesh.draw();
    }

    /// Draws one instance of `mesh` per model matrix, in pages of at most
    /// the page size. Returns the number of draw calls issued.
    pub fn draw_instanced<V: VertexLayout>(
        &self,
        pipeline: &RenderPipeline<'_>,
        mesh: &Mesh<'_, V>,
        models: &[Mat4],
    ) -> RenderResult<usize> {
        let Some(buffer) = self.instances else {
            return Err(RenderError::ResourceCreation(
                "material has no instance buffer".into(),
            ));
        };
        if models.is_empty() {
            return Ok(0);
        }
        let page = self.page_size.clamp(1, buffer.len());
        pipeline.bind();
        let mut pages = 0;
        for chunk in models.chunks(page) {
            let mut data: Vec<InstanceModel> = chunk.iter().map(Mat4::to_cols_array_2d).collect();
            data.resize(buffer.len(), [[0.0; 4]; 4]);
            buffer.set_data(&data)?;
            pipeline.bind_buffer_block(INSTANCE_STORAGE_SLOT, buffer);
            #[allow(clippy::cast_possible_truncation)]
            mesh.draw_instanced(chunk.len() as u32);
            pages += 1;
        }
        log::trace!("{} instances in {pages} pages", models.len());
        Ok(pages)
    }
}

/// A drawable material: global assembly around a [`MaterialCore`].
pub struct Material<'ctx, M: MaterialCore> {
    core: M,
    pass: RenderPass<'ctx>,
    globals: GlobalUniforms<'ctx>,
    block: TypedBuffer<'ctx, M::Block>,
    instances: Option<TypedBuffer<'ctx, InstanceModel>>,
    channels: [Option<TextureChannel<'ctx>>; MAX_TEXTURE_CHANNELS],
    instance_page_size: usize,
}

impl<'ctx, M: MaterialCore> Material<'ctx, M> {
    /// Creates the render pass and uniform buffers.
    pub fn new(context: &'ctx GpuContext, core: M) -> RenderResult<Self> {
        let pass = core.create_render_pass(context)?;
        log::debug!(
            "created render pass for '{}' ({} pipelines)",
            core.label(),
            pass.len()
        );
        let block = TypedBuffer::uniform(context, &core.block())?;
        let instances = if M::INSTANCED {
            Some(TypedBuffer::new(
                context,
                BufferKind::Storage,
                MAX_INSTANCES_PER_PAGE,
            )?)
        } else {
            None
        };
        Ok(Self {
            core,
            pass,
            globals: GlobalUniforms::new(context)?,
            block,
            instances,
            channels: Default::default(),
            instance_page_size: MAX_INSTANCES_PER_PAGE,
        })
    }

    /// Draws `mesh` with this material.
    ///
    /// `params` is only read during the call. Fails with
    /// [`RenderError::PointLightOverflow`] before any GPU work when there are
    /// more than [`MAX_POINT_LIGHTS`] point lights.
    pub fn draw<V: VertexLayout>(&self, mesh: &Mesh<'_, V>, params: &GlobalParameters) -> RenderResult<()> {
        GlobalUniforms::check(params)?;
        self.globals.upload(params, &self.channels)?;
        self.block.set_data(&[self.core.block()])?;

        let main = self.pass.main();
        self.globals.bind(main);
        main.bind_uniform_block(UNIFORM_BUFFER_BINDING_START, &self.block);
        for (unit, channel) in (TEXTURE_CHANNEL_UNIT_START..).zip(&self.channels) {
            match channel {
                Some(channel) => main.bind_texture(unit, &channel.texture),
                None => main.unbind_texture(unit),
            }
        }

        let call = DrawCall {
            context: main.shader().context(),
            pass: &self.pass,
            instances: self.instances.as_ref(),
            page_size: self.instance_page_size,
        };
        let result = self.core.draw_core(&call, mesh);
        self.pass.unbind();
        result
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.core.label()
    }

    #[must_use]
    pub fn core(&self) -> &M {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut M {
        &mut self.core
    }

    #[must_use]
    pub fn pass(&self) -> &RenderPass<'ctx> {
        &self.pass
    }

    /// Per-pipeline state overrides.
    pub fn pass_mut(&mut self) -> &mut RenderPass<'ctx> {
        &mut self.pass
    }

    /// Puts `texture` on channel `index` with unit tiling.
    pub fn set_channel(&mut self, index: usize, texture: Rc<Texture<'ctx>>) -> RenderResult<()> {
        *self.channel_slot(index)? = Some(TextureChannel::new(texture));
        Ok(())
    }

    /// Empties channel `index`.
    pub fn clear_channel(&mut self, index: usize) -> RenderResult<()> {
        *self.channel_slot(index)? = None;
        Ok(())
    }

    /// Sets tiling and offset of an occupied channel. Empty channels are
    /// left empty.
    pub fn set_channel_tiling(&mut self, index: usize, tiling: Vec2, offset: Vec2) -> RenderResult<()> {
        if let Some(channel) = self.channel_slot(index)? {
            channel.tiling = tiling;
            channel.offset = offset;
        }
        Ok(())
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&TextureChannel<'ctx>> {
        self.channels.get(index).and_then(Option::as_ref)
    }

    fn channel_slot(&mut self, index: usize) -> RenderResult<&mut Option<TextureChannel<'ctx>>> {
        self.channels
            .get_mut(index)
            .ok_or(RenderError::ChannelOutOfRange {
                channel: index,
                max: MAX_TEXTURE_CHANNELS,
            })
    }

    /// Maximum instances per draw call, clamped to `1..=256`.
    pub fn set_instance_page_size(&mut self, size: usize) {
        self.instance_page_size = size.clamp(1, MAX_INSTANCES_PER_PAGE);
    }

    #[must_use]
    pub fn instance_page_size(&self) -> usize {
        self.instance_page_size
    }

    /// Lets `inspector` edit the core's properties, then the tiling and
    /// offset of every occupied channel. Returns how many values changed.
    pub fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        let mut changed = inspect_table(&mut self.core, M::properties(), inspector)?;
        for (index, slot) in self.channels.iter_mut().enumerate() {
            let Some(channel) = slot else { continue };
            let mut value = PropertyValue::Texture(Vec4::new(
                channel.tiling.x,
                channel.tiling.y,
                channel.offset.x,
                channel.offset.y,
            ));
            let label = format!("Channel {index}");
            if inspector.edit(&label, PropertyKind::Texture { channel: index }, &mut value) {
                if let PropertyValue::Texture(v) = value {
                    channel.tiling = Vec2::new(v.x, v.y);
                    channel.offset = Vec2::new(v.z, v.w);
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    /// Writes property `index` of the core's table.
    pub fn set_property(&mut self, index: usize, value: PropertyValue) -> RenderResult<()> {
        set_property(&mut self.core, M::properties(), index, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};
    use strata_core::PointLight;

    use super::*;
    use crate::mesh::{shapes, Vertex};
    use crate::recording::{Call, RecordingBackend};
    use crate::shader::ShaderBuilder;
    use crate::software::SoftwareBackend;
    use crate::state::RenderLayer;

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct TintBlock {
        color: [f32; 4],
    }

    struct Tint {
        color: Vec4,
        extra_slot: u32,
        models: Vec<Mat4>,
    }

    impl MaterialCore for Tint {
        type Block = TintBlock;
        const INSTANCED: bool = true;

        fn label(&self) -> &'static str {
            "tint"
        }

        fn create_render_pass<'ctx>(&self, context: &'ctx GpuContext) -> RenderResult<RenderPass<'ctx>> {
            let shader = ShaderBuilder::new()
                .with_vertex("#pragma reference(vertex = instanced)\nvoid main() {}")
                .with_fragment("void main() {}")
                .build(context)?;
            Ok(RenderPass::new(RenderPipeline::new(shader, RenderLayer::Opaque)))
        }

        fn block(&self) -> TintBlock {
            TintBlock {
                color: self.color.to_array(),
            }
        }

        fn draw_core<V: VertexLayout>(&self, call: &DrawCall<'_, '_>, mesh: &Mesh<'_, V>) -> RenderResult<()> {
            let extra = TypedBuffer::uniform(call.context(), &self.block())?;
            call.bind_uniform_block(self.extra_slot, &extra)?;
            call.draw_instanced(call.pass().main(), mesh, &self.models)?;
            Ok(())
        }

        fn properties() -> &'static [Property<Self>] {
            const PROPERTIES: &[Property<Tint>] = &[Property {
                label: "Color",
                kind: PropertyKind::Color,
                get: |t| PropertyValue::Color(t.color),
                set: |t, v| {
                    if let PropertyValue::Color(c) = v {
                        t.color = c;
                    }
                },
            }];
            PROPERTIES
        }
    }

    fn tint(extra_slot: u32, instances: usize) -> Tint {
        Tint {
            color: Vec4::ONE,
            extra_slot,
            models: vec![Mat4::IDENTITY; instances],
        }
    }

    #[test]
    fn test_sixteen_lights_draw_seventeen_fail_without_gpu_calls() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let (v, i) = shapes::triangle(glam::Vec3::ZERO, glam::Vec3::X, glam::Vec3::Y);
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let material = Material::new(&ctx, tint(9, 1)).unwrap();

        let mut params = GlobalParameters::default();
        params.point_lights = vec![PointLight::default(); MAX_POINT_LIGHTS];
        material.draw(&mesh, &params).unwrap();

        params.point_lights.push(PointLight::default());
        log.reset();
        let err = material.draw(&mesh, &params).unwrap_err();
        assert!(matches!(err, RenderError::PointLightOverflow { count: 17, max: 16 }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_reserved_binding_rejected() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let (v, i) = shapes::quad(1.0);
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let material = Material::new(&ctx, tint(3, 1)).unwrap();
        let err = material.draw(&mesh, &GlobalParameters::default()).unwrap_err();
        assert!(matches!(err, RenderError::ReservedBinding { slot: 3, first_free: 8 }));
    }

    #[test]
    fn test_instances_are_paged() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let (v, i) = shapes::quad(1.0);
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let mut material = Material::new(&ctx, tint(9, 600)).unwrap();
        log.reset();
        material.draw(&mesh, &GlobalParameters::default()).unwrap();
        assert_eq!(log.draws(), 3);
        assert!(log.calls().contains(&Call::Draw {
            index_count: 6,
            instances: 600 - 2 * 256,
        }));

        material.set_instance_page_size(100);
        log.reset();
        material.draw(&mesh, &GlobalParameters::default()).unwrap();
        assert_eq!(log.draws(), 6);
        material.set_instance_page_size(10_000);
        assert_eq!(material.instance_page_size(), MAX_INSTANCES_PER_PAGE);
    }

    #[test]
    fn test_every_pipeline_unbound_after_draw() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let (v, i) = shapes::quad(1.0);
        let mesh = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let material = Material::new(&ctx, tint(9, 2)).unwrap();
        material.draw(&mesh, &GlobalParameters::default()).unwrap();
        assert_eq!(log.calls().last(), Some(&Call::UseProgram(None)));
    }

    #[test]
    fn test_channels_and_inspection() {
        struct Stretch;
        impl Inspector for Stretch {
            fn edit(&mut self, _label: &str, kind: PropertyKind, value: &mut PropertyValue) -> bool {
                if let (PropertyKind::Texture { .. }, PropertyValue::Texture(v)) = (kind, value) {
                    v.x = 4.0;
                    return true;
                }
                false
            }
        }

        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut material = Material::new(&ctx, tint(9, 1)).unwrap();
        let texture = Rc::new(Texture::solid(&ctx, [255, 0, 0, 255]).unwrap());
        assert!(matches!(
            material.set_channel(5, Rc::clone(&texture)),
            Err(RenderError::ChannelOutOfRange { channel: 5, .. })
        ));
        material.set_channel(1, texture).unwrap();
        assert_eq!(material.inspect(&mut Stretch).unwrap(), 1);
        assert!((material.channel(1).unwrap().tiling.x - 4.0).abs() < f32::EPSILON);
        material.clear_channel(1).unwrap();
        assert!(material.channel(1).is_none());

        material
            .set_property(0, PropertyValue::Color(Vec4::new(0.0, 1.0, 0.0, 1.0)))
            .unwrap();
        assert_eq!(material.core().color, Vec4::new(0.0, 1.0, 0.0, 1.0));
    }
}
