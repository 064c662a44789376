//! Render pipelines and passes.

use bytemuck::Pod;

use crate::backend::BufferKind;
use crate::buffer::TypedBuffer;
use crate::context::GpuContext;
use crate::shader::Shader;
use crate::state::{RenderLayer, RenderState};
use crate::texture::Texture;

/// A linked program plus the complete fixed-function state it draws with.
pub struct RenderPipeline<'ctx> {
    shader: Shader<'ctx>,
    layer: RenderLayer,
    state: RenderState,
}

impl<'ctx> RenderPipeline<'ctx> {
    /// Creates a pipeline with the preset of `layer`.
    #[must_use]
    pub fn new(shader: Shader<'ctx>, layer: RenderLayer) -> Self {
        Self {
            shader,
            layer,
            state: layer.state(),
        }
    }

    fn context(&self) -> &'ctx GpuContext {
        self.shader.context()
    }

    /// Replaces the whole state bundle with the preset of `layer`, discarding
    /// any earlier override.
    pub fn set_render_layer(&mut self, layer: RenderLayer) {
        self.layer = layer;
        self.state = layer.state();
    }

    /// The preset this pipeline was last set to.
    #[must_use]
    pub fn render_layer(&self) -> RenderLayer {
        self.layer
    }

    #[must_use]
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Per-pipeline overrides on top of the preset.
    pub fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    #[must_use]
    pub fn shader(&self) -> &Shader<'ctx> {
        &self.shader
    }

    /// Asserts the full state bundle through the context and activates the
    /// program.
    pub fn bind(&self) {
        self.context().apply_state(&self.state);
        self.shader.activate();
    }

    /// Deactivates the program. State is left as is; the next `bind` of any
    /// pipeline re-asserts its own bundle.
    pub fn unbind(&self) {
        self.context().use_program(None);
    }

    /// Attaches a uniform buffer to binding `slot`.
    pub fn bind_uniform_block<T: Pod>(&self, slot: u32, buffer: &TypedBuffer<'_, T>) {
        self.context().bind_buffer(BufferKind::Uniform, slot, buffer.id());
    }

    /// Attaches a storage buffer to binding `slot`.
    pub fn bind_buffer_block<T: Pod>(&self, slot: u32, buffer: &TypedBuffer<'_, T>) {
        self.context().bind_buffer(BufferKind::Storage, slot, buffer.id());
    }

    /// Attaches a texture to texture unit `unit`.
    pub fn bind_texture(&self, unit: u32, texture: &Texture<'_>) {
        self.context().bind_texture(unit, Some(texture.id()));
    }

    /// Clears texture unit `unit`.
    pub fn unbind_texture(&self, unit: u32) {
        self.context().bind_texture(unit, None);
    }
}

/// The pipelines that together implement one rendering technique.
///
/// Always holds at least one pipeline.
pub struct RenderPass<'ctx> {
    pipelines: Vec<RenderPipeline<'ctx>>,
}

impl<'ctx> RenderPass<'ctx> {
    /// A single-pipeline pass.
    #[must_use]
    pub fn new(pipeline: RenderPipeline<'ctx>) -> Self {
        Self {
            pipelines: vec![pipeline],
        }
    }

    /// Appends a pipeline; passes run in insertion order.
    #[must_use]
    pub fn with(mut self, pipeline: RenderPipeline<'ctx>) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// The first pipeline.
    #[must_use]
    pub fn main(&self) -> &RenderPipeline<'ctx> {
        &self.pipelines[0]
    }

    #[must_use]
    pub fn pipeline(&self, index: usize) -> Option<&RenderPipeline<'ctx>> {
        self.pipelines.get(index)
    }

    pub fn pipeline_mut(&mut self, index: usize) -> Option<&mut RenderPipeline<'ctx>> {
        self.pipelines.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderPipeline<'ctx>> {
        self.pipelines.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Never true; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Unbinds every pipeline.
    pub fn unbind(&self) {
        for pipeline in &self.pipelines {
            pipeline.unbind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StateKind;
    use crate::recording::{Call, RecordingBackend};
    use crate::shader::ShaderBuilder;
    use crate::software::SoftwareBackend;
    use crate::state::Face;

    fn shader(ctx: &GpuContext) -> Shader<'_> {
        ShaderBuilder::new()
            .with_vertex("void main() {}")
            .with_fragment("void main() {}")
            .build(ctx)
            .unwrap()
    }

    #[test]
    fn test_two_pipelines_same_layer_share_bundle() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let a = RenderPipeline::new(shader(&ctx), RenderLayer::Transparent);
        let mut b = RenderPipeline::new(shader(&ctx), RenderLayer::Opaque);
        b.set_render_layer(RenderLayer::Transparent);
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_set_render_layer_discards_overrides() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut p = RenderPipeline::new(shader(&ctx), RenderLayer::Opaque);
        p.state_mut().triangle_face = Face::Front;
        p.set_render_layer(RenderLayer::Opaque);
        assert_eq!(*p.state(), RenderLayer::Opaque.state());
    }

    #[test]
    fn test_bind_does_not_inherit_previous_state() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let overlay = RenderPipeline::new(shader(&ctx), RenderLayer::Overlay);
        let opaque = RenderPipeline::new(shader(&ctx), RenderLayer::Opaque);
        overlay.bind();
        overlay.unbind();
        opaque.bind();
        assert_eq!(ctx.current_state(), RenderLayer::Opaque.state());
        log.reset();
        opaque.bind();
        // Re-binding the same bundle emits no state, only the program switch.
        assert_eq!(log.state_total(), 0);
        assert_eq!(log.count(|c| matches!(c, Call::UseProgram(Some(_)))), 1);
    }

    #[test]
    fn test_unbind_leaves_state() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let ctx = GpuContext::new(backend);
        let p = RenderPipeline::new(shader(&ctx), RenderLayer::Transparent);
        p.bind();
        log.reset();
        p.unbind();
        assert_eq!(log.calls(), vec![Call::UseProgram(None)]);
        assert_eq!(log.state_count(StateKind::DepthMask), 0);
    }

    #[test]
    fn test_pass_runs_in_order() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let pass = RenderPass::new(RenderPipeline::new(shader(&ctx), RenderLayer::Opaque))
            .with(RenderPipeline::new(shader(&ctx), RenderLayer::Transparent));
        assert_eq!(pass.len(), 2);
        assert_eq!(pass.main().render_layer(), RenderLayer::Opaque);
        assert_eq!(
            pass.pipeline(1).map(RenderPipeline::render_layer),
            Some(RenderLayer::Transparent)
        );
    }
}
