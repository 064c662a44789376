//! A backend wrapper that records every call.
//!
//! Used by tests to count exactly what reaches the device.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{
    Backend, BufferId, BufferKind, ClearValues, FramebufferId, ProgramId, StateChange,
    StateKind, TextureDesc, TextureId, VertexArrayId, VertexAttribute,
};
use crate::error::RenderResult;
use crate::shader::ShaderModule;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    State(StateChange),
    CreateBuffer(BufferKind, usize),
    WriteBuffer { buffer: BufferId, offset: usize, len: usize },
    ReadBuffer(BufferId),
    BindBufferTarget(BufferKind, BufferId),
    BindBuffer(BufferKind, u32, BufferId),
    DeleteBuffer(BufferId),
    CreateVertexArray,
    VertexAttribute(VertexAttribute),
    DeleteVertexArray(VertexArrayId),
    CreateProgram,
    UseProgram(Option<ProgramId>),
    DeleteProgram(ProgramId),
    CreateTexture(TextureDesc),
    WriteTexture(TextureId),
    BindTexture(u32, Option<TextureId>),
    DeleteTexture(TextureId),
    CreateFramebuffer,
    BindFramebuffer(Option<FramebufferId>),
    DeleteFramebuffer(FramebufferId),
    Viewport(i32, i32, u32, u32),
    Clear(ClearValues),
    Draw { index_count: u32, instances: u32 },
    ReadPixels,
}

/// Shared, cloneable view of the recorded calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.0.borrow_mut().clear();
    }

    /// A copy of every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Total number of recorded calls of any kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Recorded state commands, in order.
    #[must_use]
    pub fn state_changes(&self) -> Vec<StateChange> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Number of state commands of one kind.
    #[must_use]
    pub fn state_count(&self, kind: StateKind) -> usize {
        self.state_changes()
            .iter()
            .filter(|s| s.kind() == kind)
            .count()
    }

    /// Number of state commands of any kind.
    #[must_use]
    pub fn state_total(&self) -> usize {
        self.state_changes().len()
    }

    /// Number of recorded calls matching a predicate.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| predicate(c)).count()
    }

    /// Number of draw calls.
    #[must_use]
    pub fn draws(&self) -> usize {
        self.count(|c| matches!(c, Call::Draw { .. }))
    }
}

/// Forwards to an inner backend and records each call.
pub struct RecordingBackend<B: Backend> {
    inner: B,
    log: CallLog,
}

impl<B: Backend> RecordingBackend<B> {
    /// Wraps `inner`.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            log: CallLog::default(),
        }
    }

    /// A handle to the shared log; keep it before moving the backend into a
    /// context.
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl<B: Backend> Backend for RecordingBackend<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn apply(&mut self, change: StateChange) {
        self.log.push(Call::State(change));
        self.inner.apply(change);
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> RenderResult<BufferId> {
        self.log.push(Call::CreateBuffer(kind, size));
        self.inner.create_buffer(kind, size)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        self.log.push(Call::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        self.inner.write_buffer(buffer, offset, data);
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: usize, len: usize) -> Vec<u8> {
        self.log.push(Call::ReadBuffer(buffer));
        self.inner.read_buffer(buffer, offset, len)
    }

    fn bind_buffer_target(&mut self, kind: BufferKind, buffer: BufferId) {
        self.log.push(Call::BindBufferTarget(kind, buffer));
        self.inner.bind_buffer_target(kind, buffer);
    }

    fn bind_buffer(&mut self, kind: BufferKind, slot: u32, buffer: BufferId) {
        self.log.push(Call::BindBuffer(kind, slot, buffer));
        self.inner.bind_buffer(kind, slot, buffer);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.log.push(Call::DeleteBuffer(buffer));
        self.inner.delete_buffer(buffer);
    }

    fn create_vertex_array(
        &mut self,
        vertices: BufferId,
        indices: BufferId,
        stride: usize,
    ) -> RenderResult<VertexArrayId> {
        self.log.push(Call::CreateVertexArray);
        self.inner.create_vertex_array(vertices, indices, stride)
    }

    fn vertex_attribute(&mut self, vertex_array: VertexArrayId, attribute: VertexAttribute) {
        self.log.push(Call::VertexAttribute(attribute));
        self.inner.vertex_attribute(vertex_array, attribute);
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.log.push(Call::DeleteVertexArray(vertex_array));
        self.inner.delete_vertex_array(vertex_array);
    }

    fn create_program(&mut self, modules: &[ShaderModule]) -> Result<ProgramId, String> {
        self.log.push(Call::CreateProgram);
        self.inner.create_program(modules)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.log.push(Call::UseProgram(program));
        self.inner.use_program(program);
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.log.push(Call::DeleteProgram(program));
        self.inner.delete_program(program);
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureId> {
        self.log.push(Call::CreateTexture(*desc));
        self.inner.create_texture(desc)
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) {
        self.log.push(Call::WriteTexture(texture));
        self.inner.write_texture(texture, data);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        self.log.push(Call::BindTexture(unit, texture));
        self.inner.bind_texture(unit, texture);
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.log.push(Call::DeleteTexture(texture));
        self.inner.delete_texture(texture);
    }

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth_stencil: Option<TextureId>,
    ) -> RenderResult<FramebufferId> {
        self.log.push(Call::CreateFramebuffer);
        self.inner.create_framebuffer(color, depth_stencil)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.log.push(Call::BindFramebuffer(framebuffer));
        self.inner.bind_framebuffer(framebuffer);
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.log.push(Call::DeleteFramebuffer(framebuffer));
        self.inner.delete_framebuffer(framebuffer);
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(Call::Viewport(x, y, width, height));
        self.inner.set_viewport(x, y, width, height);
    }

    fn clear(&mut self, values: ClearValues) {
        self.log.push(Call::Clear(values));
        self.inner.clear(values);
    }

    fn draw_elements(&mut self, vertex_array: VertexArrayId, index_count: u32, instances: u32) {
        self.log.push(Call::Draw {
            index_count,
            instances,
        });
        self.inner.draw_elements(vertex_array, index_count, instances);
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        self.log.push(Call::ReadPixels);
        self.inner.read_pixels(x, y, width, height)
    }
}
