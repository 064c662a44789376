//! The state-diffing GPU context.
//!
//! [`GpuContext`] owns the backend and a cache of every fixed-function state
//! field. Setters forward to the backend only when the requested value differs
//! from the cached one. Cache cells start empty, so the first assignment of
//! every field always reaches the device; construction assigns the default
//! [`RenderState`] once, which gives a known baseline from the first frame.

use std::cell::{Cell, RefCell, RefMut};
use std::marker::PhantomData;

use crate::backend::{
    Backend, BufferId, BufferKind, Capability, ClearValues, FramebufferId, ProgramId,
    StateChange, TextureId,
};
use crate::state::{BlendEquation, BlendFactor, Comparison, Face, PolygonMode, RenderState, Winding};

/// Cached value.
///
/// An empty cell is invalid for every value, so the next set always emits.
#[derive(Debug)]
struct Cached<T: PartialEq + Copy>(Option<T>);

impl<T: PartialEq + Copy> Cached<T> {
    fn empty() -> Self {
        Cached(None)
    }

    fn invalidate(&mut self) {
        self.0 = None;
    }

    fn is_invalid(&self, new_val: &T) -> bool {
        match &self.0 {
            Some(t) => t != new_val,
            None => true,
        }
    }

    /// Stores `value` and reports whether the device must be told.
    fn update(&mut self, value: T) -> bool {
        if self.is_invalid(&value) {
            self.0 = Some(value);
            true
        } else {
            false
        }
    }

    fn get(&self) -> Option<T> {
        self.0
    }
}

#[derive(Debug)]
struct StateCache {
    capabilities: [Cached<bool>; Capability::ALL.len()],
    color_write: Cached<bool>,
    depth_write: Cached<bool>,
    depth_func: Cached<Comparison>,
    stencil_func: Cached<(Comparison, i32, u32)>,
    stencil_write: Cached<bool>,
    triangle_face: Cached<Face>,
    front_face: Cached<Winding>,
    blend_func: Cached<(BlendFactor, BlendFactor)>,
    blend_equation: Cached<(BlendEquation, BlendEquation)>,
    polygon_mode: Cached<(Face, PolygonMode)>,
    line_width: Cached<f32>,
    point_size: Cached<f32>,
}

impl StateCache {
    fn empty() -> Self {
        Self {
            capabilities: std::array::from_fn(|_| Cached::empty()),
            color_write: Cached::empty(),
            depth_write: Cached::empty(),
            depth_func: Cached::empty(),
            stencil_func: Cached::empty(),
            stencil_write: Cached::empty(),
            triangle_face: Cached::empty(),
            front_face: Cached::empty(),
            blend_func: Cached::empty(),
            blend_equation: Cached::empty(),
            polygon_mode: Cached::empty(),
            line_width: Cached::empty(),
            point_size: Cached::empty(),
        }
    }

    fn invalidate(&mut self) {
        for cap in &mut self.capabilities {
            cap.invalidate();
        }
        self.color_write.invalidate();
        self.depth_write.invalidate();
        self.depth_func.invalidate();
        self.stencil_func.invalidate();
        self.stencil_write.invalidate();
        self.triangle_face.invalidate();
        self.front_face.invalidate();
        self.blend_func.invalidate();
        self.blend_equation.invalidate();
        self.polygon_mode.invalidate();
        self.line_width.invalidate();
        self.point_size.invalidate();
    }
}

fn capability_index(cap: Capability) -> usize {
    match cap {
        Capability::DepthTest => 0,
        Capability::StencilTest => 1,
        Capability::CullFace => 2,
        Capability::Blend => 3,
        Capability::ScissorTest => 4,
        Capability::PrimitiveRestart => 5,
        Capability::Multisample => 6,
    }
}

/// The GPU context for one rendering surface.
///
/// Not `Send`/`Sync`: all GPU work happens on the thread that created it.
/// Resources borrow the context, so they are always dropped before it.
pub struct GpuContext {
    _not_send: PhantomData<*const ()>,
    backend: RefCell<Box<dyn Backend>>,
    cache: RefCell<StateCache>,
    emitted: Cell<u64>,
    binding: Cell<TargetBinding>,
}

/// The bound render target and the viewport set on it.
///
/// `viewport` is `None` until the first `set_viewport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TargetBinding {
    pub framebuffer: Option<FramebufferId>,
    pub viewport: Option<(i32, i32, u32, u32)>,
}

impl GpuContext {
    /// Wraps a backend and forces the default state onto it.
    pub fn new(backend: impl Backend + 'static) -> Self {
        let context = Self {
            _not_send: PhantomData,
            backend: RefCell::new(Box::new(backend)),
            cache: RefCell::new(StateCache::empty()),
            emitted: Cell::new(0),
            binding: Cell::new(TargetBinding::default()),
        };
        context.apply_state(&RenderState::DEFAULT);
        log::info!(
            "GPU context created on '{}' ({} state commands at cold start)",
            context.backend().name(),
            context.emitted.get()
        );
        context
    }

    /// Mutable access to the backend for resource calls.
    ///
    /// Do not change fixed-function state through this; use the setters so
    /// the cache stays truthful.
    pub(crate) fn backend(&self) -> RefMut<'_, Box<dyn Backend>> {
        self.backend.borrow_mut()
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn backend_name(&self) -> String {
        self.backend().name().to_string()
    }

    /// Number of state commands forwarded to the backend so far.
    #[must_use]
    pub fn state_commands_emitted(&self) -> u64 {
        self.emitted.get()
    }

    fn emit(&self, change: StateChange) {
        log::trace!("state: {change:?}");
        self.emitted.set(self.emitted.get() + 1);
        self.backend().apply(change);
    }

    /// Forgets every cached value; the next assignment of each field emits.
    ///
    /// Call after foreign code has touched device state behind our back.
    pub fn invalidate_state(&self) {
        self.cache.borrow_mut().invalidate();
    }

    fn set_capability(&self, cap: Capability, enabled: bool) {
        let changed = self.cache.borrow_mut().capabilities[capability_index(cap)].update(enabled);
        if changed {
            self.emit(StateChange::Enable(cap, enabled));
        }
    }

    pub fn set_color_write(&self, enabled: bool) {
        if self.cache.borrow_mut().color_write.update(enabled) {
            self.emit(StateChange::ColorMask(enabled));
        }
    }

    pub fn set_depth_test(&self, enabled: bool) {
        self.set_capability(Capability::DepthTest, enabled);
    }

    pub fn set_depth_write(&self, enabled: bool) {
        if self.cache.borrow_mut().depth_write.update(enabled) {
            self.emit(StateChange::DepthMask(enabled));
        }
    }

    pub fn set_depth_func(&self, func: Comparison) {
        if self.cache.borrow_mut().depth_func.update(func) {
            self.emit(StateChange::DepthFunc(func));
        }
    }

    pub fn set_stencil_test(&self, enabled: bool) {
        self.set_capability(Capability::StencilTest, enabled);
    }

    pub fn set_stencil_write(&self, enabled: bool) {
        if self.cache.borrow_mut().stencil_write.update(enabled) {
            self.emit(StateChange::StencilMask(if enabled { 0xFF } else { 0x00 }));
        }
    }

    /// Sets stencil function, reference and read mask in one command.
    pub fn set_stencil_func(&self, func: Comparison, reference: i32, mask: u32) {
        if self.cache.borrow_mut().stencil_func.update((func, reference, mask)) {
            self.emit(StateChange::StencilFunc {
                func,
                reference,
                mask,
            });
        }
    }

    /// Changes only the stencil reference value.
    pub fn set_stencil_reference(&self, reference: i32) {
        let (func, _, mask) = self.cached_stencil_func();
        self.set_stencil_func(func, reference, mask);
    }

    /// Changes only the stencil read mask.
    pub fn set_stencil_mask(&self, mask: u32) {
        let (func, reference, _) = self.cached_stencil_func();
        self.set_stencil_func(func, reference, mask);
    }

    fn cached_stencil_func(&self) -> (Comparison, i32, u32) {
        let d = RenderState::DEFAULT;
        self.cache
            .borrow()
            .stencil_func
            .get()
            .unwrap_or((d.stencil_func, d.stencil_reference, d.stencil_mask))
    }

    pub fn set_cull_face(&self, enabled: bool) {
        self.set_capability(Capability::CullFace, enabled);
    }

    /// Which faces culling removes.
    pub fn set_triangle_face(&self, face: Face) {
        if self.cache.borrow_mut().triangle_face.update(face) {
            self.emit(StateChange::CullFace(face));
        }
    }

    pub fn set_front_face(&self, winding: Winding) {
        if self.cache.borrow_mut().front_face.update(winding) {
            self.emit(StateChange::FrontFace(winding));
        }
    }

    pub fn set_blend(&self, enabled: bool) {
        self.set_capability(Capability::Blend, enabled);
    }

    pub fn set_blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        if self.cache.borrow_mut().blend_func.update((src, dst)) {
            self.emit(StateChange::BlendFunc { src, dst });
        }
    }

    /// Sets separate colour and alpha blend equations.
    pub fn set_blend_equation(&self, color: BlendEquation, alpha: BlendEquation) {
        if self.cache.borrow_mut().blend_equation.update((color, alpha)) {
            self.emit(StateChange::BlendEquation { color, alpha });
        }
    }

    pub fn set_scissor_test(&self, enabled: bool) {
        self.set_capability(Capability::ScissorTest, enabled);
    }

    pub fn set_primitive_restart(&self, enabled: bool) {
        self.set_capability(Capability::PrimitiveRestart, enabled);
    }

    pub fn set_polygon_mode(&self, face: Face, mode: PolygonMode) {
        if self.cache.borrow_mut().polygon_mode.update((face, mode)) {
            self.emit(StateChange::PolygonMode { face, mode });
        }
    }

    pub fn set_line_width(&self, width: f32) {
        if self.cache.borrow_mut().line_width.update(width) {
            self.emit(StateChange::LineWidth(width));
        }
    }

    pub fn set_point_size(&self, size: f32) {
        if self.cache.borrow_mut().point_size.update(size) {
            self.emit(StateChange::PointSize(size));
        }
    }

    pub fn set_multisample(&self, enabled: bool) {
        self.set_capability(Capability::Multisample, enabled);
    }

    /// Asserts a complete state bundle.
    ///
    /// The destructuring below names every field, so adding a field to
    /// [`RenderState`] without applying it here does not compile.
    pub fn apply_state(&self, state: &RenderState) {
        let RenderState {
            color_write,
            depth_test,
            depth_write,
            depth_func,
            stencil_test,
            stencil_write,
            stencil_func,
            stencil_reference,
            stencil_mask,
            cull_face,
            triangle_face,
            front_face,
            blend,
            blend_src,
            blend_dst,
            blend_equation_color,
            blend_equation_alpha,
            scissor_test,
            primitive_restart,
            polygon_face,
            polygon_mode,
            line_width,
            point_size,
            multisample,
        } = *state;

        self.set_color_write(color_write);
        self.set_depth_test(depth_test);
        self.set_depth_write(depth_write);
        self.set_depth_func(depth_func);
        self.set_stencil_test(stencil_test);
        self.set_stencil_write(stencil_write);
        self.set_stencil_func(stencil_func, stencil_reference, stencil_mask);
        self.set_cull_face(cull_face);
        self.set_triangle_face(triangle_face);
        self.set_front_face(front_face);
        self.set_blend(blend);
        self.set_blend_func(blend_src, blend_dst);
        self.set_blend_equation(blend_equation_color, blend_equation_alpha);
        self.set_scissor_test(scissor_test);
        self.set_primitive_restart(primitive_restart);
        self.set_polygon_mode(polygon_face, polygon_mode);
        self.set_line_width(line_width);
        self.set_point_size(point_size);
        self.set_multisample(multisample);
    }

    /// The cached state. Fields never assigned since the last invalidation
    /// report their default.
    #[must_use]
    pub fn current_state(&self) -> RenderState {
        let cache = self.cache.borrow();
        let d = RenderState::DEFAULT;
        let cap = |c: Capability, default: bool| {
            cache.capabilities[capability_index(c)].get().unwrap_or(default)
        };
        let (stencil_func, stencil_reference, stencil_mask) = cache
            .stencil_func
            .get()
            .unwrap_or((d.stencil_func, d.stencil_reference, d.stencil_mask));
        let (blend_src, blend_dst) = cache.blend_func.get().unwrap_or((d.blend_src, d.blend_dst));
        let (blend_equation_color, blend_equation_alpha) = cache
            .blend_equation
            .get()
            .unwrap_or((d.blend_equation_color, d.blend_equation_alpha));
        let (polygon_face, polygon_mode) = cache
            .polygon_mode
            .get()
            .unwrap_or((d.polygon_face, d.polygon_mode));
        RenderState {
            color_write: cache.color_write.get().unwrap_or(d.color_write),
            depth_test: cap(Capability::DepthTest, d.depth_test),
            depth_write: cache.depth_write.get().unwrap_or(d.depth_write),
            depth_func: cache.depth_func.get().unwrap_or(d.depth_func),
            stencil_test: cap(Capability::StencilTest, d.stencil_test),
            stencil_write: cache.stencil_write.get().unwrap_or(d.stencil_write),
            stencil_func,
            stencil_reference,
            stencil_mask,
            cull_face: cap(Capability::CullFace, d.cull_face),
            triangle_face: cache.triangle_face.get().unwrap_or(d.triangle_face),
            front_face: cache.front_face.get().unwrap_or(d.front_face),
            blend: cap(Capability::Blend, d.blend),
            blend_src,
            blend_dst,
            blend_equation_color,
            blend_equation_alpha,
            scissor_test: cap(Capability::ScissorTest, d.scissor_test),
            primitive_restart: cap(Capability::PrimitiveRestart, d.primitive_restart),
            polygon_face,
            polygon_mode,
            line_width: cache.line_width.get().unwrap_or(d.line_width),
            point_size: cache.point_size.get().unwrap_or(d.point_size),
            multisample: cap(Capability::Multisample, d.multisample),
        }
    }

    // ========== Resource pass-through ==========

    pub(crate) fn use_program(&self, program: Option<ProgramId>) {
        self.backend().use_program(program);
    }

    pub(crate) fn bind_buffer_target(&self, kind: BufferKind, buffer: BufferId) {
        self.backend().bind_buffer_target(kind, buffer);
    }

    pub(crate) fn bind_buffer(&self, kind: BufferKind, slot: u32, buffer: BufferId) {
        self.backend().bind_buffer(kind, slot, buffer);
    }

    pub(crate) fn bind_texture(&self, unit: u32, texture: Option<TextureId>) {
        self.backend().bind_texture(unit, texture);
    }

    pub(crate) fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>) {
        self.backend().bind_framebuffer(framebuffer);
        self.binding.set(TargetBinding {
            framebuffer,
            ..self.binding.get()
        });
    }

    /// Sets the viewport rectangle.
    pub fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        self.backend().set_viewport(x, y, width, height);
        self.binding.set(TargetBinding {
            viewport: Some((x, y, width, height)),
            ..self.binding.get()
        });
    }

    /// The current target and viewport, to hand back to [`Self::restore_binding`].
    pub(crate) fn binding(&self) -> TargetBinding {
        self.binding.get()
    }

    /// Rebinds a target captured earlier with [`Self::binding`].
    pub(crate) fn restore_binding(&self, binding: TargetBinding) {
        self.bind_framebuffer(binding.framebuffer);
        if let Some((x, y, width, height)) = binding.viewport {
            self.set_viewport(x, y, width, height);
        }
    }

    /// Clears the bound framebuffer.
    ///
    /// Clears honour the write masks, so the masks for every cleared buffer
    /// are switched on first (through the cache) and scissoring is disabled.
    pub fn clear(&self, values: ClearValues) {
        if values.color.is_some() {
            self.set_color_write(true);
        }
        if values.depth.is_some() {
            self.set_depth_write(true);
        }
        if values.stencil.is_some() {
            self.set_stencil_write(true);
        }
        self.set_scissor_test(false);
        self.backend().clear(values);
    }

    /// Reads RGBA8 pixels from the bound framebuffer. Blocks.
    #[must_use]
    pub fn read_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        self.backend().read_pixels(x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::backend::StateKind;
    use crate::recording::{CallLog, RecordingBackend};
    use crate::software::SoftwareBackend;
    use crate::state::RenderLayer;

    fn recorded() -> (GpuContext, CallLog) {
        let backend = RecordingBackend::new(SoftwareBackend::new(4, 4));
        let log = backend.log();
        (GpuContext::new(backend), log)
    }

    #[test]
    fn test_cold_start_applies_every_field_once() {
        let (_ctx, log) = recorded();
        for kind in StateKind::all() {
            assert_eq!(log.state_count(kind), 1, "{kind:?} not applied exactly once");
        }
        assert_eq!(log.state_total(), StateKind::all().len());
    }

    #[test]
    fn test_cold_start_emits_values_equal_to_defaults() {
        // Even values that match any backend default must be sent.
        let (_ctx, log) = recorded();
        assert!(log
            .state_changes()
            .contains(&StateChange::Enable(Capability::ScissorTest, false)));
        assert!(log.state_changes().contains(&StateChange::LineWidth(1.0)));
    }

    #[test]
    fn test_repeated_setter_is_noop() {
        let (ctx, log) = recorded();
        log.reset();
        ctx.set_depth_test(false);
        ctx.set_depth_test(false);
        ctx.set_depth_test(false);
        assert_eq!(log.state_count(StateKind::Enable(Capability::DepthTest)), 1);
        ctx.set_depth_test(false);
        assert_eq!(log.state_total(), 1);
    }

    #[test]
    fn test_setting_cached_value_emits_nothing() {
        let (ctx, log) = recorded();
        log.reset();
        ctx.apply_state(&RenderState::DEFAULT);
        assert_eq!(log.state_total(), 0);
    }

    #[test]
    fn test_layer_switch_emits_only_differences() {
        let (ctx, log) = recorded();
        log.reset();
        ctx.apply_state(&RenderLayer::Opaque.state());
        // cull enable only; triangle face is already Back
        assert_eq!(log.state_total(), 1);
        log.reset();
        ctx.apply_state(&RenderLayer::Transparent.state());
        // depth mask, blend enable, blend func
        assert_eq!(log.state_total(), 3);
    }

    #[test]
    fn test_partial_stencil_setters_share_one_command() {
        let (ctx, log) = recorded();
        log.reset();
        ctx.set_stencil_reference(3);
        ctx.set_stencil_mask(0x0F);
        ctx.set_stencil_reference(3);
        assert_eq!(log.state_count(StateKind::StencilFunc), 2);
        let s = ctx.current_state();
        assert_eq!((s.stencil_reference, s.stencil_mask), (3, 0x0F));
    }

    #[test]
    fn test_invalidate_forces_reemission() {
        let (ctx, log) = recorded();
        log.reset();
        ctx.invalidate_state();
        ctx.apply_state(&RenderState::DEFAULT);
        assert_eq!(log.state_total(), StateKind::all().len());
    }

    #[test]
    fn test_clear_reenables_depth_write() {
        let (ctx, _log) = recorded();
        ctx.apply_state(&RenderLayer::Transparent.state());
        assert!(!ctx.current_state().depth_write);
        ctx.clear(ClearValues {
            depth: Some(1.0),
            ..Default::default()
        });
        assert!(ctx.current_state().depth_write);
    }

    proptest! {
        #[test]
        fn repeated_values_emit_once(values in proptest::collection::vec(any::<bool>(), 1..32)) {
            let (ctx, log) = recorded();
            log.reset();
            let mut previous = RenderState::DEFAULT.blend;
            let mut expected = 0;
            for v in values {
                ctx.set_blend(v);
                ctx.set_blend(v);
                if v != previous {
                    expected += 1;
                    previous = v;
                }
            }
            prop_assert_eq!(log.state_count(StateKind::Enable(Capability::Blend)), expected);
        }
    }
}
