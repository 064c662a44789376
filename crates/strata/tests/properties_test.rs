//! End-to-end checks of the rendering core's guarantees.
//!
//! Every test runs on the software reference backend, optionally wrapped in a
//! recording backend that counts each call reaching the device.

use proptest::prelude::*;
use strata::*;
use strata_render::{
    BufferKind, CallLog, Capability, RecordingBackend, StateKind, TypedBuffer, MAX_POINT_LIGHTS,
};

fn recorded() -> (GpuContext, CallLog) {
    let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
    let log = backend.log();
    (GpuContext::new(backend), log)
}

/// Orthographic camera on +Z looking down -Z; `half_height` world units above
/// and below the centre.
fn front_camera(half_height: f32, aspect: f32) -> Camera {
    let mut camera = Camera::orthographic(Vec3::new(0.0, 0.0, 2.0), half_height, aspect);
    camera.near = 0.5;
    camera.far = 10.0;
    camera
}

/// A counter-clockwise triangle at depth `z` large enough to cover any
/// viewport of half-height 1.
fn big_triangle<'ctx>(ctx: &'ctx GpuContext, z: f32) -> Mesh<'ctx> {
    let (v, i) = shapes::triangle(
        Vec3::new(-4.0, -4.0, z),
        Vec3::new(4.0, -4.0, z),
        Vec3::new(0.0, 4.0, z),
    );
    Mesh::with_standard_attributes(ctx, &v, &i).unwrap()
}

fn solid<'ctx>(ctx: &'ctx GpuContext, color: Vec4, layer: RenderLayer) -> Material<'ctx, SolidColor> {
    Material::new(ctx, SolidColor::with_layer(color, layer)).unwrap()
}

fn assert_rgb_near(actual: [u8; 4], expected: [u8; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.abs_diff(e) <= 1, "{actual:?} vs {expected:?}");
    }
}

const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

#[test]
fn repeated_state_assignment_emits_once() {
    let (ctx, log) = recorded();
    log.reset();
    ctx.set_depth_test(false);
    ctx.set_depth_test(false);
    assert_eq!(log.state_count(StateKind::Enable(Capability::DepthTest)), 1);
    ctx.set_depth_test(true);
    ctx.set_depth_test(true);
    assert_eq!(log.state_count(StateKind::Enable(Capability::DepthTest)), 2);
    assert_eq!(log.state_total(), 2);
}

#[test]
fn construction_applies_every_state_field() {
    let (ctx, log) = recorded();
    for kind in StateKind::all() {
        assert_eq!(log.state_count(kind), 1, "{kind:?}");
    }
    assert_eq!(ctx.current_state(), RenderState::DEFAULT);
}

#[test]
fn layer_presets_are_deterministic() {
    let (ctx, log) = recorded();
    for layer in RenderLayer::ALL {
        let a = solid(&ctx, RED, layer);
        let b = solid(&ctx, GREEN, layer);
        let (sa, sb) = (*a.pass().main().state(), *b.pass().main().state());
        assert_eq!(sa, sb, "{layer:?}");
        assert_eq!(sa, layer.state(), "{layer:?}");

        a.pass().main().bind();
        assert_eq!(ctx.current_state(), layer.state(), "{layer:?}");
        log.reset();
        b.pass().main().bind();
        a.pass().main().bind();
        assert_eq!(log.state_total(), 0, "{layer:?} re-emitted state");
        a.pass().unbind();
    }
}

#[test]
fn buffer_rejects_wrong_lengths_without_writing() {
    let (ctx, log) = recorded();
    let buffer = TypedBuffer::<u32>::new(&ctx, BufferKind::Uniform, 4).unwrap();
    buffer.set_data(&[7, 7, 7, 7]).unwrap();
    log.reset();
    for data in [&[1u32, 2, 3, 4, 5][..], &[1, 2, 3][..]] {
        match buffer.set_data(data) {
            Err(RenderError::InvalidLength { expected, actual }) => {
                assert_eq!((expected, actual), (4, data.len()));
            }
            other => panic!("expected InvalidLength, got {other:?}"),
        }
    }
    assert!(log.is_empty());
    assert_eq!(buffer.get_data(), [7, 7, 7, 7]);
}

proptest! {
    #[test]
    fn buffer_length_invariant(len in 1usize..64, delta in -8isize..8) {
        prop_assume!(delta != 0);
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let buffer = TypedBuffer::<f32>::new(&ctx, BufferKind::Storage, len).unwrap();
        let wrong = len.saturating_add_signed(delta);
        prop_assume!(wrong != len);
        let result = buffer.set_data(&vec![1.0; wrong]);
        let is_invalid_length = matches!(result, Err(RenderError::InvalidLength { .. }));
        prop_assert!(is_invalid_length);
        prop_assert!(buffer.get_data().iter().all(|v| *v == 0.0));
    }
}

#[test]
fn point_light_limit_is_inclusive() {
    let (ctx, log) = recorded();
    let frame = Frame::new(&ctx, 1, 1).unwrap();
    let mesh = big_triangle(&ctx, 0.0);
    let material = solid(&ctx, RED, RenderLayer::Opaque);
    let mut params = GlobalParameters::new(front_camera(1.0, 1.0));
    params.point_lights = vec![PointLight::default(); MAX_POINT_LIGHTS];

    let scope = frame.begin();
    material.draw(&mesh, &params).unwrap();

    params.point_lights.push(PointLight::default());
    log.reset();
    assert!(matches!(
        material.draw(&mesh, &params),
        Err(RenderError::PointLightOverflow { count: 17, max: 16 })
    ));
    assert!(log.is_empty(), "overflowing draw reached the device");
    drop(scope);
}

#[test]
fn single_opaque_draw_fills_one_texel() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let frame = Frame::new(&ctx, 1, 1).unwrap();
    let mesh = big_triangle(&ctx, 0.0);
    let material = Material::new(&ctx, SolidColor::new(RED)).unwrap();
    {
        let scope = frame.begin();
        scope.clear([0.0; 4]);
        material
            .draw(&mesh, &GlobalParameters::new(front_camera(1.0, 1.0)))
            .unwrap();
    }
    assert_eq!(frame.read_pixel(0, 0), [255, 0, 0, 255]);
}

#[test]
fn nearer_triangle_wins_in_either_order() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let frame = Frame::new(&ctx, 1, 1).unwrap();
    let near = big_triangle(&ctx, 0.5);
    let far = big_triangle(&ctx, -0.5);
    let red = solid(&ctx, RED, RenderLayer::Opaque);
    let green = solid(&ctx, GREEN, RenderLayer::Opaque);
    let params = GlobalParameters::new(front_camera(1.0, 1.0));

    {
        let scope = frame.begin();
        scope.clear([0.0; 4]);
        green.draw(&far, &params).unwrap();
        red.draw(&near, &params).unwrap();
    }
    assert_eq!(frame.read_pixel(0, 0), [255, 0, 0, 255]);

    {
        let scope = frame.begin();
        scope.clear([0.0; 4]);
        red.draw(&near, &params).unwrap();
        green.draw(&far, &params).unwrap();
    }
    assert_eq!(frame.read_pixel(0, 0), [255, 0, 0, 255]);
}

#[test]
fn transparent_draw_leaves_depth_untouched() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let frame = Frame::new(&ctx, 1, 1).unwrap();
    let opaque = big_triangle(&ctx, 0.0);
    let glass = big_triangle(&ctx, 0.5);
    let behind = big_triangle(&ctx, -0.5);
    let between = big_triangle(&ctx, 0.25);

    let red = solid(&ctx, RED, RenderLayer::Opaque);
    let blue = solid(&ctx, Vec4::new(0.0, 0.0, 1.0, 0.5), RenderLayer::Transparent);
    let green = solid(&ctx, GREEN, RenderLayer::Opaque);
    assert!(!blue.pass().main().state().depth_write);
    let params = GlobalParameters::new(front_camera(1.0, 1.0));

    let scope = frame.begin();
    scope.clear([0.0; 4]);
    red.draw(&opaque, &params).unwrap();
    blue.draw(&glass, &params).unwrap();
    green.draw(&behind, &params).unwrap();
    drop(scope);
    // Blue over red; the farther green failed against the red depth.
    assert_rgb_near(frame.read_pixel(0, 0), [128, 0, 128]);

    let scope = frame.begin();
    green.draw(&between, &params).unwrap();
    drop(scope);
    // In front of red but behind the glass: passes only because the glass
    // wrote no depth.
    assert_rgb_near(frame.read_pixel(0, 0), [0, 255, 0]);
}
