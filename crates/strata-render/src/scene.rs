//! One viewport: a frame, a camera, and the input state of the panel
//! showing it.

use chrono::{Local, NaiveDateTime};
use glam::{Vec2, Vec3};
use strata_core::{AmbientLight, DirectionalLight, Options, PointLight};

use crate::camera::Camera;
use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::frame::{Frame, FrameScope};
use crate::material::{GlobalParameters, SceneData};

/// Per-frame input for one viewport, as reported by the host UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportInput {
    /// Panel size in pixels.
    pub size: (u32, u32),
    /// Mouse position in panel pixels, origin top-left.
    pub mouse: Vec2,
    pub hovered: bool,
    pub focused: bool,
    /// The panel was dismissed.
    pub closed: bool,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// The left button was pressed this frame.
    pub left_click: bool,
    pub ctrl: bool,
    /// A modal tool (gizmo drag, text field) owns the mouse.
    pub input_captured: bool,
}

impl Default for ViewportInput {
    fn default() -> Self {
        Self {
            size: (1, 1),
            mouse: Vec2::ZERO,
            hovered: false,
            focused: false,
            closed: false,
            delta_time: 0.0,
            left_click: false,
            ctrl: false,
            input_captured: false,
        }
    }
}

impl ViewportInput {
    /// Whether `mouse` lies inside the panel.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mouse_inside(&self) -> bool {
        let (w, h) = self.size;
        self.mouse.x >= 0.0
            && self.mouse.y >= 0.0
            && self.mouse.x < w as f32
            && self.mouse.y < h as f32
    }

    /// A click the picking pass should resolve.
    #[must_use]
    pub fn is_pick_click(&self) -> bool {
        self.focused && self.left_click && !self.input_captured && self.mouse_inside()
    }
}

/// An off-screen viewport with its camera and lights.
pub struct Scene<'ctx> {
    frame: Frame<'ctx>,
    camera: Camera,
    data: SceneData,
    clear_color: [f32; 4],
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub point_lights: Vec<PointLight>,
    hovered: bool,
    focused: bool,
    closed: bool,
}

impl<'ctx> Scene<'ctx> {
    pub fn new(context: &'ctx GpuContext, width: u32, height: u32) -> RenderResult<Self> {
        Self::with_options(context, width, height, &Options::default())
    }

    /// Creates a scene honouring the background colour and MSAA setting.
    #[allow(clippy::cast_precision_loss)]
    pub fn with_options(
        context: &'ctx GpuContext,
        width: u32,
        height: u32,
        options: &Options,
    ) -> RenderResult<Self> {
        let frame = Frame::with_samples(context, width, height, options.msaa_samples)?;
        let (w, h) = frame.size();
        let aspect = w as f32 / h as f32;
        let data = SceneData {
            resolution: Vec2::new(w as f32, h as f32),
            ..SceneData::default()
        };
        Ok(Self {
            frame,
            camera: Camera::new(aspect),
            data,
            clear_color: options.background_color.extend(1.0).to_array(),
            ambient: AmbientLight::default(),
            directional: DirectionalLight::default(),
            point_lights: Vec::new(),
            hovered: false,
            focused: false,
            closed: false,
        })
    }

    /// Applies this frame's input using the local wall clock.
    pub fn update(&mut self, input: &ViewportInput) -> RenderResult<bool> {
        self.update_at(input, Local::now().naive_local())
    }

    /// Applies this frame's input. Resizes the frame and the camera aspect
    /// when the panel size changed; returns whether it did.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_at(&mut self, input: &ViewportInput, now: NaiveDateTime) -> RenderResult<bool> {
        self.hovered = input.hovered;
        self.focused = input.focused;
        self.closed = input.closed;
        let resized = self.frame.resize(input.size.0, input.size.1)?;
        let (w, h) = self.frame.size();
        if resized {
            self.camera.set_aspect_ratio(w as f32 / h as f32);
        }
        self.data.resolution = Vec2::new(w as f32, h as f32);
        self.data.mouse = input.mouse;
        self.data.advance(input.delta_time, now);
        Ok(resized)
    }

    /// Binds the frame and clears it to the background colour.
    #[must_use]
    pub fn begin(&self) -> FrameScope<'_, 'ctx> {
        let scope = self.frame.begin();
        scope.clear(self.clear_color);
        scope
    }

    /// Ends a [`begin`](Self::begin) scope and restores the default target.
    pub fn end(&self, scope: FrameScope<'_, 'ctx>) {
        drop(scope);
    }

    /// Snapshot of everything materials need this frame.
    #[must_use]
    pub fn parameters(&self) -> GlobalParameters {
        GlobalParameters {
            camera: self.camera.clone(),
            scene: self.data.clone(),
            ambient: self.ambient,
            directional: self.directional,
            point_lights: self.point_lights.clone(),
            model: glam::Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn frame(&self) -> &Frame<'ctx> {
        &self.frame
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[must_use]
    pub fn data(&self) -> &SceneData {
        &self.data
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.frame.size()
    }

    pub fn set_background_color(&mut self, color: Vec3) {
        self.clear_color = color.extend(1.0).to_array();
    }

    #[must_use]
    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::software::SoftwareBackend;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_update_resizes_and_tracks_state() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut scene = Scene::new(&ctx, 4, 4).unwrap();
        let input = ViewportInput {
            size: (8, 4),
            hovered: true,
            focused: true,
            delta_time: 0.25,
            ..ViewportInput::default()
        };
        assert!(scene.update_at(&input, noon()).unwrap());
        assert_eq!(scene.size(), (8, 4));
        assert!((scene.camera().aspect_ratio - 2.0).abs() < 1e-6);
        assert!(scene.is_hovered() && scene.is_focused() && !scene.is_closed());
        assert!(!scene.update_at(&input, noon()).unwrap());
        assert_eq!(scene.data().frame_count, 2);
        assert_eq!(scene.parameters().scene.resolution, Vec2::new(8.0, 4.0));
    }

    #[test]
    fn test_begin_clears_to_background() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut scene = Scene::new(&ctx, 2, 2).unwrap();
        scene.set_background_color(Vec3::new(0.0, 1.0, 0.0));
        let scope = scene.begin();
        scene.end(scope);
        assert_eq!(scene.frame().read_pixel(1, 1), [0, 255, 0, 255]);
    }

    #[test]
    fn test_pick_click_requires_focus_and_bounds() {
        let mut input = ViewportInput {
            size: (10, 10),
            mouse: Vec2::new(3.0, 4.0),
            focused: true,
            left_click: true,
            ..ViewportInput::default()
        };
        assert!(input.is_pick_click());
        input.input_captured = true;
        assert!(!input.is_pick_click());
        input.input_captured = false;
        input.mouse = Vec2::new(10.0, 4.0);
        assert!(!input.is_pick_click());
        input.mouse = Vec2::new(3.0, 4.0);
        input.focused = false;
        assert!(!input.is_pick_click());
    }
}
