//! The per-draw parameter bag.

use chrono::{Datelike, NaiveDateTime, Timelike};
use glam::{Mat4, Vec2};
use strata_core::{AmbientLight, DirectionalLight, PointLight};

use crate::camera::Camera;

/// Per-frame scene constants.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneData {
    /// Viewport size in pixels.
    pub resolution: Vec2,
    /// Mouse position in viewport pixels, origin top-left.
    pub mouse: Vec2,
    /// Wall-clock date and time of the frame.
    pub date_time: NaiveDateTime,
    /// Seconds since the first frame.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Smoothed frames per second.
    pub frame_rate: f32,
    /// Frames rendered so far.
    pub frame_count: u64,
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            resolution: Vec2::ONE,
            mouse: Vec2::ZERO,
            date_time: NaiveDateTime::default(),
            elapsed: 0.0,
            delta_time: 0.0,
            frame_rate: 0.0,
            frame_count: 0,
        }
    }
}

impl SceneData {
    /// Advances the clock by one frame.
    pub fn advance(&mut self, delta_time: f32, now: NaiveDateTime) {
        self.delta_time = delta_time.max(0.0);
        self.elapsed += self.delta_time;
        self.date_time = now;
        self.frame_count += 1;
        if self.delta_time > 0.0 {
            let instant = 1.0 / self.delta_time;
            // Exponential smoothing so the readout does not flicker.
            self.frame_rate = if self.frame_rate == 0.0 {
                instant
            } else {
                self.frame_rate * 0.9 + instant * 0.1
            };
        }
    }

    /// `[year, month, day, seconds since midnight]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn date_vector(&self) -> [f32; 4] {
        let d = self.date_time;
        [
            d.year() as f32,
            d.month() as f32,
            d.day() as f32,
            d.num_seconds_from_midnight() as f32 + d.nanosecond() as f32 * 1e-9,
        ]
    }
}

/// Everything a material needs for one draw.
///
/// Materials receive it by shared reference for the duration of the draw and
/// keep nothing from it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalParameters {
    pub camera: Camera,
    pub scene: SceneData,
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub point_lights: Vec<PointLight>,
    /// Model matrix of the object being drawn.
    pub model: Mat4,
}

impl Default for GlobalParameters {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            scene: SceneData::default(),
            ambient: AmbientLight::default(),
            directional: DirectionalLight::default(),
            point_lights: Vec::new(),
            model: Mat4::IDENTITY,
        }
    }
}

impl GlobalParameters {
    /// Parameters for a camera with default lights.
    #[must_use]
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    /// A copy of these parameters for one object.
    #[must_use]
    pub fn for_object(&self, model: Mat4) -> Self {
        Self {
            model,
            ..self.clone()
        }
    }
}
