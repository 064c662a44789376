//! Camera and view management.

use glam::{Mat4, Quat, Vec3};
use strata_core::Transform;

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection; `ortho_scale` is the half height.
    Orthographic,
}

/// A 3D camera for viewing the scene.
///
/// Position and orientation live in a [`Transform`] (scale is ignored). The
/// view and projection matrices are derived on every call, so they can never
/// go stale. Matrices map depth to `[0, w]` in clip space, as wgpu expects.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Placement in world space.
    pub transform: Transform,
    /// Point orbiting and zooming revolve around.
    pub pivot: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Projection mode.
    pub projection: Projection,
    /// Orthographic half height.
    pub ortho_scale: f32,
}

impl Camera {
    /// Creates a camera at (0, 0, 3) looking at the origin.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        let mut camera = Self {
            transform: Transform::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            pivot: Vec3::ZERO,
            fov: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection: Projection::Perspective,
            ortho_scale: 1.0,
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    /// An orthographic camera at `position` looking down -Z.
    #[must_use]
    pub fn orthographic(position: Vec3, half_height: f32, aspect_ratio: f32) -> Self {
        Self {
            transform: Transform::from_translation(position),
            pivot: position + Vec3::NEG_Z,
            projection: Projection::Orthographic,
            ortho_scale: half_height,
            ..Self::new(aspect_ratio)
        }
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.translation = position;
    }

    /// Rotates the camera to face `target` and makes it the pivot.
    pub fn look_at(&mut self, target: Vec3) {
        let position = self.position();
        if (target - position).length_squared() <= f32::EPSILON {
            return;
        }
        let forward = (target - position).normalize();
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(position, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.transform.rotation = rotation;
        self.pivot = target;
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            self.aspect_ratio = aspect_ratio;
        }
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.transform.rotation, self.transform.translation)
            .inverse()
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            Projection::Orthographic => {
                let half_height = self.ortho_scale;
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.transform.up()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.transform.rotation * Vec3::X
    }

    /// Orbits the camera around the pivot (turntable style).
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.position() - self.pivot;
        let yaw = Quat::from_rotation_y(-delta_x);
        let pitch = Quat::from_axis_angle(self.right(), -delta_y);
        let rotated = yaw * pitch * offset;
        // Stop short of the poles so the up vector stays defined.
        if rotated.normalize_or_zero().dot(Vec3::Y).abs() > 0.999 {
            self.set_position(self.pivot + yaw * offset);
        } else {
            self.set_position(self.pivot + rotated);
        }
        self.look_at(self.pivot);
    }

    /// Pans the camera and its pivot.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.up() * delta_y;
        self.transform.translation += offset;
        self.pivot += offset;
    }

    /// Zooms the camera (moves toward/away from the pivot for perspective,
    /// adjusts `ortho_scale` for orthographic).
    pub fn zoom(&mut self, delta: f32) {
        match self.projection {
            Projection::Perspective => {
                let direction = self.forward();
                let distance = (self.position() - self.pivot).length();
                let new_distance = (distance - delta).max(0.1);
                self.set_position(self.pivot - direction * new_distance);
            }
            Projection::Orthographic => {
                let zoom_factor = 1.0 - delta * 0.4;
                self.ortho_scale = (self.ortho_scale * zoom_factor).clamp(0.01, 1000.0);
            }
        }
    }

    /// Frames the given bounding box.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let size = (max - min).length().max(1e-3);
        let extents = max - min;

        self.set_position(center + Vec3::new(0.0, 0.0, size * 1.5));
        self.look_at(center);
        self.near = size * 0.001;
        self.far = size * 100.0;

        let half_height = extents.y.max(extents.x / self.aspect_ratio) * 0.6;
        self.ortho_scale = half_height.max(0.1);
    }

    /// Sets the field of view in radians.
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(0.1, std::f32::consts::PI - 0.1);
    }

    /// Sets the near clipping plane.
    pub fn set_near(&mut self, near: f32) {
        self.near = near.max(0.001);
    }

    /// Sets the far clipping plane.
    pub fn set_far(&mut self, far: f32) {
        self.far = far.max(self.near + 0.1);
    }

    /// Returns FOV in degrees.
    #[must_use]
    pub fn fov_degrees(&self) -> f32 {
        self.fov.to_degrees()
    }

    /// Sets FOV from degrees.
    pub fn set_fov_degrees(&mut self, degrees: f32) {
        self.set_fov(degrees.to_radians());
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.projection, Projection::Perspective);
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_matrices_follow_transform() {
        let mut camera = Camera::new(1.0);
        let before = camera.view_matrix();
        camera.set_position(Vec3::new(0.0, 0.0, 10.0));
        assert_ne!(before, camera.view_matrix());
        // origin lies 10 units in front of the camera
        let p = camera.view_matrix() * Vec4::W;
        assert!((p.z + 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_to_one_depth_range() {
        let camera = Camera::orthographic(Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0);
        let near = camera.view_projection_matrix() * Vec4::new(0.0, 0.0, 1.0 - camera.near, 1.0);
        let far = camera.view_projection_matrix() * Vec4::new(0.0, 0.0, 1.0 - camera.far, 1.0);
        assert!((near.z / near.w).abs() < 1e-3);
        assert!((far.z / far.w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_projection_mode_orthographic() {
        let mut camera = Camera::new(1.0);
        camera.projection = Projection::Orthographic;
        camera.ortho_scale = 5.0;
        let proj = camera.projection_matrix();
        assert!((proj.w_axis.w - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_set_fov_clamping() {
        let mut camera = Camera::new(1.0);
        camera.set_fov(0.0);
        assert!(camera.fov >= 0.1);
        camera.set_fov(std::f32::consts::PI);
        assert!(camera.fov < std::f32::consts::PI);
        camera.set_fov_degrees(90.0);
        assert!((camera.fov_degrees() - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::new(1.0);
        let d = camera.position().distance(camera.pivot);
        camera.orbit(0.7, 0.3);
        assert!((camera.position().distance(camera.pivot) - d).abs() < 1e-4);
        assert!((camera.forward() - (camera.pivot - camera.position()).normalize()).length() < 1e-4);
    }

    #[test]
    fn test_zoom_perspective() {
        let mut camera = Camera::new(1.0);
        camera.set_position(Vec3::new(0.0, 0.0, 5.0));
        camera.look_at(Vec3::ZERO);
        let initial_distance = camera.position().distance(camera.pivot);
        camera.zoom(1.0);
        assert!(camera.position().distance(camera.pivot) < initial_distance);
    }
}
