//! Object transforms.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// A decomposed transform (translation, rotation, scale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation component.
    pub translation: Vec3,
    /// Rotation component as a quaternion.
    pub rotation: Quat,
    /// Scale component.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Creates a new identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Creates a transform from a translation.
    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Creates a transform from a rotation.
    #[must_use]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Creates a transform from a Mat4.
    ///
    /// This decomposition may not be exact for matrices with shear.
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Sets the scale, keeping translation and rotation.
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Converts to a model matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Local forward direction (-Z rotated into world space).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Local up direction.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Returns the rotation as Euler angles in degrees (YXZ order).
    #[must_use]
    pub fn euler_angles_degrees(&self) -> Vec3 {
        let (y, x, z) = self.rotation.to_euler(EulerRot::YXZ);
        Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    /// Sets the rotation from Euler angles in degrees (YXZ order).
    pub fn set_euler_angles_degrees(&mut self, angles: Vec3) {
        self.rotation = Quat::from_euler(
            EulerRot::YXZ,
            angles.y.to_radians(),
            angles.x.to_radians(),
            angles.z.to_radians(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_matrix_roundtrip() {
        let t = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(2.0),
        };
        let back = Transform::from_matrix(t.to_matrix());
        assert!((back.translation - t.translation).length() < 1e-5);
        assert!((back.scale - t.scale).length() < 1e-5);
    }

    #[test]
    fn test_forward_follows_rotation() {
        let t = Transform::from_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        assert!((t.forward() - Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn test_transform_euler_angles() {
        let mut t = Transform::identity();
        t.set_euler_angles_degrees(Vec3::new(0.0, 90.0, 0.0));
        let angles = t.euler_angles_degrees();
        assert!((angles.y - 90.0).abs() < 0.1);
    }
}
