//! Light descriptions handed to materials at draw time.

use glam::{Vec3, Vec4};

/// Uniform ambient term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB colour; alpha is intensity.
    pub color: Vec4,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec4::new(1.0, 1.0, 1.0, 0.1),
        }
    }
}

/// A light infinitely far away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Linear RGB colour; alpha is intensity.
    pub color: Vec4,
    /// Position the light shines from; the direction is toward the origin.
    pub position: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            position: Vec3::new(1.0, 2.0, 1.5),
        }
    }
}

impl DirectionalLight {
    /// Unit vector pointing from the scene toward the light.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }
}

/// A positional light with distance attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Linear RGB colour; alpha is intensity.
    pub color: Vec4,
    /// World-space position.
    pub position: Vec3,
    /// Distance at which the contribution reaches zero.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            position: Vec3::ZERO,
            range: 10.0,
        }
    }
}
