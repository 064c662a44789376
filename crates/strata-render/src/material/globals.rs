//! Global uniform blocks shared by every material.
//!
//! Eight blocks occupy uniform slots `0..8`. Layouts follow std140: every
//! member is a `vec4` or a `mat4`, so the Rust structs need no padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::backend::BufferKind;
use crate::buffer::TypedBuffer;
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::RenderPipeline;

use super::params::GlobalParameters;
use super::TextureChannel;

pub const TRANSFORM_SLOT: u32 = 0;
pub const CAMERA_SLOT: u32 = 1;
pub const SCENE_SLOT: u32 = 2;
pub const AMBIENT_SLOT: u32 = 3;
pub const DIRECTIONAL_SLOT: u32 = 4;
pub const POINT_LIGHTS_SLOT: u32 = 5;
pub const CHANNEL_SIZE_SLOT: u32 = 6;
pub const CHANNEL_TILING_SLOT: u32 = 7;

/// First uniform slot free for material blocks.
pub const UNIFORM_BUFFER_BINDING_START: u32 = 8;
/// Texture unit of channel 0.
pub const TEXTURE_CHANNEL_UNIT_START: u32 = 5;
pub const MAX_TEXTURE_CHANNELS: usize = 5;
pub const MAX_POINT_LIGHTS: usize = 16;
/// Storage slot of the per-instance model matrices.
pub const INSTANCE_STORAGE_SLOT: u32 = 0;

/// Object transforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TransformBlock {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// `projection * view * model`.
    pub object_to_clip: [[f32; 4]; 4],
    /// Inverse transpose of `model`.
    pub normal_matrix: [[f32; 4]; 4],
}

impl TransformBlock {
    const IDENTITY: [[f32; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    #[must_use]
    pub const fn identity() -> Self {
        Self {
            model: Self::IDENTITY,
            view: Self::IDENTITY,
            projection: Self::IDENTITY,
            object_to_clip: Self::IDENTITY,
            normal_matrix: Self::IDENTITY,
        }
    }

    #[must_use]
    pub fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        let normal = if model.determinant().abs() <= f32::EPSILON {
            Mat4::IDENTITY
        } else {
            model.inverse().transpose()
        };
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            object_to_clip: (projection * view * model).to_cols_array_2d(),
            normal_matrix: normal.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraBlock {
    pub position: [f32; 4],
    pub forward: [f32; 4],
    pub up: [f32; 4],
    pub right: [f32; 4],
    /// near, far, vertical fov (radians), aspect ratio.
    pub params: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneBlock {
    /// Resolution (xy) and mouse position (zw).
    pub resolution_mouse: [f32; 4],
    /// Year, month, day, seconds since midnight.
    pub date: [f32; 4],
    /// Elapsed seconds, delta time, frame rate, frame count.
    pub timing: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AmbientBlock {
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DirectionalBlock {
    pub color: [f32; 4],
    pub position: [f32; 4],
    pub direction: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightData {
    pub color: [f32; 4],
    /// xyz position, w range.
    pub position_range: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightBlock {
    pub lights: [PointLightData; MAX_POINT_LIGHTS],
    /// Active light count in `x`.
    pub count: [u32; 4],
}

/// Per channel `(1 / width, 1 / height, width, height)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ChannelSizeBlock {
    pub channels: [[f32; 4]; MAX_TEXTURE_CHANNELS],
}

/// Per channel tiling (xy) and offset (zw).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ChannelTilingBlock {
    pub channels: [[f32; 4]; MAX_TEXTURE_CHANNELS],
}

impl Default for ChannelTilingBlock {
    fn default() -> Self {
        Self {
            channels: [[1.0, 1.0, 0.0, 0.0]; MAX_TEXTURE_CHANNELS],
        }
    }
}

fn vec4(v: Vec4) -> [f32; 4] {
    v.to_array()
}

/// Assembles the global blocks from a [`GlobalParameters`] snapshot.
pub struct GlobalUniforms<'ctx> {
    transform: TypedBuffer<'ctx, TransformBlock>,
    camera: TypedBuffer<'ctx, CameraBlock>,
    scene: TypedBuffer<'ctx, SceneBlock>,
    ambient: TypedBuffer<'ctx, AmbientBlock>,
    directional: TypedBuffer<'ctx, DirectionalBlock>,
    point_lights: TypedBuffer<'ctx, PointLightBlock>,
    channel_size: TypedBuffer<'ctx, ChannelSizeBlock>,
    channel_tiling: TypedBuffer<'ctx, ChannelTilingBlock>,
}

impl<'ctx> GlobalUniforms<'ctx> {
    pub fn new(context: &'ctx GpuContext) -> RenderResult<Self> {
        Ok(Self {
            transform: TypedBuffer::uniform(context, &TransformBlock::identity())?,
            camera: TypedBuffer::new(context, BufferKind::Uniform, 1)?,
            scene: TypedBuffer::new(context, BufferKind::Uniform, 1)?,
            ambient: TypedBuffer::new(context, BufferKind::Uniform, 1)?,
            directional: TypedBuffer::new(context, BufferKind::Uniform, 1)?,
            point_lights: TypedBuffer::new(context, BufferKind::Uniform, 1)?,
            channel_size: TypedBuffer::new(context, BufferKind::Uniform, 1)?,
            channel_tiling: TypedBuffer::uniform(context, &ChannelTilingBlock::default())?,
        })
    }

    /// Fails with [`RenderError::PointLightOverflow`] without touching the
    /// GPU when there are more point lights than the block holds.
    pub fn check(params: &GlobalParameters) -> RenderResult<()> {
        let count = params.point_lights.len();
        if count > MAX_POINT_LIGHTS {
            return Err(RenderError::PointLightOverflow {
                count,
                max: MAX_POINT_LIGHTS,
            });
        }
        Ok(())
    }

    /// Fills and uploads every block.
    #[allow(clippy::cast_precision_loss)]
    pub fn upload(
        &self,
        params: &GlobalParameters,
        channels: &[Option<TextureChannel<'ctx>>; MAX_TEXTURE_CHANNELS],
    ) -> RenderResult<()> {
        Self::check(params)?;
        let camera = &params.camera;
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        self.transform
            .set_data(&[TransformBlock::new(params.model, view, projection)])?;

        self.camera.set_data(&[CameraBlock {
            position: camera.position().extend(1.0).to_array(),
            forward: camera.forward().extend(0.0).to_array(),
            up: camera.up().extend(0.0).to_array(),
            right: camera.right().extend(0.0).to_array(),
            params: [camera.near, camera.far, camera.fov, camera.aspect_ratio],
        }])?;

        let scene = &params.scene;
        self.scene.set_data(&[SceneBlock {
            resolution_mouse: [
                scene.resolution.x,
                scene.resolution.y,
                scene.mouse.x,
                scene.mouse.y,
            ],
            date: scene.date_vector(),
            timing: [
                scene.elapsed,
                scene.delta_time,
                scene.frame_rate,
                scene.frame_count as f32,
            ],
        }])?;

        self.ambient.set_data(&[AmbientBlock {
            color: vec4(params.ambient.color),
        }])?;
        self.directional.set_data(&[DirectionalBlock {
            color: vec4(params.directional.color),
            position: params.directional.position.extend(1.0).to_array(),
            direction: params.directional.direction().extend(0.0).to_array(),
        }])?;

        let mut lights = PointLightBlock::zeroed();
        for (slot, light) in lights.lights.iter_mut().zip(&params.point_lights) {
            *slot = PointLightData {
                color: vec4(light.color),
                position_range: light.position.extend(light.range).to_array(),
            };
        }
        lights.count[0] = params.point_lights.len() as u32;
        self.point_lights.set_data(&[lights])?;

        let mut sizes = ChannelSizeBlock::zeroed();
        let mut tiling = ChannelTilingBlock::default();
        for (i, channel) in channels.iter().enumerate() {
            if let Some(channel) = channel {
                let (w, h) = channel.texture.size();
                let (w, h) = (w.max(1) as f32, h.max(1) as f32);
                sizes.channels[i] = [1.0 / w, 1.0 / h, w, h];
                tiling.channels[i] = [
                    channel.tiling.x,
                    channel.tiling.y,
                    channel.offset.x,
                    channel.offset.y,
                ];
            }
        }
        self.channel_size.set_data(&[sizes])?;
        self.channel_tiling.set_data(&[tiling])
    }

    /// Attaches the blocks to slots `0..8`.
    pub fn bind(&self, pipeline: &RenderPipeline<'_>) {
        pipeline.bind_uniform_block(TRANSFORM_SLOT, &self.transform);
        pipeline.bind_uniform_block(CAMERA_SLOT, &self.camera);
        pipeline.bind_uniform_block(SCENE_SLOT, &self.scene);
        pipeline.bind_uniform_block(AMBIENT_SLOT, &self.ambient);
        pipeline.bind_uniform_block(DIRECTIONAL_SLOT, &self.directional);
        pipeline.bind_uniform_block(POINT_LIGHTS_SLOT, &self.point_lights);
        pipeline.bind_uniform_block(CHANNEL_SIZE_SLOT, &self.channel_size);
        pipeline.bind_uniform_block(CHANNEL_TILING_SLOT, &self.channel_tiling);
    }

    /// Reads the transform block back.
    #[must_use]
    pub fn transform(&self) -> TransformBlock {
        self.transform
            .get_data()
            .first()
            .copied()
            .unwrap_or_else(TransformBlock::identity)
    }

    /// Reads the point-light block back.
    #[must_use]
    pub fn point_lights(&self) -> PointLightBlock {
        self.point_lights
            .get_data()
            .first()
            .copied()
            .unwrap_or_else(PointLightBlock::zeroed)
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use glam::Vec3;
    use strata_core::PointLight;

    use super::*;
    use crate::software::SoftwareBackend;

    #[test]
    fn test_block_sizes_are_std140() {
        assert_eq!(size_of::<TransformBlock>(), 5 * 64);
        assert_eq!(size_of::<CameraBlock>(), 80);
        assert_eq!(size_of::<PointLightBlock>(), MAX_POINT_LIGHTS * 32 + 16);
        assert_eq!(size_of::<ChannelTilingBlock>() % 16, 0);
    }

    #[test]
    fn test_normal_matrix_of_scaled_model() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let block = TransformBlock::new(model, Mat4::IDENTITY, Mat4::IDENTITY);
        assert!((block.normal_matrix[0][0] - 0.5).abs() < 1e-6);
        let flat = TransformBlock::new(Mat4::from_scale(Vec3::ZERO), Mat4::IDENTITY, Mat4::IDENTITY);
        assert_eq!(flat.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn test_upload_counts_lights() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let globals = GlobalUniforms::new(&ctx).unwrap();
        let mut params = GlobalParameters::default();
        params.point_lights = vec![
            PointLight {
                position: Vec3::new(1.0, 2.0, 3.0),
                range: 4.0,
                ..PointLight::default()
            };
            3
        ];
        params.model = Mat4::from_translation(Vec3::X);
        globals.upload(&params, &Default::default()).unwrap();
        let lights = globals.point_lights();
        assert_eq!(lights.count[0], 3);
        assert_eq!(lights.lights[2].position_range, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(lights.lights[3].position_range, [0.0; 4]);
        assert_eq!(globals.transform().model, params.model.to_cols_array_2d());
    }
}
