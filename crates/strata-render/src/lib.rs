//! Rendering core for strata.
//!
//! This crate provides:
//! - a state-diffing [`GpuContext`] over a pluggable [`Backend`]
//! - typed buffers, textures, frames and meshes that borrow the context
//! - shaders, render pipelines and the render-layer presets
//! - materials: global uniform assembly plus concrete material cores
//! - the [`Scene`] viewport and the [`PickupController`]
//! - [`WgpuBackend`], which compiles the GLSL stages with naga and draws on wgpu
//! - a software reference backend and a call-recording wrapper for tests
//! - wgpu descriptor translation and frame capture

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod backend;
pub mod buffer;
pub mod camera;
pub mod capture;
pub mod context;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod material;
pub mod materials;
pub mod mesh;
pub mod pick;
pub mod pipeline;
pub mod recording;
pub mod scene;
pub mod shader;
pub mod software;
pub mod state;
pub mod texture;
pub mod wgpu_state;

pub use backend::{
    Backend, BufferKind, Capability, ClearValues, StateChange, StateKind, TextureDesc, TextureFormat,
};
pub use buffer::TypedBuffer;
pub use camera::{Camera, Projection};
pub use capture::{frame_to_image, frame_to_png, save_frame};
pub use context::GpuContext;
pub use error::{RenderError, RenderResult};
pub use frame::{Frame, FrameScope};
pub use gpu::WgpuBackend;
pub use material::{
    DrawCall, GlobalParameters, GlobalUniforms, InstanceModel, Material, MaterialCore, SceneData,
    TextureChannel, MAX_POINT_LIGHTS, MAX_TEXTURE_CHANNELS, UNIFORM_BUFFER_BINDING_START,
};
pub use materials::{
    Diffuse, EdgeDetection, Grid, InstancedSolidColor, Outline, Sky, SolidColor, Specular,
    VertexColor,
};
pub use mesh::{shapes, Mesh, Vertex, VertexField, VertexLayout};
pub use pick::{PickTarget, PickupController};
pub use pipeline::{RenderPass, RenderPipeline};
pub use recording::{Call, CallLog, RecordingBackend};
pub use scene::{Scene, ViewportInput};
pub use shader::{Shader, ShaderBuilder, ShaderCode, ShaderModule, ShaderStage};
pub use software::SoftwareBackend;
pub use state::{
    BlendEquation, BlendFactor, Comparison, Face, PolygonMode, RenderLayer, RenderState, Winding,
};
pub use texture::Texture;
