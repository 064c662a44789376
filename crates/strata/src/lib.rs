//! strata: a layered real-time 3D rendering framework.
//!
//! Materials draw meshes through render pipelines whose fixed-function state
//! comes from a small set of render-layer presets. A state-diffing context
//! forwards only the state that actually changes. Objects are picked by
//! rendering them in flat id colours and reading back the pixel under the
//! cursor.
//!
//! # Quick Start
//!
//! ```no_run
//! use strata::*;
//!
//! fn main() -> strata::Result<()> {
//!     init();
//!     let context = GpuContext::new(SoftwareBackend::new(640, 480));
//!     let mut viewer = Viewer::new(&context, 640, 480, Options::default())?;
//!     viewer.load_sample(&SampleRegistry::builtin(), "picking")?;
//!
//!     let input = ViewportInput {
//!         size: (640, 480),
//!         focused: true,
//!         ..ViewportInput::default()
//!     };
//!     viewer.frame(&input)?;
//!     viewer.capture()?.save("picking.png").ok();
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `strata-core`: ids, selection, scene bookkeeping, lights, options
//! - `strata-render`: context, buffers, pipelines, materials, picking
//! - `strata`: this facade, the sample registry and the [`Viewer`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

mod error;
pub mod samples;
mod viewer;

pub use error::{Error, Result};
pub use samples::{Sample, SampleEntry, SampleFactory, SampleRegistry};
pub use viewer::Viewer;

// Re-export core types
pub use strata_core::{
    AmbientLight, ClickMode, ColorId, DirectionalLight, Inspector, ObjectId, Options,
    OutlineOptions, PointLight, Property, PropertyKind, PropertyValue, SceneController,
    SceneObject, Selection, StrataError, Transform, MAX_INSTANCES_PER_PAGE,
};
pub use strata_core::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export render types
pub use strata_render::{
    shapes, Backend, Camera, Diffuse, EdgeDetection, Frame, GlobalParameters, GpuContext, Grid,
    InstancedSolidColor, Material, MaterialCore, Mesh, Outline, PickTarget, PickupController,
    RenderError, RenderLayer, RenderPass, RenderPipeline, RenderResult, RenderState, Scene,
    SceneData, Sky, SoftwareBackend, SolidColor, Specular, Texture, Vertex, VertexColor,
    ViewportInput, WgpuBackend,
};

/// Sets up `env_logger` logging. Safe to call more than once.
pub fn init() {
    if env_logger::try_init().is_ok() {
        log::info!("strata {} initialized", env!("CARGO_PKG_VERSION"));
    }
}
