//! Core types for strata.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`ObjectId`] and [`ColorId`] for colour-coded picking
//! - [`Selection`] with the click semantics used by the picking controller
//! - [`SceneController`] mapping object names to ids and transforms
//! - Light descriptions, [`Options`] and the [`Inspector`] property seam

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod light;
pub mod options;
pub mod pick;
pub mod property;
pub mod registry;
pub mod selection;
pub mod transform;

pub use error::{Result, StrataError};
pub use light::{AmbientLight, DirectionalLight, PointLight};
pub use options::{Options, OutlineOptions, MAX_INSTANCES_PER_PAGE};
pub use pick::{ColorId, ObjectId, PICK_ALPHA};
pub use property::{Inspector, Property, PropertyKind, PropertyValue};
pub use registry::{SceneController, SceneObject};
pub use selection::{ClickMode, Selection};
pub use transform::Transform;

// Re-export glam types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
