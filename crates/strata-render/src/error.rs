//! Rendering error types.

use thiserror::Error;

use crate::shader::ShaderStage;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No graphics adapter matched the request.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// The adapter refused to create a device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// `set_data` was called with the wrong number of elements.
    #[error("invalid length: buffer holds {expected} elements, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// More point lights than the global uniform block can hold.
    #[error("{count} point lights exceed the maximum of {max}")]
    PointLightOverflow { count: usize, max: usize },

    /// A material-specific block tried to bind below the reserved range.
    #[error("binding slot {slot} is reserved for global uniforms (first free slot is {first_free})")]
    ReservedBinding { slot: u32, first_free: u32 },

    /// A texture channel index past the supported channel count.
    #[error("texture channel {channel} out of range (max {max})")]
    ChannelOutOfRange { channel: usize, max: usize },

    /// A vertex attribute referred to a field the layout does not declare.
    #[error("vertex layout has no field named '{0}'")]
    UnknownVertexField(String),

    /// A shader stage failed to compile.
    #[error("{stage:?} shader compilation failed: {message}")]
    ShaderCompilationFailed { stage: ShaderStage, message: String },

    /// Program linking failed; carries the backend diagnostic.
    #[error("program link failed: {0}")]
    ProgramLink(String),

    /// The backend could not allocate a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),

    /// Frame capture failed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Image encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Core error (properties, registry).
    #[error(transparent)]
    Core(#[from] strata_core::StrataError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
