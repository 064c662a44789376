//! Error type of the facade crate.

use thiserror::Error;

/// Errors raised by the viewer and the sample registry.
#[derive(Error, Debug)]
pub enum Error {
    /// Scene bookkeeping or configuration failed.
    #[error(transparent)]
    Core(#[from] strata_core::StrataError),

    /// A GPU operation failed.
    #[error(transparent)]
    Render(#[from] strata_render::RenderError),

    /// No sample with this name is registered.
    #[error("unknown sample '{0}'")]
    UnknownSample(String),

    /// A sample with this name is already registered.
    #[error("sample '{0}' is already registered")]
    DuplicateSample(String),
}

/// A specialized Result type for the facade crate.
pub type Result<T> = std::result::Result<T, Error>;
