//! Shader management.

use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::backend::ProgramId;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

/// Ready-to-link stage code, produced by an offline compiler or written by
/// hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderCode {
    Source(String),
    Binary(Vec<u8>),
}

/// One stage of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderModule {
    pub stage: ShaderStage,
    pub code: ShaderCode,
}

impl ShaderModule {
    /// A stage given as source text.
    pub fn source(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            code: ShaderCode::Source(source.into()),
        }
    }

    /// A stage given as precompiled bytecode.
    pub fn binary(stage: ShaderStage, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            stage,
            code: ShaderCode::Binary(bytes.into()),
        }
    }
}

/// Builder for creating shader programs.
#[derive(Debug, Clone, Default)]
pub struct ShaderBuilder {
    modules: Vec<ShaderModule>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the vertex stage source.
    #[must_use]
    pub fn with_vertex(self, source: impl Into<String>) -> Self {
        self.with_module(ShaderModule::source(ShaderStage::Vertex, source))
    }

    /// Adds (or replaces) the fragment stage source.
    #[must_use]
    pub fn with_fragment(self, source: impl Into<String>) -> Self {
        self.with_module(ShaderModule::source(ShaderStage::Fragment, source))
    }

    /// Adds (or replaces) the geometry stage source.
    #[must_use]
    pub fn with_geometry(self, source: impl Into<String>) -> Self {
        self.with_module(ShaderModule::source(ShaderStage::Geometry, source))
    }

    /// Adds (or replaces) a stage; at most one module per stage is kept.
    #[must_use]
    pub fn with_module(mut self, module: ShaderModule) -> Self {
        self.modules.retain(|m| m.stage != module.stage);
        self.modules.push(module);
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Compiles and links the stages on `context`.
    ///
    /// An empty stage set fails with [`RenderError::ShaderCompilationFailed`];
    /// a backend rejection fails with [`RenderError::ProgramLink`] carrying
    /// the backend diagnostic. Nothing is left allocated on failure.
    pub fn build(self, context: &GpuContext) -> RenderResult<Shader<'_>> {
        let Some(first) = self.modules.first() else {
            return Err(RenderError::ShaderCompilationFailed {
                stage: ShaderStage::Vertex,
                message: "no shader stages given".into(),
            });
        };
        let label = self
            .label
            .unwrap_or_else(|| format!("{:?} program", first.stage).to_lowercase());
        let program = context
            .backend()
            .create_program(&self.modules)
            .map_err(|message| {
                log::warn!("failed to link '{label}': {message}");
                RenderError::ProgramLink(message)
            })?;
        log::debug!("linked program '{label}' ({} stages)", self.modules.len());
        Ok(Shader {
            context,
            program,
            label,
        })
    }
}

/// A linked GPU program. Deleted on drop.
pub struct Shader<'ctx> {
    context: &'ctx GpuContext,
    program: ProgramId,
    label: String,
}

impl<'ctx> Shader<'ctx> {
    /// The backend handle.
    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.program
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn context(&self) -> &'ctx GpuContext {
        self.context
    }

    pub(crate) fn activate(&self) {
        self.context.use_program(Some(self.program));
    }
}

impl Drop for Shader<'_> {
    fn drop(&mut self) {
        log::debug!("deleting program '{}'", self.label);
        self.context.backend().delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Call, RecordingBackend};
    use crate::software::SoftwareBackend;

    #[test]
    fn test_link_failure_carries_diagnostic() {
        let context = GpuContext::new(SoftwareBackend::new(1, 1));
        let result = ShaderBuilder::new()
            .with_vertex("void main() {}")
            .with_fragment("#error unknown sampler 'albedo_map'")
            .build(&context);
        match result {
            Err(RenderError::ProgramLink(message)) => assert!(message.contains("albedo_map")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("link should have failed"),
        }
    }

    #[test]
    fn test_missing_stage_is_link_error() {
        let context = GpuContext::new(SoftwareBackend::new(1, 1));
        let result = ShaderBuilder::new().with_vertex("void main() {}").build(&context);
        assert!(matches!(result, Err(RenderError::ProgramLink(_))));
        assert!(matches!(
            ShaderBuilder::new().build(&context),
            Err(RenderError::ShaderCompilationFailed { .. })
        ));
    }

    #[test]
    fn test_program_deleted_on_drop() {
        let backend = RecordingBackend::new(SoftwareBackend::new(1, 1));
        let log = backend.log();
        let context = GpuContext::new(backend);
        let shader = ShaderBuilder::new()
            .with_vertex("void main() {}")
            .with_fragment("void main() {}")
            .with_label("flat")
            .build(&context)
            .unwrap();
        let id = shader.id();
        drop(shader);
        assert_eq!(log.count(|c| *c == Call::DeleteProgram(id)), 1);
    }

    #[test]
    fn test_builder_keeps_one_module_per_stage() {
        let builder = ShaderBuilder::new().with_vertex("a").with_vertex("b");
        assert_eq!(builder.modules.len(), 1);
        assert_eq!(
            builder.modules[0].code,
            ShaderCode::Source("b".to_string())
        );
    }
}
