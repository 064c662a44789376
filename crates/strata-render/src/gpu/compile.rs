//! GLSL and SPIR-V stages to naga modules, plus binding reflection.
//!
//! Only the resources a stage actually touches are reflected, so the shared
//! global declarations prepended to every stage do not inflate the layouts.

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::shader::{ShaderCode, ShaderModule, ShaderStage};

/// Bind groups every program layout declares: uniforms, storage, textures,
/// samplers. Unused groups get empty layouts.
pub(crate) const GROUP_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceKind {
    Uniform,
    Storage { read_only: bool },
    Texture,
    Sampler,
}

/// One bound resource of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resource {
    pub group: u32,
    /// The binding number doubles as the uniform/storage slot or texture
    /// unit the resource is fed from.
    pub binding: u32,
    pub kind: ResourceKind,
    pub visibility: wgpu::ShaderStages,
}

/// A validated stage ready for `create_shader_module`.
#[derive(Debug)]
pub(crate) struct CompiledStage {
    pub module: naga::Module,
    pub entry_point: String,
    pub resources: Vec<Resource>,
}

fn naga_stage(stage: ShaderStage) -> Result<naga::ShaderStage, String> {
    match stage {
        ShaderStage::Vertex => Ok(naga::ShaderStage::Vertex),
        ShaderStage::Fragment => Ok(naga::ShaderStage::Fragment),
        ShaderStage::Compute => Ok(naga::ShaderStage::Compute),
        ShaderStage::Geometry => Err("wgpu has no geometry stage".into()),
    }
}

fn visibility(stage: ShaderStage) -> wgpu::ShaderStages {
    match stage {
        ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
        ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
        ShaderStage::Compute => wgpu::ShaderStages::COMPUTE,
        ShaderStage::Geometry => wgpu::ShaderStages::NONE,
    }
}

/// Drops the reference-rasterizer hints, which naga's preprocessor rejects.
fn strip_reference_pragmas(source: &str) -> String {
    source
        .lines()
        .filter(|line| !line.trim_start().starts_with("#pragma reference"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses and validates one stage.
pub(crate) fn compile(module: &ShaderModule) -> Result<CompiledStage, String> {
    let stage = naga_stage(module.stage)?;
    let prefix = format!("{:?} stage", module.stage);
    let (parsed, info) = match &module.code {
        ShaderCode::Source(source) => {
            let source = strip_reference_pragmas(source);
            let parsed = naga::front::glsl::Frontend::default()
                .parse(&naga::front::glsl::Options::from(stage), &source)
                .map_err(|e| format!("{prefix}: {}", e.emit_to_string(&source)))?;
            let info = Validator::new(ValidationFlags::all(), Capabilities::all())
                .validate(&parsed)
                .map_err(|e| format!("{prefix}: {}", e.emit_to_string(&source)))?;
            (parsed, info)
        }
        ShaderCode::Binary(bytes) => {
            let parsed =
                naga::front::spv::parse_u8_slice(bytes, &naga::front::spv::Options::default())
                    .map_err(|e| format!("{prefix}: {e}"))?;
            let info = Validator::new(ValidationFlags::all(), Capabilities::all())
                .validate(&parsed)
                .map_err(|e| format!("{prefix}: {}", e.as_inner()))?;
            (parsed, info)
        }
    };
    let Some(index) = parsed.entry_points.iter().position(|ep| ep.stage == stage) else {
        return Err(format!("{prefix}: no {stage:?} entry point"));
    };
    let entry_point = parsed.entry_points[index].name.clone();
    let resources = reflect(&parsed, info.get_entry_point(index), module.stage)?;
    Ok(CompiledStage {
        module: parsed,
        entry_point,
        resources,
    })
}

fn reflect(
    module: &naga::Module,
    function: &naga::valid::FunctionInfo,
    stage: ShaderStage,
) -> Result<Vec<Resource>, String> {
    let mut resources = Vec::new();
    for (handle, var) in module.global_variables.iter() {
        if function[handle].is_empty() {
            continue;
        }
        let Some(binding) = &var.binding else {
            continue;
        };
        let kind = match var.space {
            naga::AddressSpace::Uniform => ResourceKind::Uniform,
            naga::AddressSpace::Storage { access } => ResourceKind::Storage {
                read_only: !access.contains(naga::StorageAccess::STORE),
            },
            naga::AddressSpace::Handle => match module.types[var.ty].inner {
                naga::TypeInner::Image { .. } => ResourceKind::Texture,
                naga::TypeInner::Sampler { .. } => ResourceKind::Sampler,
                _ => continue,
            },
            _ => continue,
        };
        if binding.group >= GROUP_COUNT {
            return Err(format!(
                "{stage:?} stage: set {} is past the last bind group ({})",
                binding.group,
                GROUP_COUNT - 1
            ));
        }
        resources.push(Resource {
            group: binding.group,
            binding: binding.binding,
            kind,
            visibility: visibility(stage),
        });
    }
    Ok(resources)
}

/// Joins the resources of two stages; a binding shared by both must agree
/// on its kind.
pub(crate) fn merge(a: &[Resource], b: &[Resource]) -> Result<Vec<Resource>, String> {
    let mut merged = a.to_vec();
    for resource in b {
        match merged
            .iter_mut()
            .find(|r| r.group == resource.group && r.binding == resource.binding)
        {
            Some(existing) if existing.kind == resource.kind => {
                existing.visibility |= resource.visibility;
            }
            Some(existing) => {
                return Err(format!(
                    "link error: set {} binding {} is {:?} in one stage and {:?} in the other",
                    resource.group, resource.binding, existing.kind, resource.kind
                ));
            }
            None => merged.push(*resource),
        }
    }
    Ok(merged)
}
